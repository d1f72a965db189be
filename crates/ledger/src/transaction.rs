use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pickbay_core::{DomainError, JobId, JobItemId, LocationId, OperatorId, SkuId, TxId};

/// Kind of ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxKind {
    Pick,
    Receive,
    Undo,
}

impl TxKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TxKind::Pick => "pick",
            TxKind::Receive => "receive",
            TxKind::Undo => "undo",
        }
    }

    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s.to_lowercase().as_str() {
            "pick" => Ok(TxKind::Pick),
            "receive" => Ok(TxKind::Receive),
            "undo" => Ok(TxKind::Undo),
            other => Err(DomainError::validation(format!(
                "transaction kind must be one of: pick, receive, undo (got '{other}')"
            ))),
        }
    }
}

/// One committed inventory movement.
///
/// `qty_delta` is the signed change to on-hand stock: negative for outbound
/// picks, positive for receipts. An UNDO entry negates its original's delta
/// and references it through `ref_tx_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanTransaction {
    pub id: TxId,
    pub job_id: JobId,
    pub job_item_id: JobItemId,
    pub sku_code: SkuId,
    pub location_id: LocationId,
    pub qty_delta: i64,
    pub operator_id: OperatorId,
    pub kind: TxKind,
    /// For UNDO entries: the transaction being reversed.
    pub ref_tx_id: Option<TxId>,
    /// Whether the commit went through an explicit force override.
    pub forced: bool,
    pub force_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ScanTransaction {
    /// The quantity the operator scanned (unsigned view of the delta).
    pub fn scanned_qty(&self) -> i64 {
        self.qty_delta.abs()
    }

    /// The compensating entry that reverses this transaction.
    pub fn reversal(
        &self,
        id: TxId,
        operator_id: OperatorId,
        forced: bool,
        created_at: DateTime<Utc>,
    ) -> ScanTransaction {
        ScanTransaction {
            id,
            job_id: self.job_id,
            job_item_id: self.job_item_id,
            sku_code: self.sku_code.clone(),
            location_id: self.location_id,
            qty_delta: -self.qty_delta,
            operator_id,
            kind: TxKind::Undo,
            ref_tx_id: Some(self.id),
            forced,
            force_reason: None,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pick_tx(delta: i64) -> ScanTransaction {
        ScanTransaction {
            id: TxId::new(),
            job_id: JobId::new(),
            job_item_id: JobItemId::new(),
            sku_code: SkuId::parse("SKU-1").unwrap(),
            location_id: LocationId::new(),
            qty_delta: delta,
            operator_id: OperatorId::new(),
            kind: TxKind::Pick,
            ref_tx_id: None,
            forced: false,
            force_reason: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn reversal_negates_the_delta_and_links_back() {
        let original = pick_tx(-4);
        let undo = original.reversal(TxId::new(), OperatorId::new(), false, Utc::now());

        assert_eq!(undo.kind, TxKind::Undo);
        assert_eq!(undo.qty_delta, 4);
        assert_eq!(undo.ref_tx_id, Some(original.id));
        assert_eq!(undo.job_item_id, original.job_item_id);
        assert_eq!(undo.location_id, original.location_id);
    }

    #[test]
    fn scanned_qty_is_the_unsigned_delta() {
        assert_eq!(pick_tx(-7).scanned_qty(), 7);
        assert_eq!(pick_tx(3).scanned_qty(), 3);
    }
}
