use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pickbay_core::{ConflictKind, DomainError, JobId, JobItemId, OperatorId, SkuId, StoreId};

/// Direction of the planned warehouse work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    Outbound,
    Return,
    Inbound,
}

impl JobType {
    /// Outbound jobs decrement stock; returns and inbound receipts increment.
    pub fn is_outbound(self) -> bool {
        matches!(self, JobType::Outbound)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobType::Outbound => "outbound",
            JobType::Return => "return",
            JobType::Inbound => "inbound",
        }
    }

    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s.to_lowercase().as_str() {
            "outbound" => Ok(JobType::Outbound),
            "return" => Ok(JobType::Return),
            "inbound" => Ok(JobType::Inbound),
            other => Err(DomainError::validation(format!(
                "job type must be one of: outbound, return, inbound (got '{other}')"
            ))),
        }
    }
}

/// Job lifecycle status.
///
/// DONE is derived, not terminal: an undo can reopen a finished job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Open,
    Done,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Open => "open",
            JobStatus::Done => "done",
        }
    }

    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s.to_lowercase().as_str() {
            "open" => Ok(JobStatus::Open),
            "done" => Ok(JobStatus::Done),
            other => Err(DomainError::validation(format!(
                "job status must be one of: open, done (got '{other}')"
            ))),
        }
    }
}

/// A unit of planned warehouse work (pick, receive, or return).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub job_type: JobType,
    pub status: JobStatus,
    pub store_id: StoreId,
    /// Batch grouping: jobs split from one upload share a parent.
    pub parent_id: Option<JobId>,
    /// Stock-availability gate override; see the shortage-pool routing rules.
    pub allow_overpick: bool,
    pub operator_id: OperatorId,
    /// Bumped on every mutation; commits carry the expected value.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(
        id: JobId,
        job_type: JobType,
        store_id: StoreId,
        parent_id: Option<JobId>,
        allow_overpick: bool,
        operator_id: OperatorId,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            job_type,
            status: JobStatus::Open,
            store_id,
            parent_id,
            allow_overpick,
            operator_id,
            version: 0,
            created_at,
            updated_at: created_at,
        }
    }
}

/// One planned line: a SKU with target and running-picked quantities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobItem {
    pub id: JobItemId,
    pub job_id: JobId,
    pub sku_code: SkuId,
    pub maker_code: Option<String>,
    /// Product name snapshot taken at job creation.
    pub name: String,
    pub qty_planned: i64,
    pub qty_picked: i64,
    pub extra_approved_qty: i64,
    pub extra_picked_qty: i64,
    /// Bumped on every mutation; commits carry the expected value.
    pub version: u64,
}

impl JobItem {
    pub fn planned(
        id: JobItemId,
        job_id: JobId,
        sku_code: SkuId,
        maker_code: Option<String>,
        name: String,
        qty_planned: i64,
    ) -> Self {
        Self {
            id,
            job_id,
            sku_code,
            maker_code,
            name,
            qty_planned,
            qty_picked: 0,
            extra_approved_qty: 0,
            extra_picked_qty: 0,
            version: 0,
        }
    }

    /// A line registered by a forced scan of an item the plan did not contain.
    ///
    /// Planned quantity is zero, so any pick against it needs an approval
    /// before it can commit.
    pub fn unplanned(id: JobItemId, job_id: JobId, sku_code: SkuId) -> Self {
        let name = sku_code.as_str().to_string();
        Self::planned(id, job_id, sku_code, None, name, 0)
    }

    /// Total quantity the line may reach: plan plus granted approvals.
    pub fn allowed_total(&self) -> i64 {
        self.qty_planned + self.extra_approved_qty
    }

    /// Whether the line has reached (or exceeded) its planned quantity.
    pub fn is_satisfied(&self) -> bool {
        self.qty_picked >= self.qty_planned
    }
}

/// Quantity gate for a prospective scan of `qty` against `item`.
///
/// Commits are allowed up to `qty_planned + extra_approved_qty`; anything
/// beyond returns `QUANTITY_CONFLICT` carrying the missing approval amount.
/// An approval granted via the approval gate is itself the explicit override,
/// so a scan landing inside the approved allowance commits directly.
pub fn quantity_gate(item: &JobItem, qty: i64) -> Result<(), DomainError> {
    if qty <= 0 {
        return Err(DomainError::validation("qty must be a positive integer"));
    }

    let next_picked = item.qty_picked + qty;
    let allowed = item.allowed_total();
    if next_picked > allowed {
        return Err(DomainError::conflict(ConflictKind::QuantityConflict {
            need: next_picked - allowed,
        }));
    }

    Ok(())
}

/// Line counters after committing (or reversing) `delta` scanned units.
///
/// `extra_picked_qty` is derived: the part of the running total beyond plan.
pub fn next_counters(item: &JobItem, delta: i64) -> (i64, i64) {
    let picked = item.qty_picked + delta;
    let extra = (picked - item.qty_planned).max(0);
    (picked, extra)
}

/// Derived job status: DONE once every line reached its plan.
///
/// A job with no lines stays OPEN (status is only recomputed on commit/undo,
/// and an empty job has committed nothing).
pub fn recompute_status(items: &[JobItem]) -> JobStatus {
    if !items.is_empty() && items.iter().all(JobItem::is_satisfied) {
        JobStatus::Done
    } else {
        JobStatus::Open
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_item(planned: i64, picked: i64, approved: i64) -> JobItem {
        let mut item = JobItem::planned(
            JobItemId::new(),
            JobId::new(),
            SkuId::parse("SKU-1").unwrap(),
            None,
            "Widget".to_string(),
            planned,
        );
        item.qty_picked = picked;
        item.extra_approved_qty = approved;
        item.extra_picked_qty = (picked - planned).max(0);
        item
    }

    #[test]
    fn scan_within_plan_passes() {
        let item = test_item(10, 4, 0);
        assert!(quantity_gate(&item, 4).is_ok());
    }

    #[test]
    fn scan_landing_exactly_on_plan_passes() {
        let item = test_item(10, 6, 0);
        assert!(quantity_gate(&item, 4).is_ok());
    }

    #[test]
    fn scan_beyond_plan_without_approval_reports_missing_amount() {
        let item = test_item(10, 8, 0);
        let err = quantity_gate(&item, 4).unwrap_err();
        assert_eq!(
            err.conflict_kind(),
            Some(ConflictKind::QuantityConflict { need: 2 })
        );
    }

    #[test]
    fn approval_extends_the_allowance_without_further_force() {
        let item = test_item(10, 8, 2);
        assert!(quantity_gate(&item, 4).is_ok());
    }

    #[test]
    fn one_past_the_approved_total_needs_one_more() {
        let item = test_item(10, 8, 2);
        let err = quantity_gate(&item, 5).unwrap_err();
        assert_eq!(
            err.conflict_kind(),
            Some(ConflictKind::QuantityConflict { need: 1 })
        );
    }

    #[test]
    fn non_positive_qty_is_a_validation_error() {
        let item = test_item(10, 0, 0);
        assert!(matches!(
            quantity_gate(&item, 0),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            quantity_gate(&item, -3),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn counters_track_extra_beyond_plan() {
        let item = test_item(10, 8, 2);
        assert_eq!(next_counters(&item, 4), (12, 2));

        let item = test_item(10, 4, 0);
        assert_eq!(next_counters(&item, 4), (8, 0));
    }

    #[test]
    fn counters_reverse_cleanly_on_undo() {
        let item = test_item(10, 12, 2);
        assert_eq!(next_counters(&item, -4), (8, 0));
    }

    #[test]
    fn status_is_done_only_when_every_line_is_satisfied() {
        let done = vec![test_item(10, 10, 0), test_item(5, 7, 2)];
        assert_eq!(recompute_status(&done), JobStatus::Done);

        let open = vec![test_item(10, 10, 0), test_item(5, 4, 0)];
        assert_eq!(recompute_status(&open), JobStatus::Open);

        assert_eq!(recompute_status(&[]), JobStatus::Open);
    }

    proptest! {
        /// Property: the gate never admits a scan past plan + approval, and
        /// the conflict amount is exactly the shortfall.
        #[test]
        fn gate_never_exceeds_allowance(
            planned in 0i64..1_000,
            picked in 0i64..1_000,
            approved in 0i64..100,
            qty in 1i64..500,
        ) {
            let item = test_item(planned, picked, approved);
            match quantity_gate(&item, qty) {
                Ok(()) => prop_assert!(picked + qty <= planned + approved),
                Err(DomainError::Conflict(ConflictKind::QuantityConflict { need })) => {
                    prop_assert_eq!(need, picked + qty - (planned + approved));
                    prop_assert!(need > 0);
                }
                Err(other) => prop_assert!(false, "unexpected error: {other:?}"),
            }
        }
    }
}
