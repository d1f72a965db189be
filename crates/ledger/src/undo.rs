//! Undo planning (pure; no store access).

use std::collections::HashSet;

use serde::Serialize;

use pickbay_core::TxId;

use crate::transaction::{ScanTransaction, TxKind};

/// Find the most recent transaction that can still be reversed.
///
/// `txs` must be in append (oldest-first) order. UNDO entries are terminal:
/// only PICK/RECEIVE entries not already referenced by an UNDO qualify.
pub fn latest_reversible(txs: &[ScanTransaction]) -> Option<&ScanTransaction> {
    let undone: HashSet<TxId> = txs.iter().filter_map(|t| t.ref_tx_id).collect();

    txs.iter()
        .rev()
        .find(|t| t.kind != TxKind::Undo && !undone.contains(&t.id))
}

/// Predicted effect of reversing one transaction, computed without mutating
/// anything. `undo_last` must agree with this exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UndoPreview {
    /// The transaction that would be reversed.
    pub tx_id: TxId,
    pub will_go_negative: bool,
    /// On-hand at the transaction's location right now.
    pub current_qty: i64,
    /// Signed delta the undo would apply.
    pub undo_qty: i64,
    /// On-hand after the undo.
    pub result_qty: i64,
    pub location_code: String,
}

/// Simulate reversing `tx` against the current on-hand at its location.
pub fn preview_undo(
    tx: &ScanTransaction,
    current_on_hand: i64,
    location_code: impl Into<String>,
) -> UndoPreview {
    let undo_qty = -tx.qty_delta;
    let result_qty = current_on_hand + undo_qty;
    UndoPreview {
        tx_id: tx.id,
        will_go_negative: result_qty < 0,
        current_qty: current_on_hand,
        undo_qty,
        result_qty,
        location_code: location_code.into(),
    }
}
