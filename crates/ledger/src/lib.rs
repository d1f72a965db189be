//! Scan transaction ledger.
//!
//! The append-only record of every committed inventory movement, plus the
//! pure planning logic for compensating reversals. Entries are never deleted
//! or mutated; an undo appends an inverse entry referencing the original.

pub mod transaction;
pub mod undo;

pub use transaction::{ScanTransaction, TxKind};
pub use undo::{latest_reversible, preview_undo, UndoPreview};
