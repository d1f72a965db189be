//! Infrastructure layer: warehouse store backends and the reconciliation
//! engine that orchestrates them.

pub mod engine;
pub mod store;


pub use engine::{
    BlockedUndo, CreateJob, CreateJobItem, EngineError, NewLocation, ReceiveRequest,
    ReconciliationEngine, ScanAccepted, ScanRequest, UndoAllReport, UndoApplied,
};
pub use store::{InMemoryWarehouseStore, JobFilter, LedgerCommit, StoreError, WarehouseStore};

#[cfg(feature = "postgres")]
pub use store::postgres::PostgresWarehouseStore;
