//! Warehouse store abstraction.
//!
//! The store is the single lock boundary of the system: every inventory
//! movement commits through [`WarehouseStore::commit_movement`], which checks
//! the expected versions of the affected job, line, and stock record before
//! applying the tri-write (line counters + on-hand + ledger append). A failed
//! check surfaces as [`StoreError::Concurrency`] and the engine re-reads and
//! re-validates, so gate decisions are always made against state that is
//! still current at commit time, never against caller-supplied snapshots.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use pickbay_core::{JobId, JobItemId, LocationId, StoreId};
use pickbay_inventory::{InventoryRecord, Location, StockKey};
use pickbay_jobs::{Job, JobItem, JobStatus};
use pickbay_ledger::ScanTransaction;

mod in_memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use in_memory::InMemoryWarehouseStore;

/// Store operation error.
///
/// These are **infrastructure** failures (concurrency, integrity, backend);
/// business failures (gates, conflicts) live in `pickbay_core::DomainError`.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An expected-version check failed; the caller should re-read and retry.
    #[error("concurrent update: {0}")]
    Concurrency(String),

    /// A referenced row does not exist.
    #[error("not found: {0}")]
    NotFound(&'static str),

    /// A uniqueness constraint was violated (e.g. duplicate location code).
    #[error("duplicate: {0}")]
    Duplicate(String),

    /// The commit payload is internally inconsistent.
    #[error("invalid commit: {0}")]
    InvalidCommit(String),

    /// The backing storage failed (connection loss, poisoned lock, ...).
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Filter for job listings (status / store / batch parent).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub store_id: Option<StoreId>,
    pub parent_id: Option<JobId>,
}

impl JobFilter {
    pub fn matches(&self, job: &Job) -> bool {
        self.status.is_none_or(|s| job.status == s)
            && self.store_id.is_none_or(|s| job.store_id == s)
            && self.parent_id.is_none_or(|p| job.parent_id == Some(p))
    }
}

/// One atomic inventory movement, scan and undo alike.
///
/// `tx` is the fully-formed ledger entry; the `expected_*` versions are the
/// versions of the rows the caller's gate decisions were computed from; the
/// `*_after` values are the post-commit state. The store applies everything
/// or nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerCommit {
    pub tx: ScanTransaction,
    pub expected_job_version: u64,
    pub expected_item_version: u64,
    /// Version of the stock record at `(tx.location_id, tx.sku_code)`;
    /// zero when the record does not exist yet.
    pub expected_record_version: u64,
    pub item_qty_picked_after: i64,
    pub item_extra_picked_after: i64,
    pub on_hand_after: i64,
}

/// Persistent warehouse state: jobs, lines, locations, stock, and the
/// append-only movement ledger.
///
/// Implementations must:
/// - keep job lines in insertion order (the matcher's tie-break depends on it);
/// - keep the ledger append-only (entries are never mutated or deleted);
/// - make `commit_movement` atomic and check every expected version inside
///   the same transaction/lock that applies the writes;
/// - recompute the job status from the post-commit lines inside that same
///   transaction (a commit on one line can finish a job; an undo can reopen
///   it).
#[async_trait]
pub trait WarehouseStore: Send + Sync {
    async fn insert_job(&self, job: Job, items: Vec<JobItem>) -> Result<(), StoreError>;

    async fn job(&self, job_id: JobId) -> Result<Job, StoreError>;

    async fn list_jobs(&self, filter: JobFilter) -> Result<Vec<Job>, StoreError>;

    /// Lines of a job, in insertion order.
    async fn job_items(&self, job_id: JobId) -> Result<Vec<JobItem>, StoreError>;

    /// Append one line to an existing job (forced scan of an unplanned item).
    async fn insert_job_item(&self, item: JobItem) -> Result<(), StoreError>;

    /// Toggle the stock-availability override. Bumps the job version.
    async fn set_allow_overpick(&self, job_id: JobId, allow: bool) -> Result<Job, StoreError>;

    /// Grant extra allowance on a line. Pure bookkeeping: no inventory moves.
    /// Bumps the line version.
    async fn add_extra_approval(
        &self,
        job_id: JobId,
        item_id: JobItemId,
        qty: i64,
    ) -> Result<JobItem, StoreError>;

    async fn insert_location(&self, location: Location) -> Result<(), StoreError>;

    async fn location(&self, id: LocationId) -> Result<Location, StoreError>;

    async fn location_by_code(&self, code: &str) -> Result<Option<Location>, StoreError>;

    async fn locations(&self) -> Result<Vec<Location>, StoreError>;

    /// Current stock record for a key; an empty record (on-hand 0, version 0)
    /// when the key has seen no movement.
    async fn stock(&self, key: &StockKey) -> Result<InventoryRecord, StoreError>;

    /// Ledger entries for a job, in append (oldest-first) order.
    async fn transactions(&self, job_id: JobId) -> Result<Vec<ScanTransaction>, StoreError>;

    /// Apply one movement atomically; returns the recomputed job status.
    async fn commit_movement(&self, commit: LedgerCommit) -> Result<JobStatus, StoreError>;
}

#[async_trait]
impl<S> WarehouseStore for Arc<S>
where
    S: WarehouseStore + ?Sized,
{
    async fn insert_job(&self, job: Job, items: Vec<JobItem>) -> Result<(), StoreError> {
        (**self).insert_job(job, items).await
    }

    async fn job(&self, job_id: JobId) -> Result<Job, StoreError> {
        (**self).job(job_id).await
    }

    async fn list_jobs(&self, filter: JobFilter) -> Result<Vec<Job>, StoreError> {
        (**self).list_jobs(filter).await
    }

    async fn job_items(&self, job_id: JobId) -> Result<Vec<JobItem>, StoreError> {
        (**self).job_items(job_id).await
    }

    async fn insert_job_item(&self, item: JobItem) -> Result<(), StoreError> {
        (**self).insert_job_item(item).await
    }

    async fn set_allow_overpick(&self, job_id: JobId, allow: bool) -> Result<Job, StoreError> {
        (**self).set_allow_overpick(job_id, allow).await
    }

    async fn add_extra_approval(
        &self,
        job_id: JobId,
        item_id: JobItemId,
        qty: i64,
    ) -> Result<JobItem, StoreError> {
        (**self).add_extra_approval(job_id, item_id, qty).await
    }

    async fn insert_location(&self, location: Location) -> Result<(), StoreError> {
        (**self).insert_location(location).await
    }

    async fn location(&self, id: LocationId) -> Result<Location, StoreError> {
        (**self).location(id).await
    }

    async fn location_by_code(&self, code: &str) -> Result<Option<Location>, StoreError> {
        (**self).location_by_code(code).await
    }

    async fn locations(&self) -> Result<Vec<Location>, StoreError> {
        (**self).locations().await
    }

    async fn stock(&self, key: &StockKey) -> Result<InventoryRecord, StoreError> {
        (**self).stock(key).await
    }

    async fn transactions(&self, job_id: JobId) -> Result<Vec<ScanTransaction>, StoreError> {
        (**self).transactions(job_id).await
    }

    async fn commit_movement(&self, commit: LedgerCommit) -> Result<JobStatus, StoreError> {
        (**self).commit_movement(commit).await
    }
}
