use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use pickbay_core::{JobId, JobItemId, LocationId};
use pickbay_inventory::{InventoryRecord, Location, StockKey};
use pickbay_jobs::{recompute_status, Job, JobItem, JobStatus};
use pickbay_ledger::{ScanTransaction, TxKind};

use super::{JobFilter, LedgerCommit, StoreError, WarehouseStore};

#[derive(Debug, Default)]
struct Inner {
    jobs: HashMap<JobId, Job>,
    /// Lines per job, in insertion order (matcher tie-break).
    items: HashMap<JobId, Vec<JobItem>>,
    records: HashMap<StockKey, InventoryRecord>,
    locations: Vec<Location>,
    /// Append-only; entries are pushed and never touched again.
    txs: Vec<ScanTransaction>,
}

/// In-memory warehouse store.
///
/// Intended for tests/dev. The single interior lock strictly serializes
/// commits, which subsumes the required per-(line, stock record) scope.
#[derive(Debug, Default)]
pub struct InMemoryWarehouseStore {
    inner: RwLock<Inner>,
}

impl InMemoryWarehouseStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Inner>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Inner>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }
}

fn validate_commit(inner: &Inner, commit: &LedgerCommit) -> Result<(), StoreError> {
    let tx = &commit.tx;

    match tx.kind {
        TxKind::Undo => {
            let Some(ref_id) = tx.ref_tx_id else {
                return Err(StoreError::InvalidCommit(
                    "undo entry is missing its ref_tx_id".to_string(),
                ));
            };
            let Some(original) = inner.txs.iter().find(|t| t.id == ref_id) else {
                return Err(StoreError::InvalidCommit(
                    "undo entry references an unknown transaction".to_string(),
                ));
            };
            if original.job_id != tx.job_id {
                return Err(StoreError::InvalidCommit(
                    "undo entry references a transaction of another job".to_string(),
                ));
            }
            if inner.txs.iter().any(|t| t.ref_tx_id == Some(ref_id)) {
                return Err(StoreError::InvalidCommit(
                    "transaction is already reversed".to_string(),
                ));
            }
        }
        TxKind::Pick | TxKind::Receive => {
            if tx.ref_tx_id.is_some() {
                return Err(StoreError::InvalidCommit(
                    "only undo entries may carry a ref_tx_id".to_string(),
                ));
            }
        }
    }

    Ok(())
}

#[async_trait]
impl WarehouseStore for InMemoryWarehouseStore {
    async fn insert_job(&self, job: Job, items: Vec<JobItem>) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        if inner.jobs.contains_key(&job.id) {
            return Err(StoreError::Duplicate(format!("job {}", job.id)));
        }
        if let Some(stray) = items.iter().find(|i| i.job_id != job.id) {
            return Err(StoreError::InvalidCommit(format!(
                "line {} does not belong to job {}",
                stray.id, job.id
            )));
        }
        inner.items.insert(job.id, items);
        inner.jobs.insert(job.id, job);
        Ok(())
    }

    async fn job(&self, job_id: JobId) -> Result<Job, StoreError> {
        let inner = self.read()?;
        inner
            .jobs
            .get(&job_id)
            .cloned()
            .ok_or(StoreError::NotFound("job"))
    }

    async fn list_jobs(&self, filter: JobFilter) -> Result<Vec<Job>, StoreError> {
        let inner = self.read()?;
        let mut jobs: Vec<Job> = inner
            .jobs
            .values()
            .filter(|j| filter.matches(j))
            .cloned()
            .collect();
        // Stable listing order: newest first (ids are time-ordered).
        jobs.sort_by_key(|j| std::cmp::Reverse(*j.id.as_uuid()));
        Ok(jobs)
    }

    async fn job_items(&self, job_id: JobId) -> Result<Vec<JobItem>, StoreError> {
        let inner = self.read()?;
        if !inner.jobs.contains_key(&job_id) {
            return Err(StoreError::NotFound("job"));
        }
        Ok(inner.items.get(&job_id).cloned().unwrap_or_default())
    }

    async fn insert_job_item(&self, item: JobItem) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        if !inner.jobs.contains_key(&item.job_id) {
            return Err(StoreError::NotFound("job"));
        }
        let lines = inner.items.entry(item.job_id).or_default();
        if lines.iter().any(|i| i.id == item.id) {
            return Err(StoreError::Duplicate(format!("job item {}", item.id)));
        }
        lines.push(item);
        Ok(())
    }

    async fn set_allow_overpick(&self, job_id: JobId, allow: bool) -> Result<Job, StoreError> {
        let mut inner = self.write()?;
        let job = inner
            .jobs
            .get_mut(&job_id)
            .ok_or(StoreError::NotFound("job"))?;
        job.allow_overpick = allow;
        job.version += 1;
        Ok(job.clone())
    }

    async fn add_extra_approval(
        &self,
        job_id: JobId,
        item_id: JobItemId,
        qty: i64,
    ) -> Result<JobItem, StoreError> {
        let mut inner = self.write()?;
        if !inner.jobs.contains_key(&job_id) {
            return Err(StoreError::NotFound("job"));
        }
        let lines = inner
            .items
            .get_mut(&job_id)
            .ok_or(StoreError::NotFound("job item"))?;
        let item = lines
            .iter_mut()
            .find(|i| i.id == item_id)
            .ok_or(StoreError::NotFound("job item"))?;
        item.extra_approved_qty += qty;
        item.version += 1;
        Ok(item.clone())
    }

    async fn insert_location(&self, location: Location) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        if inner.locations.iter().any(|l| l.code == location.code) {
            return Err(StoreError::Duplicate(format!("location '{}'", location.code)));
        }
        inner.locations.push(location);
        Ok(())
    }

    async fn location(&self, id: LocationId) -> Result<Location, StoreError> {
        let inner = self.read()?;
        inner
            .locations
            .iter()
            .find(|l| l.id == id)
            .cloned()
            .ok_or(StoreError::NotFound("location"))
    }

    async fn location_by_code(&self, code: &str) -> Result<Option<Location>, StoreError> {
        let inner = self.read()?;
        Ok(inner.locations.iter().find(|l| l.code == code).cloned())
    }

    async fn locations(&self) -> Result<Vec<Location>, StoreError> {
        let inner = self.read()?;
        Ok(inner.locations.clone())
    }

    async fn stock(&self, key: &StockKey) -> Result<InventoryRecord, StoreError> {
        let inner = self.read()?;
        Ok(inner
            .records
            .get(key)
            .cloned()
            .unwrap_or_else(|| InventoryRecord::empty(key.clone())))
    }

    async fn transactions(&self, job_id: JobId) -> Result<Vec<ScanTransaction>, StoreError> {
        let inner = self.read()?;
        if !inner.jobs.contains_key(&job_id) {
            return Err(StoreError::NotFound("job"));
        }
        Ok(inner
            .txs
            .iter()
            .filter(|t| t.job_id == job_id)
            .cloned()
            .collect())
    }

    async fn commit_movement(&self, commit: LedgerCommit) -> Result<JobStatus, StoreError> {
        let mut inner = self.write()?;
        validate_commit(&inner, &commit)?;

        let tx = &commit.tx;

        // Version checks against the rows the gate decisions were read from.
        let job = inner
            .jobs
            .get(&tx.job_id)
            .ok_or(StoreError::NotFound("job"))?;
        if job.version != commit.expected_job_version {
            return Err(StoreError::Concurrency(format!(
                "job version expected {}, found {}",
                commit.expected_job_version, job.version
            )));
        }

        let lines = inner
            .items
            .get(&tx.job_id)
            .ok_or(StoreError::NotFound("job item"))?;
        let item = lines
            .iter()
            .find(|i| i.id == tx.job_item_id)
            .ok_or(StoreError::NotFound("job item"))?;
        if item.version != commit.expected_item_version {
            return Err(StoreError::Concurrency(format!(
                "job item version expected {}, found {}",
                commit.expected_item_version, item.version
            )));
        }

        let key = StockKey::new(tx.location_id, tx.sku_code.clone());
        let record_version = inner.records.get(&key).map(|r| r.version).unwrap_or(0);
        if record_version != commit.expected_record_version {
            return Err(StoreError::Concurrency(format!(
                "stock record version expected {}, found {}",
                commit.expected_record_version, record_version
            )));
        }

        // All checks passed: apply the tri-write.
        let job_id = tx.job_id;
        let item_id = tx.job_item_id;
        let created_at = tx.created_at;

        let lines = inner.items.get_mut(&job_id).expect("checked above");
        let item = lines
            .iter_mut()
            .find(|i| i.id == item_id)
            .expect("checked above");
        item.qty_picked = commit.item_qty_picked_after;
        item.extra_picked_qty = commit.item_extra_picked_after;
        item.version += 1;

        let status = recompute_status(lines);

        let record = inner
            .records
            .entry(key.clone())
            .or_insert_with(|| InventoryRecord::empty(key));
        record.on_hand = commit.on_hand_after;
        record.version += 1;

        inner.txs.push(commit.tx);

        let job = inner.jobs.get_mut(&job_id).expect("checked above");
        job.status = status;
        job.version += 1;
        job.updated_at = created_at;

        Ok(status)
    }
}
