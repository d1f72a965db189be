//! Scan reconciliation engine.
//!
//! Orchestrates every state change in the system: resolve the scanned line,
//! run the quantity and stock gates against freshly read state, then commit
//! the movement atomically through the store. A concurrent update between
//! read and commit fails the expected-version check, and the whole
//! read-validate-commit cycle runs again, so gates are never decided on
//! stale counters.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use pickbay_core::{
    ConflictKind, DomainError, JobId, JobItemId, LocationId, OperatorId, SkuId, StoreId, TxId,
};
use pickbay_inventory::{
    resolve_location, stock_gate, Location, LocationStock, StockKey, StockRoute,
};
use pickbay_jobs::{match_scan, next_counters, quantity_gate, Job, JobItem, JobStatus, JobType};
use pickbay_ledger::{latest_reversible, preview_undo, ScanTransaction, TxKind, UndoPreview};

use crate::store::{JobFilter, LedgerCommit, StoreError, WarehouseStore};

/// How many times a commit is retried after losing an expected-version race
/// before the failure is surfaced to the caller.
const MAX_COMMIT_ATTEMPTS: usize = 5;

/// Engine operation error: a domain outcome or an infrastructure failure.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("store failure: {0}")]
    Store(StoreError),
}

impl From<StoreError> for EngineError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(_) => EngineError::Domain(DomainError::NotFound),
            other => EngineError::Store(other),
        }
    }
}

impl EngineError {
    fn conflict(kind: ConflictKind) -> Self {
        EngineError::Domain(DomainError::Conflict(kind))
    }
}

/// Planned line of a job to create.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateJobItem {
    pub sku_code: String,
    pub maker_code: Option<String>,
    pub name: String,
    pub qty_planned: i64,
}

/// Job creation input (fed by the upload boundary, already parsed).
#[derive(Debug, Clone)]
pub struct CreateJob {
    pub job_type: JobType,
    pub store_id: StoreId,
    pub parent_id: Option<JobId>,
    pub allow_overpick: bool,
    pub operator_id: OperatorId,
    pub items: Vec<CreateJobItem>,
}

/// Location registration input (fed by the directory boundary).
#[derive(Debug, Clone, Deserialize)]
pub struct NewLocation {
    pub code: String,
    #[serde(default)]
    pub is_system: bool,
    #[serde(default)]
    pub is_shortage_pool: bool,
    #[serde(default)]
    pub is_default: bool,
}

/// A pick scan to reconcile.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub job_id: JobId,
    pub value: String,
    pub qty: i64,
    pub location_code: Option<String>,
    pub force: bool,
    pub force_reason: Option<String>,
    pub operator_id: OperatorId,
}

/// A receive scan to reconcile (inbound/return direction).
#[derive(Debug, Clone)]
pub struct ReceiveRequest {
    pub job_id: JobId,
    pub value: String,
    pub qty: i64,
    pub location_code: String,
    pub operator_id: OperatorId,
}

/// A committed scan.
#[derive(Debug, Clone, Serialize)]
pub struct ScanAccepted {
    pub tx_id: TxId,
    pub job_item_id: JobItemId,
    pub sku_code: SkuId,
    pub used_location_code: String,
    pub qty_picked: i64,
    pub qty_planned: i64,
    pub job_status: JobStatus,
}

/// A committed reversal.
#[derive(Debug, Clone, Serialize)]
pub struct UndoApplied {
    /// The transaction that was reversed.
    pub undone_tx_id: TxId,
    /// The compensating UNDO entry that was appended.
    pub undo_tx_id: TxId,
    pub location_code: String,
    pub on_hand_after: i64,
    pub job_status: JobStatus,
}

/// Outcome of an `undo_all` sweep. The batch is not all-or-nothing: undos
/// applied before a blocked step stay committed.
#[derive(Debug, Clone, Serialize)]
pub struct UndoAllReport {
    pub undone: Vec<UndoApplied>,
    /// Set when the sweep halted: the transaction it refused to reverse and
    /// the conflict that blocked it.
    pub blocked: Option<BlockedUndo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockedUndo {
    pub tx_id: TxId,
    pub kind: ConflictKind,
}

/// Internal step result shared by `undo_last` and `undo_all`.
enum UndoStep {
    Applied(UndoApplied),
    NothingToUndo,
    Blocked { tx_id: TxId },
}

/// The reconciliation engine.
///
/// Generic over the store so tests run against the in-memory backend and the
/// service can run against Postgres without touching this logic.
#[derive(Debug)]
pub struct ReconciliationEngine<S> {
    store: S,
}

impl<S> ReconciliationEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S> ReconciliationEngine<S>
where
    S: WarehouseStore,
{
    // ---- job boundary (plans arrive pre-parsed; no file handling here) ----

    pub async fn create_job(&self, input: CreateJob) -> Result<(Job, Vec<JobItem>), EngineError> {
        let now = Utc::now();
        let job = Job::new(
            JobId::new(),
            input.job_type,
            input.store_id,
            input.parent_id,
            input.allow_overpick,
            input.operator_id,
            now,
        );

        let mut items = Vec::with_capacity(input.items.len());
        for line in &input.items {
            let sku = SkuId::parse(&line.sku_code)
                .ok_or_else(|| DomainError::validation("sku_code must not be empty"))?;
            if line.qty_planned <= 0 {
                return Err(DomainError::validation("qty_planned must be a positive integer").into());
            }
            let name = if line.name.trim().is_empty() {
                sku.as_str().to_string()
            } else {
                line.name.trim().to_string()
            };
            items.push(JobItem::planned(
                JobItemId::new(),
                job.id,
                sku,
                line.maker_code.clone(),
                name,
                line.qty_planned,
            ));
        }

        self.store.insert_job(job.clone(), items.clone()).await?;
        tracing::info!(job_id = %job.id, job_type = job.job_type.as_str(), lines = items.len(), "job created");
        Ok((job, items))
    }

    pub async fn get_job(&self, job_id: JobId) -> Result<(Job, Vec<JobItem>), EngineError> {
        let job = self.store.job(job_id).await?;
        let items = self.store.job_items(job_id).await?;
        Ok((job, items))
    }

    pub async fn list_jobs(&self, filter: JobFilter) -> Result<Vec<Job>, EngineError> {
        Ok(self.store.list_jobs(filter).await?)
    }

    // ---- location directory boundary ----

    pub async fn register_location(&self, input: NewLocation) -> Result<Location, EngineError> {
        let code = input.code.trim().to_uppercase();
        if code.is_empty() {
            return Err(DomainError::validation("location code must not be empty").into());
        }
        let mut location = Location::new(LocationId::new(), code);
        location.is_system = input.is_system;
        location.is_shortage_pool = input.is_shortage_pool;
        location.is_default = input.is_default;
        self.store.insert_location(location.clone()).await?;
        Ok(location)
    }

    pub async fn locations(&self) -> Result<Vec<Location>, EngineError> {
        Ok(self.store.locations().await?)
    }

    // ---- scans ----

    /// Reconcile an outbound pick scan.
    #[tracing::instrument(skip(self, req), fields(job_id = %req.job_id, qty = req.qty, force = req.force))]
    pub async fn scan_pick(&self, req: ScanRequest) -> Result<ScanAccepted, EngineError> {
        validate_scan_value(&req.value, req.qty)?;

        let mut last_race = None;
        for _ in 0..MAX_COMMIT_ATTEMPTS {
            let job = self.store.job(req.job_id).await?;
            if !job.job_type.is_outbound() {
                return Err(DomainError::validation(
                    "pick scans only apply to outbound jobs",
                )
                .into());
            }

            let items = self.store.job_items(req.job_id).await?;
            let item = match match_scan(&items, &req.value) {
                Some(found) => found.clone(),
                None if !req.force => {
                    return Err(EngineError::conflict(ConflictKind::ItemNotInJob));
                }
                None => self.register_unplanned_line(&job, &req.value).await?,
            };

            quantity_gate(&item, req.qty)?;

            let location = self.resolve_pick_location(&req, &item).await?;
            let record = self
                .store
                .stock(&StockKey::new(location.id, item.sku_code.clone()))
                .await?;

            let route = stock_gate(record.on_hand, req.qty, job.allow_overpick)?;
            let (location, record) = match route {
                StockRoute::Requested => (location, record),
                StockRoute::ShortagePool => {
                    let pool = self.shortage_pool().await?;
                    let pool_record = self
                        .store
                        .stock(&StockKey::new(pool.id, item.sku_code.clone()))
                        .await?;
                    tracing::info!(
                        job_id = %job.id,
                        sku = %item.sku_code,
                        from = %location.code,
                        pool = %pool.code,
                        "stock shortfall: routing full quantity to shortage pool"
                    );
                    (pool, pool_record)
                }
            };

            let (picked_after, extra_after) = next_counters(&item, req.qty);
            let tx = ScanTransaction {
                id: TxId::new(),
                job_id: job.id,
                job_item_id: item.id,
                sku_code: item.sku_code.clone(),
                location_id: location.id,
                qty_delta: -req.qty,
                operator_id: req.operator_id,
                kind: TxKind::Pick,
                ref_tx_id: None,
                forced: req.force,
                force_reason: req.force_reason.clone(),
                created_at: Utc::now(),
            };

            let commit = LedgerCommit {
                tx: tx.clone(),
                expected_job_version: job.version,
                expected_item_version: item.version,
                expected_record_version: record.version,
                item_qty_picked_after: picked_after,
                item_extra_picked_after: extra_after,
                on_hand_after: record.on_hand - req.qty,
            };

            match self.store.commit_movement(commit).await {
                Ok(status) => {
                    return Ok(ScanAccepted {
                        tx_id: tx.id,
                        job_item_id: item.id,
                        sku_code: item.sku_code,
                        used_location_code: location.code,
                        qty_picked: picked_after,
                        qty_planned: item.qty_planned,
                        job_status: status,
                    });
                }
                Err(StoreError::Concurrency(msg)) => {
                    tracing::debug!(job_id = %job.id, "commit lost a race, re-reading: {msg}");
                    last_race = Some(msg);
                }
                Err(other) => return Err(other.into()),
            }
        }

        Err(EngineError::Store(StoreError::Concurrency(
            last_race.unwrap_or_else(|| "retries exhausted".to_string()),
        )))
    }

    /// Reconcile an inbound/return receive scan.
    #[tracing::instrument(skip(self, req), fields(job_id = %req.job_id, qty = req.qty))]
    pub async fn scan_receive(&self, req: ReceiveRequest) -> Result<ScanAccepted, EngineError> {
        validate_scan_value(&req.value, req.qty)?;

        let mut last_race = None;
        for _ in 0..MAX_COMMIT_ATTEMPTS {
            let job = self.store.job(req.job_id).await?;
            if job.job_type.is_outbound() {
                return Err(DomainError::validation(
                    "receive scans only apply to inbound and return jobs",
                )
                .into());
            }

            let items = self.store.job_items(req.job_id).await?;
            let Some(item) = match_scan(&items, &req.value).cloned() else {
                return Err(EngineError::conflict(ConflictKind::ItemNotInJob));
            };

            quantity_gate(&item, req.qty)?;

            let location = self
                .store
                .location_by_code(&normalize_code(&req.location_code))
                .await?
                .ok_or_else(|| {
                    DomainError::validation(format!(
                        "unknown location code '{}'",
                        req.location_code
                    ))
                })?;
            let record = self
                .store
                .stock(&StockKey::new(location.id, item.sku_code.clone()))
                .await?;

            let (picked_after, extra_after) = next_counters(&item, req.qty);
            let tx = ScanTransaction {
                id: TxId::new(),
                job_id: job.id,
                job_item_id: item.id,
                sku_code: item.sku_code.clone(),
                location_id: location.id,
                qty_delta: req.qty,
                operator_id: req.operator_id,
                kind: TxKind::Receive,
                ref_tx_id: None,
                forced: false,
                force_reason: None,
                created_at: Utc::now(),
            };

            let commit = LedgerCommit {
                tx: tx.clone(),
                expected_job_version: job.version,
                expected_item_version: item.version,
                expected_record_version: record.version,
                item_qty_picked_after: picked_after,
                item_extra_picked_after: extra_after,
                on_hand_after: record.on_hand + req.qty,
            };

            match self.store.commit_movement(commit).await {
                Ok(status) => {
                    return Ok(ScanAccepted {
                        tx_id: tx.id,
                        job_item_id: item.id,
                        sku_code: item.sku_code,
                        used_location_code: location.code,
                        qty_picked: picked_after,
                        qty_planned: item.qty_planned,
                        job_status: status,
                    });
                }
                Err(StoreError::Concurrency(msg)) => {
                    tracing::debug!(job_id = %job.id, "commit lost a race, re-reading: {msg}");
                    last_race = Some(msg);
                }
                Err(other) => return Err(other.into()),
            }
        }

        Err(EngineError::Store(StoreError::Concurrency(
            last_race.unwrap_or_else(|| "retries exhausted".to_string()),
        )))
    }

    // ---- approval gate ----

    /// Grant extra-pick allowance on a line. Moves no inventory; a later scan
    /// consumes the allowance through the quantity gate.
    pub async fn approve_extra(
        &self,
        job_id: JobId,
        item_id: JobItemId,
        qty: i64,
    ) -> Result<JobItem, EngineError> {
        if qty <= 0 {
            return Err(DomainError::validation("qty must be a positive integer").into());
        }
        let item = self.store.add_extra_approval(job_id, item_id, qty).await?;
        tracing::info!(%job_id, %item_id, qty, "extra pick approved");
        Ok(item)
    }

    /// Toggle the stock-availability gate. Independent of the quantity gate.
    pub async fn set_allow_overpick(&self, job_id: JobId, allow: bool) -> Result<Job, EngineError> {
        let job = self.store.set_allow_overpick(job_id, allow).await?;
        tracing::info!(%job_id, allow, "overpick permission changed");
        Ok(job)
    }

    // ---- ledger & undo ----

    /// Ledger entries for a job, newest first.
    pub async fn list_transactions(
        &self,
        job_id: JobId,
    ) -> Result<Vec<ScanTransaction>, EngineError> {
        let mut txs = self.store.transactions(job_id).await?;
        txs.reverse();
        Ok(txs)
    }

    /// Simulate undoing the most recent reversible transaction.
    ///
    /// Pure read: predicts exactly what `undo_last` would do, including the
    /// negative-stock refusal.
    pub async fn check_undo(&self, job_id: JobId) -> Result<UndoPreview, EngineError> {
        let txs = self.store.transactions(job_id).await?;
        let target = latest_reversible(&txs).ok_or(DomainError::NotFound)?;

        let record = self
            .store
            .stock(&StockKey::new(target.location_id, target.sku_code.clone()))
            .await?;
        let location = self.store.location(target.location_id).await?;

        Ok(preview_undo(target, record.on_hand, location.code))
    }

    /// Reverse the most recent reversible transaction.
    #[tracing::instrument(skip(self), fields(%job_id, force))]
    pub async fn undo_last(
        &self,
        job_id: JobId,
        force: bool,
        operator_id: OperatorId,
    ) -> Result<UndoApplied, EngineError> {
        match self.try_undo_next(job_id, force, operator_id).await? {
            UndoStep::Applied(applied) => Ok(applied),
            UndoStep::NothingToUndo => Err(DomainError::NotFound.into()),
            UndoStep::Blocked { .. } => {
                Err(EngineError::conflict(ConflictKind::NegativeStockOnUndo))
            }
        }
    }

    /// Reverse every reversible transaction, newest first.
    ///
    /// Each step commits on its own; a blocked step halts the sweep and is
    /// reported, with prior undos left committed.
    #[tracing::instrument(skip(self), fields(%job_id, force))]
    pub async fn undo_all(
        &self,
        job_id: JobId,
        force: bool,
        operator_id: OperatorId,
    ) -> Result<UndoAllReport, EngineError> {
        // Surface unknown jobs as not-found before reporting an empty sweep.
        self.store.job(job_id).await?;

        let mut undone = Vec::new();
        loop {
            match self.try_undo_next(job_id, force, operator_id).await? {
                UndoStep::Applied(applied) => undone.push(applied),
                UndoStep::NothingToUndo => {
                    return Ok(UndoAllReport {
                        undone,
                        blocked: None,
                    });
                }
                UndoStep::Blocked { tx_id } => {
                    return Ok(UndoAllReport {
                        undone,
                        blocked: Some(BlockedUndo {
                            tx_id,
                            kind: ConflictKind::NegativeStockOnUndo,
                        }),
                    });
                }
            }
        }
    }

    async fn try_undo_next(
        &self,
        job_id: JobId,
        force: bool,
        operator_id: OperatorId,
    ) -> Result<UndoStep, EngineError> {
        let mut last_race = None;
        for _ in 0..MAX_COMMIT_ATTEMPTS {
            let job = self.store.job(job_id).await?;
            let txs = self.store.transactions(job_id).await?;
            let Some(target) = latest_reversible(&txs).cloned() else {
                return Ok(UndoStep::NothingToUndo);
            };

            let record = self
                .store
                .stock(&StockKey::new(target.location_id, target.sku_code.clone()))
                .await?;
            let location = self.store.location(target.location_id).await?;
            let preview = preview_undo(&target, record.on_hand, location.code.as_str());

            if preview.will_go_negative && !force {
                return Ok(UndoStep::Blocked { tx_id: target.id });
            }

            let items = self.store.job_items(job_id).await?;
            let item = items
                .iter()
                .find(|i| i.id == target.job_item_id)
                .ok_or_else(|| DomainError::invariant("ledger references a missing job item"))?
                .clone();

            // Reverse the counter the original movement had advanced.
            let (picked_after, extra_after) = next_counters(&item, -target.scanned_qty());
            let undo_tx = target.reversal(TxId::new(), operator_id, force, Utc::now());

            let commit = LedgerCommit {
                tx: undo_tx.clone(),
                expected_job_version: job.version,
                expected_item_version: item.version,
                expected_record_version: record.version,
                item_qty_picked_after: picked_after,
                item_extra_picked_after: extra_after,
                on_hand_after: preview.result_qty,
            };

            match self.store.commit_movement(commit).await {
                Ok(status) => {
                    tracing::info!(%job_id, undone = %target.id, "transaction reversed");
                    return Ok(UndoStep::Applied(UndoApplied {
                        undone_tx_id: target.id,
                        undo_tx_id: undo_tx.id,
                        location_code: location.code,
                        on_hand_after: preview.result_qty,
                        job_status: status,
                    }));
                }
                Err(StoreError::Concurrency(msg)) => {
                    tracing::debug!(%job_id, "undo lost a race, re-reading: {msg}");
                    last_race = Some(msg);
                }
                Err(other) => return Err(other.into()),
            }
        }

        Err(EngineError::Store(StoreError::Concurrency(
            last_race.unwrap_or_else(|| "retries exhausted".to_string()),
        )))
    }

    // ---- helpers ----

    async fn register_unplanned_line(
        &self,
        job: &Job,
        raw_value: &str,
    ) -> Result<JobItem, EngineError> {
        // validate_scan_value ran first, so the parse cannot fail here.
        let sku = SkuId::parse(raw_value)
            .ok_or_else(|| DomainError::validation("scan value must not be empty"))?;
        let line = JobItem::unplanned(JobItemId::new(), job.id, sku);
        self.store.insert_job_item(line.clone()).await?;
        tracing::info!(job_id = %job.id, sku = %line.sku_code, "unplanned line registered by forced scan");
        Ok(line)
    }

    async fn resolve_pick_location(
        &self,
        req: &ScanRequest,
        item: &JobItem,
    ) -> Result<Location, EngineError> {
        if let Some(code) = &req.location_code {
            let code = normalize_code(code);
            return Ok(self
                .store
                .location_by_code(&code)
                .await?
                .ok_or_else(|| DomainError::validation(format!("unknown location code '{code}'")))?);
        }

        let locations = self.store.locations().await?;
        let mut candidates = Vec::with_capacity(locations.len());
        for location in locations {
            let on_hand = self
                .store
                .stock(&StockKey::new(location.id, item.sku_code.clone()))
                .await?
                .on_hand;
            candidates.push(LocationStock { location, on_hand });
        }

        Ok(resolve_location(&candidates, req.qty, req.force)?)
    }

    async fn shortage_pool(&self) -> Result<Location, EngineError> {
        self.store
            .locations()
            .await?
            .into_iter()
            .find(|l| l.is_shortage_pool)
            .ok_or_else(|| {
                DomainError::invariant("overpick allowed but no shortage pool location is registered")
                    .into()
            })
    }
}

fn validate_scan_value(value: &str, qty: i64) -> Result<(), DomainError> {
    if SkuId::parse(value).is_none() {
        return Err(DomainError::validation("scan value must not be empty"));
    }
    if qty <= 0 {
        return Err(DomainError::validation("qty must be a positive integer"));
    }
    Ok(())
}

fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}
