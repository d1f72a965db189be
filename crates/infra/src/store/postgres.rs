//! Postgres-backed warehouse store.
//!
//! Every movement commits inside one SQL transaction that takes `FOR UPDATE`
//! row locks on the affected job, line, and stock record. That is the
//! per-(line, stock record) transaction scope: concurrent scans on the same
//! line serialize at the database, scans on different lines proceed in
//! parallel.
//! The ledger table is insert-only; no statement in this module updates or
//! deletes a `scan_transactions` row.
//!
//! ## Error Mapping
//!
//! | sqlx error | PostgreSQL code | StoreError |
//! |------------|-----------------|------------|
//! | Database (unique violation) | `23505` | `Duplicate` |
//! | Database (other) | any | `Backend` |
//! | pool/network/decoding | n/a | `Backend` |
//!
//! Expected-version mismatches are detected by comparing the locked rows'
//! versions and surface as `StoreError::Concurrency`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use pickbay_core::{JobId, JobItemId, LocationId, OperatorId, SkuId, StoreId, TxId};
use pickbay_inventory::{InventoryRecord, Location, StockKey};
use pickbay_jobs::{Job, JobItem, JobStatus, JobType};
use pickbay_ledger::{ScanTransaction, TxKind};

use super::{JobFilter, LedgerCommit, StoreError, WarehouseStore};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS jobs (
        id UUID PRIMARY KEY,
        job_type TEXT NOT NULL,
        status TEXT NOT NULL,
        store_id UUID NOT NULL,
        parent_id UUID,
        allow_overpick BOOLEAN NOT NULL,
        operator_id UUID NOT NULL,
        version BIGINT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS job_items (
        id UUID PRIMARY KEY,
        job_id UUID NOT NULL REFERENCES jobs(id),
        position BIGINT NOT NULL,
        sku_code TEXT NOT NULL,
        maker_code TEXT,
        name TEXT NOT NULL,
        qty_planned BIGINT NOT NULL,
        qty_picked BIGINT NOT NULL,
        extra_approved_qty BIGINT NOT NULL,
        extra_picked_qty BIGINT NOT NULL,
        version BIGINT NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_job_items_job ON job_items (job_id, position)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS locations (
        id UUID PRIMARY KEY,
        code TEXT NOT NULL UNIQUE,
        is_system BOOLEAN NOT NULL,
        is_shortage_pool BOOLEAN NOT NULL,
        is_default BOOLEAN NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS inventory_records (
        location_id UUID NOT NULL,
        sku_code TEXT NOT NULL,
        on_hand BIGINT NOT NULL,
        version BIGINT NOT NULL,
        PRIMARY KEY (location_id, sku_code)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS scan_transactions (
        id UUID PRIMARY KEY,
        seq BIGSERIAL,
        job_id UUID NOT NULL,
        job_item_id UUID NOT NULL,
        sku_code TEXT NOT NULL,
        location_id UUID NOT NULL,
        qty_delta BIGINT NOT NULL,
        operator_id UUID NOT NULL,
        kind TEXT NOT NULL,
        ref_tx_id UUID,
        forced BOOLEAN NOT NULL,
        force_reason TEXT,
        created_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_scan_transactions_job ON scan_transactions (job_id, seq)
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_scan_transactions_ref ON scan_transactions (ref_tx_id)
        WHERE ref_tx_id IS NOT NULL
    "#,
];

/// Postgres warehouse store.
///
/// Uses the sqlx connection pool (thread-safe; `Clone` shares the pool).
#[derive(Debug, Clone)]
pub struct PostgresWarehouseStore {
    pool: Arc<PgPool>,
}

impl PostgresWarehouseStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create the tables this store needs (idempotent).
    pub async fn init_schema(&self) -> Result<(), StoreError> {
        for ddl in SCHEMA {
            sqlx::query(ddl)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("init_schema", e))?;
        }
        Ok(())
    }
}

fn map_sqlx_error(operation: &str, e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.code().as_deref() == Some("23505") {
            return StoreError::Duplicate(format!("{operation}: {}", db.message()));
        }
    }
    StoreError::Backend(format!("{operation}: {e}"))
}

fn decode(operation: &'static str, e: impl core::fmt::Display) -> StoreError {
    StoreError::Backend(format!("{operation}: row decoding failed: {e}"))
}

fn row_to_job(row: &sqlx::postgres::PgRow) -> Result<Job, StoreError> {
    let op = "row_to_job";
    Ok(Job {
        id: JobId::from_uuid(row.try_get::<Uuid, _>("id").map_err(|e| decode(op, e))?),
        job_type: JobType::parse(&row.try_get::<String, _>("job_type").map_err(|e| decode(op, e))?)
            .map_err(|e| decode(op, e))?,
        status: JobStatus::parse(&row.try_get::<String, _>("status").map_err(|e| decode(op, e))?)
            .map_err(|e| decode(op, e))?,
        store_id: StoreId::from_uuid(row.try_get::<Uuid, _>("store_id").map_err(|e| decode(op, e))?),
        parent_id: row
            .try_get::<Option<Uuid>, _>("parent_id")
            .map_err(|e| decode(op, e))?
            .map(JobId::from_uuid),
        allow_overpick: row.try_get("allow_overpick").map_err(|e| decode(op, e))?,
        operator_id: OperatorId::from_uuid(
            row.try_get::<Uuid, _>("operator_id").map_err(|e| decode(op, e))?,
        ),
        version: row.try_get::<i64, _>("version").map_err(|e| decode(op, e))? as u64,
        created_at: row
            .try_get::<DateTime<Utc>, _>("created_at")
            .map_err(|e| decode(op, e))?,
        updated_at: row
            .try_get::<DateTime<Utc>, _>("updated_at")
            .map_err(|e| decode(op, e))?,
    })
}

fn row_to_item(row: &sqlx::postgres::PgRow) -> Result<JobItem, StoreError> {
    let op = "row_to_item";
    let sku = row.try_get::<String, _>("sku_code").map_err(|e| decode(op, e))?;
    Ok(JobItem {
        id: JobItemId::from_uuid(row.try_get::<Uuid, _>("id").map_err(|e| decode(op, e))?),
        job_id: JobId::from_uuid(row.try_get::<Uuid, _>("job_id").map_err(|e| decode(op, e))?),
        sku_code: SkuId::parse(&sku)
            .ok_or_else(|| decode(op, "empty sku_code in job_items row"))?,
        maker_code: row.try_get("maker_code").map_err(|e| decode(op, e))?,
        name: row.try_get("name").map_err(|e| decode(op, e))?,
        qty_planned: row.try_get("qty_planned").map_err(|e| decode(op, e))?,
        qty_picked: row.try_get("qty_picked").map_err(|e| decode(op, e))?,
        extra_approved_qty: row.try_get("extra_approved_qty").map_err(|e| decode(op, e))?,
        extra_picked_qty: row.try_get("extra_picked_qty").map_err(|e| decode(op, e))?,
        version: row.try_get::<i64, _>("version").map_err(|e| decode(op, e))? as u64,
    })
}

fn row_to_location(row: &sqlx::postgres::PgRow) -> Result<Location, StoreError> {
    let op = "row_to_location";
    Ok(Location {
        id: LocationId::from_uuid(row.try_get::<Uuid, _>("id").map_err(|e| decode(op, e))?),
        code: row.try_get("code").map_err(|e| decode(op, e))?,
        is_system: row.try_get("is_system").map_err(|e| decode(op, e))?,
        is_shortage_pool: row.try_get("is_shortage_pool").map_err(|e| decode(op, e))?,
        is_default: row.try_get("is_default").map_err(|e| decode(op, e))?,
    })
}

fn row_to_tx(row: &sqlx::postgres::PgRow) -> Result<ScanTransaction, StoreError> {
    let op = "row_to_tx";
    let sku = row.try_get::<String, _>("sku_code").map_err(|e| decode(op, e))?;
    Ok(ScanTransaction {
        id: TxId::from_uuid(row.try_get::<Uuid, _>("id").map_err(|e| decode(op, e))?),
        job_id: JobId::from_uuid(row.try_get::<Uuid, _>("job_id").map_err(|e| decode(op, e))?),
        job_item_id: JobItemId::from_uuid(
            row.try_get::<Uuid, _>("job_item_id").map_err(|e| decode(op, e))?,
        ),
        sku_code: SkuId::parse(&sku)
            .ok_or_else(|| decode(op, "empty sku_code in scan_transactions row"))?,
        location_id: LocationId::from_uuid(
            row.try_get::<Uuid, _>("location_id").map_err(|e| decode(op, e))?,
        ),
        qty_delta: row.try_get("qty_delta").map_err(|e| decode(op, e))?,
        operator_id: OperatorId::from_uuid(
            row.try_get::<Uuid, _>("operator_id").map_err(|e| decode(op, e))?,
        ),
        kind: TxKind::parse(&row.try_get::<String, _>("kind").map_err(|e| decode(op, e))?)
            .map_err(|e| decode(op, e))?,
        ref_tx_id: row
            .try_get::<Option<Uuid>, _>("ref_tx_id")
            .map_err(|e| decode(op, e))?
            .map(TxId::from_uuid),
        forced: row.try_get("forced").map_err(|e| decode(op, e))?,
        force_reason: row.try_get("force_reason").map_err(|e| decode(op, e))?,
        created_at: row
            .try_get::<DateTime<Utc>, _>("created_at")
            .map_err(|e| decode(op, e))?,
    })
}

async fn lock_versions(
    tx: &mut Transaction<'_, Postgres>,
    commit: &LedgerCommit,
) -> Result<(), StoreError> {
    let entry = &commit.tx;

    let job_row = sqlx::query("SELECT version FROM jobs WHERE id = $1 FOR UPDATE")
        .bind(entry.job_id.as_uuid())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("commit_movement.lock_job", e))?
        .ok_or(StoreError::NotFound("job"))?;
    let job_version = job_row
        .try_get::<i64, _>("version")
        .map_err(|e| decode("commit_movement", e))? as u64;
    if job_version != commit.expected_job_version {
        return Err(StoreError::Concurrency(format!(
            "job version expected {}, found {job_version}",
            commit.expected_job_version
        )));
    }

    let item_row =
        sqlx::query("SELECT version FROM job_items WHERE id = $1 AND job_id = $2 FOR UPDATE")
            .bind(entry.job_item_id.as_uuid())
            .bind(entry.job_id.as_uuid())
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("commit_movement.lock_item", e))?
            .ok_or(StoreError::NotFound("job item"))?;
    let item_version = item_row
        .try_get::<i64, _>("version")
        .map_err(|e| decode("commit_movement", e))? as u64;
    if item_version != commit.expected_item_version {
        return Err(StoreError::Concurrency(format!(
            "job item version expected {}, found {item_version}",
            commit.expected_item_version
        )));
    }

    // The stock row may not exist yet; create it at version 0 and lock it.
    sqlx::query(
        "INSERT INTO inventory_records (location_id, sku_code, on_hand, version)
         VALUES ($1, $2, 0, 0) ON CONFLICT DO NOTHING",
    )
    .bind(entry.location_id.as_uuid())
    .bind(entry.sku_code.as_str())
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("commit_movement.seed_record", e))?;

    let record_row = sqlx::query(
        "SELECT version FROM inventory_records
         WHERE location_id = $1 AND sku_code = $2 FOR UPDATE",
    )
    .bind(entry.location_id.as_uuid())
    .bind(entry.sku_code.as_str())
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("commit_movement.lock_record", e))?;
    let record_version = record_row
        .try_get::<i64, _>("version")
        .map_err(|e| decode("commit_movement", e))? as u64;
    if record_version != commit.expected_record_version {
        return Err(StoreError::Concurrency(format!(
            "stock record version expected {}, found {record_version}",
            commit.expected_record_version
        )));
    }

    Ok(())
}

async fn check_undo_reference(
    tx: &mut Transaction<'_, Postgres>,
    commit: &LedgerCommit,
) -> Result<(), StoreError> {
    let entry = &commit.tx;
    match entry.kind {
        TxKind::Undo => {
            let Some(ref_id) = entry.ref_tx_id else {
                return Err(StoreError::InvalidCommit(
                    "undo entry is missing its ref_tx_id".to_string(),
                ));
            };
            let row = sqlx::query(
                "SELECT
                    EXISTS(SELECT 1 FROM scan_transactions WHERE id = $1 AND job_id = $2) AS known,
                    EXISTS(SELECT 1 FROM scan_transactions WHERE ref_tx_id = $1) AS reversed",
            )
            .bind(ref_id.as_uuid())
            .bind(entry.job_id.as_uuid())
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("commit_movement.check_ref", e))?;

            let known: bool = row.try_get("known").map_err(|e| decode("commit_movement", e))?;
            let reversed: bool = row
                .try_get("reversed")
                .map_err(|e| decode("commit_movement", e))?;

            if !known {
                return Err(StoreError::InvalidCommit(
                    "undo entry references an unknown transaction".to_string(),
                ));
            }
            if reversed {
                return Err(StoreError::InvalidCommit(
                    "transaction is already reversed".to_string(),
                ));
            }
        }
        TxKind::Pick | TxKind::Receive => {
            if entry.ref_tx_id.is_some() {
                return Err(StoreError::InvalidCommit(
                    "only undo entries may carry a ref_tx_id".to_string(),
                ));
            }
        }
    }
    Ok(())
}

#[async_trait]
impl WarehouseStore for PostgresWarehouseStore {
    #[instrument(skip(self, job, items), fields(job_id = %job.id))]
    async fn insert_job(&self, job: Job, items: Vec<JobItem>) -> Result<(), StoreError> {
        if let Some(stray) = items.iter().find(|i| i.job_id != job.id) {
            return Err(StoreError::InvalidCommit(format!(
                "line {} does not belong to job {}",
                stray.id, job.id
            )));
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("insert_job.begin", e))?;

        sqlx::query(
            "INSERT INTO jobs
                (id, job_type, status, store_id, parent_id, allow_overpick, operator_id,
                 version, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(job.id.as_uuid())
        .bind(job.job_type.as_str())
        .bind(job.status.as_str())
        .bind(job.store_id.as_uuid())
        .bind(job.parent_id.map(|p| *p.as_uuid()))
        .bind(job.allow_overpick)
        .bind(job.operator_id.as_uuid())
        .bind(job.version as i64)
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_job", e))?;

        for (position, item) in items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO job_items
                    (id, job_id, position, sku_code, maker_code, name, qty_planned,
                     qty_picked, extra_approved_qty, extra_picked_qty, version)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            )
            .bind(item.id.as_uuid())
            .bind(item.job_id.as_uuid())
            .bind(position as i64)
            .bind(item.sku_code.as_str())
            .bind(item.maker_code.as_deref())
            .bind(&item.name)
            .bind(item.qty_planned)
            .bind(item.qty_picked)
            .bind(item.extra_approved_qty)
            .bind(item.extra_picked_qty)
            .bind(item.version as i64)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_job.items", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("insert_job.commit", e))
    }

    async fn job(&self, job_id: JobId) -> Result<Job, StoreError> {
        let row = sqlx::query("SELECT * FROM jobs WHERE id = $1")
            .bind(job_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("job", e))?
            .ok_or(StoreError::NotFound("job"))?;
        row_to_job(&row)
    }

    async fn list_jobs(&self, filter: JobFilter) -> Result<Vec<Job>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM jobs
             WHERE ($1::TEXT IS NULL OR status = $1)
               AND ($2::UUID IS NULL OR store_id = $2)
               AND ($3::UUID IS NULL OR parent_id = $3)
             ORDER BY id DESC",
        )
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.store_id.map(|s| *s.as_uuid()))
        .bind(filter.parent_id.map(|p| *p.as_uuid()))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_jobs", e))?;

        rows.iter().map(row_to_job).collect()
    }

    async fn job_items(&self, job_id: JobId) -> Result<Vec<JobItem>, StoreError> {
        // Distinguish "no lines" from "no job".
        self.job(job_id).await?;

        let rows = sqlx::query("SELECT * FROM job_items WHERE job_id = $1 ORDER BY position")
            .bind(job_id.as_uuid())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("job_items", e))?;

        rows.iter().map(row_to_item).collect()
    }

    async fn insert_job_item(&self, item: JobItem) -> Result<(), StoreError> {
        self.job(item.job_id).await?;

        sqlx::query(
            "INSERT INTO job_items
                (id, job_id, position, sku_code, maker_code, name, qty_planned,
                 qty_picked, extra_approved_qty, extra_picked_qty, version)
             SELECT $1, $2, COALESCE(MAX(position) + 1, 0), $3, $4, $5, $6, $7, $8, $9, $10
             FROM job_items WHERE job_id = $2",
        )
        .bind(item.id.as_uuid())
        .bind(item.job_id.as_uuid())
        .bind(item.sku_code.as_str())
        .bind(item.maker_code.as_deref())
        .bind(&item.name)
        .bind(item.qty_planned)
        .bind(item.qty_picked)
        .bind(item.extra_approved_qty)
        .bind(item.extra_picked_qty)
        .bind(item.version as i64)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_job_item", e))?;

        Ok(())
    }

    async fn set_allow_overpick(&self, job_id: JobId, allow: bool) -> Result<Job, StoreError> {
        let row = sqlx::query(
            "UPDATE jobs SET allow_overpick = $2, version = version + 1
             WHERE id = $1
             RETURNING *",
        )
        .bind(job_id.as_uuid())
        .bind(allow)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("set_allow_overpick", e))?
        .ok_or(StoreError::NotFound("job"))?;

        row_to_job(&row)
    }

    async fn add_extra_approval(
        &self,
        job_id: JobId,
        item_id: JobItemId,
        qty: i64,
    ) -> Result<JobItem, StoreError> {
        let row = sqlx::query(
            "UPDATE job_items SET extra_approved_qty = extra_approved_qty + $3, version = version + 1
             WHERE id = $2 AND job_id = $1
             RETURNING *",
        )
        .bind(job_id.as_uuid())
        .bind(item_id.as_uuid())
        .bind(qty)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("add_extra_approval", e))?
        .ok_or(StoreError::NotFound("job item"))?;

        row_to_item(&row)
    }

    async fn insert_location(&self, location: Location) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO locations (id, code, is_system, is_shortage_pool, is_default)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(location.id.as_uuid())
        .bind(&location.code)
        .bind(location.is_system)
        .bind(location.is_shortage_pool)
        .bind(location.is_default)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_location", e))?;
        Ok(())
    }

    async fn location(&self, id: LocationId) -> Result<Location, StoreError> {
        let row = sqlx::query("SELECT * FROM locations WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("location", e))?
            .ok_or(StoreError::NotFound("location"))?;
        row_to_location(&row)
    }

    async fn location_by_code(&self, code: &str) -> Result<Option<Location>, StoreError> {
        let row = sqlx::query("SELECT * FROM locations WHERE code = $1")
            .bind(code)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("location_by_code", e))?;
        row.as_ref().map(row_to_location).transpose()
    }

    async fn locations(&self) -> Result<Vec<Location>, StoreError> {
        let rows = sqlx::query("SELECT * FROM locations ORDER BY code")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("locations", e))?;
        rows.iter().map(row_to_location).collect()
    }

    async fn stock(&self, key: &StockKey) -> Result<InventoryRecord, StoreError> {
        let row = sqlx::query(
            "SELECT on_hand, version FROM inventory_records
             WHERE location_id = $1 AND sku_code = $2",
        )
        .bind(key.location_id.as_uuid())
        .bind(key.sku_code.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("stock", e))?;

        match row {
            None => Ok(InventoryRecord::empty(key.clone())),
            Some(row) => Ok(InventoryRecord {
                key: key.clone(),
                on_hand: row.try_get("on_hand").map_err(|e| decode("stock", e))?,
                version: row.try_get::<i64, _>("version").map_err(|e| decode("stock", e))? as u64,
            }),
        }
    }

    async fn transactions(&self, job_id: JobId) -> Result<Vec<ScanTransaction>, StoreError> {
        self.job(job_id).await?;

        let rows = sqlx::query("SELECT * FROM scan_transactions WHERE job_id = $1 ORDER BY seq")
            .bind(job_id.as_uuid())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("transactions", e))?;

        rows.iter().map(row_to_tx).collect()
    }

    #[instrument(skip(self, commit), fields(job_id = %commit.tx.job_id, kind = commit.tx.kind.as_str()))]
    async fn commit_movement(&self, commit: LedgerCommit) -> Result<JobStatus, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("commit_movement.begin", e))?;

        lock_versions(&mut tx, &commit).await?;
        check_undo_reference(&mut tx, &commit).await?;

        let entry = &commit.tx;

        sqlx::query(
            "UPDATE job_items
             SET qty_picked = $2, extra_picked_qty = $3, version = version + 1
             WHERE id = $1",
        )
        .bind(entry.job_item_id.as_uuid())
        .bind(commit.item_qty_picked_after)
        .bind(commit.item_extra_picked_after)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("commit_movement.update_item", e))?;

        sqlx::query(
            "UPDATE inventory_records SET on_hand = $3, version = version + 1
             WHERE location_id = $1 AND sku_code = $2",
        )
        .bind(entry.location_id.as_uuid())
        .bind(entry.sku_code.as_str())
        .bind(commit.on_hand_after)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("commit_movement.update_record", e))?;

        sqlx::query(
            "INSERT INTO scan_transactions
                (id, job_id, job_item_id, sku_code, location_id, qty_delta, operator_id,
                 kind, ref_tx_id, forced, force_reason, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(entry.id.as_uuid())
        .bind(entry.job_id.as_uuid())
        .bind(entry.job_item_id.as_uuid())
        .bind(entry.sku_code.as_str())
        .bind(entry.location_id.as_uuid())
        .bind(entry.qty_delta)
        .bind(entry.operator_id.as_uuid())
        .bind(entry.kind.as_str())
        .bind(entry.ref_tx_id.map(|r| *r.as_uuid()))
        .bind(entry.forced)
        .bind(entry.force_reason.as_deref())
        .bind(entry.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("commit_movement.append", e))?;

        // Status derives from the post-commit lines, inside the same
        // transaction: a commit on one line can finish the job, an undo can
        // reopen it.
        let row = sqlx::query(
            "SELECT COALESCE(BOOL_AND(qty_picked >= qty_planned), FALSE) AS done
             FROM job_items WHERE job_id = $1",
        )
        .bind(entry.job_id.as_uuid())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("commit_movement.status", e))?;
        let done: bool = row.try_get("done").map_err(|e| decode("commit_movement", e))?;
        let status = if done { JobStatus::Done } else { JobStatus::Open };

        sqlx::query("UPDATE jobs SET status = $2, version = version + 1, updated_at = $3 WHERE id = $1")
            .bind(entry.job_id.as_uuid())
            .bind(status.as_str())
            .bind(entry.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("commit_movement.update_job", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_movement.commit", e))?;

        Ok(status)
    }
}
