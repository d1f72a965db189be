use serde::Deserialize;
use serde_json::json;

use pickbay_infra::{ScanAccepted, UndoAllReport, UndoApplied};
use pickbay_inventory::Location;
use pickbay_jobs::{Job, JobItem};
use pickbay_ledger::ScanTransaction;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub job_type: String,
    pub store_id: String,
    pub parent_id: Option<String>,
    #[serde(default)]
    pub allow_overpick: bool,
    pub items: Vec<CreateJobItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct CreateJobItemRequest {
    pub sku_code: String,
    pub maker_code: Option<String>,
    #[serde(default)]
    pub name: String,
    pub qty_planned: i64,
}

#[derive(Debug, Deserialize)]
pub struct ScanPickRequest {
    pub value: String,
    pub qty: i64,
    pub location_code: Option<String>,
    #[serde(default)]
    pub force: bool,
    pub force_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ScanReceiveRequest {
    pub value: String,
    pub qty: i64,
    pub location_code: String,
}

#[derive(Debug, Deserialize)]
pub struct ApproveExtraRequest {
    pub qty: i64,
}

#[derive(Debug, Deserialize)]
pub struct AllowOverpickRequest {
    pub allow: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct UndoRequest {
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    pub status: Option<String>,
    pub store_id: Option<String>,
    pub parent_id: Option<String>,
}

// -------------------------
// Response mapping
// -------------------------

pub fn job_to_json(job: &Job) -> serde_json::Value {
    json!({
        "id": job.id.to_string(),
        "job_type": job.job_type.as_str(),
        "status": job.status.as_str(),
        "store_id": job.store_id.to_string(),
        "parent_id": job.parent_id.map(|p| p.to_string()),
        "allow_overpick": job.allow_overpick,
        "operator_id": job.operator_id.to_string(),
        "created_at": job.created_at.to_rfc3339(),
        "updated_at": job.updated_at.to_rfc3339(),
    })
}

pub fn item_to_json(item: &JobItem) -> serde_json::Value {
    json!({
        "id": item.id.to_string(),
        "job_id": item.job_id.to_string(),
        "sku_code": item.sku_code.as_str(),
        "maker_code": item.maker_code,
        "name": item.name,
        "qty_planned": item.qty_planned,
        "qty_picked": item.qty_picked,
        "extra_approved_qty": item.extra_approved_qty,
        "extra_picked_qty": item.extra_picked_qty,
    })
}

pub fn job_with_items_to_json(job: &Job, items: &[JobItem]) -> serde_json::Value {
    let mut body = job_to_json(job);
    if let Some(map) = body.as_object_mut() {
        map.insert(
            "items".to_string(),
            serde_json::Value::Array(items.iter().map(item_to_json).collect()),
        );
    }
    body
}

pub fn location_to_json(location: &Location) -> serde_json::Value {
    json!({
        "id": location.id.to_string(),
        "code": location.code,
        "is_system": location.is_system,
        "is_shortage_pool": location.is_shortage_pool,
        "is_default": location.is_default,
    })
}

pub fn tx_to_json(tx: &ScanTransaction) -> serde_json::Value {
    json!({
        "id": tx.id.to_string(),
        "job_id": tx.job_id.to_string(),
        "job_item_id": tx.job_item_id.to_string(),
        "sku_code": tx.sku_code.as_str(),
        "location_id": tx.location_id.to_string(),
        "qty_delta": tx.qty_delta,
        "operator_id": tx.operator_id.to_string(),
        "kind": tx.kind.as_str(),
        "ref_tx_id": tx.ref_tx_id.map(|r| r.to_string()),
        "forced": tx.forced,
        "force_reason": tx.force_reason,
        "created_at": tx.created_at.to_rfc3339(),
    })
}

pub fn scan_accepted_to_json(accepted: &ScanAccepted) -> serde_json::Value {
    json!({
        "status": "OK",
        "tx_id": accepted.tx_id.to_string(),
        "job_item_id": accepted.job_item_id.to_string(),
        "sku_code": accepted.sku_code.as_str(),
        "used_location_code": accepted.used_location_code,
        "qty_picked": accepted.qty_picked,
        "qty_planned": accepted.qty_planned,
        "job_status": accepted.job_status.as_str(),
    })
}

pub fn undo_applied_to_json(applied: &UndoApplied) -> serde_json::Value {
    json!({
        "undone_tx_id": applied.undone_tx_id.to_string(),
        "undo_tx_id": applied.undo_tx_id.to_string(),
        "location_code": applied.location_code,
        "on_hand_after": applied.on_hand_after,
        "job_status": applied.job_status.as_str(),
    })
}

pub fn undo_report_to_json(report: &UndoAllReport) -> serde_json::Value {
    json!({
        "undone": report.undone.iter().map(undo_applied_to_json).collect::<Vec<_>>(),
        "blocked": report.blocked.as_ref().map(|b| {
            // Same shape as the 409 conflict body, plus the blocked tx.
            let mut body = serde_json::to_value(b.kind).unwrap_or_else(|_| json!({}));
            if let Some(map) = body.as_object_mut() {
                map.insert("tx_id".to_string(), json!(b.tx_id.to_string()));
            }
            body
        }),
    })
}
