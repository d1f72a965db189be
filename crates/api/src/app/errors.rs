use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use pickbay_core::{ConflictKind, DomainError};
use pickbay_infra::{EngineError, StoreError};

pub fn engine_error_to_response(err: EngineError) -> axum::response::Response {
    match err {
        EngineError::Domain(domain) => domain_error_to_response(domain),
        EngineError::Store(store) => store_error_to_response(store),
    }
}

fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DomainError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        DomainError::Conflict(kind) => conflict_response(kind),
    }
}

fn store_error_to_response(err: StoreError) -> axum::response::Response {
    match err {
        StoreError::Concurrency(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        StoreError::Duplicate(msg) => json_error(StatusCode::CONFLICT, "duplicate", msg),
        StoreError::NotFound(what) => json_error(StatusCode::NOT_FOUND, "not_found", what),
        StoreError::InvalidCommit(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invalid_commit", msg)
        }
        StoreError::Backend(msg) => {
            tracing::error!("store backend failure: {msg}");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", msg)
        }
    }
}

/// 409 body carrying the discriminated conflict: `{error, message, kind, need?}`.
///
/// Clients branch on `kind` (and its payload), never on `message`.
fn conflict_response(kind: ConflictKind) -> axum::response::Response {
    let mut body = serde_json::to_value(kind).unwrap_or_else(|_| json!({}));
    if let Some(map) = body.as_object_mut() {
        map.insert("error".to_string(), json!("scan_conflict"));
        map.insert("message".to_string(), json!(kind.to_string()));
    }

    (StatusCode::CONFLICT, axum::Json(body)).into_response()
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
