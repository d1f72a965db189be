use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use pickbay_core::JobId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::OperatorContext;

pub fn router() -> Router {
    Router::new()
        .route("/:id/transactions", get(list_transactions))
        .route("/:id/undo/check", get(check_undo))
        .route("/:id/undo/last", post(undo_last))
        .route("/:id/undo/all", post(undo_all))
}

fn parse_job_id(id: &str) -> Result<JobId, axum::response::Response> {
    id.parse().map_err(|_| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid job id")
    })
}

pub async fn list_transactions(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let job_id = match parse_job_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.engine().list_transactions(job_id).await {
        Ok(txs) => {
            let body: Vec<_> = txs.iter().map(dto::tx_to_json).collect();
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn check_undo(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let job_id = match parse_job_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.engine().check_undo(job_id).await {
        Ok(preview) => (StatusCode::OK, Json(preview)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn undo_last(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(operator): Extension<OperatorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UndoRequest>,
) -> axum::response::Response {
    let job_id = match parse_job_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .engine()
        .undo_last(job_id, body.force, operator.operator_id())
        .await
    {
        Ok(applied) => (StatusCode::OK, Json(dto::undo_applied_to_json(&applied))).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn undo_all(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(operator): Extension<OperatorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UndoRequest>,
) -> axum::response::Response {
    let job_id = match parse_job_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .engine()
        .undo_all(job_id, body.force, operator.operator_id())
        .await
    {
        Ok(report) => (StatusCode::OK, Json(dto::undo_report_to_json(&report))).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}
