use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};

use pickbay_core::JobId;
use pickbay_infra::{ReceiveRequest, ScanRequest};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::OperatorContext;

pub fn router() -> Router {
    Router::new()
        .route("/:id/scans/pick", post(scan_pick))
        .route("/:id/scans/receive", post(scan_receive))
}

pub async fn scan_pick(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(operator): Extension<OperatorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ScanPickRequest>,
) -> axum::response::Response {
    let job_id: JobId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid job id"),
    };

    let req = ScanRequest {
        job_id,
        value: body.value,
        qty: body.qty,
        location_code: body.location_code,
        force: body.force,
        force_reason: body.force_reason,
        operator_id: operator.operator_id(),
    };

    match services.engine().scan_pick(req).await {
        Ok(accepted) => {
            (StatusCode::OK, Json(dto::scan_accepted_to_json(&accepted))).into_response()
        }
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn scan_receive(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(operator): Extension<OperatorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ScanReceiveRequest>,
) -> axum::response::Response {
    let job_id: JobId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid job id"),
    };

    let req = ReceiveRequest {
        job_id,
        value: body.value,
        qty: body.qty,
        location_code: body.location_code,
        operator_id: operator.operator_id(),
    };

    match services.engine().scan_receive(req).await {
        Ok(accepted) => {
            (StatusCode::OK, Json(dto::scan_accepted_to_json(&accepted))).into_response()
        }
        Err(e) => errors::engine_error_to_response(e),
    }
}
