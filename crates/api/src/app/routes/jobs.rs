use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use pickbay_core::{JobId, JobItemId, StoreId};
use pickbay_infra::{CreateJob, CreateJobItem, JobFilter};
use pickbay_jobs::{JobStatus, JobType};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::OperatorContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_job).get(list_jobs))
        .route("/:id", get(get_job))
        .route("/:id/allow-overpick", post(set_allow_overpick))
        .route("/:id/items/:item_id/approve-extra", post(approve_extra))
}

pub async fn create_job(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(operator): Extension<OperatorContext>,
    Json(body): Json<dto::CreateJobRequest>,
) -> axum::response::Response {
    let job_type = match JobType::parse(&body.job_type) {
        Ok(v) => v,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string()),
    };
    let store_id: StoreId = match body.store_id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid store id"),
    };
    let parent_id = match body.parent_id.as_deref().map(str::parse::<JobId>).transpose() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid parent id"),
    };

    let input = CreateJob {
        job_type,
        store_id,
        parent_id,
        allow_overpick: body.allow_overpick,
        operator_id: operator.operator_id(),
        items: body
            .items
            .into_iter()
            .map(|i| CreateJobItem {
                sku_code: i.sku_code,
                maker_code: i.maker_code,
                name: i.name,
                qty_planned: i.qty_planned,
            })
            .collect(),
    };

    match services.engine().create_job(input).await {
        Ok((job, items)) => (
            StatusCode::CREATED,
            Json(dto::job_with_items_to_json(&job, &items)),
        )
            .into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn list_jobs(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::ListJobsQuery>,
) -> axum::response::Response {
    let status = match query.status.as_deref().map(JobStatus::parse).transpose() {
        Ok(v) => v,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string()),
    };
    let store_id = match query.store_id.as_deref().map(str::parse::<StoreId>).transpose() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid store id"),
    };
    let parent_id = match query.parent_id.as_deref().map(str::parse::<JobId>).transpose() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid parent id"),
    };

    let filter = JobFilter {
        status,
        store_id,
        parent_id,
    };

    match services.engine().list_jobs(filter).await {
        Ok(jobs) => {
            let body: Vec<_> = jobs.iter().map(dto::job_to_json).collect();
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn get_job(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let job_id: JobId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid job id"),
    };

    match services.engine().get_job(job_id).await {
        Ok((job, items)) => {
            (StatusCode::OK, Json(dto::job_with_items_to_json(&job, &items))).into_response()
        }
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn set_allow_overpick(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::AllowOverpickRequest>,
) -> axum::response::Response {
    let job_id: JobId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid job id"),
    };

    match services.engine().set_allow_overpick(job_id, body.allow).await {
        Ok(job) => (StatusCode::OK, Json(dto::job_to_json(&job))).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn approve_extra(
    Extension(services): Extension<Arc<AppServices>>,
    Path((id, item_id)): Path<(String, String)>,
    Json(body): Json<dto::ApproveExtraRequest>,
) -> axum::response::Response {
    let job_id: JobId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid job id"),
    };
    let item_id: JobItemId = match item_id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid job item id"),
    };

    match services.engine().approve_extra(job_id, item_id, body.qty).await {
        Ok(item) => (StatusCode::OK, Json(dto::item_to_json(&item))).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}
