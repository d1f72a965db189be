use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};

use pickbay_infra::NewLocation;

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new().route("/", post(create_location).get(list_locations))
}

pub async fn create_location(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<NewLocation>,
) -> axum::response::Response {
    match services.engine().register_location(body).await {
        Ok(location) => {
            (StatusCode::CREATED, Json(dto::location_to_json(&location))).into_response()
        }
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn list_locations(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.engine().locations().await {
        Ok(locations) => {
            let body: Vec<_> = locations.iter().map(dto::location_to_json).collect();
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => errors::engine_error_to_response(e),
    }
}
