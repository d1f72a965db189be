use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use pickbay_core::OperatorId;

use crate::context::OperatorContext;

const OPERATOR_HEADER: &str = "x-operator-id";

/// Require a valid `x-operator-id` header and expose it as request context.
pub async fn operator_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let operator_id = extract_operator(req.headers())?;

    req.extensions_mut()
        .insert(OperatorContext::new(operator_id));

    Ok(next.run(req).await)
}

fn extract_operator(headers: &HeaderMap) -> Result<OperatorId, StatusCode> {
    let header = headers
        .get(OPERATOR_HEADER)
        .ok_or(StatusCode::BAD_REQUEST)?;

    let header = header.to_str().map_err(|_| StatusCode::BAD_REQUEST)?;

    header
        .trim()
        .parse::<OperatorId>()
        .map_err(|_| StatusCode::BAD_REQUEST)
}
