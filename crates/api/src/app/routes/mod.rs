use axum::Router;

pub mod jobs;
pub mod locations;
pub mod scans;
pub mod system;
pub mod undo;

/// Router for all operator-scoped endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/locations", locations::router())
        .nest(
            "/jobs",
            jobs::router().merge(scans::router()).merge(undo::router()),
        )
}
