//! API route handlers for the rowforge server.

pub mod health;
pub mod jobs;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Create the combined API router with all routes under /api prefix.
///
/// Routes:
/// - GET    /api/health                    - Health check
/// - POST   /api/jobs                      - Create a processing job
/// - GET    /api/jobs                      - List job summaries
/// - GET    /api/jobs/{id}                 - Job detail (chunks + meta_data)
/// - DELETE /api/jobs/{id}/cancel          - Cancel an in-flight job
/// - GET    /api/jobs/{id}/download/result - Download the result sheet
pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", health::router())
        .nest("/api", jobs::router())
        .with_state(state)
}
