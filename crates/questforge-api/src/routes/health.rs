//! Service health endpoint.

use axum::extract::State;
use axum::{Json, Router, routing::get};
use serde::Serialize;

use crate::state::AppState;

/// Liveness report plus a coarse view of engine load.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always "ok" while the process answers.
    pub status: &'static str,
    /// Crate version of the running server.
    pub version: &'static str,
    /// Sessions currently resident in the engine's cache.
    pub active_sessions: usize,
}

/// GET /health
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        active_sessions: state.engine.active_session_count().await,
    })
}

/// Returns the health router.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
