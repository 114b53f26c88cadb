//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{TimeZone, Utc};
use http_body_util::BodyExt;
use tower::ServiceExt;

use questforge_core::clock::Clock;
use questforge_core::generator::NarrativeGenerator;
use questforge_engine::{EngineConfig, SessionEngine};
use questforge_store::MemoryStore;
use questforge_test_support::FixedClock;

use questforge_api::routes;
use questforge_api::state::AppState;

/// Fixed timestamp used across all integration tests.
fn fixed_clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock(
        Utc.with_ymd_and_hms(2026, 3, 2, 18, 0, 0).unwrap(),
    ))
}

/// Builds the full app router over a fresh `MemoryStore`, a deterministic
/// clock, and the given generator. Uses the same route structure as
/// `main.rs`; the returned router can be cloned per request, all clones
/// share one engine.
pub fn build_test_app(generator: Arc<dyn NarrativeGenerator>) -> Router {
    let engine = Arc::new(SessionEngine::new(
        Arc::new(MemoryStore::new()),
        generator,
        fixed_clock(),
        EngineConfig::default(),
    ));

    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1/sessions", routes::session::router())
        .with_state(AppState::new(engine))
}

/// Sends a POST request with a JSON body and returns the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body_bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap()
    };

    (status, json)
}

/// Sends a GET request and returns the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body_bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap()
    };

    (status, json)
}
