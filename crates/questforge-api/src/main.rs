//! QuestForge API server entry point.

use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use questforge_core::clock::SystemClock;
use questforge_engine::{EngineConfig, SessionEngine};
use questforge_generator::HttpGenerator;
use questforge_store::MemoryStore;

mod error;
mod routes;
mod state;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting QuestForge API server");

    // Read configuration from environment.
    let generator_url = std::env::var("GENERATOR_URL")
        .map_err(|_| "GENERATOR_URL environment variable must be set")?;
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse()
        .map_err(|e| format!("PORT must be a valid u16: {e}"))?;
    let generation_timeout: u64 = std::env::var("GENERATION_TIMEOUT_SECS")
        .unwrap_or_else(|_| "30".to_string())
        .parse()
        .map_err(|e| format!("GENERATION_TIMEOUT_SECS must be a valid u64: {e}"))?;

    let config = EngineConfig {
        generation_timeout: Duration::from_secs(generation_timeout),
        ..EngineConfig::default()
    };

    // Wire the engine over its collaborators.
    let store = Arc::new(MemoryStore::new());
    let generator = Arc::new(HttpGenerator::new(generator_url, config.generation_timeout)?);
    let engine = Arc::new(SessionEngine::new(
        store,
        generator,
        Arc::new(SystemClock),
        config,
    ));
    let app_state = state::AppState::new(engine);

    // Build router.
    // TODO: Replace CorsLayer::permissive() with restricted origins for production.
    let app = Router::new()
        .merge(routes::health::router())
        .nest("/api/v1/sessions", routes::session::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server.
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e| format!("invalid HOST:PORT combination: {e}"))?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app).await?;

    Ok(())
}
