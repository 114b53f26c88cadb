//! Shared application state.

use std::sync::Arc;

use questforge_engine::SessionEngine;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The session engine behind every route.
    pub engine: Arc<SessionEngine>,
}

impl AppState {
    /// Creates new application state.
    #[must_use]
    pub fn new(engine: Arc<SessionEngine>) -> Self {
        Self { engine }
    }
}
