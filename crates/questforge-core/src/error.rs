//! Errors surfaced by the engine's external collaborators.

use thiserror::Error;
use uuid::Uuid;

/// Failures of a [`SessionStore`](crate::store::SessionStore) implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A session with this id already has a durable record.
    #[error("session {0} already exists")]
    Conflict(Uuid),

    /// The session has no durable record to operate on.
    #[error("session {0} has no durable record")]
    Missing(Uuid),

    /// The backing store failed or is unreachable.
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Failures of a [`NarrativeGenerator`](crate::generator::NarrativeGenerator).
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// The generator did not answer within the configured bound.
    #[error("narrative generation timed out")]
    Timeout,

    /// The generator answered with something other than the agreed shape.
    #[error("malformed generator response: {0}")]
    Malformed(String),

    /// The generator service itself failed.
    #[error("generator backend error: {0}")]
    Backend(String),
}
