//! Engine error types.

use thiserror::Error;
use uuid::Uuid;

use questforge_core::error::StoreError;

/// Addressing and infrastructure failures of engine operations.
///
/// The fate of an accepted turn is reported through
/// [`TurnResult`](crate::pipeline::TurnResult), never through this type.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No active or durable session with this id.
    #[error("session not found: {0}")]
    SessionNotFound(Uuid),

    /// A session with this id already exists.
    #[error("session already exists: {0}")]
    SessionExists(Uuid),

    /// The acting member is not part of the session.
    #[error("member {member_id} is not part of session {session_id}")]
    NotAMember {
        /// The addressed session.
        session_id: Uuid,
        /// The member that tried to act.
        member_id: Uuid,
    },

    /// The opening scene or definition did not hold together at creation.
    #[error("invalid campaign definition: {0}")]
    InvalidDefinition(String),

    /// The durable store failed outside a turn commit.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The session's worker went away before answering.
    #[error("session worker for {0} shut down mid-request")]
    WorkerGone(Uuid),
}
