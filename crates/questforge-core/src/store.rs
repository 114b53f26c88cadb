//! Durable store abstraction.

use async_trait::async_trait;
use uuid::Uuid;

use crate::campaign::CampaignDefinition;
use crate::error::StoreError;
use crate::session::{LogEntry, SessionRecord};

/// Transactional access to a session's persisted state.
///
/// Every method is atomic per call; the engine relies on nothing stronger.
/// The store is the single source of truth across process restarts.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persists a new session's definition and opening record together.
    ///
    /// # Errors
    ///
    /// `StoreError::Conflict` when the session id is already taken.
    async fn create_session(
        &self,
        session_id: Uuid,
        definition: &CampaignDefinition,
        record: &SessionRecord,
    ) -> Result<(), StoreError>;

    /// Loads the last committed record, if the session exists.
    async fn load_session(&self, session_id: Uuid) -> Result<Option<SessionRecord>, StoreError>;

    /// Loads the immutable campaign definition, if the session exists.
    async fn load_definition(
        &self,
        session_id: Uuid,
    ) -> Result<Option<CampaignDefinition>, StoreError>;

    /// Replaces the session's record with `record`.
    ///
    /// # Errors
    ///
    /// `StoreError::Missing` when the session was never created.
    async fn save_session(
        &self,
        session_id: Uuid,
        record: &SessionRecord,
    ) -> Result<(), StoreError>;

    /// Appends a single log entry without touching the rest of the record.
    ///
    /// This is the lightweight append used for player actions: it must
    /// succeed or fail independently of any turn commit, so a turn that
    /// aborts after validation still leaves the action on durable record.
    async fn append_log_entry(
        &self,
        session_id: Uuid,
        entry: &LogEntry,
    ) -> Result<(), StoreError>;
}
