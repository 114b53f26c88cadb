//! In-memory `SessionStore`.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use questforge_core::campaign::CampaignDefinition;
use questforge_core::error::StoreError;
use questforge_core::session::{LogEntry, SessionRecord};
use questforge_core::store::SessionStore;

#[derive(Debug)]
struct StoredSession {
    definition: CampaignDefinition,
    record: SessionRecord,
}

/// An in-process session store, atomic per call.
///
/// Holds the authoritative record for the process lifetime. The whole map
/// sits behind one lock: every trait call reads or replaces a session's
/// record as a unit, which is all the engine asks of a store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: RwLock<HashMap<Uuid, StoredSession>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create_session(
        &self,
        session_id: Uuid,
        definition: &CampaignDefinition,
        record: &SessionRecord,
    ) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session_id) {
            return Err(StoreError::Conflict(session_id));
        }
        sessions.insert(
            session_id,
            StoredSession {
                definition: definition.clone(),
                record: record.clone(),
            },
        );
        Ok(())
    }

    async fn load_session(&self, session_id: Uuid) -> Result<Option<SessionRecord>, StoreError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(&session_id).map(|s| s.record.clone()))
    }

    async fn load_definition(
        &self,
        session_id: Uuid,
    ) -> Result<Option<CampaignDefinition>, StoreError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(&session_id).map(|s| s.definition.clone()))
    }

    async fn save_session(
        &self,
        session_id: Uuid,
        record: &SessionRecord,
    ) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        let stored = sessions
            .get_mut(&session_id)
            .ok_or(StoreError::Missing(session_id))?;
        stored.record = record.clone();
        Ok(())
    }

    async fn append_log_entry(
        &self,
        session_id: Uuid,
        entry: &LogEntry,
    ) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        let stored = sessions
            .get_mut(&session_id)
            .ok_or(StoreError::Missing(session_id))?;
        stored.record.log.push(entry.clone());
        Ok(())
    }
}
