//! Mock `SessionStore` implementations for tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use uuid::Uuid;

use questforge_core::campaign::CampaignDefinition;
use questforge_core::error::StoreError;
use questforge_core::session::{LogEntry, SessionRecord};
use questforge_core::store::SessionStore;

/// A fully functional in-memory store that records every write and can be
/// told to start failing saves or appends mid-test.
///
/// The failure switches leave reads working, which is exactly the shape of a
/// durable-write outage the commit path has to survive.
#[derive(Debug, Default)]
pub struct RecordingStore {
    sessions: Mutex<HashMap<Uuid, (CampaignDefinition, SessionRecord)>>,
    saves: Mutex<Vec<(Uuid, SessionRecord)>>,
    appends: Mutex<Vec<(Uuid, LogEntry)>>,
    fail_saves: AtomicBool,
    fail_appends: AtomicBool,
}

impl RecordingStore {
    /// Creates an empty store with all failure switches off.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `save_session` fail when `fail` is true.
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent `append_log_entry` fail when `fail` is true.
    pub fn fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    /// Every successful `save_session` call, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn saves(&self) -> Vec<(Uuid, SessionRecord)> {
        self.saves.lock().unwrap().clone()
    }

    /// Every successful `append_log_entry` call, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn appends(&self) -> Vec<(Uuid, LogEntry)> {
        self.appends.lock().unwrap().clone()
    }

    /// Direct peek at a session's current durable record.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn record(&self, session_id: Uuid) -> Option<SessionRecord> {
        self.sessions
            .lock()
            .unwrap()
            .get(&session_id)
            .map(|(_, record)| record.clone())
    }
}

#[async_trait]
impl SessionStore for RecordingStore {
    async fn create_session(
        &self,
        session_id: Uuid,
        definition: &CampaignDefinition,
        record: &SessionRecord,
    ) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().unwrap();
        if sessions.contains_key(&session_id) {
            return Err(StoreError::Conflict(session_id));
        }
        sessions.insert(session_id, (definition.clone(), record.clone()));
        Ok(())
    }

    async fn load_session(&self, session_id: Uuid) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .get(&session_id)
            .map(|(_, record)| record.clone()))
    }

    async fn load_definition(
        &self,
        session_id: Uuid,
    ) -> Result<Option<CampaignDefinition>, StoreError> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .get(&session_id)
            .map(|(definition, _)| definition.clone()))
    }

    async fn save_session(
        &self,
        session_id: Uuid,
        record: &SessionRecord,
    ) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("save rejected by test".to_owned()));
        }
        let mut sessions = self.sessions.lock().unwrap();
        let stored = sessions
            .get_mut(&session_id)
            .ok_or(StoreError::Missing(session_id))?;
        stored.1 = record.clone();
        self.saves.lock().unwrap().push((session_id, record.clone()));
        Ok(())
    }

    async fn append_log_entry(
        &self,
        session_id: Uuid,
        entry: &LogEntry,
    ) -> Result<(), StoreError> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("append rejected by test".to_owned()));
        }
        let mut sessions = self.sessions.lock().unwrap();
        let stored = sessions
            .get_mut(&session_id)
            .ok_or(StoreError::Missing(session_id))?;
        stored.1.log.push(entry.clone());
        self.appends
            .lock()
            .unwrap()
            .push((session_id, entry.clone()));
        Ok(())
    }
}

/// A store where every operation fails, for exercising error paths.
#[derive(Debug)]
pub struct FailingStore;

#[async_trait]
impl SessionStore for FailingStore {
    async fn create_session(
        &self,
        _session_id: Uuid,
        _definition: &CampaignDefinition,
        _record: &SessionRecord,
    ) -> Result<(), StoreError> {
        Err(StoreError::Backend("connection refused".to_owned()))
    }

    async fn load_session(&self, _session_id: Uuid) -> Result<Option<SessionRecord>, StoreError> {
        Err(StoreError::Backend("connection refused".to_owned()))
    }

    async fn load_definition(
        &self,
        _session_id: Uuid,
    ) -> Result<Option<CampaignDefinition>, StoreError> {
        Err(StoreError::Backend("connection refused".to_owned()))
    }

    async fn save_session(
        &self,
        _session_id: Uuid,
        _record: &SessionRecord,
    ) -> Result<(), StoreError> {
        Err(StoreError::Backend("connection refused".to_owned()))
    }

    async fn append_log_entry(
        &self,
        _session_id: Uuid,
        _entry: &LogEntry,
    ) -> Result<(), StoreError> {
        Err(StoreError::Backend("connection refused".to_owned()))
    }
}
