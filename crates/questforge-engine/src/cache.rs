//! The session state cache.
//!
//! Single owner of all mutable session state. Every read and write goes
//! through here: commits persist the successor record durably before it
//! becomes visible in memory, so a reader can never observe an uncommitted
//! version, and a failed durable write leaves memory at the pre-turn state.
//!
//! Membership and hydrated state live behind separate locks so that
//! join/leave traffic never contends with turn processing.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use questforge_core::campaign::CampaignDefinition;
use questforge_core::session::{LogEntry, SessionRecord, SessionSnapshot, StateMap};
use questforge_core::store::SessionStore;

use crate::diff::{StateDiff, diff_states};
use crate::error::EngineError;

/// Hydrated state of one active session.
#[derive(Debug)]
struct SessionData {
    definition: CampaignDefinition,
    state: StateMap,
    log: Vec<LogEntry>,
    available_actions: Vec<String>,
    version: u64,
    completed_plot_points: Vec<String>,
    turns_since_progress: u32,
    concluded: bool,
    /// Recent `(version, state)` snapshots for diff computation, oldest
    /// first. Bounded; older bases degrade to a full-snapshot diff.
    history: VecDeque<(u64, StateMap)>,
}

impl SessionData {
    fn new(definition: CampaignDefinition, record: SessionRecord) -> Self {
        Self {
            definition,
            state: record.state,
            log: record.log,
            available_actions: record.available_actions,
            version: record.version,
            completed_plot_points: record.completed_plot_points,
            turns_since_progress: record.turns_since_progress,
            concluded: record.concluded,
            history: VecDeque::new(),
        }
    }

    fn record(&self) -> SessionRecord {
        SessionRecord {
            state: self.state.clone(),
            log: self.log.clone(),
            available_actions: self.available_actions.clone(),
            version: self.version,
            completed_plot_points: self.completed_plot_points.clone(),
            turns_since_progress: self.turns_since_progress,
            concluded: self.concluded,
        }
    }

    fn adopt(&mut self, record: SessionRecord) {
        self.state = record.state;
        self.log = record.log;
        self.available_actions = record.available_actions;
        self.version = record.version;
        self.completed_plot_points = record.completed_plot_points;
        self.turns_since_progress = record.turns_since_progress;
        self.concluded = record.concluded;
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            version: self.version,
            state: self.state.clone(),
            log: self.log.clone(),
            available_actions: self.available_actions.clone(),
        }
    }
}

/// One cache slot.
#[derive(Debug)]
pub(crate) struct SessionEntry {
    members: Mutex<HashSet<Uuid>>,
    data: RwLock<Option<SessionData>>,
}

impl SessionEntry {
    fn shell() -> Self {
        Self {
            members: Mutex::new(HashSet::new()),
            data: RwLock::new(None),
        }
    }
}

/// The read-modify-write context a turn commit needs, cloned out under one
/// read lock.
#[derive(Debug, Clone)]
pub(crate) struct TurnContext {
    pub state: StateMap,
    pub concluded: bool,
    pub definition: CampaignDefinition,
    pub completed_plot_points: Vec<String>,
}

/// The post-commit view handed back to the pipeline.
#[derive(Debug, Clone)]
pub(crate) struct CommittedTurn {
    pub version: u64,
    pub state: StateMap,
    pub log: Vec<LogEntry>,
    pub available_actions: Vec<String>,
    pub completed_plot_points: Vec<String>,
}

/// In-memory cache of active sessions, mediating the durable store.
pub struct SessionCache {
    store: Arc<dyn SessionStore>,
    entries: RwLock<HashMap<Uuid, Arc<SessionEntry>>>,
    snapshot_retention: usize,
}

impl SessionCache {
    /// Creates an empty cache over `store`.
    pub fn new(store: Arc<dyn SessionStore>, snapshot_retention: usize) -> Self {
        Self {
            store,
            entries: RwLock::new(HashMap::new()),
            snapshot_retention,
        }
    }

    /// Registers `member_id` in the session. Idempotent. Lazily creates an
    /// unhydrated shell when the session has no cache entry yet.
    pub async fn join(&self, session_id: Uuid, member_id: Uuid) {
        let entry = {
            let mut entries = self.entries.write().await;
            Arc::clone(
                entries
                    .entry(session_id)
                    .or_insert_with(|| Arc::new(SessionEntry::shell())),
            )
        };
        let inserted = entry.members.lock().await.insert(member_id);
        if inserted {
            debug!(%session_id, %member_id, "member joined");
        }
    }

    /// Removes `member_id`. When the membership becomes empty the cache
    /// entry is evicted; durable state is unaffected. Returns whether the
    /// entry was evicted.
    pub async fn leave(&self, session_id: Uuid, member_id: Uuid) -> bool {
        let mut entries = self.entries.write().await;
        let Some(entry) = entries.get(&session_id) else {
            return false;
        };
        let mut members = entry.members.lock().await;
        members.remove(&member_id);
        let empty = members.is_empty();
        drop(members);
        if empty {
            entries.remove(&session_id);
            info!(%session_id, "last member left, session evicted from cache");
        }
        empty
    }

    /// Fails unless `member_id` currently belongs to the session.
    pub async fn ensure_member(&self, session_id: Uuid, member_id: Uuid) -> Result<(), EngineError> {
        let entry = self
            .lookup(session_id)
            .await
            .ok_or(EngineError::SessionNotFound(session_id))?;
        if entry.members.lock().await.contains(&member_id) {
            Ok(())
        } else {
            Err(EngineError::NotAMember {
                session_id,
                member_id,
            })
        }
    }

    /// Serves the current snapshot, hydrating from the durable store on
    /// first access. Never returns a version below the last durable commit.
    pub async fn snapshot(&self, session_id: Uuid) -> Result<SessionSnapshot, EngineError> {
        let entry = self.hydrated_entry(session_id).await?;
        let guard = entry.data.read().await;
        guard
            .as_ref()
            .map(SessionData::snapshot)
            .ok_or(EngineError::SessionNotFound(session_id))
    }

    /// Computes the structural delta from `from_version` to the current
    /// version. An up-to-date base yields an empty delta; a base older than
    /// snapshot retention yields the full current snapshot.
    pub async fn diff(&self, session_id: Uuid, from_version: u64) -> Result<StateDiff, EngineError> {
        let entry = self.hydrated_entry(session_id).await?;
        let guard = entry.data.read().await;
        let data = guard
            .as_ref()
            .ok_or(EngineError::SessionNotFound(session_id))?;

        if from_version >= data.version {
            return Ok(StateDiff::Empty);
        }
        match data
            .history
            .iter()
            .find(|(version, _)| *version == from_version)
        {
            Some((_, base)) => Ok(diff_states(from_version, data.version, base, &data.state)),
            None => Ok(StateDiff::Full {
                version: data.version,
                state: data.state.clone(),
            }),
        }
    }

    /// Persists a new session's definition and opening record atomically,
    /// then primes a hydrated cache entry for it.
    pub(crate) async fn create_session(
        &self,
        session_id: Uuid,
        definition: CampaignDefinition,
        record: SessionRecord,
    ) -> Result<(), EngineError> {
        self.store
            .create_session(session_id, &definition, &record)
            .await?;
        let entry = {
            let mut entries = self.entries.write().await;
            Arc::clone(
                entries
                    .entry(session_id)
                    .or_insert_with(|| Arc::new(SessionEntry::shell())),
            )
        };
        *entry.data.write().await = Some(SessionData::new(definition, record));
        Ok(())
    }

    /// Returns the session's entry, hydrating its data from the durable
    /// store if this is the first access since the shell was created.
    pub(crate) async fn hydrated_entry(
        &self,
        session_id: Uuid,
    ) -> Result<Arc<SessionEntry>, EngineError> {
        let entry = self
            .lookup(session_id)
            .await
            .ok_or(EngineError::SessionNotFound(session_id))?;

        if entry.data.read().await.is_some() {
            return Ok(entry);
        }

        let mut guard = entry.data.write().await;
        if guard.is_none() {
            let record = self
                .store
                .load_session(session_id)
                .await?
                .ok_or(EngineError::SessionNotFound(session_id))?;
            let definition = self
                .store
                .load_definition(session_id)
                .await?
                .ok_or(EngineError::SessionNotFound(session_id))?;
            debug!(%session_id, version = record.version, "hydrated session from durable store");
            *guard = Some(SessionData::new(definition, record));
        }
        drop(guard);
        Ok(entry)
    }

    /// Clones out what a turn needs to validate and build its generation
    /// request.
    pub(crate) async fn turn_context(&self, entry: &SessionEntry) -> Option<TurnContext> {
        let guard = entry.data.read().await;
        guard.as_ref().map(|data| TurnContext {
            state: data.state.clone(),
            concluded: data.concluded,
            definition: data.definition.clone(),
            completed_plot_points: data.completed_plot_points.clone(),
        })
    }

    /// Durably appends a player-action entry, then mirrors it in memory.
    ///
    /// Independent of any turn commit: if the append fails, memory is left
    /// untouched so it never runs ahead of the durable log.
    pub(crate) async fn record_action(
        &self,
        session_id: Uuid,
        entry: &SessionEntry,
        log_entry: LogEntry,
    ) -> Result<(), EngineError> {
        let mut guard = entry.data.write().await;
        let data = guard
            .as_mut()
            .ok_or(EngineError::SessionNotFound(session_id))?;
        self.store.append_log_entry(session_id, &log_entry).await?;
        data.log.push(log_entry);
        Ok(())
    }

    /// Counts a turn attempt toward the stuck signal and returns the new
    /// counter value. Attempts count whatever the turn's eventual outcome.
    pub(crate) async fn note_turn_attempt(&self, entry: &SessionEntry) -> Option<u32> {
        let mut guard = entry.data.write().await;
        let data = guard.as_mut()?;
        data.turns_since_progress = data.turns_since_progress.saturating_add(1);
        Some(data.turns_since_progress)
    }

    /// Commits one turn: merges the delta key-by-key, appends the narrative
    /// entry, replaces the available actions, applies any achieved plot
    /// point, and increments the version by exactly one. The record is
    /// durably persisted before any of it becomes visible; on a store
    /// failure memory keeps its pre-turn value.
    pub(crate) async fn commit_turn(
        &self,
        session_id: Uuid,
        entry: &SessionEntry,
        delta: StateMap,
        narrative: LogEntry,
        available_actions: Vec<String>,
        achieved_plot_point: Option<String>,
    ) -> Result<CommittedTurn, EngineError> {
        let mut guard = entry.data.write().await;
        let data = guard
            .as_mut()
            .ok_or(EngineError::SessionNotFound(session_id))?;

        let mut next = data.record();
        for (key, value) in delta {
            next.state.insert(key, value);
        }
        next.log.push(narrative);
        next.available_actions = available_actions;
        if let Some(description) = achieved_plot_point {
            if !next.completed_plot_points.contains(&description) {
                info!(%session_id, plot_point = %description, "plot point achieved");
                next.completed_plot_points.push(description);
                next.turns_since_progress = 0;
            }
        }
        next.version += 1;

        self.store.save_session(session_id, &next).await?;

        // Durably committed; retire the old state into diff history and
        // make the new version visible.
        let retired = std::mem::take(&mut data.state);
        data.history.push_back((data.version, retired));
        while data.history.len() > self.snapshot_retention {
            data.history.pop_front();
        }
        data.adopt(next);

        Ok(CommittedTurn {
            version: data.version,
            state: data.state.clone(),
            log: data.log.clone(),
            available_actions: data.available_actions.clone(),
            completed_plot_points: data.completed_plot_points.clone(),
        })
    }

    /// Durably marks the session concluded, at the same version. Versions
    /// count committed turns; concluding is not a turn.
    pub(crate) async fn mark_concluded(
        &self,
        session_id: Uuid,
        entry: &SessionEntry,
    ) -> Result<(), EngineError> {
        let mut guard = entry.data.write().await;
        let data = guard
            .as_mut()
            .ok_or(EngineError::SessionNotFound(session_id))?;
        let mut next = data.record();
        next.concluded = true;
        self.store.save_session(session_id, &next).await?;
        data.concluded = true;
        Ok(())
    }

    /// Number of sessions currently resident in the cache, hydrated or not.
    pub async fn active_sessions(&self) -> usize {
        self.entries.read().await.len()
    }

    async fn lookup(&self, session_id: Uuid) -> Option<Arc<SessionEntry>> {
        self.entries.read().await.get(&session_id).map(Arc::clone)
    }
}
