//! The session engine facade.
//!
//! Each session is an independent serial actor: one worker task drains a
//! bounded queue of its turns in arrival order, so no two commits for the
//! same session are ever in flight together, while different sessions
//! proceed fully in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc, oneshot};
use tracing::{debug, info};
use uuid::Uuid;

use questforge_core::campaign::{CampaignDefinition, OpeningScene};
use questforge_core::clock::Clock;
use questforge_core::error::StoreError;
use questforge_core::generator::NarrativeGenerator;
use questforge_core::session::{LogEntry, SessionRecord, SessionSnapshot};
use questforge_core::store::SessionStore;

use crate::cache::SessionCache;
use crate::config::EngineConfig;
use crate::diff::StateDiff;
use crate::error::EngineError;
use crate::pipeline::{self, TurnResult};

struct TurnJob {
    member_id: Uuid,
    action: String,
    reply: oneshot::Sender<Result<TurnResult, EngineError>>,
}

struct Inner {
    cache: SessionCache,
    generator: Arc<dyn NarrativeGenerator>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

/// The public face of the session engine.
pub struct SessionEngine {
    inner: Arc<Inner>,
    workers: Mutex<HashMap<Uuid, mpsc::Sender<TurnJob>>>,
}

impl SessionEngine {
    /// Wires an engine over its collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn SessionStore>,
        generator: Arc<dyn NarrativeGenerator>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        let snapshot_retention = config.snapshot_retention;
        Self {
            inner: Arc::new(Inner {
                cache: SessionCache::new(store, snapshot_retention),
                generator,
                clock,
                config,
            }),
            workers: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a session: persists the campaign definition and the opening
    /// scene atomically and primes the cache. The session starts at
    /// version 1 with the opening narrative as its first log entry.
    ///
    /// An empty declared schema is derived from the opening state's keys.
    ///
    /// # Errors
    ///
    /// `EngineError::SessionExists` for a duplicate id,
    /// `EngineError::InvalidDefinition` when the opening state uses keys
    /// outside the declared schema, or a store error.
    pub async fn create_session(
        &self,
        session_id: Uuid,
        mut definition: CampaignDefinition,
        opening: OpeningScene,
    ) -> Result<SessionSnapshot, EngineError> {
        if definition.state_schema.is_empty() {
            definition.state_schema = opening.initial_state.keys().cloned().collect();
        } else if let Some(key) = opening
            .initial_state
            .keys()
            .find(|key| !definition.state_schema.contains(*key))
        {
            return Err(EngineError::InvalidDefinition(format!(
                "opening state key `{key}` is not in the declared schema"
            )));
        }

        let record = SessionRecord {
            state: opening.initial_state,
            log: vec![LogEntry::narrative(
                opening.narrative,
                self.inner.clock.now(),
            )],
            available_actions: opening.available_actions,
            version: 1,
            completed_plot_points: Vec::new(),
            turns_since_progress: 0,
            concluded: false,
        };

        self.inner
            .cache
            .create_session(session_id, definition, record)
            .await
            .map_err(|err| match err {
                EngineError::Store(StoreError::Conflict(id)) => EngineError::SessionExists(id),
                other => other,
            })?;
        info!(%session_id, "session created");
        self.inner.cache.snapshot(session_id).await
    }

    /// Registers `member_id` in the session. Idempotent; lazily creates an
    /// unhydrated cache shell when the session is not yet active.
    pub async fn join(&self, session_id: Uuid, member_id: Uuid) {
        self.inner.cache.join(session_id, member_id).await;
    }

    /// Removes `member_id` from the session. The last member leaving evicts
    /// the cache entry and retires its worker; durable state is unaffected
    /// and an in-flight turn still runs to completion.
    pub async fn leave(&self, session_id: Uuid, member_id: Uuid) {
        let evicted = self.inner.cache.leave(session_id, member_id).await;
        if evicted && self.workers.lock().await.remove(&session_id).is_some() {
            // Dropping the sender lets the worker drain and exit.
            debug!(%session_id, "session worker retired");
        }
    }

    /// Serves the current snapshot, hydrating from the durable store on
    /// first access.
    ///
    /// # Errors
    ///
    /// `EngineError::SessionNotFound` when the session is neither active
    /// nor durably stored.
    pub async fn get_snapshot(&self, session_id: Uuid) -> Result<SessionSnapshot, EngineError> {
        self.inner.cache.snapshot(session_id).await
    }

    /// Computes the structural delta from `from_version` to the current
    /// version.
    ///
    /// # Errors
    ///
    /// `EngineError::SessionNotFound` when the session is neither active
    /// nor durably stored.
    pub async fn request_diff(
        &self,
        session_id: Uuid,
        from_version: u64,
    ) -> Result<StateDiff, EngineError> {
        self.inner.cache.diff(session_id, from_version).await
    }

    /// Number of sessions currently resident in the cache.
    pub async fn active_session_count(&self) -> usize {
        self.inner.cache.active_sessions().await
    }

    /// Submits one action for serial resolution and awaits its outcome.
    ///
    /// Turns for the same session resolve strictly in submission order;
    /// versions are assigned in that order.
    ///
    /// # Errors
    ///
    /// `EngineError::NotAMember` or `EngineError::SessionNotFound` when the
    /// addressing is wrong; `EngineError::WorkerGone` if the worker is torn
    /// down before answering. The fate of an accepted turn arrives as a
    /// [`TurnResult`].
    pub async fn submit_action(
        &self,
        session_id: Uuid,
        member_id: Uuid,
        action: String,
    ) -> Result<TurnResult, EngineError> {
        self.inner.cache.ensure_member(session_id, member_id).await?;

        let sender = self.worker(session_id).await;
        let (reply, on_reply) = oneshot::channel();
        sender
            .send(TurnJob {
                member_id,
                action,
                reply,
            })
            .await
            .map_err(|_| EngineError::WorkerGone(session_id))?;
        on_reply
            .await
            .map_err(|_| EngineError::WorkerGone(session_id))?
    }

    async fn worker(&self, session_id: Uuid) -> mpsc::Sender<TurnJob> {
        let mut workers = self.workers.lock().await;
        if let Some(sender) = workers.get(&session_id) {
            if !sender.is_closed() {
                return sender.clone();
            }
        }
        let (sender, receiver) = mpsc::channel(self.inner.config.turn_queue_depth);
        tokio::spawn(run_worker(
            Arc::clone(&self.inner),
            session_id,
            receiver,
        ));
        workers.insert(session_id, sender.clone());
        sender
    }
}

/// Drains one session's turn queue, one job at a time, in arrival order.
async fn run_worker(inner: Arc<Inner>, session_id: Uuid, mut jobs: mpsc::Receiver<TurnJob>) {
    debug!(%session_id, "session worker started");
    while let Some(job) = jobs.recv().await {
        let deps = pipeline::TurnDeps {
            cache: &inner.cache,
            generator: inner.generator.as_ref(),
            clock: inner.clock.as_ref(),
            config: &inner.config,
        };
        let result = pipeline::resolve_turn(&deps, session_id, job.member_id, &job.action).await;
        // A caller that gave up on the reply does not undo the turn; the
        // commit or abort above has already happened.
        let _ = job.reply.send(result);
    }
    debug!(%session_id, "session worker stopped");
}
