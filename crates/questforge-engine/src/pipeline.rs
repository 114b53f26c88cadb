//! Turn resolution.
//!
//! Every accepted action runs the same sequence: validate against the
//! current snapshot, durably record the raw action, call the narrative
//! generator, commit the returned delta, then check for conclusion. A
//! failure at any stage aborts the turn without a version increment; the
//! player's action entry survives every abort after validation.

use serde::Serialize;
use serde_json::Value;
use tokio::time::timeout;
use tracing::{error, info, warn};
use uuid::Uuid;

use questforge_core::campaign::PlotPoint;
use questforge_core::clock::Clock;
use questforge_core::error::GeneratorError;
use questforge_core::generator::{ACHIEVED_PLOT_POINT_KEY, NarrativeGenerator, NarrativeRequest};
use questforge_core::session::{LogEntry, StateMap, TokenUsage};

use crate::cache::{CommittedTurn, SessionCache, TurnContext};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::evaluator;
use crate::validate;

/// The outcome of one submitted action, returned to the caller for fan-out.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TurnResult {
    /// A local precondition failed; no state change, the action was logged.
    ValidationRejected {
        /// Player-facing rejection reason.
        message: String,
    },
    /// The generator timed out or misbehaved; no state change, the action
    /// was logged.
    GenerationFailed {
        /// What went wrong, for the acting player.
        message: String,
    },
    /// The durable commit failed; in-memory state kept its pre-turn value.
    CommitFailed {
        /// What went wrong, for the acting player.
        message: String,
    },
    /// The turn committed.
    Updated(TurnUpdate),
    /// The turn committed and the session reached its end state.
    Concluded {
        /// The committed view, as for `Updated`.
        #[serde(flatten)]
        update: TurnUpdate,
        /// Closing summary for the members.
        summary: String,
    },
}

/// Post-commit session view carried by `Updated` and `Concluded` results.
#[derive(Debug, Clone, Serialize)]
pub struct TurnUpdate {
    /// The newly committed version.
    pub version: u64,
    /// The world model at that version.
    pub state: StateMap,
    /// The full log at that version.
    pub log: Vec<LogEntry>,
    /// The replacement set of valid moves.
    pub available_actions: Vec<String>,
    /// Raw token counts from the generator, for the accounting collaborator.
    pub usage: Option<TokenUsage>,
}

/// Everything a turn needs, borrowed from the engine.
pub(crate) struct TurnDeps<'a> {
    pub cache: &'a SessionCache,
    pub generator: &'a dyn NarrativeGenerator,
    pub clock: &'a dyn Clock,
    pub config: &'a EngineConfig,
}

/// Resolves one action from `Validating` through to `Done` or an abort.
pub(crate) async fn resolve_turn(
    deps: &TurnDeps<'_>,
    session_id: Uuid,
    member_id: Uuid,
    action: &str,
) -> Result<TurnResult, EngineError> {
    let entry = deps.cache.hydrated_entry(session_id).await?;
    let context = deps
        .cache
        .turn_context(&entry)
        .await
        .ok_or(EngineError::SessionNotFound(session_id))?;

    if context.concluded {
        info!(%session_id, "action on a concluded session rejected");
        return Ok(TurnResult::ValidationRejected {
            message: "the story has already concluded".to_owned(),
        });
    }

    if let Err(message) = validate::validate_action(action, &context.state) {
        // The raw action still goes on record, via the append that lives
        // and dies independently of any commit.
        let rejected = LogEntry::player(member_id, action, deps.clock.now());
        if let Err(err) = deps.cache.record_action(session_id, &entry, rejected).await {
            warn!(%session_id, %err, "could not record rejected action");
        }
        info!(%session_id, %member_id, "action failed validation");
        return Ok(TurnResult::ValidationRejected { message });
    }

    // Leaving Validating: the action must be on durable record, exactly
    // once, before generation begins.
    let player_entry = LogEntry::player(member_id, action, deps.clock.now());
    if let Err(err) = deps
        .cache
        .record_action(session_id, &entry, player_entry)
        .await
    {
        error!(%session_id, %err, "durable append of player action failed");
        return Ok(TurnResult::CommitFailed {
            message: err.to_string(),
        });
    }

    // The attempt counts toward the stuck signal whatever happens next.
    let turns_since_progress = deps
        .cache
        .note_turn_attempt(&entry)
        .await
        .ok_or(EngineError::SessionNotFound(session_id))?;

    let request = NarrativeRequest {
        state: context.state.clone(),
        action: action.to_owned(),
        stuck: turns_since_progress >= deps.config.stuck_threshold,
        next_required_plot_point: next_required_plot_point(&context),
    };

    let response = match timeout(
        deps.config.generation_timeout,
        deps.generator.generate(request),
    )
    .await
    {
        Err(_) => {
            warn!(%session_id, "narrative generation timed out");
            return Ok(TurnResult::GenerationFailed {
                message: GeneratorError::Timeout.to_string(),
            });
        }
        Ok(Err(err)) => {
            warn!(%session_id, %err, "narrative generation failed");
            return Ok(TurnResult::GenerationFailed {
                message: err.to_string(),
            });
        }
        Ok(Ok(response)) => response,
    };
    if response.narrative.trim().is_empty() {
        warn!(%session_id, "generator returned an empty narrative");
        return Ok(TurnResult::GenerationFailed {
            message: "generator returned an empty narrative".to_owned(),
        });
    }

    let (delta, achieved) = prepare_delta(response.state_delta, &context);
    let narrative = LogEntry::narrative(response.narrative, deps.clock.now());
    let committed = match deps
        .cache
        .commit_turn(
            session_id,
            &entry,
            delta,
            narrative,
            response.available_actions,
            achieved,
        )
        .await
    {
        Ok(committed) => committed,
        Err(err) => {
            error!(%session_id, %err, "turn commit failed, in-memory state rolled back");
            return Ok(TurnResult::CommitFailed {
                message: err.to_string(),
            });
        }
    };
    info!(%session_id, version = committed.version, "turn committed");

    let concluded = match evaluator::evaluate(
        &context.definition.conclusion_conditions,
        &context.definition.plot_points,
        &committed.state,
        &committed.completed_plot_points,
    ) {
        Ok(concluded) => concluded,
        Err(err) => {
            error!(%session_id, %err, "conclusion evaluation failed, session continues");
            false
        }
    };

    let update = TurnUpdate {
        version: committed.version,
        state: committed.state.clone(),
        log: committed.log.clone(),
        available_actions: committed.available_actions.clone(),
        usage: response.usage,
    };

    if concluded {
        if let Err(err) = deps.cache.mark_concluded(session_id, &entry).await {
            // The evaluator is deterministic; the next interaction will
            // re-derive and re-mark it.
            error!(%session_id, %err, "could not persist the concluded flag");
        }
        info!(%session_id, version = committed.version, "session concluded");
        return Ok(TurnResult::Concluded {
            update,
            summary: conclusion_summary(&committed),
        });
    }

    Ok(TurnResult::Updated(update))
}

/// The first required plot point, in declared order, not yet completed.
fn next_required_plot_point(context: &TurnContext) -> Option<String> {
    context
        .definition
        .plot_points
        .iter()
        .find(|p| p.required && !context.completed_plot_points.contains(&p.description))
        .map(|p| p.description.clone())
}

/// Strips the achieved-plot-point marker and drops delta keys outside the
/// declared schema. Dropped keys are an operator concern, not a turn
/// failure.
fn prepare_delta(mut delta: StateMap, context: &TurnContext) -> (StateMap, Option<String>) {
    let achieved = match delta.remove(ACHIEVED_PLOT_POINT_KEY) {
        Some(Value::String(marker)) => {
            Some(normalize_marker(marker, &context.definition.plot_points))
        }
        Some(other) => {
            warn!(marker = %other, "non-string achieved-plot-point marker dropped");
            None
        }
        None => None,
    };

    let schema = &context.definition.state_schema;
    let mut filtered = StateMap::new();
    for (key, value) in delta {
        if schema.contains(&key) {
            filtered.insert(key, value);
        } else {
            warn!(key = %key, "dropping state delta key outside the declared schema");
        }
    }
    (filtered, achieved)
}

/// Normalizes a marker to the declared plot-point description when one
/// matches case-insensitively; an undeclared marker is kept verbatim.
fn normalize_marker(marker: String, plot_points: &[PlotPoint]) -> String {
    plot_points
        .iter()
        .find(|p| p.description.eq_ignore_ascii_case(&marker))
        .map_or(marker, |p| p.description.clone())
}

fn conclusion_summary(committed: &CommittedTurn) -> String {
    let turns = committed.version.saturating_sub(1);
    if committed.completed_plot_points.is_empty() {
        format!("The story reached its end after {turns} turns.")
    } else {
        format!(
            "The story reached its end after {turns} turns: {}.",
            committed.completed_plot_points.join("; ")
        )
    }
}
