//! Narrative generator abstraction.
//!
//! The engine treats narrative generation as a black box: a structured
//! request goes in, a structured response comes out, or the call fails.
//! Prompt construction and the language-model call live behind this trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GeneratorError;
use crate::session::{StateMap, TokenUsage};

/// Reserved state-delta key carrying an achieved-plot-point marker.
///
/// Consumed and stripped by the turn pipeline before the delta is merged
/// into session state.
pub const ACHIEVED_PLOT_POINT_KEY: &str = "achieved_plot_point";

/// The structured turn context sent to the generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeRequest {
    /// Snapshot of the world model at the time of the action.
    pub state: StateMap,
    /// The raw player action text.
    pub action: String,
    /// True when the party has gone several turns without plot progress.
    pub stuck: bool,
    /// The next unsatisfied required plot point, if any remain.
    pub next_required_plot_point: Option<String>,
}

/// The structured response expected back. Any other shape is a hard failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeResponse {
    /// Narrative text to append to the session log.
    pub narrative: String,
    /// Proposed state delta; may carry [`ACHIEVED_PLOT_POINT_KEY`].
    #[serde(default)]
    pub state_delta: StateMap,
    /// Full replacement for the session's available actions.
    #[serde(default)]
    pub available_actions: Vec<String>,
    /// Raw token counts for the accounting collaborator.
    #[serde(default)]
    pub usage: Option<TokenUsage>,
}

/// A black-box narrative generation service.
#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    /// Produces the narrative continuation for one player action.
    async fn generate(&self, request: NarrativeRequest) -> Result<NarrativeResponse, GeneratorError>;
}
