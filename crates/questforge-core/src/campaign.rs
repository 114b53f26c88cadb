//! Campaign definition types.
//!
//! A campaign definition is produced once, at session creation, by an
//! external generation step; the engine consumes it read-only.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::session::StateMap;

/// A discrete narrative milestone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlotPoint {
    /// Human-readable milestone description; doubles as its identity.
    pub description: String,
    /// Required milestones gate the session's conclusion.
    pub required: bool,
}

/// The immutable narrative frame of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignDefinition {
    /// Milestones in declared order.
    #[serde(default)]
    pub plot_points: Vec<PlotPoint>,
    /// Conclusion predicate descriptors, evaluated in declared order.
    ///
    /// Kept as raw JSON: a malformed descriptor must fail conclusion
    /// evaluation for its own session, not deserialization of the record.
    #[serde(default)]
    pub conclusion_conditions: Vec<serde_json::Value>,
    /// The permitted state keys, fixed for the session's lifetime.
    ///
    /// Generator deltas are filtered against this set. Empty means "derive
    /// from the opening scene's initial state" at creation.
    #[serde(default)]
    pub state_schema: BTreeSet<String>,
}

/// The opening scene, committed atomically with the definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpeningScene {
    /// Narrative text that becomes the session's first log entry.
    pub narrative: String,
    /// The initial world model.
    pub initial_state: StateMap,
    /// The first set of valid moves.
    #[serde(default)]
    pub available_actions: Vec<String>,
}
