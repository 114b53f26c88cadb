//! Shared helpers for engine integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use serde_json::json;

use questforge_core::campaign::{CampaignDefinition, OpeningScene, PlotPoint};
use questforge_core::generator::{NarrativeGenerator, NarrativeResponse};
use questforge_core::session::StateMap;
use questforge_core::store::SessionStore;
use questforge_engine::{EngineConfig, SessionEngine};
use questforge_test_support::FixedClock;

/// Fixed timestamp used across all integration tests.
pub fn fixed_clock() -> FixedClock {
    FixedClock(Utc.with_ymd_and_hms(2026, 3, 2, 18, 0, 0).unwrap())
}

/// Builds an engine over the given collaborators with a deterministic clock.
pub fn engine_with(
    store: Arc<dyn SessionStore>,
    generator: Arc<dyn NarrativeGenerator>,
    config: EngineConfig,
) -> SessionEngine {
    SessionEngine::new(store, generator, Arc::new(fixed_clock()), config)
}

/// A campaign with one required plot point, one optional one, and a single
/// conclusion condition on the vault door.
pub fn definition() -> CampaignDefinition {
    CampaignDefinition {
        plot_points: vec![
            PlotPoint {
                description: "find the crypt key".to_owned(),
                required: true,
            },
            PlotPoint {
                description: "light the beacon".to_owned(),
                required: false,
            },
        ],
        conclusion_conditions: vec![
            json!({ "type": "state_key_equals", "key": "door", "value": "open" }),
        ],
        state_schema: ["location", "inventory", "door", "visited_locations"]
            .iter()
            .map(|key| (*key).to_owned())
            .collect(),
    }
}

/// An opening scene consistent with [`definition`]'s schema.
pub fn opening() -> OpeningScene {
    let mut initial_state = StateMap::new();
    initial_state.insert("location".to_owned(), json!("harbor"));
    initial_state.insert("inventory".to_owned(), json!(["a rusty torch", "rope"]));
    initial_state.insert("door".to_owned(), json!("locked"));
    OpeningScene {
        narrative: "Fog rolls over the harbor as the party lands.".to_owned(),
        initial_state,
        available_actions: vec!["look around".to_owned(), "use torch".to_owned()],
    }
}

/// Builds a well-formed generator response.
pub fn narrative_response(
    text: &str,
    delta: serde_json::Value,
    actions: &[&str],
) -> NarrativeResponse {
    NarrativeResponse {
        narrative: text.to_owned(),
        state_delta: delta.as_object().cloned().unwrap_or_default(),
        available_actions: actions.iter().map(|a| (*a).to_owned()).collect(),
        usage: None,
    }
}
