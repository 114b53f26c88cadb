//! Structural state diffs.
//!
//! A diff relates two versions of a session's state map. Values compare by
//! deep equality; mapping keys are order-insensitive.

use serde::Serialize;

use questforge_core::session::StateMap;

/// A structural delta between two versions of a session's state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StateDiff {
    /// The requested base version is current; nothing changed.
    Empty,
    /// Key-level changes between the two versions.
    Changes {
        /// The base version the changes apply to.
        from_version: u64,
        /// The version the changes produce.
        to_version: u64,
        /// Keys added since the base, or whose value changed, with their new
        /// values.
        entries: StateMap,
        /// Keys present at the base version but absent now.
        removed: Vec<String>,
    },
    /// The base version predates snapshot retention; the full current state
    /// is returned instead of failing.
    Full {
        /// The current version.
        version: u64,
        /// The complete current state.
        state: StateMap,
    },
}

impl StateDiff {
    /// Applies this delta to the snapshot it was computed against,
    /// reproducing the current snapshot exactly.
    #[must_use]
    pub fn apply(&self, base: &StateMap) -> StateMap {
        match self {
            Self::Empty => base.clone(),
            Self::Changes {
                entries, removed, ..
            } => {
                let mut next = base.clone();
                for key in removed {
                    next.remove(key);
                }
                for (key, value) in entries {
                    next.insert(key.clone(), value.clone());
                }
                next
            }
            Self::Full { state, .. } => state.clone(),
        }
    }
}

/// Computes the key-level changes taking `base` (at `from_version`) to
/// `current` (at `to_version`).
#[must_use]
pub fn diff_states(
    from_version: u64,
    to_version: u64,
    base: &StateMap,
    current: &StateMap,
) -> StateDiff {
    let mut entries = StateMap::new();
    for (key, value) in current {
        if base.get(key) != Some(value) {
            entries.insert(key.clone(), value.clone());
        }
    }
    let removed: Vec<String> = base
        .keys()
        .filter(|key| !current.contains_key(*key))
        .cloned()
        .collect();

    StateDiff::Changes {
        from_version,
        to_version,
        entries,
        removed,
    }
}
