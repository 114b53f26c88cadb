//! Conclusion evaluation.
//!
//! Decides whether a session has reached its end state. Pure: the same four
//! inputs always produce the same answer, and nothing here touches I/O.

use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use questforge_core::campaign::PlotPoint;
use questforge_core::session::StateMap;

/// State key holding the list of visited locations.
const VISITED_LOCATIONS_KEY: &str = "visited_locations";

/// A condition descriptor that is not a structured predicate.
///
/// The turn pipeline treats this as "not concluded" and surfaces it to
/// operators only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed conclusion condition at index {index}: {reason}")]
pub struct EvaluationError {
    /// Position of the offending descriptor in the condition list.
    pub index: usize,
    /// What was wrong with it.
    pub reason: String,
}

enum Predicate<'a> {
    StateKeyEquals { key: &'a str, value: &'a Value },
    StateKeyExists { key: &'a str },
    StateKeyContains { key: &'a str, value: &'a Value },
    LocationVisited { location: &'a str },
    Unsupported { kind: &'a str },
}

/// Decides whether the session is concluded.
///
/// Every required plot point must be completed; with that gate passed, an
/// empty condition list is vacuously satisfied, otherwise every condition
/// must hold, evaluated in declared order with short-circuiting.
///
/// # Errors
///
/// Returns [`EvaluationError`] on the first malformed condition descriptor.
pub fn evaluate(
    conditions: &[Value],
    plot_points: &[PlotPoint],
    state: &StateMap,
    completed_plot_points: &[String],
) -> Result<bool, EvaluationError> {
    for plot_point in plot_points.iter().filter(|p| p.required) {
        if !completed_plot_points.contains(&plot_point.description) {
            return Ok(false);
        }
    }

    if conditions.is_empty() {
        return Ok(true);
    }

    for (index, descriptor) in conditions.iter().enumerate() {
        if !holds(parse(index, descriptor)?, state) {
            return Ok(false);
        }
    }
    Ok(true)
}

fn parse(index: usize, descriptor: &Value) -> Result<Predicate<'_>, EvaluationError> {
    let object = descriptor
        .as_object()
        .ok_or_else(|| malformed(index, "descriptor is not an object"))?;
    let kind = object
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed(index, "missing string field `type`"))?;

    match kind {
        "state_key_equals" => Ok(Predicate::StateKeyEquals {
            key: required_str(index, object, "key")?,
            value: required(index, object, "value")?,
        }),
        "state_key_exists" => Ok(Predicate::StateKeyExists {
            key: required_str(index, object, "key")?,
        }),
        "state_key_contains" => Ok(Predicate::StateKeyContains {
            key: required_str(index, object, "key")?,
            value: required(index, object, "value")?,
        }),
        "location_visited" => Ok(Predicate::LocationVisited {
            location: required_str(index, object, "location")?,
        }),
        other => Ok(Predicate::Unsupported { kind: other }),
    }
}

fn required<'a>(
    index: usize,
    object: &'a serde_json::Map<String, Value>,
    name: &str,
) -> Result<&'a Value, EvaluationError> {
    object
        .get(name)
        .ok_or_else(|| malformed(index, &format!("missing field `{name}`")))
}

fn required_str<'a>(
    index: usize,
    object: &'a serde_json::Map<String, Value>,
    name: &str,
) -> Result<&'a str, EvaluationError> {
    required(index, object, name)?
        .as_str()
        .ok_or_else(|| malformed(index, &format!("field `{name}` is not a string")))
}

fn malformed(index: usize, reason: &str) -> EvaluationError {
    EvaluationError {
        index,
        reason: reason.to_owned(),
    }
}

fn holds(predicate: Predicate<'_>, state: &StateMap) -> bool {
    match predicate {
        Predicate::StateKeyEquals { key, value } => {
            state.get(key).is_some_and(|actual| loosely_equal(actual, value))
        }
        Predicate::StateKeyExists { key } => state.contains_key(key),
        Predicate::StateKeyContains { key, value } => {
            state.get(key).is_some_and(|actual| contains(actual, value))
        }
        Predicate::LocationVisited { location } => state
            .get(VISITED_LOCATIONS_KEY)
            .and_then(Value::as_array)
            .is_some_and(|visited| visited.iter().any(|entry| stringify(entry) == location)),
        Predicate::Unsupported { kind } => {
            warn!(kind, "unsupported conclusion predicate kind");
            false
        }
    }
}

/// Equality that tolerates representational drift around booleans: a `true`
/// on either side compares case-insensitively against the other side's
/// string form.
fn loosely_equal(left: &Value, right: &Value) -> bool {
    if left == right {
        return true;
    }
    if left.is_boolean() || right.is_boolean() {
        return stringify(left).eq_ignore_ascii_case(&stringify(right));
    }
    false
}

/// Containment: a list contains an equal element (string-compared), a string
/// contains a substring, anything else falls back to stringified equality.
fn contains(actual: &Value, value: &Value) -> bool {
    let needle = stringify(value);
    match actual {
        Value::Array(items) => items.iter().any(|item| stringify(item) == needle),
        Value::String(text) => text.contains(needle.as_str()),
        other => stringify(other) == needle,
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
