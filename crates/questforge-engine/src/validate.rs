//! Local action preconditions.
//!
//! These checks run against the current snapshot before the generator is
//! ever invoked, so a player naming an item the party does not carry gets an
//! immediate rejection instead of a generation round-trip.

use serde_json::Value;

use questforge_core::session::StateMap;

/// State key listing what the party carries.
pub const INVENTORY_KEY: &str = "inventory";

/// Verbs whose object must name a carried item.
const ITEM_VERBS: &[&str] = &["use", "equip", "wield", "drop", "read", "light", "throw"];

/// Leading articles stripped from an item reference.
const ARTICLES: &[&str] = &["the", "a", "an", "my"];

/// Validates `action` against the current state.
///
/// # Errors
///
/// Returns the player-facing rejection message when a precondition fails.
pub fn validate_action(action: &str, state: &StateMap) -> Result<(), String> {
    let trimmed = action.trim();
    if trimmed.is_empty() {
        return Err("action text is empty".to_owned());
    }

    let Some(reference) = item_reference(trimmed) else {
        return Ok(());
    };

    let carried = match state.get(INVENTORY_KEY) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .any(|item| item_matches(item, &reference)),
        _ => false,
    };

    if carried {
        Ok(())
    } else {
        Err(format!("you are not carrying \"{reference}\""))
    }
}

/// Extracts the item reference from an action, if its leading verb takes
/// one: "use the rusty torch" yields "rusty torch".
fn item_reference(action: &str) -> Option<String> {
    let lowered = action.to_lowercase();
    let (verb, rest) = lowered.split_once(char::is_whitespace)?;
    if !ITEM_VERBS.contains(&verb) {
        return None;
    }

    let mut words = rest.split_whitespace().peekable();
    while let Some(word) = words.peek() {
        if ARTICLES.contains(word) {
            words.next();
        } else {
            break;
        }
    }
    let reference = words.collect::<Vec<_>>().join(" ");
    (!reference.is_empty()).then_some(reference)
}

/// Case-insensitive exact-or-prefix match of `reference` against the
/// word-aligned suffixes of an inventory entry: "torch" matches
/// "a rusty torch", "sword" does not match "shield".
fn item_matches(item: &str, reference: &str) -> bool {
    let item = item.to_lowercase();
    let mut suffix = item.as_str();
    loop {
        if suffix == reference || suffix.starts_with(reference) {
            return true;
        }
        match suffix.find(char::is_whitespace) {
            Some(cut) => suffix = suffix[cut..].trim_start(),
            None => return false,
        }
    }
}
