//! Shared test utilities for the complyguard workspace.

use serde_json::Value;

pub const TIMESTAMP_PLACEHOLDER: &str = "__TIMESTAMP__";
pub const VERSION_PLACEHOLDER: &str = "__VERSION__";

const ENVELOPE_KEYS: [&str; 5] = ["schema", "tool", "timestamp", "coverage", "findings"];

/// Normalize the fields of a report that legitimately vary between otherwise identical runs.
///
/// Only the root object is touched, and only when it looks like a report envelope (has
/// `schema`, `tool`, `timestamp`, `coverage`, and `findings`): `timestamp` and
/// `tool.version` are replaced with placeholders. Findings carry no time values, so nothing
/// below the root needs rewriting.
pub fn normalize_nondeterministic(mut value: Value) -> Value {
    if let Some(obj) = value.as_object_mut()
        && ENVELOPE_KEYS.iter().all(|k| obj.contains_key(*k))
    {
        obj.insert(
            "timestamp".to_string(),
            Value::String(TIMESTAMP_PLACEHOLDER.to_string()),
        );
        if let Some(tool) = obj.get_mut("tool").and_then(Value::as_object_mut)
            && tool.contains_key("version")
        {
            tool.insert(
                "version".to_string(),
                Value::String(VERSION_PLACEHOLDER.to_string()),
            );
        }
    }
    value
}
