//! Decoder for the `actions` / `action_values` lists attached to insight rows.
//!
//! Each list holds `{ "action_type": ..., "value": ... }` entries. The API
//! sends values as strings, some exports flatten the whole list into a JSON
//! string, and rows without the action simply omit the field. The decoder
//! accepts all of these and falls back to zero instead of failing.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ActionEntry {
    pub action_type: String,
    #[serde(default)]
    pub value: Value,
}

impl ActionEntry {
    pub fn numeric_value(&self) -> Option<f64> {
        match &self.value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
        .filter(|v| v.is_finite())
    }
}

/// Decodes a raw actions field into typed entries, skipping anything that
/// does not look like an action.
pub fn decode_entries(raw: &Value) -> Vec<ActionEntry> {
    let items = match raw {
        Value::Array(items) => items.clone(),
        Value::String(encoded) => match serde_json::from_str::<Value>(encoded) {
            Ok(Value::Array(items)) => items,
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };
    items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<ActionEntry>(item).ok())
        .collect()
}

/// Returns the value of the first entry whose type matches `action_type`,
/// or zero when the field is absent, malformed, or has no such entry.
pub fn action_value(raw: Option<&Value>, action_type: &str) -> f64 {
    let Some(raw) = raw else {
        return 0.0;
    };
    decode_entries(raw)
        .iter()
        .find(|entry| entry.action_type == action_type)
        .and_then(ActionEntry::numeric_value)
        .unwrap_or(0.0)
}
