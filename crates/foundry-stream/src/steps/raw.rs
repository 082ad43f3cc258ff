use serde_json::{Map, Value};

const NODE_NAME_KEYS: [&str; 4] = ["Node Name", "node_name", "node", "name"];
const STATUS_KEYS: [&str; 3] = ["Status", "status", "state"];
const TOOL_NAME_KEYS: [&str; 2] = ["Tool Name", "tool_name"];
const CONTENT_KEYS: [&str; 2] = ["content", "Tool Output"];
const FOR_NODE_KEY: &str = "forNode";

/// One node-status record in canonical form.
///
/// The backend spells the same field several ways; every spelling is folded
/// into one field here so the reducer never looks at wire keys.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawEvent {
    pub node_name: Option<String>,
    pub status: Option<String>,
    pub tool_name: Option<String>,
    pub content: Option<String>,
    pub for_node: Option<String>,
}

impl RawEvent {
    /// Normalizes one wire record. Non-objects give an empty record.
    pub fn from_value(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self::default();
        };
        Self {
            node_name: first_string(object, &NODE_NAME_KEYS)
                .filter(|name| !name.trim().is_empty()),
            status: first_string(object, &STATUS_KEYS),
            tool_name: first_string(object, &TOOL_NAME_KEYS),
            content: first_content(object),
            for_node: first_string(object, &[FOR_NODE_KEY]),
        }
    }

    /// Status lower-cased and trimmed, as compared by event derivation.
    pub fn normalized_status(&self) -> Option<String> {
        self.status
            .as_deref()
            .map(|status| status.trim().to_ascii_lowercase())
    }
}

fn first_string(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match object.get(*key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    })
}

fn first_content(object: &Map<String, Value>) -> Option<String> {
    CONTENT_KEYS
        .iter()
        .find_map(|key| object.get(*key).and_then(render_content))
        .or_else(|| {
            object
                .get("raw")
                .and_then(|raw| raw.get("content"))
                .and_then(render_content)
        })
}

fn render_content(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string())),
    }
}
