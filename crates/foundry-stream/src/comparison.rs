use serde_json::{Map, Value};

use crate::sse::{SsePayload, TERMINAL_STATUS};

/// Progress report from a model-comparison stream.
///
/// Read permissively: every known field is optional, values of the wrong type
/// are treated as missing and unknown fields are kept in `extra`.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
pub struct ComparisonProgress {
    pub status: Option<String>,
    pub evaluation_id: Option<String>,
    pub message: Option<String>,
    pub processed: Option<u64>,
    pub remaining: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

const KNOWN_FIELDS: [&str; 5] = ["status", "evaluation_id", "message", "processed", "remaining"];

impl ComparisonProgress {
    /// Reads a JSON object payload. Text payloads and non-objects yield `None`.
    pub fn from_payload(payload: &SsePayload) -> Option<Self> {
        Self::from_value(payload.as_json()?)
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let extra = object
            .iter()
            .filter(|(key, _)| !KNOWN_FIELDS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Some(Self {
            status: object.get("status").and_then(text_field),
            evaluation_id: object.get("evaluation_id").and_then(id_field),
            message: object.get("message").and_then(text_field),
            processed: object.get("processed").and_then(count_field),
            remaining: object.get("remaining").and_then(count_field),
            extra,
        })
    }

    /// True when this report is the stream's terminal sentinel.
    pub fn is_done(&self) -> bool {
        self.status.as_deref() == Some(TERMINAL_STATUS)
    }

    /// Fraction of work processed, when both counters are present.
    pub fn progress_fraction(&self) -> Option<f64> {
        let processed = self.processed?;
        let total = processed.checked_add(self.remaining?)?;
        if total == 0 {
            return None;
        }
        Some(processed as f64 / total as f64)
    }
}

fn text_field(value: &Value) -> Option<String> {
    value.as_str().map(ToOwned::to_owned)
}

fn id_field(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn count_field(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
