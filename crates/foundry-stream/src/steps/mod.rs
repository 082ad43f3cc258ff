//! Execution-step reconstruction for chat streams.
//!
//! The backend reports agent progress as flat records (`Started`, `Completed`,
//! free content). This module rebuilds the call tree from those records and
//! flattens it for display. Everything here is pure: the same records always
//! give the same tree, and the input is never mutated, so callers recompute
//! from the full record list on every update.

mod display;
mod event;
mod raw;
mod tree;

use serde_json::Value;

pub use display::{DisplayNode, flatten_for_display, streaming_lines, timeline};
pub use event::{StepEvent, derive_events};
pub use raw::RawEvent;
pub use tree::{StepNode, StepStatus, StepTree};

use crate::errors::TransportError;
use crate::sse::SsePayload;
use crate::stream::PayloadStream;

/// Rebuilds the nested step tree from wire records.
pub fn build_tree(records: &[Value]) -> Vec<StepNode> {
    let raw: Vec<RawEvent> = records.iter().map(RawEvent::from_value).collect();
    StepTree::from_events(&derive_events(&raw)).roots()
}

/// Records to numbered display list.
pub fn reduce(records: &[Value]) -> Vec<DisplayNode> {
    flatten_for_display(&build_tree(records))
}

/// Like `reduce`, but accepts any JSON value; anything but an array gives an
/// empty list.
pub fn reduce_value(records: &Value) -> Vec<DisplayNode> {
    records
        .as_array()
        .map(|records| reduce(records))
        .unwrap_or_default()
}

/// Growing list of step records received for one chat turn.
#[derive(Clone, Debug, Default)]
pub struct StepLog {
    records: Vec<Value>,
}

impl StepLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one record.
    pub fn push(&mut self, record: Value) {
        self.records.push(record);
    }

    /// Appends the records carried by a stream payload.
    ///
    /// Objects are one record, arrays are a batch, anything else is ignored.
    /// Returns the number of records added.
    pub fn push_payload(&mut self, payload: &SsePayload) -> usize {
        match payload.as_json() {
            Some(record @ Value::Object(_)) => {
                self.records.push(record.clone());
                1
            }
            Some(Value::Array(batch)) => {
                self.records.extend(batch.iter().cloned());
                batch.len()
            }
            _ => 0,
        }
    }

    pub fn records(&self) -> &[Value] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rebuilds the tree from everything received so far.
    pub fn tree(&self) -> Vec<StepNode> {
        build_tree(&self.records)
    }

    /// Rebuilds the numbered display list from everything received so far.
    pub fn display(&self) -> Vec<DisplayNode> {
        reduce(&self.records)
    }
}

/// Drains a chat stream into a `StepLog`.
pub async fn collect_steps(stream: PayloadStream) -> Result<StepLog, TransportError> {
    let mut log = StepLog::new();
    for payload in stream.collect_payloads().await? {
        log.push_payload(&payload);
    }
    Ok(log)
}
