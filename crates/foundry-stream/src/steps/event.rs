use super::raw::RawEvent;

/// Reducer input derived from one `RawEvent`.
///
/// `original_index` is the position of the source record, so both halves of a
/// `Started&Completed` record share it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepEvent {
    Start {
        name: String,
        tool_name: Option<String>,
        original_index: usize,
    },
    Complete {
        name: String,
        content: Option<String>,
        original_index: usize,
    },
    Content {
        content: String,
        for_node: Option<String>,
        original_index: usize,
    },
}

impl StepEvent {
    pub fn original_index(&self) -> usize {
        match self {
            Self::Start { original_index, .. }
            | Self::Complete { original_index, .. }
            | Self::Content { original_index, .. } => *original_index,
        }
    }
}

impl RawEvent {
    /// Events carried by this record; empty when it names no node and has no content.
    pub fn events(&self, original_index: usize) -> Vec<StepEvent> {
        let Some(name) = self.node_name.as_ref() else {
            return match self.content.as_ref() {
                Some(content) => vec![StepEvent::Content {
                    content: content.clone(),
                    for_node: self.for_node.clone(),
                    original_index,
                }],
                None => Vec::new(),
            };
        };

        let status = self.normalized_status().unwrap_or_default();
        let start = || StepEvent::Start {
            name: name.clone(),
            tool_name: self.tool_name.clone(),
            original_index,
        };
        let complete = || StepEvent::Complete {
            name: name.clone(),
            content: self.content.clone(),
            original_index,
        };

        if status.contains("started&completed") {
            vec![start(), complete()]
        } else if status.contains("started") {
            vec![start()]
        } else if status.contains("completed") {
            vec![complete()]
        } else {
            Vec::new()
        }
    }
}

/// Derives the ordered event sequence for a list of records.
pub fn derive_events(records: &[RawEvent]) -> Vec<StepEvent> {
    records
        .iter()
        .enumerate()
        .flat_map(|(index, record)| record.events(index))
        .collect()
}
