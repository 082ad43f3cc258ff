use std::collections::HashMap;

use tracing::trace;

use super::event::StepEvent;

/// Lifecycle state of a step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum StepStatus {
    Started,
    Completed,
}

/// One reconstructed step and everything nested under it.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct StepNode {
    pub name: String,
    pub tool_name: Option<String>,
    pub status: StepStatus,
    /// Content routed to this step, in arrival order.
    pub parsed_contents: Vec<String>,
    pub children: Vec<StepNode>,
    /// Nesting level when the step started; roots are 0.
    pub depth: usize,
}

type NodeId = usize;

#[derive(Clone, Debug)]
struct ArenaNode {
    name: String,
    tool_name: Option<String>,
    status: StepStatus,
    parsed_contents: Vec<String>,
    children: Vec<NodeId>,
    depth: usize,
}

#[derive(Clone, Debug)]
struct OpenEntry {
    node: NodeId,
    name: String,
}

/// Accumulator for rebuilding the step tree from an event sequence.
///
/// Feed it with `apply` as a fold; every call consumes the accumulator and
/// returns the next one. Nodes live in an arena and are only materialized as
/// nested `StepNode`s by `roots()`.
#[derive(Clone, Debug, Default)]
pub struct StepTree {
    nodes: Vec<ArenaNode>,
    roots: Vec<NodeId>,
    open_stack: Vec<OpenEntry>,
    all_nodes: HashMap<String, NodeId>,
    last_completed: Option<NodeId>,
}

impl StepTree {
    /// Folds a whole event sequence into a tree.
    pub fn from_events<'a>(events: impl IntoIterator<Item = &'a StepEvent>) -> Self {
        events.into_iter().fold(Self::default(), Self::apply)
    }

    /// Applies one event and returns the updated accumulator.
    pub fn apply(mut self, event: &StepEvent) -> Self {
        match event {
            StepEvent::Start {
                name, tool_name, ..
            } => self.start(name, tool_name.clone()),
            StepEvent::Content {
                content,
                for_node,
                original_index,
            } => self.content(content, for_node.as_deref(), *original_index),
            StepEvent::Complete { name, content, .. } => self.complete(name, content.as_deref()),
        }
        self
    }

    fn start(&mut self, name: &str, tool_name: Option<String>) {
        let id = self.nodes.len();
        self.nodes.push(ArenaNode {
            name: name.to_string(),
            tool_name,
            status: StepStatus::Started,
            parsed_contents: Vec::new(),
            children: Vec::new(),
            depth: self.open_stack.len(),
        });
        match self.open_stack.last() {
            Some(parent) => self.nodes[parent.node].children.push(id),
            None => self.roots.push(id),
        }
        self.open_stack.push(OpenEntry {
            node: id,
            name: name.to_string(),
        });
        self.all_nodes.insert(name.to_string(), id);
    }

    fn content(&mut self, content: &str, for_node: Option<&str>, original_index: usize) {
        let target = for_node
            .and_then(|name| self.all_nodes.get(name).copied())
            .or_else(|| self.open_stack.last().map(|entry| entry.node))
            .or(self.last_completed);
        match target {
            Some(id) => self.nodes[id].parsed_contents.push(content.to_string()),
            None => trace!(original_index, "dropping content with no step to attach to"),
        }
    }

    fn complete(&mut self, name: &str, content: Option<&str>) {
        // Innermost match first, so a re-entered step closes its latest run.
        if let Some(pos) = self.open_stack.iter().rposition(|entry| entry.name == name) {
            let entry = self.open_stack.remove(pos);
            self.mark_completed(entry.node, content);
            self.last_completed = Some(entry.node);
        } else if let Some(&id) = self.all_nodes.get(name) {
            self.mark_completed(id, content);
        }
    }

    fn mark_completed(&mut self, id: NodeId, content: Option<&str>) {
        let node = &mut self.nodes[id];
        node.status = StepStatus::Completed;
        if let Some(content) = content.filter(|c| !c.is_empty()) {
            node.parsed_contents.push(content.to_string());
        }
    }

    /// Names of the steps still open, outermost first.
    pub fn open_names(&self) -> Vec<&str> {
        self.open_stack
            .iter()
            .map(|entry| entry.name.as_str())
            .collect()
    }

    /// Number of steps created so far.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Materializes the nested root list.
    pub fn roots(&self) -> Vec<StepNode> {
        self.roots.iter().map(|&id| self.materialize(id)).collect()
    }

    fn materialize(&self, id: NodeId) -> StepNode {
        let node = &self.nodes[id];
        StepNode {
            name: node.name.clone(),
            tool_name: node.tool_name.clone(),
            status: node.status,
            parsed_contents: node.parsed_contents.clone(),
            children: node
                .children
                .iter()
                .map(|&child| self.materialize(child))
                .collect(),
            depth: node.depth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start(name: &str) -> StepEvent {
        StepEvent::Start {
            name: name.into(),
            tool_name: None,
            original_index: 0,
        }
    }

    fn complete(name: &str, content: Option<&str>) -> StepEvent {
        StepEvent::Complete {
            name: name.into(),
            content: content.map(str::to_string),
            original_index: 0,
        }
    }

    fn content(text: &str, for_node: Option<&str>) -> StepEvent {
        StepEvent::Content {
            content: text.into(),
            for_node: for_node.map(str::to_string),
            original_index: 0,
        }
    }

    #[test]
    fn out_of_order_complete_leaves_deeper_steps_open() {
        let tree = StepTree::from_events(&[start("a"), start("b"), start("c"), complete("b", None)]);
        assert_eq!(tree.open_names(), vec!["a", "c"]);

        let tree = tree.apply(&content("for c", None));
        let roots = tree.roots();
        let b = &roots[0].children[0];
        assert_eq!(b.status, StepStatus::Completed);
        assert_eq!(b.children[0].parsed_contents, vec!["for c".to_string()]);
        assert_eq!(b.children[0].status, StepStatus::Started);
    }

    #[test]
    fn late_complete_does_not_reopen_the_step() {
        let tree = StepTree::from_events(&[
            start("a"),
            complete("a", None),
            complete("a", Some("late")),
            start("b"),
        ]);
        let roots = tree.roots();
        assert_eq!(roots.len(), 2);
        assert_eq!(roots[0].parsed_contents, vec!["late".to_string()]);
        assert_eq!(roots[1].depth, 0);
        assert_eq!(tree.open_names(), vec!["b"]);
    }

    #[test]
    fn complete_for_unknown_step_is_ignored() {
        let tree = StepTree::from_events(&[complete("ghost", Some("x"))]);
        assert!(tree.is_empty());
        assert!(tree.roots().is_empty());
    }

    #[test]
    fn content_targets_for_node_then_open_step_then_last_completed() {
        let tree = StepTree::from_events(&[
            start("a"),
            complete("a", None),
            start("b"),
            content("explicit", Some("a")),
            content("implicit", None),
            content("unresolved target", Some("zzz")),
            complete("b", None),
            content("after close", None),
        ]);
        let roots = tree.roots();
        assert_eq!(roots[0].parsed_contents, vec!["explicit".to_string()]);
        assert_eq!(
            roots[1].parsed_contents,
            vec![
                "implicit".to_string(),
                "unresolved target".to_string(),
                "after close".to_string()
            ]
        );
    }

    #[test]
    fn repeated_names_close_the_innermost_run() {
        let tree = StepTree::from_events(&[start("loop"), start("loop"), complete("loop", None)]);
        let roots = tree.roots();
        assert_eq!(roots[0].status, StepStatus::Started);
        assert_eq!(roots[0].children[0].status, StepStatus::Completed);
        assert_eq!(roots[0].children[0].depth, 1);
        assert_eq!(tree.open_names(), vec!["loop"]);
    }

    #[test]
    fn empty_completion_content_is_not_recorded() {
        let tree = StepTree::from_events(&[start("a"), complete("a", Some(""))]);
        assert!(tree.roots()[0].parsed_contents.is_empty());
    }
}
