use super::tree::{StepNode, StepStatus};

/// A step placed in display order with its hierarchical number (`"2.1"`).
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct DisplayNode {
    pub display_number: String,
    pub name: String,
    pub tool_name: Option<String>,
    pub status: StepStatus,
    pub parsed_contents: Vec<String>,
    pub depth: usize,
    /// Number of direct children, which follow this node in the list.
    pub child_count: usize,
}

impl DisplayNode {
    fn from_step(node: &StepNode, display_number: String) -> Self {
        Self {
            display_number,
            name: node.name.clone(),
            tool_name: node.tool_name.clone(),
            status: node.status,
            parsed_contents: node.parsed_contents.clone(),
            depth: node.depth,
            child_count: node.children.len(),
        }
    }
}

/// Depth-first flatten of the root list.
///
/// Roots are numbered `1, 2, ...`; a child gets `<parent>.<ordinal>` with the
/// ordinal counted from 1 among its siblings.
pub fn flatten_for_display(roots: &[StepNode]) -> Vec<DisplayNode> {
    let mut out = Vec::new();
    push_numbered(roots, None, &mut out);
    out
}

fn push_numbered(nodes: &[StepNode], parent_number: Option<&str>, out: &mut Vec<DisplayNode>) {
    let mut child_ordinal = 0_usize;
    for (index, node) in nodes.iter().enumerate() {
        let display_number = match parent_number {
            Some(parent) => {
                child_ordinal += 1;
                format!("{parent}.{child_ordinal}")
            }
            None => (index + 1).to_string(),
        };
        let parent_of_children = display_number.clone();
        out.push(DisplayNode::from_step(node, display_number));
        push_numbered(&node.children, Some(&parent_of_children), out);
    }
}

/// Every step in one linear depth-first list, for a timeline view.
pub fn timeline(roots: &[StepNode]) -> Vec<&StepNode> {
    fn walk<'a>(nodes: &'a [StepNode], out: &mut Vec<&'a StepNode>) {
        for node in nodes {
            out.push(node);
            walk(&node.children, out);
        }
    }
    let mut out = Vec::new();
    walk(roots, &mut out);
    out
}

/// Lines to show for a step while it streams.
///
/// Blank lines are skipped and a line equal to the one before it is shown
/// once. The step's `parsed_contents` are left untouched.
pub fn streaming_lines(contents: &[String]) -> Vec<&str> {
    let mut lines: Vec<&str> = Vec::new();
    for line in contents.iter().flat_map(|content| content.lines()) {
        let line = line.trim_end();
        if line.trim().is_empty() || lines.last() == Some(&line) {
            continue;
        }
        lines.push(line);
    }
    lines
}
