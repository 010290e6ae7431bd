//! In-memory directed-graph representation of one tool (spec §4.E): node
//! lookup by id plus the adjacency function the scheduler and validator
//! both walk.

use crate::types::{Node, ToolDef};
use std::collections::HashMap;
use toolgraph_types::NodeId;

/// A tool's graph, indexed by node id for O(1) lookup during execution
/// and validation.
pub struct Graph<'a> {
    tool_name: &'a str,
    nodes: HashMap<&'a str, &'a Node>,
}

impl<'a> Graph<'a> {
    /// Builds a graph view over a tool's node list. Does not validate;
    /// duplicate ids simply shadow each other (the validator catches that
    /// indirectly via entry/exit counts and dangling references).
    pub fn new(tool: &'a ToolDef) -> Self {
        let nodes = tool.nodes.iter().map(|n| (n.id().as_str(), n)).collect();
        Self { tool_name: &tool.name, nodes }
    }

    /// The tool name this graph belongs to.
    pub fn tool_name(&self) -> &str {
        self.tool_name
    }

    /// Look up a node by id.
    pub fn node(&self, id: &str) -> Option<&'a Node> {
        self.nodes.get(id).copied()
    }

    /// All nodes of the `entry` kind (should be exactly one).
    pub fn entries(&self) -> Vec<&'a Node> {
        self.nodes.values().copied().filter(|n| matches!(n, Node::Entry { .. })).collect()
    }

    /// All nodes of the `exit` kind (should be exactly one).
    pub fn exits(&self) -> Vec<&'a Node> {
        self.nodes.values().copied().filter(|n| matches!(n, Node::Exit { .. })).collect()
    }

    /// Every node id this node can statically transition to: `next` for
    /// non-switch nodes, or the union of all arm targets and the fallback
    /// `next` for a switch. Exit nodes have none.
    pub fn successors(&self, node: &Node) -> Vec<NodeId> {
        match node {
            Node::Entry { next, .. } | Node::Transform { next, .. } | Node::McpCall { next, .. } => {
                vec![next.clone()]
            }
            Node::Exit { .. } => Vec::new(),
            Node::Switch { conditions, next, .. } => {
                let mut targets: Vec<NodeId> = conditions.iter().map(|arm| arm.target.clone()).collect();
                if let Some(fallback) = next {
                    targets.push(fallback.clone());
                }
                targets
            }
        }
    }

    /// Breadth-first reachability check: is `exit_id` reachable from
    /// `entry_id` over static edges?
    pub fn exit_reachable_from_entry(&self, entry_id: &str, exit_id: &str) -> bool {
        let mut visited = std::collections::HashSet::new();
        let mut queue = std::collections::VecDeque::new();
        queue.push_back(entry_id.to_string());
        visited.insert(entry_id.to_string());

        while let Some(current) = queue.pop_front() {
            if current == exit_id {
                return true;
            }
            let Some(node) = self.node(&current) else { continue };
            for succ in self.successors(node) {
                if visited.insert(succ.as_str().to_string()) {
                    queue.push_back(succ.as_str().to_string());
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SwitchArm;
    use serde_json::json;

    fn tool_with(nodes: Vec<Node>) -> ToolDef {
        ToolDef {
            name: "t".into(),
            description: "d".into(),
            input_schema: json!({}),
            output_schema: json!({}),
            nodes,
        }
    }

    #[test]
    fn finds_unique_entry_and_exit() {
        let tool = tool_with(vec![
            Node::Entry { id: "entry".into(), next: "exit".into() },
            Node::Exit { id: "exit".into() },
        ]);
        let graph = Graph::new(&tool);
        assert_eq!(graph.entries().len(), 1);
        assert_eq!(graph.exits().len(), 1);
    }

    #[test]
    fn exit_reachable_through_switch_arms() {
        let tool = tool_with(vec![
            Node::Entry { id: "entry".into(), next: "sw".into() },
            Node::Switch {
                id: "sw".into(),
                conditions: vec![
                    SwitchArm { rule: Some(json!({"==": [1, 1]})), target: "high".into() },
                    SwitchArm { rule: None, target: "low".into() },
                ],
                next: None,
            },
            Node::Transform { id: "high".into(), expr: "1".into(), next: "exit".into() },
            Node::Transform { id: "low".into(), expr: "0".into(), next: "exit".into() },
            Node::Exit { id: "exit".into() },
        ]);
        let graph = Graph::new(&tool);
        assert!(graph.exit_reachable_from_entry("entry", "exit"));
    }

    #[test]
    fn unreachable_exit_is_detected() {
        let tool = tool_with(vec![
            Node::Entry { id: "entry".into(), next: "dead_end".into() },
            Node::Transform { id: "dead_end".into(), expr: "1".into(), next: "dead_end".into() },
            Node::Exit { id: "exit".into() },
        ]);
        let graph = Graph::new(&tool);
        assert!(!graph.exit_reachable_from_entry("entry", "exit"));
    }
}
