//! Static validation (spec §4.E): structural checks plus expression
//! syntax checks, aggregated rather than fail-fast so a caller sees every
//! problem in one pass. Pure — never talks to downstream clients.

use crate::graph::Graph;
use crate::types::{GraphConfig, Node};
use toolgraph_expr::{jsonata, jsonlogic};
use toolgraph_types::{GraphValidationError, ValidationIssue};

/// Validates every tool in a configuration and returns the aggregated
/// structural issues as a [`GraphValidationError`] (empty list on
/// success is represented by returning `Ok(())`).
///
/// Expression-syntax issues are folded into the same aggregated list per
/// spec §4.E ("expression syntax ... per §4.A"); callers that want to
/// distinguish schema/config-loading failures from structural+expression
/// ones should run their own schema check first and surface those as
/// [`toolgraph_types::ConfigurationError`] before calling this.
pub fn validate(config: &GraphConfig) -> Result<(), GraphValidationError> {
    let mut issues = Vec::new();

    for tool in &config.tools {
        issues.extend(validate_tool(tool, config));
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(GraphValidationError(issues))
    }
}

fn validate_tool(tool: &crate::types::ToolDef, config: &GraphConfig) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let graph = Graph::new(tool);

    let entries = graph.entries();
    if entries.len() != 1 {
        issues.push(ValidationIssue::EntryCount { tool: tool.name.clone(), count: entries.len() });
    }

    let exits = graph.exits();
    if exits.len() != 1 {
        issues.push(ValidationIssue::ExitCount { tool: tool.name.clone(), count: exits.len() });
    }

    for node in &tool.nodes {
        validate_node_references(&graph, node, tool, config, &mut issues);
        validate_node_expressions(node, tool, &mut issues);
    }

    if let (Some(entry), Some(exit)) = (entries.first(), exits.first()) {
        if !graph.exit_reachable_from_entry(entry.id().as_str(), exit.id().as_str()) {
            issues.push(ValidationIssue::ExitUnreachable { tool: tool.name.clone() });
        }
    }

    issues
}

fn validate_node_references(
    graph: &Graph<'_>,
    node: &Node,
    tool: &crate::types::ToolDef,
    config: &GraphConfig,
    issues: &mut Vec<ValidationIssue>,
) {
    let mut check_target = |target: &toolgraph_types::NodeId| {
        if graph.node(target.as_str()).is_none() {
            issues.push(ValidationIssue::DanglingReference {
                tool: tool.name.clone(),
                node: node.id().clone(),
                target: target.clone(),
            });
        }
    };

    match node {
        Node::Entry { next, .. } | Node::Transform { next, .. } | Node::McpCall { next, .. } => {
            check_target(next);
        }
        Node::Exit { .. } => {}
        Node::Switch { conditions, next, .. } => {
            for arm in conditions {
                check_target(&arm.target);
            }
            if let Some(fallback) = next {
                check_target(fallback);
            }
        }
    }

    if let Node::McpCall { server, .. } = node {
        if !config.mcp_servers.contains_key(server.as_str()) {
            issues.push(ValidationIssue::UnknownDownstreamServer {
                tool: tool.name.clone(),
                node: node.id().clone(),
                server: server.as_str().to_string(),
            });
        }
    }

    if let Node::Switch { conditions, next, .. } = node {
        let has_default_arm = conditions.iter().any(|arm| arm.is_default());
        if has_default_arm && next.is_some() {
            issues.push(ValidationIssue::AmbiguousSwitchDefault {
                tool: tool.name.clone(),
                node: node.id().clone(),
            });
        }

        let targets_exit = |id: &toolgraph_types::NodeId| {
            matches!(graph.node(id.as_str()), Some(Node::Exit { .. }))
        };
        let switch_targets_exit = conditions.iter().any(|arm| targets_exit(&arm.target))
            || next.as_ref().is_some_and(targets_exit);
        if switch_targets_exit {
            issues.push(ValidationIssue::SwitchTargetsExit {
                tool: tool.name.clone(),
                node: node.id().clone(),
            });
        }
    }
}

fn validate_node_expressions(node: &Node, tool: &crate::types::ToolDef, issues: &mut Vec<ValidationIssue>) {
    match node {
        Node::Transform { expr, .. } => {
            if let Err(message) = jsonata::check_syntax(expr) {
                issues.push(ValidationIssue::ExpressionSyntax {
                    tool: tool.name.clone(),
                    node: node.id().clone(),
                    message,
                });
            }
        }
        Node::Switch { conditions, .. } => {
            for arm in conditions {
                let Some(rule) = &arm.rule else { continue };
                if let Err(message) = jsonlogic::check_syntax(rule) {
                    issues.push(ValidationIssue::ExpressionSyntax {
                        tool: tool.name.clone(),
                        node: node.id().clone(),
                        message,
                    });
                }
            }
        }
        Node::McpCall { args, .. } => {
            if let Err(message) = check_arg_tree_expressions(args) {
                issues.push(ValidationIssue::ExpressionSyntax {
                    tool: tool.name.clone(),
                    node: node.id().clone(),
                    message,
                });
            }
        }
        Node::Entry { .. } | Node::Exit { .. } => {}
    }
}

/// Walks an `mcp-call` node's `args` tree and syntax-checks every
/// `{expr: "<string>"}` leaf as JSONata, without evaluating it.
fn check_arg_tree_expressions(value: &serde_json::Value) -> Result<(), String> {
    match value {
        serde_json::Value::Object(map) => {
            if let Some(expr_value) = map.get("expr") {
                if map.len() == 1 {
                    return match expr_value.as_str() {
                        Some(expr) => jsonata::check_syntax(expr),
                        None => Err("`expr` argument must be a string".to_string()),
                    };
                }
            }
            for v in map.values() {
                check_arg_tree_expressions(v)?;
            }
            Ok(())
        }
        serde_json::Value::Array(items) => {
            for item in items {
                check_arg_tree_expressions(item)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}
