//! Node Executors (spec §4.D): per-node-kind logic. Each function
//! computes `(output, next-node-id?)`; the scheduler is responsible for
//! measuring timing and appending the history record (see
//! [`crate::scheduler`]), which keeps "exactly one record per node" true
//! by construction rather than by executor discipline.

use crate::argument;
use serde_json::Value;
use std::rc::Rc;
use toolgraph_expr::{jsonata, jsonlogic, HistoryView};
use toolgraph_mcp::DownstreamClientManager;
use toolgraph_model::{GraphConfig, Node};
use toolgraph_types::{EngineError, ExpressionError, NodeId, SwitchUnmatched};

/// Output of one node executor: the recorded output plus the next node
/// id to advance to (`None` only for `exit`, which has no successor).
pub struct ExecutorOutput {
    /// The node's output, to be recorded in history.
    pub output: Value,
    /// Where the scheduler should advance to next.
    pub next: Option<NodeId>,
}

/// *entry*: output is the tool's input arguments, unchanged. `next` is
/// taken from the node.
pub fn execute_entry(node: &Node, input: &Value) -> Result<ExecutorOutput, EngineError> {
    let Node::Entry { next, .. } = node else { unreachable!("execute_entry called with non-entry node") };
    Ok(ExecutorOutput { output: input.clone(), next: Some(next.clone()) })
}

/// *transform*: output is the JSONata evaluation of the node's
/// expression against the live context.
pub fn execute_transform(
    node: &Node,
    context: &Value,
    history: Rc<dyn HistoryView>,
    current_index: u64,
) -> Result<ExecutorOutput, EngineError> {
    let Node::Transform { expr, next, .. } = node else {
        unreachable!("execute_transform called with non-transform node")
    };
    let output = jsonata::evaluate(node.id(), expr, context, history, current_index)?;
    Ok(ExecutorOutput { output, next: Some(next.clone()) })
}

/// *mcp-call*: lowers `args` through the Argument Evaluator, forwards
/// `(server, tool, lowered-args)` to the Downstream-Client Manager, and
/// returns its unwrapped response. `next` is fixed.
pub async fn execute_mcp_call(
    node: &Node,
    context: &Value,
    history: Rc<dyn HistoryView>,
    current_index: u64,
    config: &GraphConfig,
    manager: &DownstreamClientManager,
) -> Result<ExecutorOutput, EngineError> {
    let Node::McpCall { server, tool, args, next, .. } = node else {
        unreachable!("execute_mcp_call called with non-mcp node")
    };

    let lowered = argument::lower(node.id(), args, context, history, current_index)?;

    let entry = config.mcp_servers.get(server.as_str()).ok_or_else(|| {
        EngineError::from(ExpressionError {
            node: node.id().clone(),
            message: format!("downstream server `{server}` is not configured"),
        })
    })?;

    let result = manager.call(server, &entry.transport, tool.as_str(), lowered).await.map_err(|e| match e {
        toolgraph_mcp::DownstreamError::Protocol(p) => EngineError::from(p),
        toolgraph_mcp::DownstreamError::Tool(t) => EngineError::from(t),
    })?;

    Ok(ExecutorOutput { output: result, next: Some(next.clone()) })
}

/// *switch*: walks the arms in order; the first arm with a truthy rule
/// wins, a default arm (no rule) wins immediately when encountered, and
/// the node's `next` is used as a fallback if no arm matches. The
/// switch's output is the chosen successor's id, per spec §4.D.
pub fn execute_switch(
    node: &Node,
    context: &Value,
    history: Rc<dyn HistoryView>,
    current_index: u64,
) -> Result<ExecutorOutput, EngineError> {
    let Node::Switch { conditions, next, .. } = node else {
        unreachable!("execute_switch called with non-switch node")
    };

    for arm in conditions {
        let matched = match &arm.rule {
            None => true,
            Some(rule) => jsonlogic::evaluate(node.id(), rule, context, Rc::clone(&history), current_index)?,
        };
        if matched {
            return Ok(ExecutorOutput { output: Value::String(arm.target.to_string()), next: Some(arm.target.clone()) });
        }
    }

    match next {
        Some(fallback) => Ok(ExecutorOutput { output: Value::String(fallback.to_string()), next: Some(fallback.clone()) }),
        None => Err(SwitchUnmatched { node: node.id().clone() }.into()),
    }
}

/// *exit*: output is the most-recently-recorded node's output, or the
/// empty object if there is no such record yet (a misconfiguration
/// path). A node that legitimately produced a JSON `null` output is
/// distinct from "no record" and is passed through unchanged.
pub fn execute_exit(most_recent_output: Option<Value>) -> ExecutorOutput {
    ExecutorOutput { output: most_recent_output.unwrap_or_else(|| Value::Object(Default::default())), next: None }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use toolgraph_model::SwitchArm;

    struct EmptyHistory;
    impl HistoryView for EmptyHistory {
        fn previous_output(&self, _i: u64, _o: u64) -> Option<Value> {
            None
        }
        fn execution_count(&self, _n: &str) -> u64 {
            0
        }
        fn nth_execution(&self, _n: &str, _i: i64) -> Option<Value> {
            None
        }
        fn all_executions(&self, _n: &str) -> Vec<Value> {
            Vec::new()
        }
    }

    fn no_history() -> Rc<dyn HistoryView> {
        Rc::new(EmptyHistory)
    }

    #[test]
    fn entry_passes_through_input_unchanged() {
        let node = Node::Entry { id: "entry".into(), next: "exit".into() };
        let input = json!({"directory": "./tests"});
        let result = execute_entry(&node, &input).unwrap();
        assert_eq!(result.output, input);
        assert_eq!(result.next.unwrap().as_str(), "exit");
    }

    #[test]
    fn transform_evaluates_expression_against_context() {
        let node = Node::Transform { id: "t".into(), expr: "entry.value * 2".into(), next: "exit".into() };
        let ctx = json!({"entry": {"value": 21}});
        let result = execute_transform(&node, &ctx, no_history(), 1).unwrap();
        assert_eq!(result.output, json!(42));
    }

    #[test]
    fn switch_picks_first_truthy_arm_not_a_later_one() {
        let node = Node::Switch {
            id: "sw".into(),
            conditions: vec![
                SwitchArm { rule: Some(json!({">": [{"var": "value"}, 10]})), target: "high".into() },
                SwitchArm { rule: Some(json!({">": [{"var": "value"}, 0]})), target: "low".into() },
                SwitchArm { rule: None, target: "zero".into() },
            ],
            next: None,
        };
        let ctx = json!({"value": 15});
        let result = execute_switch(&node, &ctx, no_history(), 1).unwrap();
        assert_eq!(result.next.unwrap().as_str(), "high");
    }

    #[test]
    fn switch_falls_through_to_default_arm() {
        let node = Node::Switch {
            id: "sw".into(),
            conditions: vec![
                SwitchArm { rule: Some(json!({">": [{"var": "value"}, 10]})), target: "high".into() },
                SwitchArm { rule: None, target: "zero".into() },
            ],
            next: None,
        };
        let ctx = json!({"value": -5});
        let result = execute_switch(&node, &ctx, no_history(), 1).unwrap();
        assert_eq!(result.next.unwrap().as_str(), "zero");
    }

    #[test]
    fn switch_uses_top_level_next_as_fallback() {
        let node = Node::Switch {
            id: "sw".into(),
            conditions: vec![SwitchArm { rule: Some(json!(false)), target: "high".into() }],
            next: Some("fallback".into()),
        };
        let ctx = json!({});
        let result = execute_switch(&node, &ctx, no_history(), 1).unwrap();
        assert_eq!(result.next.unwrap().as_str(), "fallback");
    }

    #[test]
    fn switch_with_no_match_and_no_fallback_fails() {
        let node = Node::Switch {
            id: "sw".into(),
            conditions: vec![SwitchArm { rule: Some(json!(false)), target: "high".into() }],
            next: None,
        };
        let ctx = json!({});
        let err = execute_switch(&node, &ctx, no_history(), 1).unwrap_err();
        assert!(matches!(err, EngineError::SwitchUnmatched(_)));
    }

    #[test]
    fn exit_uses_most_recent_output() {
        let result = execute_exit(Some(json!({"count": 3})));
        assert_eq!(result.output, json!({"count": 3}));
        assert!(result.next.is_none());
    }

    #[test]
    fn exit_falls_back_to_empty_object_when_history_was_empty() {
        let result = execute_exit(None);
        assert_eq!(result.output, json!({}));
    }

    #[test]
    fn exit_passes_through_a_legitimate_null_output_unchanged() {
        let result = execute_exit(Some(Value::Null));
        assert_eq!(result.output, Value::Null);
    }
}
