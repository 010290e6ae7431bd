//! The Scheduler (spec §4.G): the main loop that walks one tool's graph
//! from entry to exit, enforcing limits, honoring breakpoints/pause/step
//! /stop, dispatching hooks, and building telemetry.

use crate::controller::{Controller, ControllerStatus};
use crate::executors::{self, ExecutorOutput};
use crate::history::{self, ExecutionHistory, HistoryRecord};
use crate::hooks::SchedulerHooks;
use crate::telemetry::Telemetry;
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;
use toolgraph_expr::HistoryView;
use toolgraph_mcp::DownstreamClientManager;
use toolgraph_model::{Graph, GraphConfig, Node};
use toolgraph_types::{Cancelled, DurationMs, EngineError, LimitExceeded, LimitKind, NodeId};
use tracing::{debug, info, warn};

/// The result of one completed invocation.
pub struct ExecutionOutcome {
    /// The exit node's output.
    pub result: Value,
    /// The full history, in execution order.
    pub history: Vec<HistoryRecord>,
    /// Aggregated counters, present only when telemetry was requested.
    pub telemetry: Option<Telemetry>,
}

/// A failed invocation. Carries the history accumulated up to and
/// including the failing node, so callers can inspect it post-mortem
/// (spec §8: a node-count limit breach at limit 10 must report a history
/// of exactly 10 records, not an opaque error with no trace).
pub struct ExecutionFailure {
    /// The error that ended the invocation.
    pub error: EngineError,
    /// History recorded before (and, for a failed node executor, the
    /// synthetic failure record for) the failure.
    pub history: Vec<HistoryRecord>,
    /// Aggregated counters over the partial history, when requested.
    pub telemetry: Option<Telemetry>,
}

/// Walks `graph` from its entry node to its exit node, starting with
/// `input` as the entry's output.
///
/// `controller` must have been constructed for this invocation (fresh
/// breakpoints/start-paused state); it is mutated in place as execution
/// proceeds and is the caller's handle for `pause`/`resume`/`step`/`stop`.
pub async fn run(
    graph: &Graph<'_>,
    config: &GraphConfig,
    manager: &DownstreamClientManager,
    controller: &Controller,
    hooks: &mut dyn SchedulerHooks,
    input: Value,
    enable_telemetry: bool,
) -> Result<ExecutionOutcome, ExecutionFailure> {
    let limits = config.execution_limits;
    let start_time_ms = history::now_ms();
    let history = Rc::new(RefCell::new(ExecutionHistory::new()));

    let entry = graph.entries().into_iter().next().expect("validated graph has exactly one entry");
    let mut current = entry.id().clone();
    let mut raw_input = Some(input);
    controller.begin(&current);
    let invocation_id = controller.invocation_id();
    info!(%invocation_id, tool = graph.tool_name(), "starting invocation");

    loop {
        let hist_len = history.borrow().len() as u64;
        if hist_len >= limits.max_node_executions {
            let err: EngineError =
                LimitExceeded { kind: LimitKind::NodeCount, limit: limits.max_node_executions, current: hist_len }.into();
            return finish_with_error(controller, hooks, &current, err, &history, enable_telemetry).await;
        }

        let elapsed = history::now_ms().saturating_sub(start_time_ms);
        if elapsed >= limits.max_execution_time_ms {
            let err: EngineError =
                LimitExceeded { kind: LimitKind::Time, limit: limits.max_execution_time_ms, current: elapsed }.into();
            return finish_with_error(controller, hooks, &current, err, &history, enable_telemetry).await;
        }

        if controller.stop_requested() {
            return finish_with_error(controller, hooks, &current, Cancelled.into(), &history, enable_telemetry).await;
        }

        controller.enter_node(&current);
        if controller.should_pause_before(&current) {
            if let Some(stopped) = pause_and_await(controller, hooks, &current).await {
                return finish_with_error(controller, hooks, &current, stopped, &history, enable_telemetry).await;
            }
        }

        let idx = history.borrow().next_index();
        let context_before = history.borrow().live_context(idx);

        if !hooks.on_node_start(&current, &context_before).await {
            controller.request_pause();
            if let Some(stopped) = pause_and_await(controller, hooks, &current).await {
                return finish_with_error(controller, hooks, &current, stopped, &history, enable_telemetry).await;
            }
        }

        if controller.stop_requested() {
            return finish_with_error(controller, hooks, &current, Cancelled.into(), &history, enable_telemetry).await;
        }

        let node = graph.node(current.as_str()).expect("validated graph: no dangling references");

        debug!(%invocation_id, node = current.as_str(), kind = node.kind(), "node start");
        let node_start_ms = history::now_ms();
        let exec_result =
            dispatch(node, &context_before, raw_input.take(), Rc::clone(&history), idx, config, manager).await;
        let node_end_ms = history::now_ms();
        let duration = DurationMs::from_millis(node_end_ms.saturating_sub(node_start_ms));

        match exec_result {
            Ok(ExecutorOutput { output, next }) => {
                history.borrow_mut().push(HistoryRecord {
                    execution_index: 0,
                    node_id: current.to_string(),
                    node_type: node.kind(),
                    start_time_ms: node_start_ms,
                    end_time_ms: node_end_ms,
                    duration,
                    output: Some(output.clone()),
                    error: None,
                });
                debug!(%invocation_id, node = current.as_str(), duration_ms = duration.as_millis(), "node complete");

                hooks.on_node_complete(&current, &context_before, &output, duration).await;
                controller.mark_step_complete();

                match next {
                    Some(next_id) => current = next_id,
                    None => {
                        controller.finish(ControllerStatus::Finished);
                        let history = Rc::try_unwrap(history)
                            .unwrap_or_else(|_| unreachable!("history is not shared past run()"))
                            .into_inner();
                        let telemetry = enable_telemetry.then(|| Telemetry::from_history(&history));
                        return Ok(ExecutionOutcome { result: output, history: history.records().to_vec(), telemetry });
                    }
                }
            }
            Err(error) => {
                warn!(%invocation_id, node = current.as_str(), error = %error, "node failed");
                history.borrow_mut().push(history::synthetic_failure_record(
                    current.as_str(),
                    node.kind(),
                    node_start_ms,
                    node_end_ms,
                    &error,
                ));
                return finish_with_error(controller, hooks, &current, error, &history, enable_telemetry).await;
            }
        }
    }
}

/// Fires `onPause`, suspends until resumed or stopped, and fires
/// `onResume` on a clean wake. Returns `Some(Cancelled error)` if a stop
/// was observed instead.
async fn pause_and_await(controller: &Controller, hooks: &mut dyn SchedulerHooks, node: &NodeId) -> Option<EngineError> {
    debug!(invocation_id = %controller.invocation_id(), node = node.as_str(), "pausing");
    hooks.on_pause(node).await;
    let stopped = controller.await_resume().await;
    if stopped {
        debug!(invocation_id = %controller.invocation_id(), node = node.as_str(), "stop observed while paused");
        return Some(Cancelled.into());
    }
    debug!(invocation_id = %controller.invocation_id(), node = node.as_str(), "resuming");
    hooks.on_resume(node).await;
    None
}

async fn finish_with_error(
    controller: &Controller,
    hooks: &mut dyn SchedulerHooks,
    node: &NodeId,
    error: EngineError,
    history: &Rc<RefCell<ExecutionHistory>>,
    enable_telemetry: bool,
) -> Result<ExecutionOutcome, ExecutionFailure> {
    hooks.on_node_error(node, &error).await;
    controller.finish(if error.is_cancellation() { ControllerStatus::Stopped } else { ControllerStatus::Error });
    let history = history.borrow();
    let telemetry = enable_telemetry.then(|| Telemetry::from_history(&history));
    Err(ExecutionFailure { error, history: history.records().to_vec(), telemetry })
}

async fn dispatch(
    node: &Node,
    context: &Value,
    raw_input: Option<Value>,
    history: Rc<RefCell<ExecutionHistory>>,
    idx: u64,
    config: &GraphConfig,
    manager: &DownstreamClientManager,
) -> Result<ExecutorOutput, EngineError> {
    match node {
        Node::Entry { .. } => {
            let input = raw_input.unwrap_or(Value::Null);
            executors::execute_entry(node, &input)
        }
        Node::Exit { .. } => Ok(executors::execute_exit(history.borrow().most_recent_output())),
        Node::Transform { .. } => {
            let view: Rc<dyn HistoryView> = Rc::new(HistorySnapshot(history));
            executors::execute_transform(node, context, view, idx)
        }
        Node::Switch { .. } => {
            let view: Rc<dyn HistoryView> = Rc::new(HistorySnapshot(history));
            executors::execute_switch(node, context, view, idx)
        }
        Node::McpCall { .. } => {
            let view: Rc<dyn HistoryView> = Rc::new(HistorySnapshot(history));
            executors::execute_mcp_call(node, context, view, idx, config, manager).await
        }
    }
}

/// A `HistoryView` over a shared, still-being-built history — lets
/// expression evaluation see every record appended so far without the
/// scheduler handing out a borrow that outlives the call.
struct HistorySnapshot(Rc<RefCell<ExecutionHistory>>);

impl HistoryView for HistorySnapshot {
    fn previous_output(&self, current_index: u64, offset: u64) -> Option<Value> {
        self.0.borrow().previous_output(current_index, offset)
    }

    fn execution_count(&self, name: &str) -> u64 {
        self.0.borrow().execution_count(name)
    }

    fn nth_execution(&self, name: &str, index: i64) -> Option<Value> {
        self.0.borrow().nth_execution(name, index)
    }

    fn all_executions(&self, name: &str) -> Vec<Value> {
        self.0.borrow().all_executions(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::NoopHooks;
    use serde_json::json;
    use toolgraph_model::{ExecutionLimits, ServerMetadata, SwitchArm, ToolDef};

    fn config_with(nodes: Vec<Node>, limits: ExecutionLimits) -> GraphConfig {
        GraphConfig {
            version: "1".into(),
            server: ServerMetadata { name: "s".into(), version: "1".into(), title: None, instructions: None },
            mcp_servers: Default::default(),
            execution_limits: limits,
            tools: vec![ToolDef {
                name: "t".into(),
                description: "d".into(),
                input_schema: json!({}),
                output_schema: json!({}),
                nodes,
            }],
        }
    }

    #[tokio::test]
    async fn runs_entry_transform_exit_and_returns_transform_output() {
        let config = config_with(
            vec![
                Node::Entry { id: "entry".into(), next: "double".into() },
                Node::Transform { id: "double".into(), expr: "entry.value * 2".into(), next: "exit".into() },
                Node::Exit { id: "exit".into() },
            ],
            ExecutionLimits::default(),
        );
        let graph = Graph::new(&config.tools[0]);
        let manager = DownstreamClientManager::new();
        let controller = Controller::new([], false);
        let mut hooks = NoopHooks;

        let outcome =
            run(&graph, &config, &manager, &controller, &mut hooks, json!({"value": 21}), false).await.unwrap();

        assert_eq!(outcome.result, json!(42));
        assert_eq!(outcome.history.len(), 3);
        assert_eq!(controller.status(), ControllerStatus::Finished);
    }

    #[tokio::test]
    async fn switch_picks_the_high_branch() {
        let config = config_with(
            vec![
                Node::Entry { id: "entry".into(), next: "sw".into() },
                Node::Switch {
                    id: "sw".into(),
                    conditions: vec![
                        SwitchArm { rule: Some(json!({">": [{"var": "entry.value"}, 10]})), target: "high".into() },
                        SwitchArm { rule: None, target: "low".into() },
                    ],
                    next: None,
                },
                Node::Transform { id: "high".into(), expr: "{\"result\": \"high\"}".into(), next: "exit".into() },
                Node::Transform { id: "low".into(), expr: "{\"result\": \"low\"}".into(), next: "exit".into() },
                Node::Exit { id: "exit".into() },
            ],
            ExecutionLimits::default(),
        );
        let graph = Graph::new(&config.tools[0]);
        let manager = DownstreamClientManager::new();
        let controller = Controller::new([], false);
        let mut hooks = NoopHooks;

        let outcome =
            run(&graph, &config, &manager, &controller, &mut hooks, json!({"value": 15}), false).await.unwrap();

        assert_eq!(outcome.result, json!({"result": "high"}));
    }

    #[tokio::test]
    async fn node_count_limit_breach_fails_with_exact_history_length() {
        let config = config_with(
            vec![
                Node::Entry { id: "entry".into(), next: "loop".into() },
                Node::Transform { id: "loop".into(), expr: "1".into(), next: "loop".into() },
                Node::Exit { id: "exit".into() },
            ],
            ExecutionLimits { max_node_executions: 10, max_execution_time_ms: 300_000 },
        );
        let graph = Graph::new(&config.tools[0]);
        let manager = DownstreamClientManager::new();
        let controller = Controller::new([], false);
        let mut hooks = NoopHooks;

        let failure = run(&graph, &config, &manager, &controller, &mut hooks, json!({}), false).await.unwrap_err();

        assert!(matches!(failure.error, EngineError::LimitExceeded(_)));
        assert_eq!(failure.history.len(), 10);
        assert_eq!(controller.status(), ControllerStatus::Error);
    }

    #[tokio::test]
    async fn stop_before_first_node_surfaces_as_cancelled() {
        let config = config_with(
            vec![Node::Entry { id: "entry".into(), next: "exit".into() }, Node::Exit { id: "exit".into() }],
            ExecutionLimits::default(),
        );
        let graph = Graph::new(&config.tools[0]);
        let manager = DownstreamClientManager::new();
        let controller = Controller::new([], false);
        controller.begin(&NodeId::from("entry"));
        controller.stop().unwrap();
        let mut hooks = NoopHooks;

        let failure = run(&graph, &config, &manager, &controller, &mut hooks, json!({}), false).await.unwrap_err();
        assert!(failure.error.is_cancellation());
    }
}
