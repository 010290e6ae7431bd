//! Scheduler lifecycle hooks (spec §4.G): five discrete callback points
//! rather than a single dispatch-by-point method, so the trait mirrors
//! that shape directly instead of a generic `on_event(point, ctx)`
//! design.

use async_trait::async_trait;
use serde_json::Value;
use toolgraph_types::{DurationMs, EngineError, NodeId};

/// Observes and, at `on_node_start`, can intervene in one invocation's
/// scheduler loop. All methods have no-op default bodies so a hook only
/// needs to override the points it cares about.
///
/// Not `Send`/`Sync`: hook callbacks run inline on the scheduler's single
/// logical thread for the invocation (spec §5), so there's no need to
/// pay for synchronization a hook implementation doesn't use.
#[async_trait(?Send)]
pub trait SchedulerHooks {
    /// Fires before a node executes. Returning `false` is treated as a
    /// pause request, handled by the same wait loop as a breakpoint.
    async fn on_node_start(&mut self, _node: &NodeId, _input_context: &Value) -> bool {
        true
    }

    /// Fires after a node completes successfully, with the context
    /// snapshot taken *before* execution, the output, and the measured
    /// duration.
    async fn on_node_complete(&mut self, _node: &NodeId, _input_context: &Value, _output: &Value, _duration: DurationMs) {}

    /// Fires when the scheduler suspends at a breakpoint or pause request.
    async fn on_pause(&mut self, _node: &NodeId) {}

    /// Fires when a paused invocation resumes.
    async fn on_resume(&mut self, _node: &NodeId) {}

    /// Fires when a node executor (or a limit check) fails.
    async fn on_node_error(&mut self, _node: &NodeId, _error: &EngineError) {}
}

/// A hook implementation that observes nothing — the default when a
/// caller of `executeTool` supplies no `hooks` option.
#[derive(Debug, Default)]
pub struct NoopHooks;

#[async_trait(?Send)]
impl SchedulerHooks for NoopHooks {}
