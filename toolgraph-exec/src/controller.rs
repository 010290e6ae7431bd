//! The Controller half of Scheduler & Controller (spec §4.G): the
//! breakpoint/pause/step/stop state machine. Shared between the task
//! running the scheduler loop and whatever task the embedding host calls
//! `pause`/`resume`/`step`/`stop` from, so (unlike the rest of this
//! crate, which leans on `Rc` per spec §5's single-logical-thread model)
//! this one type is `Send + Sync`.

use std::collections::HashSet;
use std::sync::Mutex;
use toolgraph_types::NodeId;
use tokio::sync::Notify;
use uuid::Uuid;

/// The controller's externally-visible state, per spec §4.G's machine:
/// `not-started → running → paused ⇄ running → finished | error | stopped`.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ControllerStatus {
    /// No node has executed yet.
    NotStarted,
    /// The scheduler is actively executing nodes.
    Running,
    /// Suspended at a node boundary, awaiting `resume()` or `stop()`.
    Paused,
    /// Reached the exit node successfully.
    Finished,
    /// A node executor or limit check failed.
    Error,
    /// `stop()` was observed.
    Stopped,
}

/// An invalid call against the controller's current state — e.g.
/// `resume()` while not paused.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid controller transition: {action} is not valid while {status:?}")]
pub struct InvalidTransition {
    /// The action that was rejected (`"pause"`, `"resume"`, `"step"`, `"stop"`).
    pub action: &'static str,
    /// The status it was rejected in.
    pub status: ControllerStatus,
}

struct Inner {
    status: ControllerStatus,
    pause_requested: bool,
    step_after_resume: bool,
    stop_requested: bool,
    current_node: Option<NodeId>,
    breakpoints: HashSet<String>,
}

/// Shared pause/resume/step/stop state for one tool invocation.
pub struct Controller {
    invocation_id: Uuid,
    inner: Mutex<Inner>,
    notify: Notify,
}

impl Controller {
    /// Creates a controller with a fixed breakpoint set. `start_paused`
    /// is equivalent to pre-setting a pause request (spec §4.G): the
    /// first breakpoint check fires at the entry node.
    ///
    /// Generates a fresh `invocation_id`, threaded through the scheduler's
    /// tracing spans so concurrent invocations (spec §5) are distinguishable
    /// in logs (`SPEC_FULL.md` §4).
    pub fn new(breakpoints: impl IntoIterator<Item = NodeId>, start_paused: bool) -> Self {
        Self {
            invocation_id: Uuid::new_v4(),
            inner: Mutex::new(Inner {
                status: ControllerStatus::NotStarted,
                pause_requested: start_paused,
                step_after_resume: false,
                stop_requested: false,
                current_node: None,
                breakpoints: breakpoints.into_iter().map(|n| n.to_string()).collect(),
            }),
            notify: Notify::new(),
        }
    }

    /// This invocation's identifier, for log correlation across
    /// concurrent invocations.
    pub fn invocation_id(&self) -> Uuid {
        self.invocation_id
    }

    /// Current status.
    pub fn status(&self) -> ControllerStatus {
        self.inner.lock().unwrap().status
    }

    /// The node id the scheduler is currently at or paused on, if any.
    pub fn current_node(&self) -> Option<NodeId> {
        self.inner.lock().unwrap().current_node.clone()
    }

    /// Requests a pause at the next node boundary. Valid only while `Running`.
    pub fn pause(&self) -> Result<(), InvalidTransition> {
        let mut inner = self.inner.lock().unwrap();
        if inner.status != ControllerStatus::Running {
            return Err(InvalidTransition { action: "pause", status: inner.status });
        }
        inner.pause_requested = true;
        Ok(())
    }

    /// Wakes a paused scheduler. Valid only while `Paused`.
    pub fn resume(&self) -> Result<(), InvalidTransition> {
        let mut inner = self.inner.lock().unwrap();
        if inner.status != ControllerStatus::Paused {
            return Err(InvalidTransition { action: "resume", status: inner.status });
        }
        inner.status = ControllerStatus::Running;
        drop(inner);
        self.notify.notify_waiters();
        Ok(())
    }

    /// Resumes, then pauses again after exactly one more node executes.
    /// Valid only while `Paused`.
    pub fn step(&self) -> Result<(), InvalidTransition> {
        let mut inner = self.inner.lock().unwrap();
        if inner.status != ControllerStatus::Paused {
            return Err(InvalidTransition { action: "step", status: inner.status });
        }
        inner.status = ControllerStatus::Running;
        inner.step_after_resume = true;
        drop(inner);
        self.notify.notify_waiters();
        Ok(())
    }

    /// Stops the invocation. Valid while `Running` or `Paused`; wakes a
    /// paused scheduler immediately so it observes the stop.
    pub fn stop(&self) -> Result<(), InvalidTransition> {
        let mut inner = self.inner.lock().unwrap();
        if !matches!(inner.status, ControllerStatus::Running | ControllerStatus::Paused) {
            return Err(InvalidTransition { action: "stop", status: inner.status });
        }
        inner.stop_requested = true;
        inner.status = ControllerStatus::Stopped;
        drop(inner);
        self.notify.notify_waiters();
        Ok(())
    }

    /// Whether `stop()` has been observed — checked by the scheduler at
    /// every node boundary and before/after downstream calls (spec §5).
    pub fn stop_requested(&self) -> bool {
        self.inner.lock().unwrap().stop_requested
    }

    pub(crate) fn begin(&self, first_node: &NodeId) {
        let mut inner = self.inner.lock().unwrap();
        inner.status = ControllerStatus::Running;
        inner.current_node = Some(first_node.clone());
    }

    pub(crate) fn enter_node(&self, node: &NodeId) {
        self.inner.lock().unwrap().current_node = Some(node.clone());
    }

    /// Whether the scheduler should pause before executing `node`: the
    /// node is a breakpoint, or a pause was requested (by `pause()`,
    /// `start_paused`, or a hook returning false from `onNodeStart`).
    pub(crate) fn should_pause_before(&self, node: &NodeId) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.breakpoints.contains(node.as_str()) || inner.pause_requested
    }

    pub(crate) fn request_pause(&self) {
        self.inner.lock().unwrap().pause_requested = true;
    }

    /// Suspends the caller until `resume()` or `stop()` wakes it.
    /// Transitions to `Paused` before waiting and returns whether a stop
    /// was observed while suspended.
    pub(crate) async fn await_resume(&self) -> bool {
        loop {
            // `notified()` must be created before the lock is released, so
            // a `resume()`/`stop()` racing in right after we set `Paused`
            // still wakes this future once polled (tokio::sync::Notify
            // captures notify_waiters() state at creation, not at poll time).
            let notified = self.notify.notified();
            {
                let mut inner = self.inner.lock().unwrap();
                if inner.stop_requested {
                    return true;
                }
                inner.status = ControllerStatus::Paused;
                inner.pause_requested = false;
            }
            notified.await;
            let inner = self.inner.lock().unwrap();
            if inner.stop_requested {
                return true;
            }
            if inner.status == ControllerStatus::Running {
                return false;
            }
        }
    }

    /// Marks step-completion: if a `step()` is pending, arms a pause
    /// request for the *next* boundary (spec §4.G step 7).
    pub(crate) fn mark_step_complete(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.step_after_resume {
            inner.step_after_resume = false;
            inner.pause_requested = true;
        }
    }

    pub(crate) fn finish(&self, status: ControllerStatus) {
        self.inner.lock().unwrap().status = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pause_is_rejected_before_running() {
        let controller = Controller::new([], false);
        assert!(controller.pause().is_err());
    }

    #[test]
    fn each_controller_gets_a_distinct_invocation_id() {
        let a = Controller::new([], false);
        let b = Controller::new([], false);
        assert_ne!(a.invocation_id(), b.invocation_id());
    }

    #[test]
    fn resume_is_rejected_while_running() {
        let controller = Controller::new([], false);
        controller.begin(&NodeId::from("entry"));
        assert!(controller.resume().is_err());
    }

    #[test]
    fn stop_is_valid_from_running_and_sets_status_immediately() {
        let controller = Controller::new([], false);
        controller.begin(&NodeId::from("entry"));
        controller.stop().unwrap();
        assert_eq!(controller.status(), ControllerStatus::Stopped);
        assert!(controller.stop_requested());
    }

    #[test]
    fn start_paused_arms_a_pause_request_for_the_entry_node() {
        let controller = Controller::new([], true);
        controller.begin(&NodeId::from("entry"));
        assert!(controller.should_pause_before(&NodeId::from("entry")));
    }

    #[test]
    fn breakpoint_set_triggers_pause_regardless_of_pause_flag() {
        let controller = Controller::new([NodeId::from("switch_node")], false);
        controller.begin(&NodeId::from("entry"));
        assert!(!controller.should_pause_before(&NodeId::from("entry")));
        assert!(controller.should_pause_before(&NodeId::from("switch_node")));
    }

    #[tokio::test]
    async fn resume_wakes_a_waiting_scheduler() {
        let controller = std::sync::Arc::new(Controller::new([], false));
        controller.begin(&NodeId::from("entry"));

        let waiter = std::sync::Arc::clone(&controller);
        let handle = tokio::spawn(async move { waiter.await_resume().await });

        tokio::task::yield_now().await;
        controller.resume().unwrap();

        let stopped = handle.await.unwrap();
        assert!(!stopped);
    }

    #[tokio::test]
    async fn stop_wakes_a_waiting_scheduler() {
        let controller = std::sync::Arc::new(Controller::new([], false));
        controller.begin(&NodeId::from("entry"));

        let waiter = std::sync::Arc::clone(&controller);
        let handle = tokio::spawn(async move { waiter.await_resume().await });

        tokio::task::yield_now().await;
        controller.stop().unwrap();

        let stopped = handle.await.unwrap();
        assert!(stopped);
    }
}
