//! The read-only view of execution history that the JSONata-like engine
//! exposes to expressions as four bound functions.
//!
//! This crate doesn't own history — `toolgraph-exec` does — so it only
//! defines the narrow trait an evaluation call needs. `toolgraph-exec`'s
//! history log implements it; this crate never constructs one itself
//! outside of tests.

use serde_json::Value;

/// A read-only slice of execution history, as seen from one evaluation.
///
/// Implementations expose outputs by node id and execution order only;
/// they never expose errors or timing, which expressions can't observe.
pub trait HistoryView {
    /// Output recorded `offset` steps before `current_index` (0-based),
    /// across the whole history regardless of node id. `offset` of 1 means
    /// "the immediately preceding record". `None` if out of range.
    fn previous_output(&self, current_index: u64, offset: u64) -> Option<Value>;

    /// Number of history records whose node id equals `name`.
    fn execution_count(&self, name: &str) -> u64;

    /// Output of the `index`-th execution of node `name`. Negative indices
    /// count from the end (`-1` is the most recent). `None` if out of range.
    fn nth_execution(&self, name: &str, index: i64) -> Option<Value>;

    /// All outputs recorded for node `name`, in execution order.
    fn all_executions(&self, name: &str) -> Vec<Value>;
}

/// An empty history, useful for evaluating expressions with no execution
/// context yet (e.g. during static validation).
pub struct NoHistory;

impl HistoryView for NoHistory {
    fn previous_output(&self, _current_index: u64, _offset: u64) -> Option<Value> {
        None
    }

    fn execution_count(&self, _name: &str) -> u64 {
        0
    }

    fn nth_execution(&self, _name: &str, _index: i64) -> Option<Value> {
        None
    }

    fn all_executions(&self, _name: &str) -> Vec<Value> {
        Vec::new()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::HistoryView;
    use serde_json::Value;

    /// An in-memory [`HistoryView`] fixture, keyed by node id, for unit
    /// tests in this crate that need history functions without pulling in
    /// `toolgraph-exec`.
    #[derive(Default)]
    pub struct FakeHistory {
        records: Vec<(String, Value)>,
    }

    impl FakeHistory {
        pub fn push(&mut self, node: &str, output: Value) {
            self.records.push((node.to_string(), output));
        }

        fn by_node(&self, name: &str) -> Vec<&Value> {
            self.records
                .iter()
                .filter(|(n, _)| n == name)
                .map(|(_, v)| v)
                .collect()
        }
    }

    impl HistoryView for FakeHistory {
        fn previous_output(&self, current_index: u64, offset: u64) -> Option<Value> {
            let idx = current_index.checked_sub(offset)?;
            self.records.get(idx as usize).map(|(_, v)| v.clone())
        }

        fn execution_count(&self, name: &str) -> u64 {
            self.by_node(name).len() as u64
        }

        fn nth_execution(&self, name: &str, index: i64) -> Option<Value> {
            let outputs = self.by_node(name);
            let len = outputs.len() as i64;
            let idx = if index < 0 { len + index } else { index };
            if idx < 0 || idx >= len {
                return None;
            }
            Some(outputs[idx as usize].clone())
        }

        fn all_executions(&self, name: &str) -> Vec<Value> {
            self.by_node(name).into_iter().cloned().collect()
        }
    }
}
