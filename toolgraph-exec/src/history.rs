//! Execution History & Context (spec §4.B, §3): an append-only log of
//! node executions, the "live context" derived from it, and the
//! [`HistoryView`] implementation the Expression Evaluator uses for its
//! four history-access functions.

use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};
use toolgraph_expr::HistoryView;
use toolgraph_types::{DurationMs, EngineError};

/// One append-only record of a node's execution. `execution_index` is
/// assigned at insertion time and is the record's stable identity —
/// `record[i].execution_index == i` always holds (spec §8).
#[derive(Debug, Clone, serde::Serialize)]
pub struct HistoryRecord {
    /// Monotonic position of this record in the history.
    pub execution_index: u64,
    /// The node that produced this record.
    pub node_id: String,
    /// The node's kind (`entry`, `transform`, `mcp`, `switch`, `exit`).
    pub node_type: &'static str,
    /// Milliseconds since the Unix epoch when execution started.
    pub start_time_ms: u64,
    /// Milliseconds since the Unix epoch when execution finished.
    pub end_time_ms: u64,
    /// Measured wall-clock duration (`end_time - start_time`).
    pub duration: DurationMs,
    /// The node's output, if it succeeded.
    pub output: Option<Value>,
    /// A human-readable error description, if it failed.
    pub error: Option<String>,
}

impl HistoryRecord {
    /// Whether this record represents a successful execution.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch, used to
/// stamp history records and check the time limit.
pub fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

/// The append-only log for one invocation. Not `Clone`; owned by the
/// scheduler loop for the lifetime of one `executeTool` call.
#[derive(Default)]
pub struct ExecutionHistory {
    records: Vec<HistoryRecord>,
}

impl ExecutionHistory {
    /// An empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records appended so far.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no records have been appended yet.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The execution-index the next appended record will receive.
    pub fn next_index(&self) -> u64 {
        self.records.len() as u64
    }

    /// Appends a record, assigning it `next_index()` as its
    /// `execution_index`. Enforces history's append-only/contiguous
    /// invariant by construction — callers never choose the index.
    pub fn push(&mut self, mut record: HistoryRecord) {
        record.execution_index = self.next_index();
        self.records.push(record);
    }

    /// All records appended so far, in execution order.
    pub fn records(&self) -> &[HistoryRecord] {
        &self.records
    }

    /// The live context visible to the node about to execute at
    /// `execution_index`: for each distinct node id among
    /// `records[0..execution_index]`, the most-recent successful output,
    /// keyed by that node id (spec §3).
    pub fn live_context(&self, execution_index: u64) -> Value {
        reconstruct_context(&self.records[..execution_index.min(self.records.len() as u64) as usize])
    }

    /// The output most recently recorded, or `None` if history is empty
    /// or the last record carries no output (an errored record) — used by
    /// the exit executor (spec §4.D) to distinguish "nothing ran yet"
    /// from a node that legitimately produced a JSON `null` output.
    pub fn most_recent_output(&self) -> Option<Value> {
        self.records.last().and_then(|r| r.output.clone())
    }

    /// Total duration summed across every record, for telemetry.
    pub fn total_duration(&self) -> DurationMs {
        self.records.iter().fold(DurationMs::ZERO, |acc, r| acc + r.duration)
    }

    /// Number of records whose `error` field is set, for telemetry.
    pub fn error_count(&self) -> usize {
        self.records.iter().filter(|r| !r.is_success()).count()
    }
}

fn reconstruct_context(records: &[HistoryRecord]) -> Value {
    let mut context = serde_json::Map::new();
    for record in records {
        if let Some(output) = &record.output {
            context.insert(record.node_id.clone(), output.clone());
        }
    }
    Value::Object(context)
}

impl HistoryView for ExecutionHistory {
    fn previous_output(&self, current_index: u64, offset: u64) -> Option<Value> {
        let idx = current_index.checked_sub(offset)?;
        self.records.get(idx as usize).and_then(|r| r.output.clone())
    }

    fn execution_count(&self, name: &str) -> u64 {
        self.records.iter().filter(|r| r.node_id == name).count() as u64
    }

    fn nth_execution(&self, name: &str, index: i64) -> Option<Value> {
        let outputs: Vec<&Value> =
            self.records.iter().filter(|r| r.node_id == name).filter_map(|r| r.output.as_ref()).collect();
        let len = outputs.len() as i64;
        let idx = if index < 0 { len + index } else { index };
        if idx < 0 || idx >= len {
            return None;
        }
        Some(outputs[idx as usize].clone())
    }

    fn all_executions(&self, name: &str) -> Vec<Value> {
        self.records.iter().filter(|r| r.node_id == name).filter_map(|r| r.output.clone()).collect()
    }
}

/// Builds a synthetic failure record for the scheduler to append when a
/// node executor fails without recording its own history entry (spec
/// §4.D: "on failure ... leave history empty for the scheduler to
/// synthesize").
pub fn synthetic_failure_record(
    node_id: &str,
    node_type: &'static str,
    start_time_ms: u64,
    end_time_ms: u64,
    error: &EngineError,
) -> HistoryRecord {
    HistoryRecord {
        execution_index: 0, // overwritten by `ExecutionHistory::push`
        node_id: node_id.to_string(),
        node_type,
        start_time_ms,
        end_time_ms,
        duration: DurationMs::from_millis(end_time_ms.saturating_sub(start_time_ms)),
        output: None,
        error: Some(error.to_string()),
    }
}
