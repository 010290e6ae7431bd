//! Telemetry (spec §4.G): total wall-clock duration, per-node-type
//! aggregated durations and counts, and a total error count. Built from
//! history after the invocation ends; only constructed when requested.

use crate::history::ExecutionHistory;
use std::collections::HashMap;
use toolgraph_types::DurationMs;

/// Aggregated counters for one node type (`entry`, `transform`, `mcp`,
/// `switch`, `exit`).
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct NodeTypeTelemetry {
    /// Number of times a node of this type executed.
    pub count: u64,
    /// Summed duration across all executions of this type.
    pub total_duration: DurationMs,
}

/// Summary statistics for one completed (or failed) invocation.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct Telemetry {
    /// Summed duration across every history record.
    pub total_duration: DurationMs,
    /// Per-node-type counts and durations.
    pub per_node_type: HashMap<&'static str, NodeTypeTelemetry>,
    /// Number of history records whose `error` field is set.
    pub error_count: usize,
}

impl Telemetry {
    /// Builds telemetry from a completed (or partially completed, on
    /// failure) history.
    pub fn from_history(history: &ExecutionHistory) -> Self {
        let mut per_node_type: HashMap<&'static str, NodeTypeTelemetry> = HashMap::new();
        for record in history.records() {
            let entry = per_node_type.entry(record.node_type).or_default();
            entry.count += 1;
            entry.total_duration = entry.total_duration + record.duration;
        }

        Self { total_duration: history.total_duration(), per_node_type, error_count: history.error_count() }
    }
}
