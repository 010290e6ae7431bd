#![deny(missing_docs)]
//! The graph configuration data model, in-memory graph, and static
//! validator for the toolgraph execution engine (spec §3, §4.E).

pub mod graph;
pub mod types;
pub mod validator;

pub use graph::Graph;
pub use types::{
    ExecutionLimits, GraphConfig, Node, Provenance, ServerEntry, ServerMetadata, ServerTransport,
    SwitchArm, ToolDef,
};
pub use validator::validate;
