#![deny(missing_docs)]
//! `toolgraph`: a host-embeddable engine for declarative tool-server
//! graphs (spec OVERVIEW). A host decodes a configuration document
//! (`host::load_yaml`, `Engine::from_yaml`), hands it to an [`Engine`],
//! and drives invocations through `execute_tool`/`execute_tool_definition`
//! while a [`toolgraph_exec::Controller`] gives it pause/resume/step/stop
//! over each running invocation.
//!
//! The umbrella re-exports the pieces a host typically needs so most
//! integrations only depend on this one crate; the sub-crates
//! (`toolgraph-types`, `toolgraph-model`, `toolgraph-expr`,
//! `toolgraph-mcp`, `toolgraph-exec`) remain usable standalone for
//! embedders that only need, say, the expression evaluator.

pub mod engine;
pub mod host;

pub use engine::{Engine, EngineDescription, EngineLoadError, ExecuteError, HostError, ToolDescriptor};

pub use toolgraph_exec::{
    Controller, ControllerStatus, ExecutionFailure, ExecutionHistory, ExecutionOutcome, HistoryRecord,
    InvalidTransition, NodeTypeTelemetry, NoopHooks, SchedulerHooks, Telemetry,
};
pub use toolgraph_mcp::{DownstreamClientManager, DownstreamError};
pub use toolgraph_model::{
    ExecutionLimits, Graph, GraphConfig, Node, Provenance, ServerEntry, ServerMetadata, ServerTransport,
    SwitchArm, ToolDef,
};
pub use toolgraph_types::{
    Cancelled, ConfigurationError, DownstreamProtocolError, DownstreamToolError, DurationMs, EngineError,
    GraphValidationError, LimitExceeded, LimitKind, NodeId, ServerName, ValidationIssue,
};
