#![deny(missing_docs)]
//! Shared types for the toolgraph execution engine.
//!
//! This crate has no knowledge of graphs, expressions, or downstream
//! transports — it only defines the typed ids ([`id`]) and the error
//! taxonomy ([`error`]) that every other crate in the workspace builds on.

pub mod duration;
pub mod error;
pub mod id;

pub use duration::DurationMs;
pub use error::{
    ArgumentEvaluationError, Cancelled, ConfigurationError, DownstreamProtocolError,
    DownstreamToolError, EngineError, ExpressionError, GraphValidationError, LimitExceeded,
    LimitKind, StderrSnapshot, SwitchUnmatched, ValidationIssue,
};
pub use id::{NodeId, ServerName, ToolName};
