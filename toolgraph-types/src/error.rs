//! The error taxonomy shared by every crate in the workspace.
//!
//! Every variant here is one of the nine kinds the engine's callers need
//! to discriminate on. Centralizing them here, rather than letting each
//! crate define its own narrow error and wrap at the boundary, keeps the
//! taxonomy discriminable by variant instead of by string-sniffing.

use crate::id::NodeId;
use thiserror::Error;

/// One problem found while statically validating a tool's graph —
/// structural or expression-syntax. [`ConfigurationError`] and
/// [`GraphValidationError`] each carry a filtered view of these.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub enum ValidationIssue {
    /// The configuration loader rejected the document (schema-shaped checks
    /// performed by the engine's collaborator, surfaced here for tools that
    /// hand the engine pre-parsed-but-unchecked configuration).
    SchemaInvalid {
        /// Human-readable description of the schema problem.
        message: String,
    },
    /// A JSONata-like or JSON-Logic-like expression failed to parse.
    ExpressionSyntax {
        /// Tool the offending expression belongs to.
        tool: String,
        /// Node carrying the offending expression.
        node: NodeId,
        /// Parser error message.
        message: String,
    },
    /// A tool defines more than one entry node, or none.
    EntryCount {
        /// Tool name.
        tool: String,
        /// Number of entry nodes found.
        count: usize,
    },
    /// A tool defines more than one exit node, or none.
    ExitCount {
        /// Tool name.
        tool: String,
        /// Number of exit nodes found.
        count: usize,
    },
    /// A `next`, switch arm target, or switch default names an undefined node.
    DanglingReference {
        /// Tool name.
        tool: String,
        /// Node that holds the dangling reference.
        node: NodeId,
        /// The undefined node id it points at.
        target: NodeId,
    },
    /// An `mcp-call` node's `server` field names a downstream server that
    /// isn't in the configuration's server table.
    UnknownDownstreamServer {
        /// Tool name.
        tool: String,
        /// Node making the reference.
        node: NodeId,
        /// The undefined server name.
        server: String,
    },
    /// Breadth-first closure from entry never reaches exit.
    ExitUnreachable {
        /// Tool name.
        tool: String,
    },
    /// A switch node supplies both a rule-less arm and a top-level `next`.
    AmbiguousSwitchDefault {
        /// Tool name.
        tool: String,
        /// The switch node.
        node: NodeId,
    },
    /// A switch node names `exit` (directly, as an arm target, or as its
    /// `next` fallback) — forbidden because the exit node's output would
    /// become the switch's chosen-successor-id, not a real result.
    SwitchTargetsExit {
        /// Tool name.
        tool: String,
        /// The switch node.
        node: NodeId,
    },
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SchemaInvalid { message } => write!(f, "schema invalid: {message}"),
            Self::ExpressionSyntax { tool, node, message } => {
                write!(f, "{tool}/{node}: expression syntax error: {message}")
            }
            Self::EntryCount { tool, count } => {
                write!(f, "{tool}: expected exactly one entry node, found {count}")
            }
            Self::ExitCount { tool, count } => {
                write!(f, "{tool}: expected exactly one exit node, found {count}")
            }
            Self::DanglingReference { tool, node, target } => {
                write!(f, "{tool}/{node}: references undefined node {target}")
            }
            Self::UnknownDownstreamServer { tool, node, server } => {
                write!(f, "{tool}/{node}: references undefined downstream server {server}")
            }
            Self::ExitUnreachable { tool } => write!(f, "{tool}: exit node is unreachable from entry"),
            Self::AmbiguousSwitchDefault { tool, node } => write!(
                f,
                "{tool}/{node}: switch supplies both a rule-less arm and a top-level `next`"
            ),
            Self::SwitchTargetsExit { tool, node } => {
                write!(f, "{tool}/{node}: switch must not target exit directly")
            }
        }
    }
}

/// Any failure of schema or expression static validation. Fatal: no
/// execution starts while this is non-empty.
#[derive(Debug, Error, Clone)]
#[error("configuration invalid: {}", format_issues(.0))]
pub struct ConfigurationError(pub Vec<ValidationIssue>);

/// Structural graph failures: dangling references, unreachable exit,
/// wrong entry/exit counts. Same fatality as [`ConfigurationError`].
#[derive(Debug, Error, Clone)]
#[error("graph invalid: {}", format_issues(.0))]
pub struct GraphValidationError(pub Vec<ValidationIssue>);

fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Snapshot of a downstream client's captured stderr lines at the moment
/// of failure. Cheap to clone: callers typically embed one in an error.
pub type StderrSnapshot = Vec<String>;

/// Transport or handshake failure, connection closed, or a protocol-level
/// error reported by a downstream server. Not retried by the core.
#[derive(Debug, Error, Clone)]
#[error("downstream protocol error ({server}): code {code}: {message}")]
pub struct DownstreamProtocolError {
    /// The downstream server's configured name.
    pub server: String,
    /// Numeric error code from the underlying transport/protocol error.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
    /// Opaque data payload from the underlying protocol error, if any.
    pub data: Option<serde_json::Value>,
    /// Captured stderr lines at the time of failure (stdio transports only).
    pub stderr: StderrSnapshot,
}

/// The downstream server returned `isError: true`.
#[derive(Debug, Error, Clone)]
#[error("downstream tool error ({server}/{tool}): {message}")]
pub struct DownstreamToolError {
    /// The downstream server's configured name.
    pub server: String,
    /// The downstream tool name that was called.
    pub tool: String,
    /// Message extracted from the first text content item, if present.
    pub message: String,
    /// The full response object, for inspection.
    pub response: serde_json::Value,
}

/// A malformed `{expr: ...}` literal or a JSONata failure while lowering
/// a node's `args` tree.
#[derive(Debug, Error, Clone)]
#[error("argument evaluation error at {path}: {message}")]
pub struct ArgumentEvaluationError {
    /// Dot/bracket path into the argument tree where the failure occurred.
    pub path: String,
    /// Description of the failure.
    pub message: String,
}

/// JSONata or JSON-Logic evaluation failure during a transform or switch.
#[derive(Debug, Error, Clone)]
#[error("expression error in {node}: {message}")]
pub struct ExpressionError {
    /// The node whose expression failed.
    pub node: NodeId,
    /// Description of the failure.
    pub message: String,
}

/// A switch node had no matching arm and no default.
#[derive(Debug, Error, Clone)]
#[error("switch {node} matched no arm and has no default")]
pub struct SwitchUnmatched {
    /// The unmatched switch node.
    pub node: NodeId,
}

/// Which limit was breached.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    /// `max-node-executions` was reached.
    NodeCount,
    /// `max-execution-time-ms` was reached.
    Time,
}

impl std::fmt::Display for LimitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NodeCount => write!(f, "node-count"),
            Self::Time => write!(f, "time"),
        }
    }
}

/// A node-count or wall-clock limit was reached mid-execution.
#[derive(Debug, Error, Clone)]
#[error("limit exceeded ({kind}): current {current} >= limit {limit}")]
pub struct LimitExceeded {
    /// Which limit was breached.
    pub kind: LimitKind,
    /// The configured limit.
    pub limit: u64,
    /// The value observed when the limit was hit.
    pub current: u64,
}

/// `stop()` was invoked on the controller. Carries a fixed message so
/// callers can discriminate cancellation from other failures by matching
/// on the variant rather than string-sniffing.
#[derive(Debug, Error, Clone, Default)]
#[error("execution cancelled")]
pub struct Cancelled;

/// The full taxonomy, as returned to a caller of `executeTool`.
#[non_exhaustive]
#[derive(Debug, Error, Clone)]
pub enum EngineError {
    /// See [`ConfigurationError`].
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    /// See [`GraphValidationError`].
    #[error(transparent)]
    GraphValidation(#[from] GraphValidationError),
    /// See [`DownstreamProtocolError`].
    #[error(transparent)]
    DownstreamProtocol(#[from] DownstreamProtocolError),
    /// See [`DownstreamToolError`].
    #[error(transparent)]
    DownstreamTool(#[from] DownstreamToolError),
    /// See [`ArgumentEvaluationError`].
    #[error(transparent)]
    ArgumentEvaluation(#[from] ArgumentEvaluationError),
    /// See [`ExpressionError`].
    #[error(transparent)]
    Expression(#[from] ExpressionError),
    /// See [`SwitchUnmatched`].
    #[error(transparent)]
    SwitchUnmatched(#[from] SwitchUnmatched),
    /// See [`LimitExceeded`].
    #[error(transparent)]
    LimitExceeded(#[from] LimitExceeded),
    /// See [`Cancelled`].
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

impl EngineError {
    /// Whether this error should be reported to the caller as a
    /// cancellation (rather than a generic execution error), per spec
    /// §4.G's controller status mapping.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}
