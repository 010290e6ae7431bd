//! The configuration data model (spec §3): server metadata, the
//! downstream-server table, execution limits, tools, and nodes.
//!
//! Every type here is `Serialize`/`Deserialize` against the YAML shape in
//! spec §6; the schema-validating loader itself is an external
//! collaborator (see `toolgraph::host`), so this module only carries the
//! shapes and their `serde` wiring, not a JSON-Schema document.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use toolgraph_types::{NodeId, ServerName, ToolName};

/// Server identity, as advertised to clients. `title` and `instructions`
/// are optional; `title` conventionally falls back to `name` for display.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMetadata {
    /// Server name.
    pub name: String,
    /// Server version string.
    pub version: String,
    /// Optional display title; falls back to `name` when absent.
    #[serde(default)]
    pub title: Option<String>,
    /// Optional free-text instructions surfaced to clients.
    #[serde(default)]
    pub instructions: Option<String>,
}

impl ServerMetadata {
    /// The display title: `title` if set, else `name`.
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.name)
    }
}

/// One downstream-server's transport configuration. The `type` tag
/// distinguishes the three transport kinds spec §3 names.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerTransport {
    /// A child process speaking MCP over stdio.
    Stdio {
        /// Executable to spawn.
        command: String,
        /// Argument list.
        #[serde(default)]
        args: Vec<String>,
        /// Optional working directory for the child process.
        #[serde(default, rename = "cwd")]
        working_dir: Option<String>,
    },
    /// A server-sent-events endpoint.
    Sse {
        /// Event-source URL.
        url: String,
        /// Extra headers merged into the connection request.
        #[serde(default)]
        headers: Option<HashMap<String, String>>,
        /// Opaque event-source initialization options, passed through
        /// verbatim to the transport.
        #[serde(default, rename = "eventSourceInitOptions")]
        event_source_init_options: Option<Value>,
        /// Opaque request-init options, passed through verbatim.
        #[serde(default, rename = "requestInitOptions")]
        request_init_options: Option<Value>,
    },
    /// A streaming-HTTP endpoint.
    StreamingHttp {
        /// Endpoint URL.
        url: String,
        /// Extra headers merged into the connection request.
        #[serde(default)]
        headers: Option<HashMap<String, String>>,
        /// Opaque request-init options, passed through verbatim.
        #[serde(default, rename = "requestInitOptions")]
        request_init_options: Option<Value>,
    },
}

/// Whether a downstream-server entry came from the graph configuration
/// itself or from the optional external server file (spec §6). Decides
/// whether `save()` writes the entry back to disk.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    /// Declared inline in the graph configuration; written back on save.
    GraphLocal,
    /// Merged in from the external server file; never written back.
    ExternallySupplied,
}

/// One entry in the downstream-server table: a transport plus its
/// provenance tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerEntry {
    /// The transport configuration.
    #[serde(flatten)]
    pub transport: ServerTransport,
    /// Where this entry came from.
    #[serde(default = "Provenance::default_graph_local")]
    pub provenance: Provenance,
}

impl Provenance {
    fn default_graph_local() -> Self {
        Self::GraphLocal
    }
}

/// `max-node-executions` and `max-execution-time-ms`, both positive.
/// Defaults match spec §3: 1000 node executions, 300000 ms (5 minutes).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionLimits {
    /// Maximum history records before the scheduler fails with
    /// `LimitExceeded(NodeCount)`.
    #[serde(default = "ExecutionLimits::default_max_node_executions")]
    pub max_node_executions: u64,
    /// Maximum wall-clock milliseconds before the scheduler fails with
    /// `LimitExceeded(Time)`.
    #[serde(default = "ExecutionLimits::default_max_execution_time_ms")]
    pub max_execution_time_ms: u64,
}

impl ExecutionLimits {
    fn default_max_node_executions() -> u64 {
        1000
    }

    fn default_max_execution_time_ms() -> u64 {
        300_000
    }
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_node_executions: Self::default_max_node_executions(),
            max_execution_time_ms: Self::default_max_execution_time_ms(),
        }
    }
}

/// One `(rule?, target)` arm of a switch node. A missing `rule` marks a
/// default arm (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchArm {
    /// The JSON-Logic-like rule; `None` marks this arm as a default.
    #[serde(default)]
    pub rule: Option<Value>,
    /// The node id to route to when this arm wins.
    pub target: NodeId,
}

impl SwitchArm {
    /// Whether this arm is a default arm (no rule).
    pub fn is_default(&self) -> bool {
        self.rule.is_none()
    }
}

/// A vertex in a tool's execution graph, tagged by `type` per spec §6
/// (the downstream-call variant's wire tag is `mcp`, not `mcp-call`).
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Node {
    /// The tool's unique starting node.
    Entry {
        /// Node id.
        id: NodeId,
        /// Successor node id.
        next: NodeId,
    },
    /// The tool's unique terminal node. Has no successor.
    Exit {
        /// Node id.
        id: NodeId,
    },
    /// Produces its output by evaluating a JSONata-like expression
    /// against the live context.
    Transform {
        /// Node id.
        id: NodeId,
        /// The JSONata-like expression.
        expr: String,
        /// Successor node id.
        next: NodeId,
    },
    /// Forwards a call to a downstream server. Wire-tagged `mcp`.
    #[serde(rename = "mcp")]
    McpCall {
        /// Node id.
        id: NodeId,
        /// Downstream server name (must exist in the server table).
        server: ServerName,
        /// Downstream tool name.
        tool: ToolName,
        /// Argument tree; leaves may be `{expr: "..."}` objects.
        args: Value,
        /// Successor node id.
        next: NodeId,
    },
    /// Ordered conditional branch. See [`SwitchArm`].
    Switch {
        /// Node id.
        id: NodeId,
        /// Ordered arms; the first truthy rule (or the first default arm
        /// encountered) wins.
        conditions: Vec<SwitchArm>,
        /// Fallback successor used when no arm matches and no arm is a
        /// default arm.
        #[serde(default)]
        next: Option<NodeId>,
    },
}

impl Node {
    /// This node's id, regardless of variant.
    pub fn id(&self) -> &NodeId {
        match self {
            Self::Entry { id, .. }
            | Self::Exit { id }
            | Self::Transform { id, .. }
            | Self::McpCall { id, .. }
            | Self::Switch { id, .. } => id,
        }
    }

    /// A human-readable name for this node's kind, matching the wire tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Entry { .. } => "entry",
            Self::Exit { .. } => "exit",
            Self::Transform { .. } => "transform",
            Self::McpCall { .. } => "mcp",
            Self::Switch { .. } => "switch",
        }
    }
}

/// One tool definition: a unique name, description, I/O schemas, and the
/// graph of nodes implementing it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDef {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON-Schema-shaped input descriptor.
    pub input_schema: Value,
    /// JSON-Schema-shaped output descriptor.
    pub output_schema: Value,
    /// The graph's nodes.
    pub nodes: Vec<Node>,
}

/// The full graph configuration document (spec §6's YAML shape).
/// Unknown top-level fields are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GraphConfig {
    /// Configuration format version string.
    pub version: String,
    /// Server identity metadata.
    pub server: ServerMetadata,
    /// Downstream-server table.
    #[serde(default)]
    pub mcp_servers: HashMap<ServerName, ServerEntry>,
    /// Node-count and wall-clock execution limits.
    #[serde(default)]
    pub execution_limits: ExecutionLimits,
    /// The tool definitions. Tool names are unique (validated, not
    /// type-enforced).
    pub tools: Vec<ToolDef>,
}

impl GraphConfig {
    /// Looks up a tool by name.
    pub fn tool(&self, name: &str) -> Option<&ToolDef> {
        self.tools.iter().find(|t| t.name == name)
    }
}
