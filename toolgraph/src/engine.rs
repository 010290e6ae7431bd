//! The host-embeddable `Engine` (spec §6): wires the graph model, the
//! downstream-client cache, and the scheduler into the tool surface an
//! RPC server or CLI front-end calls against. Config mutation and
//! execution both go through one `Engine`, so the downstream-client
//! cache (spec §5's one piece of cross-invocation shared state besides
//! the immutable configuration) is shared by every invocation.

use std::sync::Arc;
use std::path::Path;

use serde_json::Value;
use tokio::sync::RwLock;

use toolgraph_exec::{Controller, ExecutionFailure, ExecutionOutcome, HistoryRecord, SchedulerHooks, Telemetry};
use toolgraph_mcp::DownstreamClientManager;
use toolgraph_model::{ExecutionLimits, Graph, GraphConfig, ToolDef};
use toolgraph_types::{DownstreamProtocolError, EngineError, GraphValidationError, ServerName};
use tracing::info;

/// A tool's public shape, as returned by `listTools`/`getTool` (spec §6).
/// Carries no graph internals — a client only needs name, description,
/// and the two schemas to call the tool.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolDescriptor {
    /// Tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON-Schema-shaped input descriptor.
    pub input_schema: Value,
    /// JSON-Schema-shaped output descriptor.
    pub output_schema: Value,
}

impl From<&ToolDef> for ToolDescriptor {
    fn from(tool: &ToolDef) -> Self {
        Self {
            name: tool.name.clone(),
            description: tool.description.clone(),
            input_schema: tool.input_schema.clone(),
            output_schema: tool.output_schema.clone(),
        }
    }
}

/// A read-only snapshot of the engine's current configuration: loaded
/// tool names, downstream server names, and execution limits. Added as
/// an introspection surface consistent with the ambient stack (no
/// mutation, no side effects) — see `SPEC_FULL.md` §4.
#[derive(Debug, Clone, serde::Serialize)]
pub struct EngineDescription {
    /// Names of every loaded tool.
    pub tool_names: Vec<String>,
    /// Names of every configured downstream server.
    pub server_names: Vec<String>,
    /// The configured execution limits.
    pub limits: ExecutionLimits,
}

/// The host-facing taxonomy for operations this crate adds on top of
/// the core engine error kinds (spec §7): tool lookup and mutation
/// failures that exist only at this surface, plus the core execution
/// failure carried through unchanged.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// No tool with this name is loaded.
    #[error("tool not found: {0}")]
    ToolNotFound(String),
    /// `addTool` was called with a name that's already taken.
    #[error("tool already exists: {0}")]
    ToolAlreadyExists(String),
    /// The mutated (or transient) configuration failed structural
    /// validation (spec §4.E).
    #[error(transparent)]
    GraphValidation(#[from] GraphValidationError),
    /// Serializing the configuration back to YAML failed (spec §6 `save`).
    #[error(transparent)]
    Configuration(#[from] toolgraph_types::ConfigurationError),
    /// Writing the persisted configuration to disk failed.
    #[error("failed to persist configuration: {0}")]
    Io(#[from] std::io::Error),
}

/// The outcome of a failed `executeTool`/`executeToolDefinition` call:
/// either the tool name didn't resolve, or the graph ran and failed
/// partway through (in which case the partial history and any requested
/// telemetry are still available, per spec §8).
#[derive(Debug, thiserror::Error)]
pub enum ExecuteError {
    /// No tool with this name is loaded.
    #[error("tool not found: {0}")]
    NotFound(String),
    /// The invocation started but failed before reaching `exit`.
    #[error("{error}")]
    Failed {
        /// The error that ended the invocation.
        error: EngineError,
        /// History recorded up to (and including) the failure.
        history: Vec<HistoryRecord>,
        /// Telemetry over the partial history, if requested.
        telemetry: Option<Telemetry>,
    },
}

impl From<ExecutionFailure> for ExecuteError {
    fn from(failure: ExecutionFailure) -> Self {
        Self::Failed { error: failure.error, history: failure.history, telemetry: failure.telemetry }
    }
}

/// Wires the graph model, downstream-client cache, and scheduler into
/// one embeddable engine. Cheap to share: clone the `Arc` this type is
/// typically held behind, or construct once and pass `&Engine` around —
/// every method takes `&self` and synchronizes its own state.
pub struct Engine {
    config: RwLock<Arc<GraphConfig>>,
    manager: DownstreamClientManager,
}

impl Engine {
    /// Validates `config` (spec §4.E) and builds an engine over it. No
    /// downstream clients are created yet — they're lazy (spec §4.F).
    pub fn new(config: GraphConfig) -> Result<Self, GraphValidationError> {
        toolgraph_model::validate(&config)?;
        Ok(Self { config: RwLock::new(Arc::new(config)), manager: DownstreamClientManager::new() })
    }

    /// Decodes a YAML configuration document and builds an engine over
    /// it (spec §6), via the `host` module's loader seam.
    pub fn from_yaml(source: &str) -> Result<Self, EngineLoadError> {
        let config = crate::host::load_yaml(source)?;
        Ok(Self::new(config)?)
    }

    /// A read-only snapshot of the loaded tools, server names, and
    /// execution limits.
    pub async fn describe(&self) -> EngineDescription {
        let config = Arc::clone(&*self.config.read().await);
        EngineDescription {
            tool_names: config.tools.iter().map(|t| t.name.clone()).collect(),
            server_names: config.mcp_servers.keys().map(ServerName::to_string).collect(),
            limits: config.execution_limits,
        }
    }

    /// Lists every loaded tool's public descriptor (spec §6 `listTools`).
    pub async fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.config.read().await.tools.iter().map(ToolDescriptor::from).collect()
    }

    /// Looks up one tool's public descriptor (spec §6 `getTool`).
    pub async fn get_tool(&self, name: &str) -> Option<ToolDescriptor> {
        self.config.read().await.tool(name).map(ToolDescriptor::from)
    }

    /// Runs `name` to completion or failure (spec §6 `executeTool`).
    ///
    /// `controller` is constructed by the caller (`Controller::new` with
    /// whatever breakpoints/`start_paused` the invocation wants) and kept
    /// around so the caller can call `pause`/`resume`/`step`/`stop` on it
    /// concurrently from another task while this future runs; `hooks`
    /// likewise is the caller's to construct. A fresh [`DownstreamClientManager`]
    /// lookup happens per downstream call inside the scheduler — this
    /// method only resolves which tool graph to run against the engine's
    /// current configuration snapshot (taken at the start of the call, not
    /// reread mid-execution — configuration hot-reload mid-invocation is a
    /// non-goal).
    pub async fn execute_tool(
        &self,
        name: &str,
        input: Value,
        controller: &Controller,
        hooks: &mut dyn SchedulerHooks,
        enable_telemetry: bool,
    ) -> Result<ExecutionOutcome, ExecuteError> {
        let config = Arc::clone(&*self.config.read().await);
        let tool = config.tool(name).ok_or_else(|| ExecuteError::NotFound(name.to_string()))?;
        info!(invocation_id = %controller.invocation_id(), tool = name, "executing tool");
        let graph = Graph::new(tool);
        toolgraph_exec::run(&graph, &config, &self.manager, controller, hooks, input, enable_telemetry)
            .await
            .map_err(ExecuteError::from)
    }

    /// Runs a transient tool definition that is not (and will not be)
    /// part of the loaded configuration, validating it first against the
    /// engine's current downstream-server table (spec §6
    /// `executeToolDefinition`). Uses the same downstream-client cache as
    /// every other invocation.
    pub async fn execute_tool_definition(
        &self,
        def: ToolDef,
        input: Value,
        controller: &Controller,
        hooks: &mut dyn SchedulerHooks,
        enable_telemetry: bool,
    ) -> Result<ExecutionOutcome, ExecuteError> {
        let base = Arc::clone(&*self.config.read().await);
        let mut transient = (*base).clone();
        transient.tools = vec![def];
        toolgraph_model::validate(&transient).map_err(|e| ExecuteError::Failed {
            error: EngineError::from(e),
            history: Vec::new(),
            telemetry: None,
        })?;

        let graph = Graph::new(&transient.tools[0]);
        toolgraph_exec::run(&graph, &transient, &self.manager, controller, hooks, input, enable_telemetry)
            .await
            .map_err(ExecuteError::from)
    }

    /// Adds a new tool to the in-memory configuration (spec §6 `addTool`).
    /// Rejects a name collision and any structural/expression-syntax
    /// problem the new tool introduces, leaving the prior configuration
    /// untouched on failure.
    pub async fn add_tool(&self, def: ToolDef) -> Result<(), HostError> {
        let mut guard = self.config.write().await;
        if guard.tool(&def.name).is_some() {
            return Err(HostError::ToolAlreadyExists(def.name));
        }
        let mut candidate = (**guard).clone();
        candidate.tools.push(def);
        toolgraph_model::validate(&candidate)?;
        *guard = Arc::new(candidate);
        Ok(())
    }

    /// Replaces an existing tool's definition by name (spec §6
    /// `updateTool`).
    pub async fn update_tool(&self, name: &str, def: ToolDef) -> Result<(), HostError> {
        let mut guard = self.config.write().await;
        let Some(position) = guard.tools.iter().position(|t| t.name == name) else {
            return Err(HostError::ToolNotFound(name.to_string()));
        };
        let mut candidate = (**guard).clone();
        candidate.tools[position] = def;
        toolgraph_model::validate(&candidate)?;
        *guard = Arc::new(candidate);
        Ok(())
    }

    /// Removes a tool from the in-memory configuration (spec §6
    /// `deleteTool`).
    pub async fn delete_tool(&self, name: &str) -> Result<(), HostError> {
        let mut guard = self.config.write().await;
        let mut candidate = (**guard).clone();
        let before = candidate.tools.len();
        candidate.tools.retain(|t| t.name != name);
        if candidate.tools.len() == before {
            return Err(HostError::ToolNotFound(name.to_string()));
        }
        toolgraph_model::validate(&candidate)?;
        *guard = Arc::new(candidate);
        Ok(())
    }

    /// Serializes the current configuration to YAML (dropping
    /// externally-supplied server entries, spec §9) and, if `path` is
    /// given, writes it there (spec §6 `save(path?)`).
    pub async fn save(&self, path: Option<&Path>) -> Result<String, HostError> {
        let config = Arc::clone(&*self.config.read().await);
        let yaml = crate::host::to_persisted_yaml(&config)?;
        if let Some(path) = path {
            std::fs::write(path, &yaml)?;
        }
        Ok(yaml)
    }

    /// Names of currently connected downstream servers (mirrors
    /// [`DownstreamClientManager::active_servers`]).
    pub async fn active_downstream_servers(&self) -> Vec<ServerName> {
        self.manager.active_servers().await
    }

    /// Closes every connected downstream client. Idempotent.
    pub async fn close(&self) -> Vec<DownstreamProtocolError> {
        self.manager.close_all().await
    }
}

/// Either leg of `Engine::from_yaml`'s failure: the document didn't
/// decode, or it decoded but failed structural validation.
#[derive(Debug, thiserror::Error)]
pub enum EngineLoadError {
    /// See [`toolgraph_types::ConfigurationError`].
    #[error(transparent)]
    Configuration(#[from] toolgraph_types::ConfigurationError),
    /// See [`GraphValidationError`].
    #[error(transparent)]
    GraphValidation(#[from] GraphValidationError),
}
