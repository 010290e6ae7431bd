//! Thin seams for external collaborators deliberately kept out of this
//! crate's core: schema-validating the configuration document, merging
//! the optional external downstream-server file, and persisting a
//! modified configuration back to disk.
//!
//! None of these do more than the core owes the host: a plain YAML/JSON
//! decode (not a full JSON-Schema validator — that's the embedder's
//! job) and a straightforward re-serialize that honors the
//! graph-local/externally-supplied provenance split.

use std::collections::HashMap;
use toolgraph_model::{GraphConfig, Provenance, ServerEntry, ServerTransport};
use toolgraph_types::{ConfigurationError, ValidationIssue};

/// Decodes a YAML configuration document (spec §6). Decode failures are
/// surfaced as a single [`ValidationIssue::SchemaInvalid`]; this is not a
/// JSON-Schema validator, just the boundary a host can build one behind.
pub fn load_yaml(source: &str) -> Result<GraphConfig, ConfigurationError> {
    serde_yaml::from_str(source)
        .map_err(|e| ConfigurationError(vec![ValidationIssue::SchemaInvalid { message: e.to_string() }]))
}

/// The shape of the optional external downstream-server file (spec §6):
/// `{ "mcpServers": { name: server-config, ... } }`.
#[derive(Debug, serde::Deserialize)]
struct ExternalServerFile {
    #[serde(rename = "mcpServers")]
    mcp_servers: HashMap<String, ServerTransport>,
}

/// Decodes the optional external downstream-server JSON file.
pub fn load_external_servers(source: &str) -> Result<HashMap<String, ServerTransport>, ConfigurationError> {
    let parsed: ExternalServerFile = serde_json::from_str(source)
        .map_err(|e| ConfigurationError(vec![ValidationIssue::SchemaInvalid { message: e.to_string() }]))?;
    Ok(parsed.mcp_servers)
}

/// Merges externally-supplied server entries into `config`'s table (spec
/// §6): on a name collision the in-graph entry wins, so external entries
/// are only inserted where the graph didn't already name that server.
pub fn merge_external_servers(mut config: GraphConfig, external: HashMap<String, ServerTransport>) -> GraphConfig {
    for (name, transport) in external {
        config
            .mcp_servers
            .entry(name.into())
            .or_insert_with(|| ServerEntry { transport, provenance: Provenance::ExternallySupplied });
    }
    config
}

/// Serializes `config` to YAML for persistence, dropping every
/// externally-supplied server entry first (spec §9: "saving the
/// configuration must not write externally-supplied entries back to
/// disk").
pub fn to_persisted_yaml(config: &GraphConfig) -> Result<String, ConfigurationError> {
    let mut persisted = config.clone();
    persisted.mcp_servers.retain(|_, entry| entry.provenance == Provenance::GraphLocal);
    serde_yaml::to_string(&persisted)
        .map_err(|e| ConfigurationError(vec![ValidationIssue::SchemaInvalid { message: e.to_string() }]))
}
