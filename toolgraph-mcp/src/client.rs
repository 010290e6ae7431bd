//! The Downstream-Client Manager (spec §4.F): lazy per-server-name client
//! cache across the three transport kinds, with stderr capture for stdio
//! and the shared response-unwrapping rule.

use crate::error::{from_call_error, from_service_error};
use crate::stderr::StderrBuffer;
use crate::unwrap::{extract_message, unwrap_response};
use rmcp::ServiceExt;
use rmcp::model::CallToolRequestParams;
use rmcp::service::{RoleClient, RunningService};
use rmcp::transport::child_process::TokioChildProcess;
use rmcp::transport::sse_client::SseClientTransport;
use rmcp::transport::streamable_http_client::StreamableHttpClientTransport;
use serde_json::Value;
use std::borrow::Cow;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::RwLock;
use toolgraph_model::ServerTransport;
use toolgraph_types::{DownstreamProtocolError, DownstreamToolError, ServerName};
use tracing::{debug, info, warn};

/// One connected downstream server: its MCP service handle, and (for
/// stdio transports only) the buffer its stderr-reading task writes into.
struct DownstreamClient {
    service: RunningService<RoleClient, ()>,
    stderr: Option<StderrBuffer>,
}

/// Owns the cache of connected downstream clients, keyed by server name.
/// Safe against concurrent first-use of the same name: creation is
/// double-checked under the write lock so at most one client is ever
/// created per name (spec §4.F, §5).
#[derive(Default)]
pub struct DownstreamClientManager {
    clients: RwLock<HashMap<ServerName, Arc<DownstreamClient>>>,
    registration_order: RwLock<Vec<ServerName>>,
}

impl DownstreamClientManager {
    /// Creates an empty manager with no connected clients.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the existing client for `name`, or connects one using
    /// `transport` if this is the first request for that name (spec
    /// §4.F's `get(server-name, server-config) -> client`).
    async fn ensure_connected(
        &self,
        name: &ServerName,
        transport: &ServerTransport,
    ) -> Result<Arc<DownstreamClient>, DownstreamProtocolError> {
        if let Some(client) = self.clients.read().await.get(name) {
            return Ok(Arc::clone(client));
        }

        let mut clients = self.clients.write().await;
        if let Some(client) = clients.get(name) {
            return Ok(Arc::clone(client));
        }

        info!(server = name.as_str(), "connecting downstream server");
        let client = Arc::new(connect(name.as_str(), transport).await?);
        clients.insert(name.clone(), Arc::clone(&client));
        self.registration_order.write().await.push(name.clone());
        Ok(client)
    }

    /// Forwards a call to `tool` on the downstream server `name`,
    /// connecting it first if necessary. The stderr buffer (if any) is
    /// cleared immediately before the call so captured lines are
    /// attributable to it, then applies the error-mapping and
    /// response-unwrapping rules from spec §4.F.
    pub async fn call(
        &self,
        name: &ServerName,
        transport: &ServerTransport,
        tool: &str,
        args: Value,
    ) -> Result<Value, DownstreamError> {
        let client = self.ensure_connected(name, transport).await?;

        if let Some(stderr) = &client.stderr {
            stderr.clear();
        }

        let arguments = args.as_object().cloned();
        let params = CallToolRequestParams {
            meta: None,
            name: Cow::Owned(tool.to_string()),
            arguments,
            task: None,
        };

        debug!(server = name.as_str(), tool, "calling downstream tool");
        let result = client.service.peer().call_tool(params).await.map_err(|e| {
            let stderr = client.stderr.as_ref().map(StderrBuffer::snapshot).unwrap_or_default();
            let protocol_error = match &e {
                rmcp::ServiceError::McpError(data) => from_call_error(name.as_str(), data, stderr),
                other => from_service_error(name.as_str(), other, stderr),
            };
            DownstreamError::Protocol(protocol_error)
        })?;

        if result.is_error == Some(true) {
            return Err(DownstreamError::Tool(DownstreamToolError {
                server: name.as_str().to_string(),
                tool: tool.to_string(),
                message: extract_message(&result),
                response: serde_json::to_value(&result).unwrap_or(Value::Null),
            }));
        }

        Ok(unwrap_response(&result))
    }

    /// Closes every connected client. Idempotent: servers with no client
    /// yet are simply absent from the cache. Collects (rather than
    /// short-circuits on) individual close failures, draining in
    /// registration order.
    pub async fn close_all(&self) -> Vec<DownstreamProtocolError> {
        let order = self.registration_order.write().await.split_off(0);
        let mut clients = self.clients.write().await;
        let mut failures = Vec::new();

        for name in order {
            let Some(client) = clients.remove(&name) else { continue };
            let Ok(client) = Arc::try_unwrap(client) else {
                warn!(server = name.as_str(), "downstream client still referenced at shutdown");
                continue;
            };
            if let Err(e) = client.service.cancel().await {
                failures.push(from_service_error(name.as_str(), e, Vec::new()));
            }
        }

        failures
    }

    /// Names of currently cached (connected) downstream servers.
    pub async fn active_servers(&self) -> Vec<ServerName> {
        self.clients.read().await.keys().cloned().collect()
    }
}

/// Either leg of a downstream call failure: transport/protocol-level, or
/// the downstream tool itself reporting `isError: true`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DownstreamError {
    /// See [`DownstreamProtocolError`].
    #[error(transparent)]
    Protocol(#[from] DownstreamProtocolError),
    /// See [`DownstreamToolError`].
    #[error(transparent)]
    Tool(#[from] DownstreamToolError),
}

async fn connect(server: &str, transport: &ServerTransport) -> Result<DownstreamClient, DownstreamProtocolError> {
    match transport {
        ServerTransport::Stdio { command, args, working_dir } => connect_stdio(server, command, args, working_dir.as_deref()).await,
        ServerTransport::Sse { url, headers, .. } => connect_sse(server, url, headers.as_ref()).await,
        ServerTransport::StreamingHttp { url, headers, .. } => connect_streaming_http(server, url, headers.as_ref()).await,
    }
}

async fn connect_stdio(
    server: &str,
    command: &str,
    args: &[String],
    working_dir: Option<&str>,
) -> Result<DownstreamClient, DownstreamProtocolError> {
    let mut cmd = Command::new(command);
    cmd.args(args).stdin(Stdio::piped()).stdout(Stdio::piped());
    if let Some(dir) = working_dir {
        cmd.current_dir(dir);
    }

    let (transport, child_stderr) = TokioChildProcess::builder(cmd)
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| from_service_error(server, e, Vec::new()))?;

    let stderr = StderrBuffer::new();
    if let Some(child_stderr) = child_stderr {
        let buffer = stderr.clone();
        let server_name = server.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(child_stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let trimmed = line.trim();
                if !trimmed.is_empty() {
                    debug!(server = server_name.as_str(), "downstream stderr: {trimmed}");
                    buffer.push_line(trimmed.to_string());
                }
            }
        });
    }

    let service = ().serve(transport).await.map_err(|e| from_service_error(server, e, stderr.snapshot()))?;

    Ok(DownstreamClient { service, stderr: Some(stderr) })
}

fn build_http_client(server: &str, headers: Option<&HashMap<String, String>>) -> Result<reqwest::Client, DownstreamProtocolError> {
    let Some(headers) = headers else { return Ok(reqwest::Client::new()) };

    let mut map = reqwest::header::HeaderMap::with_capacity(headers.len());
    for (key, value) in headers {
        let name = reqwest::header::HeaderName::from_bytes(key.as_bytes())
            .map_err(|e| from_service_error(server, e, Vec::new()))?;
        let value = reqwest::header::HeaderValue::from_str(value).map_err(|e| from_service_error(server, e, Vec::new()))?;
        map.insert(name, value);
    }

    reqwest::Client::builder()
        .default_headers(map)
        .build()
        .map_err(|e| from_service_error(server, e, Vec::new()))
}

async fn connect_sse(
    server: &str,
    url: &str,
    headers: Option<&HashMap<String, String>>,
) -> Result<DownstreamClient, DownstreamProtocolError> {
    let client = build_http_client(server, headers)?;
    let transport = SseClientTransport::start_with_client(client, url.to_string())
        .await
        .map_err(|e| from_service_error(server, e, Vec::new()))?;
    let service = ().serve(transport).await.map_err(|e| from_service_error(server, e, Vec::new()))?;
    Ok(DownstreamClient { service, stderr: None })
}

async fn connect_streaming_http(
    server: &str,
    url: &str,
    headers: Option<&HashMap<String, String>>,
) -> Result<DownstreamClient, DownstreamProtocolError> {
    let client = build_http_client(server, headers)?;
    let transport = StreamableHttpClientTransport::with_client(client, url.to_string());
    let service = ().serve(transport).await.map_err(|e| from_service_error(server, e, Vec::new()))?;
    Ok(DownstreamClient { service, stderr: None })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn manager_starts_with_no_active_servers() {
        let manager = DownstreamClientManager::new();
        assert!(manager.active_servers().await.is_empty());
    }

    #[tokio::test]
    async fn close_all_on_empty_manager_is_idempotent_and_reports_no_failures() {
        let manager = DownstreamClientManager::new();
        assert!(manager.close_all().await.is_empty());
        assert!(manager.close_all().await.is_empty());
    }
}
