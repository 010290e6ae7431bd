//! Conversions from rmcp's error types into [`DownstreamProtocolError`].
//!
//! Kept as plain functions rather than `From` impls since both `rmcp`'s
//! error types and our error type are foreign to each other from the
//! orphan rule's point of view.

use toolgraph_types::{DownstreamProtocolError, StderrSnapshot};

/// JSON-RPC's reserved range for server errors; used as the generic code
/// for transport/connection failures that don't carry a more specific
/// one.
const CONNECTION_CLOSED_CODE: i64 = -32000;

/// Converts a failure establishing or running the MCP service (handshake,
/// transport closed mid-flight, etc.) into a protocol error.
pub(crate) fn from_service_error(
    server: &str,
    err: impl std::fmt::Display,
    stderr: StderrSnapshot,
) -> DownstreamProtocolError {
    DownstreamProtocolError {
        server: server.to_string(),
        code: CONNECTION_CLOSED_CODE,
        message: err.to_string(),
        data: None,
        stderr,
    }
}

/// Converts a failed `call_tool` RPC into a protocol error, preserving
/// the JSON-RPC error code and data payload when the underlying error
/// carries one.
pub(crate) fn from_call_error(
    server: &str,
    err: &rmcp::ErrorData,
    stderr: StderrSnapshot,
) -> DownstreamProtocolError {
    DownstreamProtocolError {
        server: server.to_string(),
        code: err.code.0,
        message: err.message.to_string(),
        data: err.data.clone(),
        stderr,
    }
}
