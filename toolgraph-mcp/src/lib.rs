#![deny(missing_docs)]
//! The Downstream-Client Manager (spec §4.F): lazily-created, cached MCP
//! clients across stdio/SSE/streaming-HTTP transports, stdio stderr
//! capture, and the response-unwrapping rule shared with test tooling.

mod client;
mod error;
mod stderr;
mod unwrap;

pub use client::{DownstreamClientManager, DownstreamError};
pub use stderr::StderrBuffer;
pub use unwrap::{extract_message, unwrap_response};
