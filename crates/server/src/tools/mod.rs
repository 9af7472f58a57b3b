//! MCP tool implementations.
//!
//! This module contains all tools exposed by the appshell-mcp server. Each
//! tool is a free function generic over the agent's collaborators, so tests
//! can drive it with an in-memory store and a scripted network.

#![allow(unused_imports)]

pub mod cache;
pub mod lifecycle;
pub mod resource_fetch;

pub use lifecycle::{activate_impl, install_impl};
pub use resource_fetch::{ResourceFetchOutput, ResourceFetchParams, fetch_impl};

use appshell_core::Error;
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

/// Serialize a tool output as pretty JSON text content.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
