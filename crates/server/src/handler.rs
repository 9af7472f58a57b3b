//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::tools::{
    self,
    cache::{CacheGetParams, generations_impl, get_impl},
    resource_fetch::ResourceFetchParams,
};

use appshell_client::{CachingAgent, FetchClient, LocalHost};
use appshell_core::CacheDb;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The agent as the server runs it: SQLite store, reqwest network, in-process host.
pub type Agent = CachingAgent<CacheDb, FetchClient, LocalHost>;

/// The main MCP server handler for appshell-mcp.
#[derive(Clone)]
pub struct AppShellServer {
    agent: Arc<Agent>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl AppShellServer {
    /// Create a new server handler around a shared agent.
    pub fn new(agent: Arc<Agent>) -> Self {
        Self { agent, tool_router: Self::tool_router() }
    }

    #[tool(
        description = "Install the configured version: precache critical assets atomically and supplementary assets best-effort into this version's cache generation."
    )]
    async fn agent_install(&self) -> Result<CallToolResult, McpError> {
        tools::install_impl(&self.agent).await
    }

    #[tool(description = "Activate the installed version: delete every other cache generation, then claim open clients.")]
    async fn agent_activate(&self) -> Result<CallToolResult, McpError> {
        tools::activate_impl(&self.agent).await
    }

    /// Route a request through the agent.
    ///
    /// Non-GET requests and bypass domains go straight to the network; GET
    /// requests are answered cache-first.
    #[tool(
        description = "Fetch a resource through the caching agent. Returns the routing decision (hit, stored, network-only, bypass, pass-through, fallback) and the response."
    )]
    async fn resource_fetch(&self, params: Parameters<ResourceFetchParams>) -> Result<CallToolResult, McpError> {
        tools::fetch_impl(&self.agent, params.0).await
    }

    #[tool(description = "Look up a URL in the current cache generation without using the network.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(&self.agent, params.0).await
    }

    #[tool(description = "List cache generations with their entry counts and the agent's lifecycle state.")]
    async fn cache_generations(&self) -> Result<CallToolResult, McpError> {
        generations_impl(&self.agent).await
    }
}

impl ServerHandler for AppShellServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "appshell-mcp".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
