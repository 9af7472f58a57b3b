//! agent_install and agent_activate tool implementations.

use appshell_client::{CachingAgent, HostRuntime, Network};
use appshell_core::CacheStore;
use rmcp::{ErrorData as McpError, model::CallToolResult};

use super::json_result;

/// Run the install transition and report what was precached.
pub async fn install_impl<S, N, H>(agent: &CachingAgent<S, N, H>) -> Result<CallToolResult, McpError>
where
    S: CacheStore + 'static,
    N: Network + 'static,
    H: HostRuntime + 'static,
{
    let report = agent.on_install().await?;
    json_result(&report)
}

/// Run the activate transition and report purged generations.
pub async fn activate_impl<S, N, H>(agent: &CachingAgent<S, N, H>) -> Result<CallToolResult, McpError>
where
    S: CacheStore + 'static,
    N: Network + 'static,
    H: HostRuntime + 'static,
{
    let report = agent.on_activate().await?;
    json_result(&report)
}
