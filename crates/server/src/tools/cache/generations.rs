//! cache_generations tool implementation.

use appshell_client::{CachingAgent, HostRuntime, Network};
use appshell_core::{CacheStore, Generation};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GenerationInfo {
    pub name: String,
    pub entries: u64,
    /// Whether this is the running version's generation.
    pub current: bool,
}

/// Output from the cache_generations tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGenerationsOutput {
    /// Lifecycle state of the running agent.
    pub state: String,
    pub generations: Vec<GenerationInfo>,
}

/// Implementation of the cache_generations tool.
pub async fn generations_impl<S, N, H>(agent: &CachingAgent<S, N, H>) -> Result<CallToolResult, McpError>
where
    S: CacheStore + 'static,
    N: Network + 'static,
    H: HostRuntime + 'static,
{
    let store = agent.store();
    let mut generations = Vec::new();
    for name in store.list_generations().await? {
        let entries = store.count_entries(&Generation::new(name.as_str())).await?;
        let current = name == agent.generation_name();
        generations.push(GenerationInfo { name, entries, current });
    }

    let output = CacheGenerationsOutput { state: agent.state().await.to_string(), generations };
    json_result(&output)
}
