//! cache_get tool implementation.
//!
//! Looks up a request in the current generation without touching the network.

use appshell_client::fetch::parse_request_url;
use appshell_client::{CachingAgent, HostRuntime, Network};
use appshell_core::{CacheStore, Error, Method, RequestKey};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Absolute URL of the cached resource.
    pub url: String,
}

/// A stored response.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachedEntry {
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub kind: String,
    pub headers: Vec<(String, String)>,
    pub size: usize,
    /// Body as text, when it is valid UTF-8.
    pub text: Option<String>,
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    /// Generation that was searched.
    pub generation: String,
    /// The stored response, if present.
    pub entry: Option<CachedEntry>,
}

/// Implementation of the cache_get tool.
pub async fn get_impl<S, N, H>(agent: &CachingAgent<S, N, H>, params: CacheGetParams) -> Result<CallToolResult, McpError>
where
    S: CacheStore + 'static,
    N: Network + 'static,
    H: HostRuntime + 'static,
{
    let url = parse_request_url(&params.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let key = RequestKey::new(Method::Get, &url);

    let entry = agent
        .store()
        .match_entry(agent.generation(), &key)
        .await?
        .map(|snapshot| CachedEntry {
            size: snapshot.body.len(),
            text: std::str::from_utf8(&snapshot.body).ok().map(str::to_string),
            url: snapshot.url,
            status: snapshot.status,
            status_text: snapshot.status_text,
            kind: snapshot.kind.as_str().to_string(),
            headers: snapshot.headers,
        });

    tracing::debug!(key = %key, found = entry.is_some(), "cache_get");

    json_result(&CacheGetOutput { generation: agent.generation_name().to_string(), entry })
}
