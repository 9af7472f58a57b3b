//! resource_fetch tool implementation.
//!
//! Routes one request through the agent exactly as an intercepted
//! application request would be, and reports how it was answered.

use std::collections::BTreeMap;

use appshell_client::fetch::{content_type, parse_request_url};
use appshell_client::{CachingAgent, HostRuntime, Network};
use appshell_core::{CacheStore, Error, Method, RequestMode, ResourceRequest};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;

/// Input parameters for resource_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ResourceFetchParams {
    /// The URL to request.
    pub url: String,

    /// HTTP method (default: "GET"). Only GET requests are cached.
    #[serde(default = "default_method")]
    pub method: String,

    /// Request mode: "same-origin", "cors" (default), "no-cors" or "navigate".
    #[serde(default)]
    pub mode: RequestMode,

    /// Extra request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Request body, for non-GET methods.
    #[serde(default)]
    pub body: Option<String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for resource_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ResourceFetchOutput {
    /// How the request was answered: hit, stored, network-only, bypass, pass-through or fallback.
    pub decision: String,
    pub url: String,
    pub status: u16,
    /// Response classification: basic, cors or opaque.
    pub kind: String,
    pub content_type: Option<String>,
    /// Body size in bytes.
    pub size: usize,
    /// Body as text, when it is valid UTF-8.
    pub text: Option<String>,
}

/// Implementation of the resource_fetch tool.
pub async fn fetch_impl<S, N, H>(
    agent: &CachingAgent<S, N, H>, params: ResourceFetchParams,
) -> Result<CallToolResult, McpError>
where
    S: CacheStore + 'static,
    N: Network + 'static,
    H: HostRuntime + 'static,
{
    let url = parse_request_url(&params.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let method: Method = params.method.parse()?;

    let mut request = ResourceRequest::new(method, url).with_mode(params.mode);
    for (name, value) in params.headers {
        request = request.with_header(name, value);
    }
    if let Some(body) = params.body {
        request = request.with_body(body);
    }

    let outcome = agent.on_request(request).await?;
    let response = &outcome.response;

    let output = ResourceFetchOutput {
        decision: outcome.decision.as_str().to_string(),
        url: response.url.clone(),
        status: response.status,
        kind: response.kind.as_str().to_string(),
        content_type: content_type(response).map(str::to_string),
        size: response.body.len(),
        text: std::str::from_utf8(&response.body).ok().map(str::to_string),
    };

    json_result(&output)
}
