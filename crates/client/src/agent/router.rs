//! Per-request routing: pass-through, bypass, or cache-first.

use appshell_core::{CacheStore, Error, Method, RequestKey, RequestMode, ResourceRequest, ResponseSnapshot};
use serde::Serialize;
use tokio::task::JoinHandle;

use super::{CachingAgent, HostRuntime};
use crate::fetch::{Network, resolve};

/// Where a request is sent before anything is fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Not a read; forwarded untouched.
    PassThrough,
    /// Host matched this bypass entry.
    Bypass(String),
    CacheFirst,
}

/// How a request was ultimately answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Decision {
    PassThrough,
    Bypass,
    /// Served from the current generation.
    Hit,
    /// Miss; served from the network and queued for storage.
    Stored,
    /// Miss; served from the network, not cacheable or too large to store.
    NetworkOnly,
    /// Network unreachable; served the configured offline document.
    Fallback,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PassThrough => "pass-through",
            Self::Bypass => "bypass",
            Self::Hit => "hit",
            Self::Stored => "stored",
            Self::NetworkOnly => "network-only",
            Self::Fallback => "fallback",
        }
    }
}

/// Response handed back to the host for one request.
#[derive(Debug)]
pub struct FetchOutcome {
    pub decision: Decision,
    pub response: ResponseSnapshot,
    /// Background store write started for a [`Decision::Stored`] response.
    ///
    /// Callers are free to drop it; the write proceeds and logs its own
    /// result either way.
    pub background: Option<JoinHandle<()>>,
}

impl FetchOutcome {
    fn new(decision: Decision, response: ResponseSnapshot) -> Self {
        Self { decision, response, background: None }
    }
}

impl<S, N, H> CachingAgent<S, N, H>
where
    S: CacheStore + 'static,
    N: Network + 'static,
    H: HostRuntime + 'static,
{
    /// Classify a request without touching the store or the network.
    pub fn route(&self, request: &ResourceRequest) -> Route {
        if !request.method.is_read() {
            return Route::PassThrough;
        }
        match self.bypass.matching(&request.url) {
            Some(entry) => Route::Bypass(entry.to_string()),
            None => Route::CacheFirst,
        }
    }

    /// Answer an intercepted request.
    ///
    /// Pass-through and bypass requests go to the network and their result,
    /// error included, is returned unchanged. Everything else is looked up
    /// in the current generation first.
    pub async fn on_request(&self, request: ResourceRequest) -> Result<FetchOutcome, Error> {
        match self.route(&request) {
            Route::PassThrough => {
                tracing::info!(stage = "fetch", decision = "pass-through", method = %request.method, url = %request.url);
                let response = self.network.fetch(&request).await?;
                Ok(FetchOutcome::new(Decision::PassThrough, response))
            }
            Route::Bypass(entry) => {
                tracing::info!(stage = "fetch", decision = "bypass", matched = %entry, url = %request.url);
                let response = self.network.fetch(&request).await?;
                Ok(FetchOutcome::new(Decision::Bypass, response))
            }
            Route::CacheFirst => self.cache_first(request).await,
        }
    }

    async fn cache_first(&self, request: ResourceRequest) -> Result<FetchOutcome, Error> {
        let key = RequestKey::for_request(&request);

        match self.store.match_entry(&self.generation, &key).await {
            Ok(Some(cached)) => {
                tracing::info!(stage = "fetch", decision = "hit", key = %key, "served from cache");
                return Ok(FetchOutcome::new(Decision::Hit, cached));
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(stage = "fetch", key = %key, error = %e, "cache lookup failed; treating as miss");
            }
        }

        let response = match self.network.fetch(&request).await {
            Ok(response) => response,
            Err(e @ Error::Network(_)) => {
                if let Some(document) = self.offline_document(&request).await {
                    tracing::info!(stage = "fetch", decision = "fallback", key = %key, error = %e, "served offline document");
                    return Ok(FetchOutcome::new(Decision::Fallback, document));
                }
                tracing::info!(stage = "fetch", decision = "failed", key = %key, error = %e, "network failed on miss");
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        if !response.is_cacheable() || response.body.len() > self.config.max_bytes {
            tracing::info!(
                stage = "fetch",
                decision = "network-only",
                key = %key,
                status = response.status,
                kind = response.kind.as_str(),
                bytes = response.body.len(),
                "miss not cacheable"
            );
            return Ok(FetchOutcome::new(Decision::NetworkOnly, response));
        }

        tracing::info!(stage = "fetch", decision = "stored", key = %key, "miss served from network");
        let background = self.store_in_background(key, response.clone());
        Ok(FetchOutcome { decision: Decision::Stored, response, background: Some(background) })
    }

    /// Write a snapshot without making the caller wait for it.
    fn store_in_background(&self, key: RequestKey, snapshot: ResponseSnapshot) -> JoinHandle<()> {
        let store = self.store.clone();
        let generation = self.generation.clone();
        tokio::spawn(async move {
            match store.put(&generation, &key, &snapshot).await {
                Ok(()) => tracing::debug!(stage = "fetch", decision = "stored", key = %key, "runtime cache write complete"),
                Err(e) => tracing::warn!(stage = "fetch", key = %key, error = %e, "runtime cache write failed"),
            }
        })
    }

    /// Cached offline document for a failed navigation, when one is configured.
    async fn offline_document(&self, request: &ResourceRequest) -> Option<ResponseSnapshot> {
        if request.mode != RequestMode::Navigate {
            return None;
        }
        let entry = self.config.offline_document.as_deref()?;
        let url = resolve(&self.base, entry).ok()?;
        let key = RequestKey::new(Method::Get, &url);
        match self.store.match_entry(&self.generation, &key).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(stage = "fetch", key = %key, error = %e, "offline document lookup failed");
                None
            }
        }
    }
}
