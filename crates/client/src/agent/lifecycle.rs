//! Install and activate transitions.

use std::collections::HashSet;

use appshell_core::{CacheStore, Error, Generation, InstallPolicy, RequestKey, ResourceRequest, ResponseSnapshot};
use futures_util::future::{join_all, try_join_all};
use serde::Serialize;
use url::Url;

use super::{AgentState, CachingAgent, HostRuntime};
use crate::fetch::{Network, resolve};

/// An asset that a best-effort pass could not cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedAsset {
    pub url: String,
    pub reason: String,
}

/// Outcome of a successful install.
#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    pub generation: String,
    pub critical_cached: usize,
    pub supplementary_cached: usize,
    pub skipped: Vec<SkippedAsset>,
    /// Whether the host accepted the skip-wait request.
    pub skip_waiting: bool,
}

/// Outcome of a successful activation.
#[derive(Debug, Clone, Serialize)]
pub struct ActivateReport {
    pub generation: String,
    pub deleted: Vec<String>,
    /// Clients claimed, when claiming is enabled.
    pub claimed: Option<usize>,
}

#[derive(Debug, Default)]
struct Precached {
    cached: usize,
    skipped: Vec<SkippedAsset>,
}

fn precache_failed(url: impl Into<String>, reason: impl ToString) -> Error {
    Error::PrecacheFailed { url: url.into(), reason: reason.to_string() }
}

impl<S, N, H> CachingAgent<S, N, H>
where
    S: CacheStore + 'static,
    N: Network + 'static,
    H: HostRuntime + 'static,
{
    /// Install transition: populate this version's generation.
    ///
    /// Critical assets are written first using their policy; supplementary
    /// assets are only attempted once the critical pass succeeded. On failure
    /// the agent becomes [`AgentState::Redundant`] and a generation created by
    /// this install is removed again.
    pub async fn on_install(&self) -> Result<InstallReport, Error> {
        let previous = self
            .begin(
                "install",
                |s| matches!(s, AgentState::Parsed | AgentState::Installed | AgentState::Activated),
                AgentState::Installing,
            )
            .await?;

        tracing::info!(stage = "install", generation = self.generation_name(), from = %previous, "installing");

        match self.run_install().await {
            Ok(report) => {
                self.finish(AgentState::Installed).await;
                tracing::info!(
                    stage = "install",
                    decision = "installed",
                    generation = %report.generation,
                    critical = report.critical_cached,
                    supplementary = report.supplementary_cached,
                    skipped = report.skipped.len(),
                    "install complete"
                );
                Ok(report)
            }
            Err(e) => {
                self.finish(AgentState::Redundant).await;
                tracing::error!(
                    stage = "install",
                    decision = "redundant",
                    generation = self.generation_name(),
                    error = %e,
                    "install failed"
                );
                Err(e)
            }
        }
    }

    async fn run_install(&self) -> Result<InstallReport, Error> {
        let name = self.generation_name().to_string();
        let existed = self.store.has_generation(&name).await?;
        let generation = self.store.open(&name).await?;

        let passes = [
            ("critical", &self.config.critical_assets, self.config.critical_policy),
            ("supplementary", &self.config.supplementary_assets, self.config.supplementary_policy),
        ];

        let mut seen = HashSet::new();
        let mut counts = [0usize; 2];
        let mut skipped = Vec::new();
        for (i, (subset, entries, policy)) in passes.into_iter().enumerate() {
            let resolved = self.resolve_entries(entries, &mut seen);
            match self.precache(&generation, subset, resolved, policy).await {
                Ok(done) => {
                    counts[i] = done.cached;
                    skipped.extend(done.skipped);
                }
                Err(e) => {
                    if !existed {
                        self.discard(&name).await;
                    }
                    return Err(e);
                }
            }
        }

        let skip_waiting = if self.config.skip_waiting {
            match self.host.skip_waiting().await {
                Ok(()) => {
                    tracing::info!(stage = "install", decision = "skip-waiting", "requested immediate activation");
                    true
                }
                Err(e) => {
                    tracing::warn!(stage = "install", error = %e, "host refused skip-waiting; activation will wait");
                    false
                }
            }
        } else {
            false
        };

        Ok(InstallReport {
            generation: name,
            critical_cached: counts[0],
            supplementary_cached: counts[1],
            skipped,
            skip_waiting,
        })
    }

    async fn discard(&self, name: &str) {
        match self.store.delete(name).await {
            Ok(_) => tracing::info!(stage = "install", generation = name, "discarded candidate generation"),
            Err(e) => tracing::warn!(stage = "install", generation = name, error = %e, "failed to discard candidate generation"),
        }
    }

    /// Resolve manifest entries, dropping any URL already in `seen` while
    /// keeping order. `seen` spans both subsets, so an asset listed as
    /// critical is never fetched again as supplementary.
    fn resolve_entries(&self, entries: &[String], seen: &mut HashSet<Url>) -> Vec<(String, Result<Url, Error>)> {
        entries
            .iter()
            .map(|entry| (entry.clone(), resolve(&self.base, entry).map_err(|e| precache_failed(entry.as_str(), e))))
            .filter(|(_, url)| match url {
                Ok(u) => seen.insert(u.clone()),
                Err(_) => true,
            })
            .collect()
    }

    async fn precache(
        &self, generation: &Generation, subset: &'static str, resolved: Vec<(String, Result<Url, Error>)>,
        policy: InstallPolicy,
    ) -> Result<Precached, Error> {
        if resolved.is_empty() {
            return Ok(Precached::default());
        }

        tracing::debug!(stage = "install", subset, ?policy, assets = resolved.len(), "precaching");

        match policy {
            InstallPolicy::Atomic => {
                let urls = resolved.into_iter().map(|(_, url)| url).collect::<Result<Vec<_>, _>>()?;
                let batch: Vec<(RequestKey, ResponseSnapshot)> =
                    try_join_all(urls.iter().map(|url| self.fetch_asset(url))).await?;
                self.store.put_all(generation, &batch).await?;
                tracing::info!(stage = "install", subset, decision = "stored", count = batch.len(), "precached atomically");
                Ok(Precached { cached: batch.len(), skipped: Vec::new() })
            }
            InstallPolicy::BestEffort => {
                let attempts = resolved.into_iter().map(|(entry, url)| async move {
                    let url = url.map_err(|e| SkippedAsset { url: entry.clone(), reason: e.to_string() })?;
                    let (key, snapshot) = self
                        .fetch_asset(&url)
                        .await
                        .map_err(|e| SkippedAsset { url: url.to_string(), reason: e.to_string() })?;
                    self.store
                        .put(generation, &key, &snapshot)
                        .await
                        .map_err(|e| SkippedAsset { url: url.to_string(), reason: e.to_string() })
                });

                let mut done = Precached::default();
                for result in join_all(attempts).await {
                    match result {
                        Ok(()) => done.cached += 1,
                        Err(skip) => {
                            tracing::warn!(
                                stage = "install",
                                subset,
                                decision = "skipped",
                                url = %skip.url,
                                reason = %skip.reason,
                                "asset not precached"
                            );
                            done.skipped.push(skip);
                        }
                    }
                }
                Ok(done)
            }
        }
    }

    /// Fetch one manifest asset; a non-2xx or oversized response is a failure.
    async fn fetch_asset(&self, url: &Url) -> Result<(RequestKey, ResponseSnapshot), Error> {
        let request = ResourceRequest::get(url.clone());
        let response = self.network.fetch(&request).await.map_err(|e| precache_failed(url.as_str(), e))?;

        if !response.is_ok() {
            return Err(precache_failed(url.as_str(), format!("status {}", response.status)));
        }
        if response.body.len() > self.config.max_bytes {
            let too_large = Error::FetchTooLarge(format!("{} bytes exceeds {}", response.body.len(), self.config.max_bytes));
            return Err(precache_failed(url.as_str(), too_large));
        }

        Ok((RequestKey::for_request(&request), response))
    }

    /// Activate transition: purge every other generation, then claim clients.
    ///
    /// All deletions are awaited before the claim step. A failed activation
    /// leaves the agent installed so the host can retry.
    pub async fn on_activate(&self) -> Result<ActivateReport, Error> {
        self.begin("activate", |s| s == AgentState::Installed, AgentState::Activating).await?;

        tracing::info!(stage = "activate", generation = self.generation_name(), "activating");

        match self.run_activate().await {
            Ok(report) => {
                self.finish(AgentState::Activated).await;
                tracing::info!(
                    stage = "activate",
                    decision = "activated",
                    generation = %report.generation,
                    deleted = report.deleted.len(),
                    claimed = ?report.claimed,
                    "activation complete"
                );
                Ok(report)
            }
            Err(e) => {
                self.finish(AgentState::Installed).await;
                tracing::error!(stage = "activate", generation = self.generation_name(), error = %e, "activation failed");
                Err(e)
            }
        }
    }

    async fn run_activate(&self) -> Result<ActivateReport, Error> {
        let current = self.generation_name();
        let stale: Vec<String> = self
            .store
            .list_generations()
            .await?
            .into_iter()
            .filter(|name| name != current)
            .collect();

        let results = join_all(stale.iter().map(|name| self.store.delete(name))).await;

        let mut deleted = Vec::new();
        let mut failures = Vec::new();
        for (name, result) in stale.into_iter().zip(results) {
            match result {
                Ok(_) => {
                    tracing::info!(stage = "activate", decision = "deleted", generation = %name, "removed stale generation");
                    deleted.push(name);
                }
                Err(e) => failures.push(format!("{name}: {e}")),
            }
        }

        if !failures.is_empty() {
            return Err(Error::ActivateFailed(failures.join("; ")));
        }

        let claimed = if self.config.claim_clients {
            let n = self.host.claim_clients().await?;
            tracing::info!(stage = "activate", decision = "claimed", clients = n, "claimed open clients");
            Some(n)
        } else {
            None
        };

        Ok(ActivateReport { generation: current.to_string(), deleted, claimed })
    }
}
