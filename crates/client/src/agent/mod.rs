//! The caching agent.
//!
//! A [`CachingAgent`] owns one immutable [`AppConfig`] and three
//! collaborators: the [`CacheStore`] holding generations, the [`Network`] it
//! fetches through, and the [`HostRuntime`] it asks for skip-wait and claim.
//! Hosts call:
//!
//! - [`CachingAgent::on_install`] once per deployment,
//! - [`CachingAgent::on_activate`] when the installed version takes over,
//! - [`CachingAgent::on_request`] for every intercepted request.
//!
//! The agent is `Send + Sync`; hosts share it behind an `Arc` and may run
//! many `on_request` calls concurrently.

mod bypass;
mod host;
mod lifecycle;
mod router;

use std::fmt;
use std::sync::Arc;

use appshell_core::{AppConfig, CacheStore, Error, Generation};
use serde::Serialize;
use tokio::sync::RwLock;
use url::Url;

use crate::fetch::Network;

pub use bypass::BypassDomains;
pub use host::{HostRuntime, LocalHost};
pub use lifecycle::{ActivateReport, InstallReport, SkippedAsset};
pub use router::{Decision, FetchOutcome, Route};

/// Lifecycle position of an agent version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    /// Constructed, install not yet run.
    #[default]
    Parsed,
    Installing,
    /// Install succeeded; waiting to activate.
    Installed,
    Activating,
    /// Current version; stale generations are gone.
    Activated,
    /// Install failed; this version will never become current.
    Redundant,
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Parsed => "parsed",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Activating => "activating",
            Self::Activated => "activated",
            Self::Redundant => "redundant",
        };
        f.write_str(s)
    }
}

/// Offline caching agent for one deployed version.
pub struct CachingAgent<S, N, H> {
    config: AppConfig,
    base: Url,
    generation: Generation,
    bypass: BypassDomains,
    store: Arc<S>,
    network: Arc<N>,
    host: Arc<H>,
    state: RwLock<AgentState>,
}

impl<S, N, H> CachingAgent<S, N, H>
where
    S: CacheStore + 'static,
    N: Network + 'static,
    H: HostRuntime + 'static,
{
    /// Build an agent from its configuration and collaborators.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUrl` if the configured base URL does not parse.
    pub fn new(config: AppConfig, store: Arc<S>, network: Arc<N>, host: Arc<H>) -> Result<Self, Error> {
        let base = config.base().map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let generation = Generation::new(config.generation_name());
        let bypass = BypassDomains::new(&config.bypass_domains);

        tracing::debug!(
            generation = generation.name(),
            bypass_domains = bypass.len(),
            critical = config.critical_assets.len(),
            supplementary = config.supplementary_assets.len(),
            "caching agent constructed"
        );

        Ok(Self { config, base, generation, bypass, store, network, host, state: RwLock::new(AgentState::Parsed) })
    }

    /// Name of the generation this version owns.
    pub fn generation_name(&self) -> &str {
        self.generation.name()
    }

    pub fn generation(&self) -> &Generation {
        &self.generation
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub async fn state(&self) -> AgentState {
        *self.state.read().await
    }

    /// Move into `next` if the current state satisfies `allowed`.
    async fn begin(
        &self, action: &'static str, allowed: impl Fn(AgentState) -> bool, next: AgentState,
    ) -> Result<AgentState, Error> {
        let mut state = self.state.write().await;
        let current = *state;
        if !allowed(current) {
            return Err(Error::InvalidTransition { action, state: current.to_string() });
        }
        *state = next;
        tracing::debug!(stage = action, from = %current, to = %next, "lifecycle transition");
        Ok(current)
    }

    async fn finish(&self, next: AgentState) {
        *self.state.write().await = next;
    }
}
