//! Client-side pieces of appshell.
//!
//! This crate provides the caching agent (lifecycle controller and request
//! router) together with the network it fetches through. Hosts such as the
//! MCP server and the CLI construct a [`CachingAgent`] and forward lifecycle
//! events and intercepted requests to it.

pub mod agent;
pub mod fetch;

pub use agent::{
    ActivateReport, AgentState, BypassDomains, CachingAgent, Decision, FetchOutcome, HostRuntime, InstallReport,
    LocalHost,
};

pub use fetch::{FetchClient, FetchConfig, Network};
