//! appshell-mcp server entry point.
//!
//! Boots the caching agent and serves it as an MCP server on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use appshell_client::{CachingAgent, FetchClient, FetchConfig, LocalHost};
use appshell_core::{AppConfig, CacheDb};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let db = CacheDb::open(&config.db_path).await?;
    let network = FetchClient::new(FetchConfig::from_app_config(&config))?;
    let agent = CachingAgent::new(config, Arc::new(db), Arc::new(network), Arc::new(LocalHost::with_clients(1)))?;

    tracing::info!(generation = agent.generation_name(), "Starting appshell-mcp server on stdio transport");

    let handler = handler::AppShellServer::new(Arc::new(agent));
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
