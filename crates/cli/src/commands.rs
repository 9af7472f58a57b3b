//! Subcommand implementations.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use appshell_client::fetch::{content_type, parse_request_url};
use appshell_client::{CachingAgent, FetchClient, FetchConfig, LocalHost};
use appshell_core::{AppConfig, CacheDb, CacheStore, Generation, Method, RequestMode, ResourceRequest};
use clap::{Args, ValueEnum};
use serde_json::json;

type Agent = CachingAgent<CacheDb, FetchClient, LocalHost>;

#[derive(Args)]
pub struct FetchArgs {
    /// URL to request
    pub url: String,

    /// HTTP method
    #[arg(short = 'X', long, default_value = "GET")]
    pub method: String,

    /// Request mode
    #[arg(long, value_enum, default_value_t = ModeArg::Cors)]
    pub mode: ModeArg,

    /// Extra header as "name: value" (repeatable)
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,

    /// Request body
    #[arg(short, long)]
    pub data: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ModeArg {
    SameOrigin,
    Cors,
    NoCors,
    Navigate,
}

impl From<ModeArg> for RequestMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::SameOrigin => Self::SameOrigin,
            ModeArg::Cors => Self::Cors,
            ModeArg::NoCors => Self::NoCors,
            ModeArg::Navigate => Self::Navigate,
        }
    }
}

async fn build_agent() -> Result<Agent> {
    let config = AppConfig::load().context("loading configuration")?;
    let db = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("opening cache at {}", config.db_path.display()))?;
    let network = FetchClient::new(FetchConfig::from_app_config(&config))?;
    Ok(CachingAgent::new(config, Arc::new(db), Arc::new(network), Arc::new(LocalHost::default()))?)
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn install(json: bool) -> Result<()> {
    let agent = build_agent().await?;
    let report = agent.on_install().await?;

    if json {
        return print_json(&report);
    }
    println!(
        "installed {}: {} critical, {} supplementary",
        report.generation, report.critical_cached, report.supplementary_cached
    );
    for skipped in &report.skipped {
        println!("  skipped {} ({})", skipped.url, skipped.reason);
    }
    Ok(())
}

pub async fn activate(json: bool) -> Result<()> {
    let agent = build_agent().await?;
    let installed = agent.on_install().await?;
    let activated = agent.on_activate().await?;

    if json {
        return print_json(&json!({ "install": installed, "activate": activated }));
    }
    println!("activated {}", activated.generation);
    for name in &activated.deleted {
        println!("  deleted {name}");
    }
    Ok(())
}

/// Split a `name: value` header argument.
fn parse_header(raw: &str) -> Result<(String, String)> {
    match raw.split_once(':') {
        Some((name, value)) if !name.trim().is_empty() => Ok((name.trim().to_string(), value.trim().to_string())),
        _ => bail!("invalid header {raw:?}, expected \"name: value\""),
    }
}

pub async fn fetch(args: FetchArgs, json: bool) -> Result<()> {
    let url = parse_request_url(&args.url)?;
    let method: Method = args.method.parse()?;

    let mut request = ResourceRequest::new(method, url).with_mode(args.mode.into());
    for raw in &args.headers {
        let (name, value) = parse_header(raw)?;
        request = request.with_header(name, value);
    }
    if let Some(body) = args.data {
        request = request.with_body(body);
    }

    let agent = build_agent().await?;
    let outcome = agent.on_request(request).await?;

    // The process exits right after printing; let the cache write land first.
    if let Some(write) = outcome.background {
        write.await?;
    }

    let response = &outcome.response;
    if json {
        return print_json(&json!({
            "decision": outcome.decision,
            "url": response.url,
            "status": response.status,
            "kind": response.kind.as_str(),
            "content_type": content_type(response),
            "size": response.body.len(),
        }));
    }
    println!(
        "{} {} {} ({} bytes, {})",
        outcome.decision.as_str(),
        response.status,
        response.url,
        response.body.len(),
        response.kind.as_str()
    );
    Ok(())
}

pub async fn generations(json: bool) -> Result<()> {
    let agent = build_agent().await?;
    let store = agent.store();

    let mut rows = Vec::new();
    for name in store.list_generations().await? {
        let entries = store.count_entries(&Generation::new(name.as_str())).await?;
        let current = name == agent.generation_name();
        rows.push((name, entries, current));
    }

    if json {
        let rows: Vec<_> = rows
            .iter()
            .map(|(name, entries, current)| json!({ "name": name, "entries": entries, "current": current }))
            .collect();
        return print_json(&rows);
    }
    if rows.is_empty() {
        println!("no generations");
    }
    for (name, entries, current) in rows {
        let marker = if current { "*" } else { " " };
        println!("{marker} {name} ({entries} entries)");
    }
    Ok(())
}
