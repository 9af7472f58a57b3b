//! appshell CLI entry point.
//!
//! Each invocation builds a fresh agent from the layered configuration, so
//! lifecycle commands run every transition they depend on in-process.

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "appshell")]
#[command(about = "Offline app-shell caching agent", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Precache the configured version's assets
    Install,

    /// Install, then delete stale generations and claim clients
    Activate,

    /// Fetch a resource through the agent
    Fetch(commands::FetchArgs),

    /// List cache generations
    Generations,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Install => commands::install(cli.json).await,
        Commands::Activate => commands::activate(cli.json).await,
        Commands::Fetch(args) => commands::fetch(args, cli.json).await,
        Commands::Generations => commands::generations(cli.json).await,
    };

    if let Err(err) = result {
        if cli.json {
            eprintln!("{}", serde_json::json!({ "error": err.to_string() }));
        } else {
            eprintln!("error: {err:#}");
        }
        std::process::exit(1);
    }
}
