//! Sentinel — binary entrypoint for the streaming gateway: resolves
//! configuration from the environment, assembles the provider client,
//! tool registry and schema registry, and serves `POST /v1/stream` /
//! `GET /health` until the process is killed.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use sentinel_config::Config;
use sentinel_provider::{MockProviderClient, OpenAiProviderClient, OpenAiProviderClientConfig, ProviderClient};
use sentinel_server::{AppState, Server};
use sentinel_tools::demo::demo_registry;

/// Sentinel streaming gateway.
#[derive(Parser, Debug)]
#[command(name = "sentinel", author, version, about, long_about = None)]
struct Cli {
    /// Enable debug-level logging for the sentinel crates.
    #[arg(short, long)]
    verbose: bool,

    /// Serve against an in-process scripted provider instead of a real
    /// upstream model. For local development and demos only.
    #[arg(long, env = "SENTINEL_MOCK_PROVIDER")]
    mock: bool,

    /// Directory for the rotating JSON log file.
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_tracing(&cli);

    let config = Config::from_env().context("failed to resolve configuration from the environment")?;

    let provider: Arc<dyn ProviderClient> = if cli.mock {
        tracing::warn!("serving against the in-process mock provider; no upstream model is used");
        Arc::new(MockProviderClient::new())
    } else {
        Arc::new(OpenAiProviderClient::new(OpenAiProviderClientConfig::from(&config)))
    };

    let bind_addr = config.bind_addr;
    let state = AppState::new(config, provider, demo_registry());
    let server = Server::new(state);

    tracing::info!(%bind_addr, "starting sentinel server");
    server.run().await.context("server exited with an error")?;
    Ok(())
}

/// Console (human-readable) + rotating daily JSON file, filtered
/// independently so a quiet console doesn't also mean a quiet log file.
/// `RUST_LOG`, if set, overrides both defaults.
fn init_tracing(cli: &Cli) -> tracing_appender::non_blocking::WorkerGuard {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let default_console_filter = if cli.verbose {
        "sentinel=debug,sentinel_session=debug,sentinel_server=debug,sentinel_tools=debug,sentinel_schema=debug,info"
    } else {
        "sentinel=info,sentinel_session=info,sentinel_server=info,warn"
    };
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_console_filter));

    let default_file_filter = "sentinel=trace,sentinel_session=trace,sentinel_server=trace,info";
    let file_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_file_filter));

    let file_appender = tracing_appender::rolling::daily(&cli.log_dir, "sentinel.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(true).with_filter(console_filter))
        .with(tracing_subscriber::fmt::layer().json().with_writer(non_blocking).with_filter(file_filter))
        .init();

    guard
}
