use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Mutex;
use tidewatch::{config, tui};

#[derive(Parser, Debug)]
#[command(name = "tidewatch")]
#[command(about = "Browse and watch live playground sessions")]
#[command(version)]
struct Args {
    /// Initialize configuration
    #[arg(long)]
    init: bool,

    /// Path to config file
    #[arg(long, short)]
    config: Option<std::path::PathBuf>,

    /// Server url, overriding the config file (ws:// or wss://)
    #[arg(long, short)]
    server: Option<String>,
}

/// Send logs to a file; the TUI owns the terminal.
fn init_logging() -> Result<()> {
    let dir = config::log_dir()?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join("tidewatch.log");
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tidewatch=info".parse()?),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.init {
        config::init_wizard().await?;
        return Ok(());
    }

    init_logging()?;

    let mut config = config::load(args.config.as_deref())?;
    if let Some(server) = args.server {
        config.server.url = server;
        config.server.base_url()?;
    }

    tracing::info!("Starting against {}", config.server.url);

    // Run TUI
    tui::run(config).await
}
