//! Loupe Daemon
//!
//! Background process that indexes one project and keeps the index current
//! while files change.

mod daemon;
mod signals;

use anyhow::{Context, Result};
use clap::Parser;
use loupe_core::LoupeConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

pub use daemon::Daemon;

#[derive(Parser)]
#[command(name = "loupe-daemon")]
#[command(about = "Index a project and watch it for changes")]
#[command(version)]
struct Args {
    /// Project root (default: current directory)
    #[arg(default_value = ".")]
    project: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = LoupeConfig::load(&args.project);

    // Initialize logging; RUST_LOG wins over the configured level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    tracing::info!("Starting loupe daemon v{}", env!("CARGO_PKG_VERSION"));

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build runtime")?
        .block_on(async {
            let daemon = Daemon::new(&args.project, config)?;
            daemon.run().await
        })
}
