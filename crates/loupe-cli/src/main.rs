//! Loupe CLI
//!
//! Command-line interface for building and querying a project index.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use loupe_core::{Engine, LoupeConfig};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "loupe")]
#[command(about = "Loupe - incremental index of a Shopware project")]
#[command(version)]
struct Cli {
    /// Project root (default: current directory)
    #[arg(short, long, global = true, default_value = ".")]
    project: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index changed files, or everything with --force
    Index {
        /// Drop the existing index and rebuild it
        #[arg(short, long)]
        force: bool,
    },

    /// Show the merged record of a component as JSON
    Components {
        /// Component name, e.g. sw-button
        name: String,
    },

    /// Check a template's version markers against upstream blocks
    Drift {
        /// Path to the .twig template
        template: PathBuf,
    },

    /// List the keys of one store
    Keys {
        #[arg(value_enum)]
        store: Store,
    },

    /// Show index status
    Status,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Store {
    Services,
    Components,
    Templates,
    Blocks,
    Snippets,
    AdminSnippets,
    Theme,
    SystemConfig,
    Extensions,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = LoupeConfig::load(&cli.project);

    // Logs go to stderr so query output stays clean
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let engine = Engine::open(&cli.project, &config)
        .with_context(|| format!("Failed to open index for {}", cli.project.display()))?;

    let result = match cli.command {
        Commands::Index { force } => cmd_index(&engine, force).await,
        Commands::Components { name } => cmd_components(&engine, &name),
        Commands::Drift { template } => cmd_drift(&engine, &template),
        Commands::Keys { store } => cmd_keys(&engine, store),
        Commands::Status => cmd_status(&engine),
    };

    engine.shutdown().context("Failed to close index")?;
    result
}

async fn cmd_index(engine: &Engine, force: bool) -> Result<()> {
    let force = force || engine.needs_rebuild();
    let report = engine
        .spawn_index_all(force)
        .await
        .context("Indexing task failed")??;

    println!("✓ Indexed {}", engine.root().display());
    println!();
    println!("  Seen:       {}", report.seen);
    println!("  Indexed:    {}", report.indexed);
    println!("  Unchanged:  {}", report.unchanged);
    println!("  Removed:    {}", report.removed);
    if report.failed > 0 {
        println!("  Failed:     {}", report.failed);
    }
    println!("  Duration:   {}ms", report.duration.as_millis());
    Ok(())
}

fn cmd_components(engine: &Engine, name: &str) -> Result<()> {
    let component = engine
        .components()
        .resolve_component(name)?
        .with_context(|| format!("Component '{}' is not indexed", name))?;

    println!("{}", serde_json::to_string_pretty(&component)?);
    Ok(())
}

fn cmd_drift(engine: &Engine, template: &Path) -> Result<()> {
    let path = template
        .canonicalize()
        .with_context(|| format!("Template not found: {}", template.display()))?;
    let source = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let diagnostics = engine.templates().check_drift(&path, &source)?;
    if diagnostics.is_empty() {
        println!("✓ No drift in {}", path.display());
        return Ok(());
    }

    for diagnostic in &diagnostics {
        println!("{}:{}: {}", path.display(), diagnostic.line, diagnostic);
    }
    anyhow::bail!("{} block(s) need attention", diagnostics.len())
}

fn cmd_keys(engine: &Engine, store: Store) -> Result<()> {
    let keys = match store {
        Store::Services => engine.services().get_service_ids()?,
        Store::Components => engine.components().get_component_names()?,
        Store::Templates => engine.templates().get_template_paths()?,
        Store::Blocks => engine.templates().get_block_names()?,
        Store::Snippets => engine.snippets().get_storefront_keys()?,
        Store::AdminSnippets => engine.snippets().get_admin_keys()?,
        Store::Theme => engine.theme().get_field_keys()?,
        Store::SystemConfig => engine.system_config().get_entry_keys()?,
        Store::Extensions => engine.extensions().get_extension_names()?,
    };

    for key in keys {
        println!("{}", key);
    }
    Ok(())
}

fn cmd_status(engine: &Engine) -> Result<()> {
    println!("Loupe v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("  Project:    {}", engine.root().display());
    println!("  Cache:      {}", engine.cache_dir().display());
    println!("  Files:      {} tracked", engine.scanner().tracked_count()?);
    println!("  Indexers:   {}", engine.scanner().indexer_ids().join(", "));
    if engine.needs_rebuild() {
        println!();
        println!("  Index is empty or outdated. Run: loupe index");
    }
    Ok(())
}
