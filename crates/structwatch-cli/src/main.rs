//! structwatch CLI
//!
//! Watches a project tree, reports file and directory creations, deletions
//! and moves, and keeps the project structure document up to date.

mod config;
mod signals;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::{LoadedConfig, WatchConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use structwatch_core::{Engine, FsWatcher, Ignored, Notification, PathFilter, RawEvent, Rebuild};
use structwatch_structure::StructureWriter;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Capacity of the channel between the watcher thread and the engine.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Parser)]
#[command(name = "structwatch")]
#[command(about = "structwatch - Track file moves and keep a project structure document current")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch a directory and report changes
    Watch {
        /// Project path (default: current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Config file (default: <path>/.structwatch.yaml, then the user config)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Enable debug logging
        #[arg(short, long)]
        debug: bool,

        /// Print notifications as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Write the structure document once and exit
    Generate {
        /// Project path (default: current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Config file (default: <path>/.structwatch.yaml, then the user config)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (path, config_path, debug) = match &cli.command {
        Commands::Watch {
            path, config, debug, ..
        } => (path, config, *debug),
        Commands::Generate { path, config } => (path, config, false),
    };

    let root = path
        .canonicalize()
        .with_context(|| format!("Cannot resolve project path {}", path.display()))?;
    let loaded = load_config(&root, config_path.as_deref())?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(loaded.config.log_filter(debug))),
        )
        .with_target(false)
        .init();

    if let Some(warning) = &loaded.warning {
        warn!("{}, using defaults", warning);
    } else if let Some(path) = &loaded.path {
        info!(path = %path.display(), "Loaded config");
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    match cli.command {
        Commands::Watch { json, .. } => runtime.block_on(cmd_watch(root, loaded.config, json)),
        Commands::Generate { .. } => runtime.block_on(cmd_generate(root, loaded.config)),
    }
}

fn load_config(root: &Path, explicit: Option<&Path>) -> Result<LoadedConfig> {
    match explicit {
        Some(path) => {
            let config = WatchConfig::load_from(path)
                .with_context(|| format!("Failed to load config file {}", path.display()))?;
            Ok(LoadedConfig {
                config,
                path: Some(path.to_path_buf()),
                warning: None,
            })
        }
        None => Ok(WatchConfig::load(root)),
    }
}

fn ignore_predicate(root: &Path, config: &WatchConfig) -> Result<Ignored> {
    let filter = PathFilter::new(root, config.ignore_patterns(root)).context("Invalid ignore pattern")?;
    Ok(filter.into_predicate())
}

async fn cmd_generate(root: PathBuf, config: WatchConfig) -> Result<()> {
    let ignored = ignore_predicate(&root, &config)?;
    let writer = StructureWriter::new(&root, config.structure, ignored);
    writer.rebuild().await?;
    println!("Wrote {}", writer.output_path().display());
    Ok(())
}

/// Start the watcher, then index the tree.
///
/// Events from the moment the watcher is up queue in the channel while the
/// initial index runs, so nothing created during startup goes untracked.
/// Queued creations for entries the index already picked up are no-ops.
async fn start_engine(
    root: &Path,
    config: &WatchConfig,
    ignored: Ignored,
    rebuild: Arc<dyn Rebuild>,
) -> Result<(FsWatcher, Engine, mpsc::Receiver<RawEvent>)> {
    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let watcher = FsWatcher::watch(root, ignored.clone(), tx).context("Failed to start watcher")?;

    let mut engine = Engine::new(root, config.engine.clone(), ignored, rebuild);
    engine.prime().await;

    Ok((watcher, engine, rx))
}

async fn cmd_watch(root: PathBuf, config: WatchConfig, json: bool) -> Result<()> {
    info!("Starting structwatch v{}", env!("CARGO_PKG_VERSION"));

    let ignored = ignore_predicate(&root, &config)?;
    let writer = StructureWriter::new(&root, config.structure.clone(), ignored.clone());

    let rebuild: Arc<dyn Rebuild> = Arc::new(writer.clone());
    let (watcher, engine, rx) = start_engine(&root, &config, ignored, rebuild).await?;

    if let Err(e) = writer.rebuild().await {
        error!(error = %format!("{e:#}"), "Initial structure build failed");
    }

    let notifications = engine.subscribe();
    let printer = tokio::spawn(print_notifications(notifications, json));

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let engine_task = tokio::spawn(engine.run(rx, shutdown_rx));

    println!("Watching {} (Ctrl+C to stop)", root.display());
    signals::wait_for_shutdown().await;

    drop(watcher);
    let _ = shutdown_tx.send(());
    let stats = engine_task.await.context("Engine task failed")?;
    let _ = printer.await;

    info!(
        files = stats.files,
        dirs = stats.dirs,
        rebuilds = stats.rebuilds,
        "structwatch stopped"
    );
    Ok(())
}

async fn print_notifications(mut rx: broadcast::Receiver<Notification>, json: bool) {
    loop {
        match rx.recv().await {
            Ok(notification) => {
                if json {
                    match serde_json::to_string(&notification) {
                        Ok(line) => println!("{line}"),
                        Err(e) => error!(error = %e, "Failed to encode notification"),
                    }
                } else {
                    println!("{notification}");
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Notification output fell behind");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
