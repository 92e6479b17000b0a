//! shellcache - command-line host for the offline cache controller.
//!
//! Each subcommand plays the part of the hosting runtime: it turns an
//! install, a fetch or a control message into the matching controller call
//! and prints what happened. `bridge` keeps a controller alive and speaks
//! JSON lines on stdin/stdout for hosts that drive it programmatically.

mod adapter;
mod commands;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use shellcache_core::{
    CacheController, ClientRegistry, ControllerConfig, DiskStorage, HttpFetcher, Translator,
};

#[derive(Parser, Debug)]
#[command(name = "shellcache", version, about = "Offline cache controller for static web apps")]
struct Cli {
    /// Path to config.json (defaults to the user config directory)
    #[arg(long, short, env = "SHELLCACHE_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long, env = "SHELLCACHE_LOG_FILE", global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Cache the manifest as a new version and activate it
    Install,
    /// Route one request through the controller
    Get {
        /// Absolute URL, or a path relative to the configured scope
        url: String,
        /// Treat the request as a page navigation
        #[arg(long)]
        navigate: bool,
        /// Accept header to send
        #[arg(long)]
        accept: Option<String>,
    },
    /// Compare critical resources with the live site now
    Check,
    /// Show the active cache version
    Status,
    /// List the active cache's entries
    Stats,
    /// Send a raw control message, e.g. '{"type":"GET_CACHE_STATS"}'
    Message { json: String },
    /// Serve host events as JSON lines on stdin/stdout
    Bridge,
}

/// Initialize the tracing subscriber for logging.
/// RUST_LOG controls the level (e.g. RUST_LOG=debug); the default is warn.
fn init_tracing(log_file: Option<&PathBuf>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();
    Ok(guard)
}

/// Everything a command needs
pub struct Host {
    pub controller: CacheController,
    pub translator: Translator,
}

impl Host {
    fn new(config: &ControllerConfig) -> Result<Self> {
        let settings = config.settings().context("Invalid configuration")?;
        let storage_dir = config.storage_dir()?;
        let storage = DiskStorage::new(&storage_dir)
            .with_context(|| format!("Failed to open storage at {}", storage_dir.display()))?;
        let network = HttpFetcher::new().context("Failed to create HTTP client")?;

        let controller = CacheController::new(
            settings,
            Arc::new(storage),
            Arc::new(network),
            Arc::new(ClientRegistry::new()),
        );
        let translator = Translator::load(config.locales_dir.as_deref(), &config.language);
        Ok(Self {
            controller,
            translator,
        })
    }

    pub fn t(&self, key: &str, vars: &[(&str, &str)]) -> String {
        self.translator.translate(key, vars)
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<ControllerConfig> {
    match path {
        Some(path) => ControllerConfig::load_from(path),
        None => ControllerConfig::load(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_file.as_ref())?;
    info!("shellcache starting");

    let config = load_config(cli.config.as_ref())?;
    let host = Host::new(&config)?;

    match cli.command {
        Command::Install => commands::install(&host).await,
        Command::Get {
            url,
            navigate,
            accept,
        } => commands::get(&host, &url, navigate, accept.as_deref()).await,
        Command::Check => commands::check(&host).await,
        Command::Status => commands::status(&host).await,
        Command::Stats => commands::stats(&host).await,
        Command::Message { json } => commands::message(&host, &json).await,
        Command::Bridge => adapter::run_bridge(&host.controller).await,
    }
}
