//! hashpaste - content-addressed command line pastebin
//!
//! Usage:
//!   hashpaste --db <PATH> [--addr <ADDR>] [--port <PORT>] [--config <FILE>]
//!
//! Example:
//!   hashpaste --db /var/lib/hashpaste/pastes.db --port 9001

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use hashpaste::config::Config;
use hashpaste::server;
use hashpaste::store::{PasteStore, SledStore};

#[derive(Parser, Debug)]
#[command(name = "hashpaste")]
#[command(about = "Content-addressed command line pastebin", long_about = None)]
struct Args {
    /// Location of the paste database (required here or in the config file)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Bind address (empty binds all interfaces)
    #[arg(long)]
    addr: Option<String>,

    /// Bind port [default: 9001]
    #[arg(short, long)]
    port: Option<u16>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    /// Command-line values win over the config file
    fn apply(self, config: &mut Config) {
        if let Some(db) = self.db {
            config.store.path = Some(db);
        }
        if let Some(addr) = self.addr {
            config.server.addr = addr;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(level) = self.log_level {
            config.server.log_level = level;
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match Config::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("error: failed to load config from {:?}: {}", path, e);
                process::exit(1);
            }
        },
        None => Config::default(),
    };
    args.apply(&mut config);

    if let Err(e) = config.validate() {
        eprintln!("error: {}", e);
        eprintln!("Run with --help for usage.");
        process::exit(1);
    }

    // RUST_LOG takes precedence over the configured level
    env_logger::Builder::from_env(Env::default().default_filter_or(&config.server.log_level))
        .init();

    if let Err(e) = run(config).await {
        log::error!("{:#}", e);
        process::exit(1);
    }
}

async fn run(config: Config) -> Result<()> {
    let db_path = config
        .store
        .path
        .clone()
        .context("database path missing after validation")?;
    let bind_addr = config.server.bind_addr();

    log::info!("hashpaste v{}", env!("CARGO_PKG_VERSION"));
    log::info!("  Database: {:?}", db_path);
    log::info!("  Bind address: {}", bind_addr);

    let timeout = config.store.open_timeout();
    let open_path = db_path.clone();
    let store = tokio::task::spawn_blocking(move || SledStore::open(&open_path, timeout))
        .await
        .context("store open task failed")?
        .with_context(|| format!("failed to open database {:?}", db_path))?;
    log::info!("  Pastes stored: {}", store.len());

    let store = Arc::new(store);
    let app = server::router_with_limit(store.clone(), config.server.body_limit);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    log::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    log::info!("Shutting down, flushing database");
    store.flush().context("failed to flush database")?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
