//! catsnap - tagged image service
//!
//! Serves the HTTP API, stores image blobs under the root folder and runs
//! background jobs for requests that committed.

use anyhow::{Context, Result};
use catsnap_common::config::{CompiledDefaults, RootFolderInitializer, RootFolderResolver, TomlConfig};
use catsnap_common::db::init_database;
use catsnap_common::document::SqliteDocumentStore;
use clap::Parser;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use catsnap_web::config::{CliOverrides, ServiceConfig};
use catsnap_web::fetch::ImageFetcher;
use catsnap_web::jobs::{TaskQueue, WorkerContext, WorkerPool};
use catsnap_web::storage::FilesystemBlobStore;
use catsnap_web::{build_router, AppState};

const MODULE_NAME: &str = "catsnap";

/// Command-line arguments for catsnap
#[derive(Parser, Debug)]
#[command(name = "catsnap")]
#[command(about = "Tagged image service")]
#[command(version)]
struct Args {
    /// Root folder holding the database and images
    #[arg(short, long, env = "CATSNAP_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "CATSNAP_BIND")]
    bind: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "CATSNAP_PORT")]
    port: Option<u16>,

    /// Base URL blobs are served under
    #[arg(long, env = "CATSNAP_PUBLIC_BASE_URL")]
    public_base_url: Option<String>,

    /// Number of concurrent background jobs
    #[arg(short, long, env = "CATSNAP_WORKERS")]
    workers: Option<usize>,

    /// Log level or filter directives, e.g. "debug" or "catsnap_web=trace"
    #[arg(long, env = "CATSNAP_LOG")]
    log_level: Option<String>,
}

fn init_tracing(config: &ServiceConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .context("Invalid log level")?;

    let file_layer = match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Arc::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Read config before tracing exists; problems are logged once it does
    let toml_result = TomlConfig::load(MODULE_NAME);
    let toml_config = toml_result.as_ref().ok().cloned().flatten().unwrap_or_default();

    let cli = CliOverrides {
        bind_address: args.bind.clone(),
        port: args.port,
        public_base_url: args.public_base_url.clone(),
        workers: args.workers,
        log_level: args.log_level.clone(),
    };
    let config = ServiceConfig::resolve(&cli, &toml_config, &CompiledDefaults::for_current_platform());

    init_tracing(&config)?;

    // Log build identification immediately after tracing init
    info!(
        "Starting catsnap v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    if let Err(e) = &toml_result {
        warn!("Ignoring config file: {}", e);
    }

    let root_folder = RootFolderResolver::new(MODULE_NAME)
        .with_override(args.root_folder)
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to create root folder")?;
    info!("Root folder: {}", initializer.root_folder().display());

    let db_path = initializer.database_path();
    let pool = init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    info!("✓ Database ready: {}", db_path.display());

    let documents = Arc::new(SqliteDocumentStore::new(pool.clone()));
    let images_dir = initializer.images_path();
    let blobs = Arc::new(FilesystemBlobStore::new(
        images_dir.clone(),
        &config.public_base_url,
    ));

    let (queue, receiver) = TaskQueue::new(config.queue_capacity);
    let shutdown = CancellationToken::new();
    let workers = WorkerPool::spawn(
        WorkerContext::new(pool.clone(), documents.clone(), blobs.clone()),
        receiver,
        config.worker_count,
        shutdown.clone(),
    );

    let fetcher = ImageFetcher::new().context("Failed to create HTTP client")?;
    let state = AppState::new(pool.clone(), queue, documents, blobs, images_dir, fetcher);
    let app = build_router(state);

    let addr = config.listen_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("catsnap listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // In-flight requests are done; let running jobs finish
    shutdown.cancel();
    if let Err(e) = workers.await {
        warn!("Job workers ended abnormally: {}", e);
    }

    pool.close().await;
    info!("Shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
