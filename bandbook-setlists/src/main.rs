//! bandbook-setlists - setlist builder service
//!
//! Serves the song catalog and setlist submit endpoints over an embedded
//! SQLite database.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use bandbook_common::config::{config_file_in_use, database_path, resolve_root_folder, TomlConfig};
use bandbook_common::db::init_database;
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bandbook_setlists::{build_router, AppState, BuilderSettings};

/// Command-line arguments for bandbook-setlists
#[derive(Parser, Debug)]
#[command(name = "bandbook-setlists")]
#[command(about = "Setlist builder service for Bandbook")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "BANDBOOK_PORT")]
    port: Option<u16>,

    /// Folder holding bandbook.db
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Path to config.toml (default: ~/.config/bandbook/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    bind: std::net::IpAddr,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Loaded before the subscriber exists, so its own log lines are dropped.
    // The source is logged again below once tracing is up.
    let config = TomlConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // RUST_LOG wins over the config file level
    let level = &config.logging.level;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "bandbook_setlists={level},bandbook_common={level},tower_http={level}"
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Build identification first, before any database work
    info!(
        "Starting bandbook-setlists v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match config_file_in_use(args.config.as_deref()) {
        Some(path) => info!("Configuration file: {}", path.display()),
        None => info!("No configuration file, using compiled defaults"),
    }

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), &config);
    let db_path = database_path(&root_folder);
    info!("Database path: {}", db_path.display());

    let pool = init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    let settings = BuilderSettings::load(&pool)
        .await
        .context("Failed to load runtime settings")?;
    info!(
        "Settings: search debounce {:?}, result limit {}, {} songs per seeded set",
        settings.search_debounce, settings.search_result_limit, settings.max_songs_per_set
    );

    let app = build_router(AppState::new(pool, settings));

    let port = args.port.unwrap_or(config.port);
    let addr = SocketAddr::new(args.bind, port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("bandbook-setlists listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
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
