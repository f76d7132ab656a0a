//! Beat battle web service (bb-web) - Main entry point
//!
//! Serves the battle page actions and the live event stream, and runs the
//! sweeper that moves contests through their phases.

use std::path::PathBuf;

use anyhow::{Context, Result};
use bb_common::config::BattleConfig;
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bb_web::{build_router, lifecycle, AppState};

/// Command-line arguments for bb-web
#[derive(Parser, Debug)]
#[command(name = "bb-web")]
#[command(about = "Beat battle web service")]
#[command(version)]
struct Args {
    /// Config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SQLite database file
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Address to listen on, e.g. 127.0.0.1:5760
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bb_web=debug,bb_common=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting bb-web v{}", env!("CARGO_PKG_VERSION"));

    let mut config = BattleConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(database) = args.database {
        config.database_path = database;
    }
    if let Some(bind) = args.bind {
        config.web.bind = bind;
    }

    info!("Database: {}", config.database_path.display());
    let db = bb_common::db::init_database(&config.database_path)
        .await
        .context("Failed to open database")?;

    let state = AppState::new(db);
    let sweeper = lifecycle::spawn_sweeper(state.clone(), config.sweep_interval());
    info!("Lifecycle sweeper running every {:?}", config.sweep_interval());

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.web.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.web.bind))?;
    info!("Listening on http://{}", config.web.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    sweeper.abort();
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
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
            Ok(mut stream) => {
                stream.recv().await;
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
