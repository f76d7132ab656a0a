//! Beat battle chat bot (bb-bot) - Main entry point
//!
//! Runs the command bridge server and a console chat gateway side by side.
//! The bridge keeps serving after the console input closes; the process ends
//! on Ctrl+C or SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use bb_common::bridge::{BridgeListener, BridgeServer};
use bb_common::config::BattleConfig;
use clap::Parser;
use tokio::io::BufReader;
use tokio::signal;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bb_bot::{forward_announcements, service_table, BotContext, ConsoleGateway};

/// Announcements queued before the gateway writes them
const ANNOUNCEMENT_CAPACITY: usize = 32;

/// Command-line arguments for bb-bot
#[derive(Parser, Debug)]
#[command(name = "bb-bot")]
#[command(about = "Beat battle chat bot and command bridge server")]
#[command(version)]
struct Args {
    /// Config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SQLite database file
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Chat command prefix
    #[arg(short, long)]
    prefix: Option<String>,

    /// Bridge endpoint to listen on (`host:port` or `unix:/path`)
    #[arg(short, long)]
    endpoint: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the console chat
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bb_bot=debug,bb_common=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    info!("Starting bb-bot v{}", env!("CARGO_PKG_VERSION"));

    let mut config = BattleConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(database) = args.database {
        config.database_path = database;
    }
    if let Some(prefix) = args.prefix {
        config.bot.prefix = prefix;
    }
    if let Some(endpoint) = args.endpoint {
        config.bridge.endpoint = endpoint;
    }

    info!("Database: {}", config.database_path.display());
    let db = bb_common::db::init_database(&config.database_path)
        .await
        .context("Failed to open database")?;

    let (announce_tx, announce_rx) = mpsc::channel(ANNOUNCEMENT_CAPACITY);
    let ctx = Arc::new(BotContext::new(db, config.bot.clone(), announce_tx));
    info!(
        "Command prefix '{}' ({} commands)",
        ctx.config.prefix,
        ctx.commands.len()
    );

    // Command bridge
    let endpoint = config.bridge.endpoint().context("Invalid bridge endpoint")?;
    let listener = BridgeListener::bind(&endpoint)
        .await
        .with_context(|| format!("Failed to bind bridge endpoint {}", endpoint))?;
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let server = BridgeServer::new(service_table(), ctx.clone());
    let bridge = tokio::spawn(server.run(listener, async move {
        let _ = shutdown_rx.changed().await;
    }));

    // Console chat
    let gateway = ConsoleGateway::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout());
    let console_ctx = ctx.clone();
    let console = tokio::spawn(async move {
        match gateway.run(console_ctx, announce_rx).await {
            Ok((stdout, announcements)) => {
                info!("Console input closed; command bridge still running");
                if let Err(e) = forward_announcements(announcements, stdout).await {
                    error!("Announcement output failed: {}", e);
                }
            }
            Err(e) => error!("Console gateway failed: {}", e),
        }
    });

    shutdown_signal().await;

    let _ = shutdown_tx.send(true);
    console.abort();
    match bridge.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Command bridge failed: {}", e),
        Err(e) => error!("Command bridge task failed: {}", e),
    }

    info!("Bot shutdown complete");
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
