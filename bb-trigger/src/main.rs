//! Command bridge trigger (bb-trigger) - Main entry point
//!
//! Asks a running bb-bot to run one service, e.g. from cron:
//!
//! ```text
//! bb-trigger hourLeft
//! bb-trigger announce Voting is now open
//! ```
//!
//! Delivery is fire-and-forget. When the bot cannot be reached the trigger
//! logs a warning and still exits successfully, so schedulers do not retry a
//! reminder that would arrive late.

use std::path::PathBuf;

use anyhow::{Context, Result};
use bb_common::bridge::{BridgeClient, ServiceInvocation};
use bb_common::config::BattleConfig;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for bb-trigger
#[derive(Parser, Debug)]
#[command(name = "bb-trigger")]
#[command(about = "Run a bb-bot service over the command bridge")]
#[command(version)]
struct Args {
    /// Config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bridge endpoint of the bot (`host:port` or `unix:/path`)
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Connection attempts before giving up
    #[arg(short, long)]
    retries: Option<u32>,

    /// Milliseconds to keep the connection open after sending
    #[arg(long)]
    grace_ms: Option<u64>,

    /// Service to run
    service: String,

    /// Arguments passed to the service
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bb_trigger=info,bb_common=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    info!("Starting bb-trigger v{}", env!("CARGO_PKG_VERSION"));

    let mut config = BattleConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(endpoint) = args.endpoint {
        config.bridge.endpoint = endpoint;
    }
    if let Some(retries) = args.retries {
        config.bridge.max_retries = retries;
    }
    if let Some(grace_ms) = args.grace_ms {
        config.bridge.grace_ms = grace_ms;
    }

    let client_config = config.bridge.client_config().context("Invalid bridge endpoint")?;
    let invocation = ServiceInvocation::new(args.service, args.args);

    let mut client = BridgeClient::new(client_config);
    match client.invoke(&invocation).await {
        Ok(()) => info!("Service {} triggered", invocation.service_name),
        Err(e) => warn!("Service {} not delivered: {}", invocation.service_name, e),
    }

    Ok(())
}
