//! Bot process context handed to every command and service

use std::sync::Arc;

use bb_common::config::BotConfig;
use sqlx::SqlitePool;
use tokio::sync::mpsc;
use tracing::warn;

use crate::commands::{self, CommandRegistry};
use crate::reply::Reply;

/// Shared state of the bot process
///
/// Built once at startup and dropped at shutdown.
pub struct BotContext {
    pub db: SqlitePool,
    pub config: BotConfig,
    /// Chat command table, reachable from handlers so `help` can list it
    pub commands: Arc<CommandRegistry>,
    announcements: mpsc::Sender<Reply>,
}

impl BotContext {
    pub fn new(db: SqlitePool, config: BotConfig, announcements: mpsc::Sender<Reply>) -> Self {
        Self {
            commands: Arc::new(commands::command_table(&config.prefix)),
            db,
            config,
            announcements,
        }
    }

    /// Start an embed reply with the configured color, linking to `url`
    pub fn embed(&self, title: impl Into<String>, url: impl Into<String>) -> Reply {
        Reply::embed(title, url).with_color(self.config.embed_color.clone())
    }

    /// Queue a message for the announcement channel
    ///
    /// Never waits: a full or closed channel drops the announcement.
    pub fn announce(&self, reply: Reply) {
        if let Err(e) = self.announcements.try_send(reply) {
            warn!("Announcement dropped: {}", e);
        }
    }
}
