//! bb-bot library - Beat battle chat bot
//!
//! Answers prefixed chat commands about running battles and hosts the command
//! bridge server that lets `bb-trigger` run bot services (reminders,
//! announcements) from outside the process.

pub mod commands;
pub mod context;
pub mod gateway;
pub mod reply;
pub mod services;

pub use commands::{command_table, handle_message, parse_message, CommandRegistry};
pub use context::BotContext;
pub use gateway::{forward_announcements, ConsoleGateway};
pub use reply::{Field, Reply};
pub use services::service_table;
