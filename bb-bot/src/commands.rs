//! Chat command table
//!
//! Messages look like `<prefix> <command> [args...]`. The command name is
//! matched case-insensitively; a message that is just the prefix runs `help`.

use std::sync::Arc;

use bb_common::countdown::status_line;
use bb_common::db::{self, Contest};
use bb_common::registry::DispatchError;
use bb_common::Registry;
use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::context::BotContext;
use crate::reply::Reply;
use crate::services::reminder;

pub type CommandRegistry = Registry<BotContext, Reply>;

/// Reply to an unknown command keyword
pub const UNKNOWN_COMMAND: &str = "Command Does not Exist!";

const DATABASE_UNAVAILABLE: &str = "Could not load battles right now, try again later.";

/// A prefixed chat message split into command name and arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub name: String,
    pub args: Vec<String>,
}

/// Split a chat message; `None` when it is not addressed to the bot
pub fn parse_message(prefix: &str, content: &str) -> Option<CommandLine> {
    let rest = content.trim().strip_prefix(prefix)?;
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }

    let mut words = rest.split_whitespace();
    let name = words.next().unwrap_or("help").to_lowercase();
    Some(CommandLine {
        name,
        args: words.map(str::to_string).collect(),
    })
}

/// Answer a chat message, if it is a command
pub async fn handle_message(ctx: &Arc<BotContext>, content: &str) -> Option<Reply> {
    let command = parse_message(&ctx.config.prefix, content)?;
    info!("Command submitted: {} {:?}", command.name, command.args);

    match ctx.commands.dispatch(ctx.clone(), &command.name, command.args).await {
        Ok(reply) => Some(reply),
        Err(e) => {
            warn!("{}", e);
            Some(Reply::text(UNKNOWN_COMMAND))
        }
    }
}

/// Build the command table; examples are rendered with `prefix`
pub fn command_table(prefix: &str) -> CommandRegistry {
    let mut commands = CommandRegistry::new("Command");
    commands
        .register(
            "battles",
            "Returns all open battles",
            &format!("{} battles", prefix),
            battles,
        )
        .register(
            "faq",
            "Replies with a link to the FAQ page on the beatbattle website",
            &format!("{} faq", prefix),
            faq,
        )
        .register(
            "help",
            "Returns either a list of commands available or a description of a specific command",
            &format!("{0} help OR {0} help <command>", prefix),
            help,
        )
        .register(
            "search",
            "Returns all open battles based on search query",
            &format!("{} search <search query>", prefix),
            search,
        )
        .register(
            "status",
            "Returns the status of a specific challenge or challenges based on search query",
            &format!("{} status <search query>", prefix),
            status,
        );
    commands
}

// ========================================
// Helpers
// ========================================

/// One field per running contest: display title and phase countdown
fn contest_fields(mut reply: Reply, contests: &[Contest], now: DateTime<Utc>) -> Reply {
    for contest in contests {
        if let Some(line) = status_line(contest, now) {
            reply = reply.field(contest.display_title(), line);
        }
    }
    reply
}

/// Running contests whose display title contains `query`, ignoring case
async fn matching_contests(ctx: &BotContext, query: &str) -> bb_common::Result<Vec<Contest>> {
    let query = query.to_lowercase();
    let contests = db::list_running_contests(&ctx.db).await?;
    Ok(contests
        .into_iter()
        .filter(|c| c.display_title().to_lowercase().contains(&query))
        .collect())
}

fn database_unavailable(command: &str, err: bb_common::Error) -> Reply {
    error!("{} command failed: {}", command, err);
    Reply::text(DATABASE_UNAVAILABLE)
}

// ========================================
// Commands
// ========================================

async fn battles(ctx: Arc<BotContext>, _args: Vec<String>) -> Reply {
    match db::list_running_contests(&ctx.db).await {
        Ok(contests) => contest_fields(
            ctx.embed("beatbattle.app Battles", ctx.config.site_url.clone()),
            &contests,
            Utc::now(),
        ),
        Err(e) => database_unavailable("battles", e),
    }
}

async fn faq(ctx: Arc<BotContext>, _args: Vec<String>) -> Reply {
    ctx.embed(
        "FAQ for beatbattle.app",
        format!("{}/faq", ctx.config.site_url.trim_end_matches('/')),
    )
}

async fn help(ctx: Arc<BotContext>, args: Vec<String>) -> Reply {
    if args.is_empty() {
        let mut reply = ctx.embed("List of Available Commands", ctx.config.site_url.clone());
        for command in ctx.commands.entries() {
            reply = reply.field(command.name.clone(), command.description.clone());
        }
        return reply;
    }

    let query = args.join(" ").to_lowercase();
    match ctx.commands.lookup(&query) {
        Ok(command) => ctx
            .embed(command.name.clone(), ctx.config.site_url.clone())
            .field(command.description.clone(), format!("Example: {}", command.example)),
        Err(DispatchError::NotFound { name, .. }) => Reply::text(format!("Command not found: {}", name)),
    }
}

async fn search(ctx: Arc<BotContext>, args: Vec<String>) -> Reply {
    let query = args.join(" ");
    match matching_contests(&ctx, &query).await {
        Ok(found) if found.is_empty() => Reply::text(format!("No results found for search term: {}", query)),
        Ok(found) => contest_fields(
            ctx.embed(format!("Search Results for: {}", query), ctx.config.site_url.clone()),
            &found,
            Utc::now(),
        ),
        Err(e) => database_unavailable("search", e),
    }
}

async fn status(ctx: Arc<BotContext>, args: Vec<String>) -> Reply {
    let query = args.join(" ");
    let found = match matching_contests(&ctx, &query).await {
        Ok(found) => found,
        Err(e) => return database_unavailable("status", e),
    };
    let now = Utc::now();

    match found.as_slice() {
        [] => Reply::text(format!("No results found for search term: {}", query)),
        [contest] => match reminder(contest, now) {
            Some(text) => Reply::text(text),
            None => Reply::text(format!("No results found for search term: {}", query)),
        },
        many => contest_fields(
            ctx.embed(
                format!("Found multiple battles for search term: {}", query),
                ctx.config.site_url.clone(),
            ),
            many,
            now,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command_and_args() {
        let line = parse_message("!bbot", "!bbot Search Flip  It").unwrap();
        assert_eq!(line.name, "search");
        assert_eq!(line.args, vec!["Flip", "It"]);
    }

    #[test]
    fn test_bare_prefix_is_help() {
        for content in ["!bbot", "  !bbot  "] {
            let line = parse_message("!bbot", content).unwrap();
            assert_eq!(line.name, "help");
            assert!(line.args.is_empty());
        }
    }

    #[test]
    fn test_unaddressed_messages_ignored() {
        assert!(parse_message("!bbot", "hello there").is_none());
        assert!(parse_message("!bbot", "!bbotbattles").is_none());
    }

    #[test]
    fn test_table_contents() {
        let table = command_table("!bbot");
        let names: Vec<_> = table.entries().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["battles", "faq", "help", "search", "status"]);
        assert_eq!(table.lookup("STATUS").unwrap().example, "!bbot status <search query>");
    }
}
