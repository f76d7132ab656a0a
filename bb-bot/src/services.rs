//! Services the command bridge can trigger in the bot process

use std::sync::Arc;

use bb_common::bridge::ServiceRegistry;
use bb_common::countdown::format_countdown;
use bb_common::db::{self, Contest};
use chrono::{DateTime, Duration, Utc};
use tracing::{error, info, warn};

use crate::context::BotContext;
use crate::reply::Reply;

/// How far ahead `hourLeft` looks
const REMINDER_WINDOW_MINUTES: i64 = 60;

pub fn service_table() -> ServiceRegistry<BotContext> {
    let mut services: ServiceRegistry<BotContext> = ServiceRegistry::new("Service");
    services
        .register("test", "Checks that the bridge is wired up", "bb-trigger test", bridge_test)
        .register(
            "hourLeft",
            "Announces battles whose current phase ends within the hour",
            "bb-trigger hourLeft",
            hour_left,
        )
        .register(
            "announce",
            "Posts its arguments to the announcement channel",
            "bb-trigger announce <text>",
            announce,
        );
    services
}

/// Running contests whose current phase ends in `(now, now + window]`, soonest first
pub fn closing_within(contests: &[Contest], now: DateTime<Utc>, window: Duration) -> Vec<&Contest> {
    let mut closing: Vec<&Contest> = contests
        .iter()
        .filter(|c| {
            c.active_deadline()
                .is_some_and(|deadline| deadline > now && deadline <= now + window)
        })
        .collect();
    closing.sort_by_key(|c| c.active_deadline());
    closing
}

/// Reminder text for one contest
pub fn reminder(contest: &Contest, now: DateTime<Utc>) -> Option<String> {
    let deadline = contest.active_deadline()?;
    let phase = match contest.status {
        db::ContestStatus::Entry => "submissions",
        _ => "voting",
    };
    Some(format!(
        "Battle {} is closing {} in: {}",
        contest.display_title(),
        phase,
        format_countdown(deadline, now)
    ))
}

async fn bridge_test(_ctx: Arc<BotContext>, _args: Vec<String>) {
    info!("Socket set up correctly!");
}

async fn hour_left(ctx: Arc<BotContext>, _args: Vec<String>) {
    let contests = match db::list_running_contests(&ctx.db).await {
        Ok(contests) => contests,
        Err(e) => {
            error!("hourLeft: could not load battles: {}", e);
            return;
        }
    };

    let now = Utc::now();
    let closing = closing_within(&contests, now, Duration::minutes(REMINDER_WINDOW_MINUTES));
    info!("hourLeft: {} battle(s) closing within the hour", closing.len());

    for contest in closing {
        if let Some(text) = reminder(contest, now) {
            ctx.announce(Reply::text(text));
        }
    }
}

async fn announce(ctx: Arc<BotContext>, args: Vec<String>) {
    let text = args.join(" ");
    if text.trim().is_empty() {
        warn!("announce called without text");
        return;
    }
    ctx.announce(Reply::text(text));
}
