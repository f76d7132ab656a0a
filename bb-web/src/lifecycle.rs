//! Contest lifecycle sweeper
//!
//! Moves contests from entry to voting and from voting to closed once their
//! deadlines pass, and tells live pages about it.

use std::time::Duration;

use bb_common::db::{self, StatusChange};
use bb_common::events::{BattleEvent, EventBus};
use bb_common::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error};

/// Apply every due status change and announce each on the event bus
pub async fn sweep_once(db: &SqlitePool, events: &EventBus, now: DateTime<Utc>) -> Result<Vec<StatusChange>> {
    let changes = db::advance_due_contests(db, now).await?;

    for change in &changes {
        events.emit_lossy(BattleEvent::ContestStatusChanged {
            battle_id: change.battle_id,
            old_status: change.from,
            new_status: change.to,
            timestamp: now,
        });
    }

    Ok(changes)
}

/// Sweep every `period` until the task is aborted
pub fn spawn_sweeper(state: crate::AppState, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = interval(period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tick.tick().await;

            match sweep_once(&state.db, &state.events, Utc::now()).await {
                Ok(changes) if changes.is_empty() => {}
                Ok(changes) => debug!("Lifecycle sweep applied {} change(s)", changes.len()),
                Err(e) => error!("Lifecycle sweep failed: {}", e),
            }
        }
    })
}
