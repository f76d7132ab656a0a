//! Contest (battle) queries

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{sqlite::SqliteRow, Row, SqliteExecutor, SqlitePool};
use tracing::info;

use super::models::{Contest, ContestStatus, NewContest};
use crate::Result;

const CONTEST_COLUMNS: &str =
    "id, title, host_id, status, deadline, voting_deadline, max_votes";

/// One applied lifecycle step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusChange {
    pub battle_id: i64,
    pub from: ContestStatus,
    pub to: ContestStatus,
}

fn contest_from_row(row: &SqliteRow) -> Result<Contest> {
    let status: String = row.try_get("status")?;
    let max_votes: i64 = row.try_get("max_votes")?;
    Ok(Contest {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        host_id: row.try_get("host_id")?,
        status: status.parse()?,
        submission_deadline: row.try_get("deadline")?,
        voting_deadline: row.try_get("voting_deadline")?,
        max_votes: max_votes.max(0) as u32,
    })
}

/// Create a contest, returning its id
pub async fn insert_contest(pool: &SqlitePool, new: &NewContest) -> Result<i64> {
    new.validate()?;

    let status = if new.draft {
        ContestStatus::Draft
    } else {
        ContestStatus::Entry
    };

    let result = sqlx::query(
        "INSERT INTO battles (title, host_id, status, deadline, voting_deadline, max_votes)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&new.title)
    .bind(new.host_id)
    .bind(status.as_str())
    .bind(new.submission_deadline)
    .bind(new.voting_deadline)
    .bind(new.max_votes as i64)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Load one contest
pub async fn get_contest<'e, E>(executor: E, battle_id: i64) -> Result<Option<Contest>>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query(&format!("SELECT {} FROM battles WHERE id = ?", CONTEST_COLUMNS))
        .bind(battle_id)
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(contest_from_row).transpose()
}

/// Contests currently accepting entries or votes, soonest deadline first
pub async fn list_running_contests(pool: &SqlitePool) -> Result<Vec<Contest>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM battles WHERE status IN ('entry', 'voting') ORDER BY deadline, id",
        CONTEST_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    rows.iter().map(contest_from_row).collect()
}

/// Overwrite a contest's status
pub async fn set_contest_status(
    pool: &SqlitePool,
    battle_id: i64,
    status: ContestStatus,
) -> Result<()> {
    sqlx::query("UPDATE battles SET status = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(battle_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Apply every lifecycle step that is due at `now`
///
/// The update is conditional on the status read, so two sweepers racing on
/// the same contest apply each step once.
pub async fn advance_due_contests(pool: &SqlitePool, now: DateTime<Utc>) -> Result<Vec<StatusChange>> {
    let mut changes = Vec::new();

    for contest in list_running_contests(pool).await? {
        let Some(next) = contest.due_transition(now) else {
            continue;
        };

        let updated = sqlx::query("UPDATE battles SET status = ? WHERE id = ? AND status = ?")
            .bind(next.as_str())
            .bind(contest.id)
            .bind(contest.status.as_str())
            .execute(pool)
            .await?
            .rows_affected();

        if updated == 1 {
            info!(
                "Battle {} ({}) moved from {} to {}",
                contest.id,
                contest.display_title(),
                contest.status,
                next
            );
            changes.push(StatusChange {
                battle_id: contest.id,
                from: contest.status,
                to: next,
            });
        }
    }

    Ok(changes)
}
