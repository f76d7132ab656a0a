//! Vote budget manager
//!
//! Each user gets a fixed allowance of votes per contest (the contest's
//! `max_votes`). The ledger for (user, contest) tracks which entries the user
//! voted for; remaining votes are always `allowance - |votes_cast|`.
//!
//! Cast and retract are check-then-act sequences. [`VoteBudgetManager`]
//! serializes them per (user, contest) and runs each inside one database
//! transaction, so two concurrent casts for the same user can never both take
//! the last vote.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, info};

use crate::db::{self, ContestStatus};
use crate::locks::KeyedLocks;
use crate::{Error, Result};

/// Vote rejections
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VoteError {
    /// Every vote in the allowance is already spent
    #[error("No votes remaining")]
    NoVotesRemaining,

    /// The user already voted for this entry
    #[error("Already voted for entry {0}")]
    AlreadyVoted(i64),

    /// The user has no vote on this entry to take back
    #[error("No vote on entry {0} to retract")]
    NotVoted(i64),

    /// The contest is not in its voting phase
    #[error("Contest is not open for voting (status: {0})")]
    ContestNotVoting(ContestStatus),

    /// Users cannot vote for their own entry
    #[error("Entry {0} belongs to the voter")]
    OwnEntry(i64),

    /// Entry does not exist in this contest
    #[error("Entry {0} is not part of this contest")]
    UnknownEntry(i64),
}

/// Result of a successful vote operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteOutcome {
    Cast,
    Retracted,
}

/// Per-(user, contest) vote ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "LedgerRepr", from = "LedgerRepr")]
pub struct VoteLedger {
    allowance: u32,
    votes_cast: BTreeSet<i64>,
}

#[derive(Serialize, Deserialize)]
struct LedgerRepr {
    allowance: u32,
    votes_remaining: u32,
    votes_cast: Vec<i64>,
}

impl From<VoteLedger> for LedgerRepr {
    fn from(ledger: VoteLedger) -> Self {
        LedgerRepr {
            allowance: ledger.allowance,
            votes_remaining: ledger.votes_remaining(),
            votes_cast: ledger.votes_cast.into_iter().collect(),
        }
    }
}

impl From<LedgerRepr> for VoteLedger {
    fn from(repr: LedgerRepr) -> Self {
        VoteLedger::with_votes(repr.allowance, repr.votes_cast)
    }
}

impl VoteLedger {
    /// Empty ledger for a fresh (user, contest) pair
    pub fn new(allowance: u32) -> Self {
        Self {
            allowance,
            votes_cast: BTreeSet::new(),
        }
    }

    /// Ledger rebuilt from stored votes
    pub fn with_votes(allowance: u32, votes: impl IntoIterator<Item = i64>) -> Self {
        Self {
            allowance,
            votes_cast: votes.into_iter().collect(),
        }
    }

    pub fn allowance(&self) -> u32 {
        self.allowance
    }

    /// Votes still available; never negative, even if the allowance was lowered
    pub fn votes_remaining(&self) -> u32 {
        self.allowance.saturating_sub(self.votes_cast.len() as u32)
    }

    pub fn votes_cast(&self) -> &BTreeSet<i64> {
        &self.votes_cast
    }

    pub fn has_voted(&self, entry_id: i64) -> bool {
        self.votes_cast.contains(&entry_id)
    }

    /// Spend one vote on `entry_id`; the ledger is unchanged on error
    pub fn cast(&mut self, entry_id: i64) -> std::result::Result<(), VoteError> {
        if self.has_voted(entry_id) {
            return Err(VoteError::AlreadyVoted(entry_id));
        }
        if self.votes_remaining() == 0 {
            return Err(VoteError::NoVotesRemaining);
        }
        self.votes_cast.insert(entry_id);
        Ok(())
    }

    /// Give back the vote on `entry_id`; the ledger is unchanged on error
    pub fn retract(&mut self, entry_id: i64) -> std::result::Result<(), VoteError> {
        if !self.votes_cast.remove(&entry_id) {
            return Err(VoteError::NotVoted(entry_id));
        }
        Ok(())
    }
}

/// Authoritative vote operations backed by the database
pub struct VoteBudgetManager {
    db: SqlitePool,
    locks: KeyedLocks<(i64, i64)>,
}

impl VoteBudgetManager {
    pub fn new(db: SqlitePool) -> Self {
        Self {
            db,
            locks: KeyedLocks::new(),
        }
    }

    /// Current ledger of `user_id` in `battle_id`
    pub async fn ledger(&self, user_id: i64, battle_id: i64) -> Result<VoteLedger> {
        let contest = db::get_contest(&self.db, battle_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Battle {}", battle_id)))?;
        let cast = load_votes(&self.db, user_id, battle_id).await?;
        Ok(VoteLedger::with_votes(contest.max_votes, cast))
    }

    /// Spend one of the user's votes on `entry_id`
    pub async fn cast_vote(&self, user_id: i64, battle_id: i64, entry_id: i64) -> Result<VoteLedger> {
        self.apply(user_id, battle_id, entry_id, Intent::Cast).await.map(|(_, ledger)| ledger)
    }

    /// Take back the user's vote on `entry_id`
    pub async fn retract_vote(&self, user_id: i64, battle_id: i64, entry_id: i64) -> Result<VoteLedger> {
        self.apply(user_id, battle_id, entry_id, Intent::Retract).await.map(|(_, ledger)| ledger)
    }

    /// Retract if the user voted for `entry_id`, cast otherwise
    pub async fn toggle_vote(
        &self,
        user_id: i64,
        battle_id: i64,
        entry_id: i64,
    ) -> Result<(VoteOutcome, VoteLedger)> {
        self.apply(user_id, battle_id, entry_id, Intent::Toggle).await
    }

    async fn apply(
        &self,
        user_id: i64,
        battle_id: i64,
        entry_id: i64,
        intent: Intent,
    ) -> Result<(VoteOutcome, VoteLedger)> {
        let _guard = self.locks.acquire((user_id, battle_id)).await;
        let mut tx = self.db.begin().await?;

        let contest = db::get_contest(&mut *tx, battle_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Battle {}", battle_id)))?;

        // Retraction is held to the same phase rule as casting
        if contest.status != ContestStatus::Voting {
            return Err(VoteError::ContestNotVoting(contest.status).into());
        }

        let owner = db::entry_owner(&mut *tx, entry_id)
            .await?
            .filter(|owner| owner.battle_id == battle_id)
            .ok_or(VoteError::UnknownEntry(entry_id))?;

        let mut ledger = VoteLedger::with_votes(
            contest.max_votes,
            load_votes(&mut *tx, user_id, battle_id).await?,
        );

        let outcome = match intent {
            Intent::Cast => VoteOutcome::Cast,
            Intent::Retract => VoteOutcome::Retracted,
            Intent::Toggle if ledger.has_voted(entry_id) => VoteOutcome::Retracted,
            Intent::Toggle => VoteOutcome::Cast,
        };

        match outcome {
            VoteOutcome::Cast => {
                if owner.artist_id == user_id {
                    return Err(VoteError::OwnEntry(entry_id).into());
                }
                ledger.cast(entry_id)?;
                sqlx::query("INSERT INTO votes (user_id, beat_id, battle_id) VALUES (?, ?, ?)")
                    .bind(user_id)
                    .bind(entry_id)
                    .bind(battle_id)
                    .execute(&mut *tx)
                    .await?;
            }
            VoteOutcome::Retracted => {
                ledger.retract(entry_id)?;
                sqlx::query("DELETE FROM votes WHERE user_id = ? AND beat_id = ?")
                    .bind(user_id)
                    .bind(entry_id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;

        info!(
            "User {} {:?} vote on entry {} in battle {} ({} remaining)",
            user_id,
            outcome,
            entry_id,
            battle_id,
            ledger.votes_remaining()
        );
        Ok((outcome, ledger))
    }
}

#[derive(Debug, Clone, Copy)]
enum Intent {
    Cast,
    Retract,
    Toggle,
}

async fn load_votes<'e, E>(executor: E, user_id: i64, battle_id: i64) -> Result<Vec<i64>>
where
    E: sqlx::SqliteExecutor<'e>,
{
    let votes: Vec<i64> =
        sqlx::query_scalar("SELECT beat_id FROM votes WHERE user_id = ? AND battle_id = ? ORDER BY beat_id")
            .bind(user_id)
            .bind(battle_id)
            .fetch_all(executor)
            .await?;
    debug!("Loaded {} votes for user {} in battle {}", votes.len(), user_id, battle_id);
    Ok(votes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: i64 = 1;
    const B: i64 = 2;
    const C: i64 = 3;
    const D: i64 = 4;

    fn assert_balanced(ledger: &VoteLedger) {
        assert_eq!(
            ledger.votes_remaining() as usize + ledger.votes_cast().len(),
            ledger.allowance() as usize
        );
    }

    #[test]
    fn test_allowance_of_three_scenario() {
        let mut ledger = VoteLedger::new(3);
        ledger.cast(A).unwrap();
        ledger.cast(B).unwrap();
        ledger.cast(C).unwrap();
        assert_eq!(ledger.votes_remaining(), 0);

        assert_eq!(ledger.cast(D), Err(VoteError::NoVotesRemaining));

        ledger.retract(A).unwrap();
        assert_eq!(ledger.votes_remaining(), 1);

        ledger.cast(D).unwrap();
        assert_eq!(ledger.votes_remaining(), 0);
        assert_eq!(ledger.votes_cast().iter().copied().collect::<Vec<_>>(), vec![B, C, D]);
    }

    #[test]
    fn test_rejected_cast_leaves_state_unchanged() {
        let mut ledger = VoteLedger::with_votes(1, [A]);
        let before = ledger.clone();
        assert_eq!(ledger.cast(B), Err(VoteError::NoVotesRemaining));
        assert_eq!(ledger, before);
    }

    #[test]
    fn test_double_cast_is_rejected() {
        let mut ledger = VoteLedger::new(5);
        ledger.cast(A).unwrap();
        assert_eq!(ledger.cast(A), Err(VoteError::AlreadyVoted(A)));
        assert_eq!(ledger.votes_remaining(), 4);
    }

    #[test]
    fn test_retract_without_vote() {
        let mut ledger = VoteLedger::new(2);
        assert_eq!(ledger.retract(A), Err(VoteError::NotVoted(A)));
        assert_eq!(ledger.votes_remaining(), 2);
    }

    #[test]
    fn test_balance_holds_over_mixed_sequence() {
        let mut ledger = VoteLedger::new(2);
        let steps: [(bool, i64); 10] = [
            (true, A),
            (true, A),
            (true, B),
            (true, C),
            (false, C),
            (false, A),
            (true, C),
            (true, D),
            (false, B),
            (true, B),
        ];
        for (cast, entry) in steps {
            let _ = if cast { ledger.cast(entry) } else { ledger.retract(entry) };
            assert_balanced(&ledger);
        }
    }

    #[test]
    fn test_lowered_allowance_saturates() {
        let ledger = VoteLedger::with_votes(1, [A, B]);
        assert_eq!(ledger.votes_remaining(), 0);
    }

    #[test]
    fn test_ledger_json_includes_remaining() {
        let json = serde_json::to_value(VoteLedger::with_votes(3, [B, A])).unwrap();
        assert_eq!(json["votes_remaining"], 1);
        assert_eq!(json["votes_cast"], serde_json::json!([A, B]));
    }
}
