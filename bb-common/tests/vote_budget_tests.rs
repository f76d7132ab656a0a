//! Vote budget manager against a real (in-memory) database

use std::sync::Arc;

use bb_common::db::{self, ContestStatus, NewContest};
use bb_common::votes::VoteError;
use bb_common::{Error, VoteBudgetManager, VoteOutcome};
use chrono::{Duration, Utc};
use sqlx::SqlitePool;

const HOST: i64 = 1;
const VOTER: i64 = 50;

struct Fixture {
    pool: SqlitePool,
    battle_id: i64,
    /// Entries by artists 11, 12, 13, 14
    entries: Vec<i64>,
}

async fn fixture(max_votes: u32) -> Fixture {
    let pool = db::init_memory_database().await.unwrap();
    fixture_on(pool, max_votes).await
}

async fn fixture_on(pool: SqlitePool, max_votes: u32) -> Fixture {
    let now = Utc::now();
    let battle_id = db::insert_contest(
        &pool,
        &NewContest {
            title: "Sample Flip".to_string(),
            host_id: HOST,
            submission_deadline: now + Duration::days(1),
            voting_deadline: now + Duration::days(2),
            max_votes,
            draft: false,
        },
    )
    .await
    .unwrap();

    let mut entries = Vec::new();
    for artist in 11..=14 {
        let url = format!("https://soundcloud.com/artist{}/flip", artist);
        entries.push(db::insert_entry(&pool, battle_id, artist, &url).await.unwrap());
    }

    db::set_contest_status(&pool, battle_id, ContestStatus::Voting).await.unwrap();
    Fixture {
        pool,
        battle_id,
        entries,
    }
}

fn vote_error(err: Error) -> VoteError {
    match err {
        Error::Vote(e) => e,
        other => panic!("expected a vote rejection, got {}", other),
    }
}

#[tokio::test]
async fn test_allowance_of_three_scenario() {
    let f = fixture(3).await;
    let manager = VoteBudgetManager::new(f.pool.clone());
    let [a, b, c, d] = [f.entries[0], f.entries[1], f.entries[2], f.entries[3]];

    manager.cast_vote(VOTER, f.battle_id, a).await.unwrap();
    manager.cast_vote(VOTER, f.battle_id, b).await.unwrap();
    let ledger = manager.cast_vote(VOTER, f.battle_id, c).await.unwrap();
    assert_eq!(ledger.votes_remaining(), 0);

    let err = manager.cast_vote(VOTER, f.battle_id, d).await.unwrap_err();
    assert_eq!(vote_error(err), VoteError::NoVotesRemaining);

    let ledger = manager.retract_vote(VOTER, f.battle_id, a).await.unwrap();
    assert_eq!(ledger.votes_remaining(), 1);

    let ledger = manager.cast_vote(VOTER, f.battle_id, d).await.unwrap();
    assert_eq!(ledger.votes_remaining(), 0);
    assert!(ledger.has_voted(d));
    assert!(!ledger.has_voted(a));

    // Stored tallies follow the ledger
    let entries = db::load_entries(&f.pool, f.battle_id, Some(VOTER)).await.unwrap();
    let tally = |id: i64| entries.iter().find(|e| e.id == id).map(|e| (e.votes, e.user_voted));
    assert_eq!(tally(a), Some((0, false)));
    assert_eq!(tally(d), Some((1, true)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_casts_for_last_vote() {
    // File-backed pool so every cast gets its own connection
    let dir = tempfile::tempdir().unwrap();
    let pool = db::init_database(&dir.path().join("battles.db")).await.unwrap();
    let f = fixture_on(pool, 1).await;
    let manager = Arc::new(VoteBudgetManager::new(f.pool.clone()));

    let mut handles = Vec::new();
    for &entry in &f.entries {
        let manager = manager.clone();
        let battle_id = f.battle_id;
        handles.push(tokio::spawn(async move {
            manager.cast_vote(VOTER, battle_id, entry).await
        }));
    }

    let mut accepted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(err) => assert_eq!(vote_error(err), VoteError::NoVotesRemaining),
        }
    }
    assert_eq!(accepted, 1);

    let ledger = manager.ledger(VOTER, f.battle_id).await.unwrap();
    assert_eq!(ledger.votes_cast().len(), 1);
    assert_eq!(ledger.votes_remaining(), 0);
}

#[tokio::test]
async fn test_toggle_casts_then_retracts() {
    let f = fixture(2).await;
    let manager = VoteBudgetManager::new(f.pool.clone());
    let entry = f.entries[0];

    let (outcome, ledger) = manager.toggle_vote(VOTER, f.battle_id, entry).await.unwrap();
    assert_eq!(outcome, VoteOutcome::Cast);
    assert_eq!(ledger.votes_remaining(), 1);

    let (outcome, ledger) = manager.toggle_vote(VOTER, f.battle_id, entry).await.unwrap();
    assert_eq!(outcome, VoteOutcome::Retracted);
    assert_eq!(ledger.votes_remaining(), 2);
}

#[tokio::test]
async fn test_own_entry_is_rejected() {
    let f = fixture(3).await;
    let manager = VoteBudgetManager::new(f.pool.clone());

    // Artist 11 owns the first entry
    let err = manager.cast_vote(11, f.battle_id, f.entries[0]).await.unwrap_err();
    assert_eq!(vote_error(err), VoteError::OwnEntry(f.entries[0]));
}

#[tokio::test]
async fn test_double_cast_and_missing_retract() {
    let f = fixture(3).await;
    let manager = VoteBudgetManager::new(f.pool.clone());
    let entry = f.entries[1];

    manager.cast_vote(VOTER, f.battle_id, entry).await.unwrap();
    let err = manager.cast_vote(VOTER, f.battle_id, entry).await.unwrap_err();
    assert_eq!(vote_error(err), VoteError::AlreadyVoted(entry));

    let err = manager.retract_vote(VOTER, f.battle_id, f.entries[2]).await.unwrap_err();
    assert_eq!(vote_error(err), VoteError::NotVoted(f.entries[2]));

    let ledger = manager.ledger(VOTER, f.battle_id).await.unwrap();
    assert_eq!(ledger.votes_remaining(), 2);
}

#[tokio::test]
async fn test_voting_phase_required_for_cast_and_retract() {
    let f = fixture(3).await;
    let manager = VoteBudgetManager::new(f.pool.clone());
    let entry = f.entries[0];
    manager.cast_vote(VOTER, f.battle_id, entry).await.unwrap();

    db::set_contest_status(&f.pool, f.battle_id, ContestStatus::Closed).await.unwrap();

    let err = manager.retract_vote(VOTER, f.battle_id, entry).await.unwrap_err();
    assert_eq!(vote_error(err), VoteError::ContestNotVoting(ContestStatus::Closed));
    let err = manager.cast_vote(VOTER, f.battle_id, f.entries[1]).await.unwrap_err();
    assert_eq!(vote_error(err), VoteError::ContestNotVoting(ContestStatus::Closed));

    // The vote cast before closing is still counted
    let ledger = manager.ledger(VOTER, f.battle_id).await.unwrap();
    assert!(ledger.has_voted(entry));
}

#[tokio::test]
async fn test_entry_from_other_contest_is_unknown() {
    let f = fixture(3).await;
    let manager = VoteBudgetManager::new(f.pool.clone());

    let err = manager.cast_vote(VOTER, f.battle_id, 9999).await.unwrap_err();
    assert_eq!(vote_error(err), VoteError::UnknownEntry(9999));

    let err = manager.cast_vote(VOTER, 4242, f.entries[0]).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}
