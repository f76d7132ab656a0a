//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ranking::{Placement, Rankable};
use crate::{Error, Result};

/// Smallest and largest per-user vote allowance a contest may be created with
pub const MIN_VOTE_ALLOWANCE: u32 = 1;
pub const MAX_VOTE_ALLOWANCE: u32 = 10;

/// Contest phase
///
/// Published contests only move forward: entry → voting → closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContestStatus {
    /// Saved by the host but not yet published
    Draft,
    /// Accepting submissions
    Entry,
    /// Submissions closed, votes being cast
    Voting,
    /// Results frozen
    Closed,
}

impl ContestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContestStatus::Draft => "draft",
            ContestStatus::Entry => "entry",
            ContestStatus::Voting => "voting",
            ContestStatus::Closed => "closed",
        }
    }
}

impl std::fmt::Display for ContestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContestStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "draft" => Ok(ContestStatus::Draft),
            "entry" => Ok(ContestStatus::Entry),
            "voting" => Ok(ContestStatus::Voting),
            // Older rows used "complete" for finished contests
            "closed" | "complete" => Ok(ContestStatus::Closed),
            other => Err(Error::InvalidInput(format!("Unknown contest status: {}", other))),
        }
    }
}

/// A beat battle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contest {
    pub id: i64,
    pub title: String,
    pub host_id: i64,
    pub status: ContestStatus,
    pub submission_deadline: DateTime<Utc>,
    pub voting_deadline: DateTime<Utc>,
    /// Votes each user may cast in this contest
    pub max_votes: u32,
}

impl Contest {
    /// Title with stored HTML apostrophe entities turned back into `'`
    pub fn display_title(&self) -> String {
        self.title.replace("&#39;", "'")
    }

    /// Deadline that ends the current phase, if the contest is running
    pub fn active_deadline(&self) -> Option<DateTime<Utc>> {
        match self.status {
            ContestStatus::Entry => Some(self.submission_deadline),
            ContestStatus::Voting => Some(self.voting_deadline),
            ContestStatus::Draft | ContestStatus::Closed => None,
        }
    }

    /// Phase the contest should be in at `now`, when that differs from the stored one
    ///
    /// Only a single step is returned; an entry-phase contest whose voting
    /// deadline has also passed moves to voting now and closes on the next sweep.
    pub fn due_transition(&self, now: DateTime<Utc>) -> Option<ContestStatus> {
        match self.status {
            ContestStatus::Entry if now >= self.submission_deadline => Some(ContestStatus::Voting),
            ContestStatus::Voting if now >= self.voting_deadline => Some(ContestStatus::Closed),
            _ => None,
        }
    }
}

/// Fields needed to create a contest
#[derive(Debug, Clone, Deserialize)]
pub struct NewContest {
    pub title: String,
    pub host_id: i64,
    pub submission_deadline: DateTime<Utc>,
    pub voting_deadline: DateTime<Utc>,
    pub max_votes: u32,
    #[serde(default)]
    pub draft: bool,
}

impl NewContest {
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::InvalidInput("Contest title is empty".to_string()));
        }
        if !(MIN_VOTE_ALLOWANCE..=MAX_VOTE_ALLOWANCE).contains(&self.max_votes) {
            return Err(Error::InvalidInput(format!(
                "max_votes must be between {} and {} (got {})",
                MIN_VOTE_ALLOWANCE, MAX_VOTE_ALLOWANCE, self.max_votes
            )));
        }
        if self.voting_deadline <= self.submission_deadline {
            return Err(Error::InvalidInput(
                "Voting deadline must come after the submission deadline".to_string(),
            ));
        }
        Ok(())
    }
}

/// A submitted beat as seen by one viewer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: i64,
    pub battle_id: i64,
    pub artist_id: i64,
    pub url: String,
    /// Rank within the contest; `None` when unranked or disqualified
    pub placement: Option<u32>,
    pub disqualified: bool,
    pub votes: i64,
    pub likes: i64,
    pub user_voted: bool,
    pub user_liked: bool,
    /// The viewer's own feedback on this entry
    pub feedback: Option<String>,
}

impl Rankable for Entry {
    fn entry_id(&self) -> i64 {
        self.id
    }

    fn placement(&self) -> Placement {
        if self.disqualified {
            Placement::Disqualified
        } else {
            self.placement.map(Placement::Ranked).unwrap_or(Placement::Unranked)
        }
    }

    fn set_placement(&mut self, placement: Placement) {
        self.disqualified = placement.is_disqualified();
        self.placement = placement.rank();
    }
}
