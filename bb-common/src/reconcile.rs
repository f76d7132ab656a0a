//! Optimistic client state
//!
//! A client may show a vote, like or disqualification before the server has
//! answered. [`PendingOverlay`] keeps those as layers over the last
//! authoritative entry list instead of editing that list in place: the
//! response tag either commits a layer into the canonical list or discards it.
//! A rejected request therefore can never leave the display diverged from the
//! server.

use std::collections::BTreeSet;

use crate::api::OutcomeTag;
use crate::db::Entry;
use crate::ranking::{self, Rankable, Standing};

/// Kind of optimistic mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Mutation {
    Vote,
    Like,
    Disqualify,
}

impl Mutation {
    /// Tags that confirm this kind of mutation
    fn confirmed_by(self, tag: OutcomeTag) -> bool {
        matches!(
            (self, tag),
            (Mutation::Vote, OutcomeTag::SuccessVote | OutcomeTag::SuccessDelVote)
                | (Mutation::Like, OutcomeTag::Liked | OutcomeTag::Unliked)
                | (Mutation::Disqualify, OutcomeTag::Disqualified | OutcomeTag::Requalified)
        )
    }
}

/// What `resolve` did with a pending layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Committed,
    RolledBack,
    /// Rolled back, and the server showed the canonical vote state was out of
    /// date; it has been corrected, but standings and ledger should be refetched
    Stale,
    /// No such layer was pending
    Ignored,
}

/// Canonical entries plus pending optimistic layers
#[derive(Debug, Clone)]
pub struct PendingOverlay {
    canonical: Vec<Entry>,
    votes_remaining: u32,
    pending: BTreeSet<(i64, Mutation)>,
}

impl PendingOverlay {
    pub fn new(entries: Vec<Entry>, votes_remaining: u32) -> Self {
        Self {
            canonical: entries,
            votes_remaining,
            pending: BTreeSet::new(),
        }
    }

    /// Last server-confirmed entries
    pub fn canonical(&self) -> &[Entry] {
        &self.canonical
    }

    /// Server-confirmed remaining votes; pending votes never move it
    pub fn votes_remaining(&self) -> u32 {
        self.votes_remaining
    }

    pub fn is_pending(&self, entry_id: i64, mutation: Mutation) -> bool {
        self.pending.contains(&(entry_id, mutation))
    }

    /// Record an optimistic toggle
    ///
    /// Returns false if the same toggle is already awaiting its response; the
    /// caller should not send a second request.
    pub fn begin(&mut self, entry_id: i64, mutation: Mutation) -> bool {
        if !self.canonical.iter().any(|e| e.id == entry_id) {
            return false;
        }
        self.pending.insert((entry_id, mutation))
    }

    /// Apply the server's answer to a pending toggle
    pub fn resolve(&mut self, entry_id: i64, mutation: Mutation, tag: OutcomeTag) -> Resolution {
        if !self.pending.remove(&(entry_id, mutation)) {
            return Resolution::Ignored;
        }
        if !mutation.confirmed_by(tag) {
            return self.reject(entry_id, mutation, tag);
        }

        match tag {
            OutcomeTag::SuccessVote => {
                self.set_vote(entry_id, true);
                self.votes_remaining = self.votes_remaining.saturating_sub(1);
            }
            OutcomeTag::SuccessDelVote => {
                self.set_vote(entry_id, false);
                self.votes_remaining += 1;
            }
            OutcomeTag::Liked => self.set_like(entry_id, true),
            OutcomeTag::Unliked => self.set_like(entry_id, false),
            OutcomeTag::Disqualified | OutcomeTag::Requalified => {
                let disqualify = tag == OutcomeTag::Disqualified;
                let entries = std::mem::take(&mut self.canonical);
                let result = if disqualify {
                    ranking::disqualify(entries.clone(), entry_id)
                } else {
                    ranking::requalify(entries.clone(), entry_id, None)
                };
                self.canonical = result.unwrap_or(entries);
            }
            _ => {}
        }
        Resolution::Committed
    }

    /// Take a full standings list pushed by the server
    ///
    /// Replaces every placement; entries missing from `standings` keep theirs.
    pub fn replace_standings(&mut self, standings: &[Standing]) {
        for standing in standings {
            if let Some(entry) = self.canonical.iter_mut().find(|e| e.id == standing.entry_id) {
                entry.set_placement(standing.placement);
            }
        }
        self.canonical = ranking::normalize(std::mem::take(&mut self.canonical));
    }

    /// Canonical entries with every pending layer applied
    pub fn view(&self) -> Vec<Entry> {
        let mut entries = self.canonical.clone();
        for &(entry_id, mutation) in &self.pending {
            match mutation {
                Mutation::Vote => {
                    if let Some(entry) = entries.iter_mut().find(|e| e.id == entry_id) {
                        let voted = !entry.user_voted;
                        apply_vote(entry, voted);
                    }
                }
                Mutation::Like => {
                    if let Some(entry) = entries.iter_mut().find(|e| e.id == entry_id) {
                        let liked = !entry.user_liked;
                        apply_like(entry, liked);
                    }
                }
                Mutation::Disqualify => {
                    if let Ok((toggled, _)) = ranking::toggle_disqualification(entries.clone(), entry_id) {
                        entries = toggled;
                    }
                }
            }
        }
        entries
    }

    /// Drop a rejected layer and take whatever the rejection says about the server
    fn reject(&mut self, entry_id: i64, mutation: Mutation, tag: OutcomeTag) -> Resolution {
        match (mutation, tag) {
            (Mutation::Vote, OutcomeTag::MaxVotes) => {
                self.votes_remaining = 0;
                Resolution::RolledBack
            }
            (Mutation::Vote, OutcomeTag::Cache) => {
                // Server already holds the vote we thought missing, or the reverse
                let voted = self.canonical.iter().find(|e| e.id == entry_id).map(|e| !e.user_voted);
                if let Some(voted) = voted {
                    self.set_vote(entry_id, voted);
                    if voted {
                        self.votes_remaining = self.votes_remaining.saturating_sub(1);
                    } else {
                        self.votes_remaining += 1;
                    }
                }
                Resolution::Stale
            }
            _ => Resolution::RolledBack,
        }
    }

    fn set_vote(&mut self, entry_id: i64, voted: bool) {
        if let Some(entry) = self.canonical.iter_mut().find(|e| e.id == entry_id) {
            apply_vote(entry, voted);
        }
    }

    fn set_like(&mut self, entry_id: i64, liked: bool) {
        if let Some(entry) = self.canonical.iter_mut().find(|e| e.id == entry_id) {
            apply_like(entry, liked);
        }
    }
}

fn apply_vote(entry: &mut Entry, voted: bool) {
    if entry.user_voted != voted {
        entry.user_voted = voted;
        entry.votes += if voted { 1 } else { -1 };
    }
}

fn apply_like(entry: &mut Entry, liked: bool) {
    if entry.user_liked != liked {
        entry.user_liked = liked;
        entry.likes += if liked { 1 } else { -1 };
    }
}
