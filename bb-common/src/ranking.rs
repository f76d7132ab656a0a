//! Placement ranking engine
//!
//! Keeps the placements of a contest's entries dense: among entries that are
//! not disqualified, placements always form the sequence 1..N with no gaps or
//! duplicates. Disqualified entries carry no placement and sit after the
//! ranked entries.
//!
//! All operations here are pure. They take the contest's entries by value and
//! hand back the same entries in ranking order with placements rewritten.
//! Persisting the result and notifying observers is the caller's job.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Value stored in the `placement` column for entries without a rank
pub const UNPLACED_SENTINEL: i64 = 0;

/// Errors raised by ranking operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RankingError {
    /// Requested placement is outside 1..=max
    #[error("Invalid placement {requested} (valid range is 1..={max})")]
    InvalidPlacement { requested: i64, max: usize },

    /// Entry is not part of this contest
    #[error("Entry {0} is not part of this contest")]
    UnknownEntry(i64),

    /// Entry is disqualified and cannot be moved
    #[error("Entry {0} is disqualified")]
    EntryDisqualified(i64),
}

/// Placement of one entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placement {
    /// Member of the dense ranking (1-based)
    Ranked(u32),
    /// Eligible but not placed yet (fresh submission); ranks after all placed entries
    Unranked,
    /// Excluded from the ranking
    Disqualified,
}

impl Placement {
    /// Rebuild a placement from its stored columns
    pub fn from_columns(placement: i64, disqualified: bool) -> Self {
        if disqualified {
            Placement::Disqualified
        } else if placement > 0 && placement <= u32::MAX as i64 {
            Placement::Ranked(placement as u32)
        } else {
            Placement::Unranked
        }
    }

    /// Value for the `placement` column
    pub fn column_value(self) -> i64 {
        match self {
            Placement::Ranked(n) => n as i64,
            Placement::Unranked | Placement::Disqualified => UNPLACED_SENTINEL,
        }
    }

    pub fn is_disqualified(self) -> bool {
        matches!(self, Placement::Disqualified)
    }

    /// Rank number, if any
    pub fn rank(self) -> Option<u32> {
        match self {
            Placement::Ranked(n) => Some(n),
            _ => None,
        }
    }

    fn sort_key(self) -> (u8, u32) {
        match self {
            Placement::Ranked(n) => (0, n),
            Placement::Unranked => (1, 0),
            Placement::Disqualified => (2, 0),
        }
    }
}

/// Anything that carries an entry id and a placement
pub trait Rankable {
    fn entry_id(&self) -> i64;
    fn placement(&self) -> Placement;
    fn set_placement(&mut self, placement: Placement);
}

/// Minimal ranked view of an entry
///
/// Serialized as `{ "entry_id": 7, "placement": 2, "disqualified": false }`
/// with `placement` null when the entry has no rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StandingRepr", into = "StandingRepr")]
pub struct Standing {
    pub entry_id: i64,
    pub placement: Placement,
}

impl Standing {
    pub fn new(entry_id: i64, placement: Placement) -> Self {
        Self { entry_id, placement }
    }
}

impl Rankable for Standing {
    fn entry_id(&self) -> i64 {
        self.entry_id
    }

    fn placement(&self) -> Placement {
        self.placement
    }

    fn set_placement(&mut self, placement: Placement) {
        self.placement = placement;
    }
}

#[derive(Serialize, Deserialize)]
struct StandingRepr {
    entry_id: i64,
    placement: Option<u32>,
    #[serde(default)]
    disqualified: bool,
}

impl From<StandingRepr> for Standing {
    fn from(repr: StandingRepr) -> Self {
        let placement = match (repr.disqualified, repr.placement) {
            (true, _) => Placement::Disqualified,
            (false, Some(n)) if n > 0 => Placement::Ranked(n),
            (false, _) => Placement::Unranked,
        };
        Standing::new(repr.entry_id, placement)
    }
}

impl From<Standing> for StandingRepr {
    fn from(standing: Standing) -> Self {
        StandingRepr {
            entry_id: standing.entry_id,
            placement: standing.placement.rank(),
            disqualified: standing.placement.is_disqualified(),
        }
    }
}

/// Split entries into (eligible in ranking order, disqualified in input order)
///
/// The sort is stable, so entries sharing a placement (or all unranked)
/// keep their input order.
fn split<T: Rankable>(entries: Vec<T>) -> (Vec<T>, Vec<T>) {
    let (mut eligible, disqualified): (Vec<T>, Vec<T>) = entries
        .into_iter()
        .partition(|e| !e.placement().is_disqualified());
    eligible.sort_by_key(|e| e.placement().sort_key());
    (eligible, disqualified)
}

/// Rewrite placements densely and concatenate
fn assemble<T: Rankable>(mut eligible: Vec<T>, disqualified: Vec<T>) -> Vec<T> {
    for (index, entry) in eligible.iter_mut().enumerate() {
        entry.set_placement(Placement::Ranked(index as u32 + 1));
    }
    for mut entry in disqualified {
        entry.set_placement(Placement::Disqualified);
        eligible.push(entry);
    }
    eligible
}

fn position_of<T: Rankable>(entries: &[T], entry_id: i64) -> Option<usize> {
    entries.iter().position(|e| e.entry_id() == entry_id)
}

fn validate_target(requested: i64, max: usize) -> Result<usize, RankingError> {
    if requested < 1 || requested as u64 > max as u64 {
        return Err(RankingError::InvalidPlacement { requested, max });
    }
    Ok(requested as usize - 1)
}

/// Close any gaps and duplicates without moving anything
pub fn normalize<T: Rankable>(entries: Vec<T>) -> Vec<T> {
    let (eligible, disqualified) = split(entries);
    assemble(eligible, disqualified)
}

/// Move one entry to `requested` and shift the entries in between by one slot
///
/// `requested` must lie in 1..=N where N counts the non-disqualified entries.
/// On error the input is dropped untouched; nothing partial is returned.
pub fn reorder<T: Rankable>(
    entries: Vec<T>,
    moved_entry_id: i64,
    requested: i64,
) -> Result<Vec<T>, RankingError> {
    let (mut eligible, disqualified) = split(entries);

    let Some(from) = position_of(&eligible, moved_entry_id) else {
        return Err(if position_of(&disqualified, moved_entry_id).is_some() {
            RankingError::EntryDisqualified(moved_entry_id)
        } else {
            RankingError::UnknownEntry(moved_entry_id)
        });
    };
    let to = validate_target(requested, eligible.len())?;

    let entry = eligible.remove(from);
    eligible.insert(to, entry);

    Ok(assemble(eligible, disqualified))
}

/// Remove an entry from the ranking and compact the rest
///
/// Disqualifying an already disqualified entry leaves the standings as they are.
pub fn disqualify<T: Rankable>(entries: Vec<T>, entry_id: i64) -> Result<Vec<T>, RankingError> {
    let (mut eligible, mut disqualified) = split(entries);

    match position_of(&eligible, entry_id) {
        Some(index) => {
            let entry = eligible.remove(index);
            disqualified.push(entry);
        }
        None if position_of(&disqualified, entry_id).is_some() => {}
        None => return Err(RankingError::UnknownEntry(entry_id)),
    }

    Ok(assemble(eligible, disqualified))
}

/// Put a disqualified entry back into the ranking
///
/// Without an explicit placement the entry lands at the bottom (N+1). Called on
/// an entry that is already ranked, an explicit placement acts like [`reorder`]
/// and no placement leaves the standings unchanged.
pub fn requalify<T: Rankable>(
    entries: Vec<T>,
    entry_id: i64,
    placement: Option<i64>,
) -> Result<Vec<T>, RankingError> {
    let (mut eligible, mut disqualified) = split(entries);

    if position_of(&eligible, entry_id).is_some() {
        let entries = assemble(eligible, disqualified);
        return match placement {
            Some(requested) => reorder(entries, entry_id, requested),
            None => Ok(entries),
        };
    }

    let index = position_of(&disqualified, entry_id).ok_or(RankingError::UnknownEntry(entry_id))?;
    let max = eligible.len() + 1;
    let to = validate_target(placement.unwrap_or(max as i64), max)?;

    let entry = disqualified.remove(index);
    eligible.insert(to, entry);

    Ok(assemble(eligible, disqualified))
}

/// Flip an entry between ranked and disqualified
///
/// Returns the new standings and whether the entry ended up disqualified.
pub fn toggle_disqualification<T: Rankable>(
    entries: Vec<T>,
    entry_id: i64,
) -> Result<(Vec<T>, bool), RankingError> {
    let currently = entries
        .iter()
        .find(|e| e.entry_id() == entry_id)
        .map(|e| e.placement())
        .ok_or(RankingError::UnknownEntry(entry_id))?;

    if currently.is_disqualified() {
        Ok((requalify(entries, entry_id, None)?, false))
    } else {
        Ok((disqualify(entries, entry_id)?, true))
    }
}

/// True when ranked placements form exactly 1..N over the non-disqualified entries
pub fn is_dense<T: Rankable>(entries: &[T]) -> bool {
    let mut ranks = Vec::with_capacity(entries.len());
    for entry in entries {
        match entry.placement() {
            Placement::Ranked(n) => ranks.push(n),
            Placement::Unranked => return false,
            Placement::Disqualified => {}
        }
    }
    ranks.sort_unstable();
    ranks.iter().enumerate().all(|(i, &n)| n as usize == i + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranked(ids: &[i64]) -> Vec<Standing> {
        ids.iter()
            .enumerate()
            .map(|(i, &id)| Standing::new(id, Placement::Ranked(i as u32 + 1)))
            .collect()
    }

    fn ids(entries: &[Standing]) -> Vec<i64> {
        entries.iter().map(|s| s.entry_id).collect()
    }

    fn placement_of(entries: &[Standing], id: i64) -> Placement {
        entries.iter().find(|s| s.entry_id == id).unwrap().placement
    }

    fn ranked_ids(entries: &[Standing]) -> Vec<i64> {
        entries
            .iter()
            .filter(|s| !s.placement.is_disqualified())
            .map(|s| s.entry_id)
            .collect()
    }

    #[test]
    fn test_move_last_to_second() {
        // 10..40 hold placements 1..4; move the entry at 4 up to 2
        let result = reorder(ranked(&[10, 20, 30, 40]), 40, 2).unwrap();

        assert_eq!(placement_of(&result, 10), Placement::Ranked(1));
        assert_eq!(placement_of(&result, 40), Placement::Ranked(2));
        assert_eq!(placement_of(&result, 20), Placement::Ranked(3));
        assert_eq!(placement_of(&result, 30), Placement::Ranked(4));
        assert_eq!(ids(&result), vec![10, 40, 20, 30]);
    }

    #[test]
    fn test_move_down_shifts_up() {
        let result = reorder(ranked(&[1, 2, 3, 4, 5]), 2, 4).unwrap();
        assert_eq!(ids(&result), vec![1, 3, 4, 2, 5]);
        assert!(is_dense(&result));
    }

    #[test]
    fn test_every_move_stays_dense() {
        for n in 1..=6i64 {
            let base: Vec<i64> = (1..=n).collect();
            for moved in 1..=n {
                for target in 1..=n {
                    let result = reorder(ranked(&base), moved, target).unwrap();
                    assert!(is_dense(&result), "n={} moved={} target={}", n, moved, target);
                    assert_eq!(placement_of(&result, moved), Placement::Ranked(target as u32));
                    assert_eq!(result.len(), n as usize);
                }
            }
        }
    }

    #[test]
    fn test_entries_outside_move_range_untouched() {
        let result = reorder(ranked(&[1, 2, 3, 4, 5, 6]), 5, 3).unwrap();
        assert_eq!(placement_of(&result, 1), Placement::Ranked(1));
        assert_eq!(placement_of(&result, 2), Placement::Ranked(2));
        assert_eq!(placement_of(&result, 6), Placement::Ranked(6));
        assert_eq!(ids(&result), vec![1, 2, 5, 3, 4, 6]);
    }

    #[test]
    fn test_reorder_is_idempotent() {
        let once = reorder(ranked(&[1, 2, 3, 4]), 4, 2).unwrap();
        let twice = reorder(once.clone(), 4, 2).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_reorder_rejects_out_of_range() {
        let err = reorder(ranked(&[1, 2, 3]), 2, 0).unwrap_err();
        assert_eq!(err, RankingError::InvalidPlacement { requested: 0, max: 3 });

        let err = reorder(ranked(&[1, 2, 3]), 2, 4).unwrap_err();
        assert_eq!(err, RankingError::InvalidPlacement { requested: 4, max: 3 });
    }

    #[test]
    fn test_reorder_range_excludes_disqualified() {
        let entries = disqualify(ranked(&[1, 2, 3, 4]), 3).unwrap();
        let err = reorder(entries, 1, 4).unwrap_err();
        assert_eq!(err, RankingError::InvalidPlacement { requested: 4, max: 3 });
    }

    #[test]
    fn test_reorder_disqualified_or_unknown_entry() {
        let entries = disqualify(ranked(&[1, 2, 3]), 2).unwrap();
        assert_eq!(
            reorder(entries.clone(), 2, 1).unwrap_err(),
            RankingError::EntryDisqualified(2)
        );
        assert_eq!(reorder(entries, 99, 1).unwrap_err(), RankingError::UnknownEntry(99));
    }

    #[test]
    fn test_disqualify_compacts_and_keeps_order() {
        let before = ranked(&[1, 2, 3, 4, 5]);
        let after = disqualify(before, 2).unwrap();

        assert_eq!(placement_of(&after, 2), Placement::Disqualified);
        assert_eq!(ranked_ids(&after), vec![1, 3, 4, 5]);
        assert_eq!(placement_of(&after, 3), Placement::Ranked(2));
        assert_eq!(placement_of(&after, 5), Placement::Ranked(4));
        assert!(is_dense(&after));
    }

    #[test]
    fn test_disqualify_twice_is_noop() {
        let once = disqualify(ranked(&[1, 2, 3]), 1).unwrap();
        let twice = disqualify(once.clone(), 1).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_requalify_appends_at_bottom() {
        let entries = disqualify(ranked(&[1, 2, 3, 4]), 1).unwrap();
        let entries = requalify(entries, 1, None).unwrap();

        assert_eq!(ids(&entries), vec![2, 3, 4, 1]);
        assert_eq!(placement_of(&entries, 1), Placement::Ranked(4));
        assert!(is_dense(&entries));
    }

    #[test]
    fn test_requalify_at_explicit_placement() {
        let entries = disqualify(ranked(&[1, 2, 3, 4]), 4).unwrap();
        let entries = requalify(entries, 4, Some(1)).unwrap();
        assert_eq!(ids(&entries), vec![4, 1, 2, 3]);

        let entries = disqualify(ranked(&[1, 2, 3]), 3).unwrap();
        let err = requalify(entries, 3, Some(4)).unwrap_err();
        assert_eq!(err, RankingError::InvalidPlacement { requested: 4, max: 3 });
    }

    #[test]
    fn test_toggle_disqualification_round_trip() {
        let (entries, disqualified) = toggle_disqualification(ranked(&[1, 2, 3]), 1).unwrap();
        assert!(disqualified);
        assert_eq!(ranked_ids(&entries), vec![2, 3]);

        let (entries, disqualified) = toggle_disqualification(entries, 1).unwrap();
        assert!(!disqualified);
        assert_eq!(ids(&entries), vec![2, 3, 1]);
    }

    #[test]
    fn test_normalize_places_unranked_after_ranked() {
        let entries = vec![
            Standing::new(7, Placement::Unranked),
            Standing::new(8, Placement::Ranked(5)),
            Standing::new(9, Placement::Unranked),
            Standing::new(6, Placement::Ranked(2)),
        ];
        let entries = normalize(entries);
        assert_eq!(ids(&entries), vec![6, 8, 7, 9]);
        assert!(is_dense(&entries));
    }

    #[test]
    fn test_duplicate_placements_keep_input_order() {
        let entries = vec![
            Standing::new(1, Placement::Ranked(1)),
            Standing::new(2, Placement::Ranked(2)),
            Standing::new(3, Placement::Ranked(2)),
        ];
        assert_eq!(ids(&normalize(entries)), vec![1, 2, 3]);
    }

    #[test]
    fn test_standing_json_shape() {
        let json = serde_json::to_value(Standing::new(3, Placement::Disqualified)).unwrap();
        assert_eq!(json["placement"], serde_json::Value::Null);
        assert_eq!(json["disqualified"], true);

        let standing: Standing =
            serde_json::from_str(r#"{"entry_id": 4, "placement": 2}"#).unwrap();
        assert_eq!(standing.placement, Placement::Ranked(2));
    }
}
