//! Battle page actions: vote, like, feedback, placement, disqualify
//!
//! Every action answers with an [`ActionResponse`] whose `ToastQuery` tells
//! the page what happened. The entry named by `beatID` decides which battle an
//! action applies to; a `battleID` that disagrees with it is treated as an
//! unknown entry.

use axum::extract::rejection::FormRejection;
use axum::extract::State;
use axum::Form;
use bb_common::api::{ActionForm, ActionResponse, OutcomeTag};
use bb_common::db::{self, Contest, ContestStatus, Entry, EntryOwner, Upsert, MAX_FEEDBACK_LEN};
use bb_common::events::BattleEvent;
use bb_common::ranking::{self, Rankable, RankingError};
use bb_common::{Error, Standing, VoteOutcome};
use tracing::{debug, error, info};

use super::{battle_path, ActingUser, ActionReply};
use crate::AppState;

/// Why an action did not go through
#[derive(Debug)]
enum Refusal {
    Tag(OutcomeTag),
    Failed(Error),
}

impl From<OutcomeTag> for Refusal {
    fn from(tag: OutcomeTag) -> Self {
        Refusal::Tag(tag)
    }
}

impl From<Error> for Refusal {
    fn from(err: Error) -> Self {
        Refusal::Failed(err)
    }
}

impl From<RankingError> for Refusal {
    fn from(err: RankingError) -> Self {
        Refusal::Failed(err.into())
    }
}

/// Result of an action: the success tag, plus the battle it touched when known
struct Done {
    battle_id: Option<i64>,
    outcome: Result<OutcomeTag, Refusal>,
}

impl Done {
    fn at(battle_id: i64, outcome: Result<OutcomeTag, Refusal>) -> Self {
        Self {
            battle_id: Some(battle_id),
            outcome,
        }
    }

    fn early(refusal: Refusal) -> Self {
        Self {
            battle_id: None,
            outcome: Err(refusal),
        }
    }
}

fn respond(action: &str, user: i64, done: Done) -> ActionReply {
    let tag = match done.outcome {
        Ok(tag) => {
            debug!("{} by user {}: {}", action, user, tag);
            tag
        }
        Err(Refusal::Tag(tag)) => {
            info!("{} by user {} refused: {}", action, user, tag);
            tag
        }
        Err(Refusal::Failed(err)) => {
            let tag = OutcomeTag::from_error(&err);
            if tag == OutcomeTag::ServerError {
                error!("{} by user {} failed: {}", action, user, err);
            } else {
                info!("{} by user {} refused: {}", action, user, err);
            }
            tag
        }
    };

    let path = done.battle_id.map(battle_path).unwrap_or_else(|| "/".to_string());
    ActionReply(ActionResponse::toast(tag).at(path))
}

fn read_form(form: Result<Form<ActionForm>, FormRejection>) -> Result<ActionForm, Refusal> {
    match form {
        Ok(Form(form)) => Ok(form),
        Err(rejection) => {
            debug!("Unreadable action form: {}", rejection);
            Err(OutcomeTag::NoData.into())
        }
    }
}

/// Resolve `beatID` (and the optional `battleID`) to the stored entry owner
async fn locate_entry(state: &AppState, form: &ActionForm) -> Result<(i64, EntryOwner), Refusal> {
    let beat_id = form.beat_id.ok_or(OutcomeTag::NoData)?;
    let owner = db::entry_owner(&state.db, beat_id)
        .await?
        .ok_or(OutcomeTag::NotFound)?;

    if form.battle_id.is_some_and(|id| id != owner.battle_id) {
        return Err(OutcomeTag::NotFound.into());
    }
    Ok((beat_id, owner))
}

/// Contest of `battle_id` if `user` hosts it and it still accepts ranking changes
async fn hosted_contest(
    state: &AppState,
    battle_id: i64,
    user: i64,
    not_host: OutcomeTag,
) -> Result<Contest, Refusal> {
    let contest = db::get_contest(&state.db, battle_id)
        .await?
        .ok_or(OutcomeTag::NotFound)?;

    if contest.host_id != user {
        return Err(not_host.into());
    }
    if contest.status == ContestStatus::Closed {
        return Err(OutcomeTag::NotOpen.into());
    }
    Ok(contest)
}

fn standings_of(entries: &[Entry]) -> Vec<Standing> {
    entries
        .iter()
        .map(|e| Standing::new(e.entry_id(), e.placement()))
        .collect()
}

/// Load, rewrite and store a contest's standings under its lock, then broadcast them
async fn rewrite_standings<F, T>(state: &AppState, battle_id: i64, rewrite: F) -> Result<T, Refusal>
where
    F: FnOnce(Vec<Entry>) -> Result<(Vec<Entry>, T), RankingError>,
{
    let _guard = state.standings_locks.acquire(battle_id).await;

    let entries = db::load_entries(&state.db, battle_id, None).await?;
    let (entries, extra) = rewrite(entries)?;
    db::save_placements(&state.db, battle_id, &entries).await?;

    state
        .events
        .emit_lossy(BattleEvent::standings_replaced(battle_id, standings_of(&entries)));
    Ok(extra)
}

/// Run an action against the entry named in the form
async fn run<'a, F, Fut>(state: &'a AppState, form: Result<Form<ActionForm>, FormRejection>, action: F) -> Done
where
    F: FnOnce(ActionForm, i64, EntryOwner) -> Fut,
    Fut: std::future::Future<Output = Result<OutcomeTag, Refusal>> + 'a,
{
    let form = match read_form(form) {
        Ok(form) => form,
        Err(refusal) => return Done::early(refusal),
    };
    match locate_entry(state, &form).await {
        Ok((beat_id, owner)) => Done::at(owner.battle_id, action(form, beat_id, owner).await),
        Err(refusal) => Done::early(refusal),
    }
}

// ========================================
// Handlers
// ========================================

/// POST /vote
///
/// Casts a vote for the entry, or takes it back when the user already voted for it.
pub async fn toggle_vote(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    form: Result<Form<ActionForm>, FormRejection>,
) -> ActionReply {
    let done = run(&state, form, |_, beat_id, owner| vote(&state, user, beat_id, owner)).await;
    respond("Vote", user, done)
}

async fn vote(state: &AppState, user: i64, beat_id: i64, owner: EntryOwner) -> Result<OutcomeTag, Refusal> {
    let (outcome, ledger) = state.votes.toggle_vote(user, owner.battle_id, beat_id).await?;
    debug!(
        "User {} has {} of {} votes left in battle {}",
        user,
        ledger.votes_remaining(),
        ledger.allowance(),
        owner.battle_id
    );

    Ok(match outcome {
        VoteOutcome::Cast => OutcomeTag::SuccessVote,
        VoteOutcome::Retracted => OutcomeTag::SuccessDelVote,
    })
}

/// POST /like
pub async fn toggle_like(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    form: Result<Form<ActionForm>, FormRejection>,
) -> ActionReply {
    let done = run(&state, form, |_, beat_id, owner| like(&state, user, beat_id, owner)).await;
    respond("Like", user, done)
}

async fn like(state: &AppState, user: i64, beat_id: i64, owner: EntryOwner) -> Result<OutcomeTag, Refusal> {
    let liked = db::toggle_like(&state.db, user, beat_id, owner.battle_id).await?;
    Ok(if liked { OutcomeTag::Liked } else { OutcomeTag::Unliked })
}

/// POST /feedback
///
/// Creates or replaces the user's feedback on someone else's entry.
pub async fn add_feedback(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    form: Result<Form<ActionForm>, FormRejection>,
) -> ActionReply {
    let done = run(&state, form, |form, beat_id, owner| {
        feedback(&state, user, form, beat_id, owner)
    })
    .await;
    respond("Feedback", user, done)
}

async fn feedback(
    state: &AppState,
    user: i64,
    form: ActionForm,
    beat_id: i64,
    owner: EntryOwner,
) -> Result<OutcomeTag, Refusal> {
    if owner.artist_id == user {
        return Err(OutcomeTag::FeedbackSelf.into());
    }
    let text = form.feedback.as_deref().map(str::trim).unwrap_or_default();
    if text.is_empty() {
        return Err(OutcomeTag::NoData.into());
    }
    if text.chars().count() > MAX_FEEDBACK_LEN {
        return Err(OutcomeTag::ValidationError.into());
    }

    Ok(match db::upsert_feedback(&state.db, user, beat_id, text).await? {
        Upsert::Inserted => OutcomeTag::SuccessAddFeedback,
        Upsert::Updated => OutcomeTag::SuccessUpdate,
    })
}

/// POST /placement
///
/// Host moves an entry to `placement`; the entries in between shift by one.
pub async fn set_placement(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    form: Result<Form<ActionForm>, FormRejection>,
) -> ActionReply {
    let done = run(&state, form, |form, beat_id, owner| {
        placement(&state, user, form, beat_id, owner)
    })
    .await;
    respond("Placement", user, done)
}

async fn placement(
    state: &AppState,
    user: i64,
    form: ActionForm,
    beat_id: i64,
    owner: EntryOwner,
) -> Result<OutcomeTag, Refusal> {
    let requested = form.placement.ok_or(OutcomeTag::NoData)?;
    hosted_contest(state, owner.battle_id, user, OutcomeTag::Forbidden).await?;

    rewrite_standings(state, owner.battle_id, |entries| {
        ranking::reorder(entries, beat_id, requested).map(|entries| (entries, ()))
    })
    .await?;
    Ok(OutcomeTag::Placement)
}

/// POST /disqualify
///
/// Host flips an entry between ranked and disqualified.
pub async fn toggle_disqualify(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    form: Result<Form<ActionForm>, FormRejection>,
) -> ActionReply {
    let done = run(&state, form, |_, beat_id, owner| {
        disqualify(&state, user, beat_id, owner)
    })
    .await;
    respond("Disqualify", user, done)
}

async fn disqualify(state: &AppState, user: i64, beat_id: i64, owner: EntryOwner) -> Result<OutcomeTag, Refusal> {
    hosted_contest(state, owner.battle_id, user, OutcomeTag::NotAuth).await?;

    let disqualified = rewrite_standings(state, owner.battle_id, |entries| {
        ranking::toggle_disqualification(entries, beat_id)
    })
    .await?;

    Ok(if disqualified {
        OutcomeTag::Disqualified
    } else {
        OutcomeTag::Requalified
    })
}
