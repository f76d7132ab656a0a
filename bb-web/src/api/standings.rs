//! Read endpoints for battle pages

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use bb_common::db::{self, Contest, Entry};
use bb_common::{Error, VoteLedger};
use serde::Serialize;
use tracing::error;

use super::{ActingUser, Viewer};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct StandingsResponse {
    pub battle: Contest,
    /// Ranked entries in placement order, then unranked, then disqualified
    pub entries: Vec<Entry>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(err: Error) -> ApiError {
    let status = match err {
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        _ => {
            error!("Read endpoint failed: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(ErrorResponse { error: err.to_string() }))
}

/// GET /battle/:id/standings
///
/// Entries carry the viewer's own vote, like and feedback when an
/// `X-User-Id` header is present.
pub async fn get_standings(
    State(state): State<AppState>,
    Path(battle_id): Path<i64>,
    Viewer(viewer): Viewer,
) -> Result<Json<StandingsResponse>, ApiError> {
    let battle = db::get_contest(&state.db, battle_id)
        .await
        .map_err(api_error)?
        .ok_or_else(|| api_error(Error::NotFound(format!("Battle {}", battle_id))))?;

    let entries = db::load_entries(&state.db, battle_id, viewer)
        .await
        .map_err(api_error)?;

    Ok(Json(StandingsResponse { battle, entries }))
}

/// GET /battle/:id/ledger
///
/// The acting user's vote budget in this battle.
pub async fn get_ledger(
    State(state): State<AppState>,
    Path(battle_id): Path<i64>,
    ActingUser(user): ActingUser,
) -> Result<Json<VoteLedger>, ApiError> {
    state
        .votes
        .ledger(user, battle_id)
        .await
        .map(Json)
        .map_err(api_error)
}
