//! Server-Sent Events for live battle pages

use std::convert::Infallible;

use axum::extract::{Query, State};
use axum::response::sse::{Event, Sse};
use futures::stream::Stream;
use serde::Deserialize;

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct EventFilter {
    /// Only forward events of this battle
    pub battle: Option<i64>,
}

/// GET /events[?battle=ID]
///
/// Streams:
/// - StandingsReplaced (full standings after every ranking change)
/// - ContestStatusChanged
pub async fn event_stream(
    State(state): State<AppState>,
    Query(filter): Query<EventFilter>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    bb_common::sse::battle_event_stream(state.events.clone(), filter.battle)
}
