//! bb-web library - Beat battle web service
//!
//! REST endpoints behind the battle pages: voting, likes, feedback and the
//! host's ranking actions, plus read endpoints and a live event stream.

use std::sync::Arc;

use axum::Router;
use bb_common::events::EventBus;
use bb_common::locks::KeyedLocks;
use bb_common::VoteBudgetManager;
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod lifecycle;

/// Events buffered per SSE subscriber before it is told to resync
const EVENT_BUS_CAPACITY: usize = 256;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    /// Serializes every vote check-then-act per (user, battle)
    pub votes: Arc<VoteBudgetManager>,
    /// Serializes standings read-modify-write per battle
    pub standings_locks: Arc<KeyedLocks<i64>>,
    pub events: Arc<EventBus>,
}

impl AppState {
    pub fn new(db: SqlitePool) -> Self {
        Self {
            votes: Arc::new(VoteBudgetManager::new(db.clone())),
            standings_locks: Arc::new(KeyedLocks::new()),
            events: Arc::new(EventBus::new(EVENT_BUS_CAPACITY)),
            db,
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    let actions = Router::new()
        .route("/placement", post(api::set_placement))
        .route("/feedback", post(api::add_feedback))
        .route("/like", post(api::toggle_like))
        .route("/vote", post(api::toggle_vote))
        .route("/disqualify", post(api::toggle_disqualify));

    let reads = Router::new()
        .route("/battle/:id/standings", get(api::get_standings))
        .route("/battle/:id/ledger", get(api::get_ledger))
        .route("/events", get(api::event_stream));

    Router::new()
        .merge(actions)
        .merge(reads)
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
