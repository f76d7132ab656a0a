//! HTTP API handlers for bb-web

pub mod actions;
pub mod health;
pub mod sse;
pub mod standings;
pub mod user;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bb_common::api::{ActionResponse, OutcomeTag};

pub use actions::{add_feedback, set_placement, toggle_disqualify, toggle_like, toggle_vote};
pub use health::health_routes;
pub use sse::event_stream;
pub use standings::{get_ledger, get_standings};
pub use user::{ActingUser, Viewer, USER_HEADER};

/// [`ActionResponse`] sent with the status its outcome tag calls for
#[derive(Debug)]
pub struct ActionReply(pub ActionResponse);

impl ActionReply {
    pub fn tag(&self) -> OutcomeTag {
        self.0.toast_query
    }
}

impl From<ActionResponse> for ActionReply {
    fn from(response: ActionResponse) -> Self {
        ActionReply(response)
    }
}

impl IntoResponse for ActionReply {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.tag().status_code()).unwrap_or(StatusCode::OK);
        (status, Json(self.0)).into_response()
    }
}

/// Path of a battle page
pub fn battle_path(battle_id: i64) -> String {
    format!("/battle/{}/", battle_id)
}
