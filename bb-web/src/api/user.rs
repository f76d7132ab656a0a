//! Acting user extraction
//!
//! Sessions are handled in front of this service; the session layer forwards
//! the authenticated user's id in the `X-User-Id` header.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use bb_common::api::{ActionResponse, OutcomeTag};
use tracing::debug;

use super::ActionReply;

pub const USER_HEADER: &str = "x-user-id";

fn header_user(parts: &Parts) -> Option<i64> {
    parts
        .headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<i64>().ok())
}

/// Logged-in user; requests without one are answered `noauth` with a redirect to the login page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActingUser(pub i64);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ActingUser {
    type Rejection = ActionReply;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        header_user(parts).map(ActingUser).ok_or_else(|| {
            debug!("{} {} without a user", parts.method, parts.uri.path());
            ActionReply(ActionResponse::redirect(OutcomeTag::NoAuth, "/login/"))
        })
    }
}

/// Optional viewer for read endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewer(pub Option<i64>);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Viewer {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Viewer(header_user(parts)))
    }
}
