//! REST request/response types

use serde::{Deserialize, Serialize};

use crate::bridge::BridgeError;
use crate::ranking::RankingError;
use crate::votes::VoteError;
use crate::Error;

// ========================================
// Outcome tags
// ========================================

/// Outcome discriminator carried in `ToastQuery`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutcomeTag {
    // Successes
    #[serde(rename = "placement")]
    Placement,
    #[serde(rename = "disqualified")]
    Disqualified,
    #[serde(rename = "requalified")]
    Requalified,
    #[serde(rename = "liked")]
    Liked,
    #[serde(rename = "unliked")]
    Unliked,
    #[serde(rename = "successvote")]
    SuccessVote,
    #[serde(rename = "successdelvote")]
    SuccessDelVote,
    #[serde(rename = "successaddfeedback")]
    SuccessAddFeedback,
    #[serde(rename = "successupdate")]
    SuccessUpdate,

    // Rejections
    #[serde(rename = "maxvotes")]
    MaxVotes,
    #[serde(rename = "notvoting")]
    NotVoting,
    #[serde(rename = "owntrack")]
    OwnTrack,
    /// Client state disagrees with the server (double vote, missing vote)
    #[serde(rename = "cache")]
    Cache,
    #[serde(rename = "feedbackself")]
    FeedbackSelf,
    #[serde(rename = "invalidplacement")]
    InvalidPlacement,
    #[serde(rename = "validationerror")]
    ValidationError,
    #[serde(rename = "nodata")]
    NoData,
    #[serde(rename = "noauth")]
    NoAuth,
    #[serde(rename = "notauth")]
    NotAuth,
    #[serde(rename = "403")]
    Forbidden,
    #[serde(rename = "notopen")]
    NotOpen,
    #[serde(rename = "404")]
    NotFound,
    #[serde(rename = "502")]
    ServerError,
}

impl OutcomeTag {
    /// Wire value
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeTag::Placement => "placement",
            OutcomeTag::Disqualified => "disqualified",
            OutcomeTag::Requalified => "requalified",
            OutcomeTag::Liked => "liked",
            OutcomeTag::Unliked => "unliked",
            OutcomeTag::SuccessVote => "successvote",
            OutcomeTag::SuccessDelVote => "successdelvote",
            OutcomeTag::SuccessAddFeedback => "successaddfeedback",
            OutcomeTag::SuccessUpdate => "successupdate",
            OutcomeTag::MaxVotes => "maxvotes",
            OutcomeTag::NotVoting => "notvoting",
            OutcomeTag::OwnTrack => "owntrack",
            OutcomeTag::Cache => "cache",
            OutcomeTag::FeedbackSelf => "feedbackself",
            OutcomeTag::InvalidPlacement => "invalidplacement",
            OutcomeTag::ValidationError => "validationerror",
            OutcomeTag::NoData => "nodata",
            OutcomeTag::NoAuth => "noauth",
            OutcomeTag::NotAuth => "notauth",
            OutcomeTag::Forbidden => "403",
            OutcomeTag::NotOpen => "notopen",
            OutcomeTag::NotFound => "404",
            OutcomeTag::ServerError => "502",
        }
    }

    /// Toast text shown to the user
    pub fn message(&self) -> &'static str {
        match self {
            OutcomeTag::Placement => "Placement updated.",
            OutcomeTag::Disqualified => "Beat disqualified.",
            OutcomeTag::Requalified => "Beat requalified.",
            OutcomeTag::Liked => "Beat liked.",
            OutcomeTag::Unliked => "Like removed.",
            OutcomeTag::SuccessVote => "Vote successful.",
            OutcomeTag::SuccessDelVote => "Vote successfully removed.",
            OutcomeTag::SuccessAddFeedback => "Successfully added feedback.",
            OutcomeTag::SuccessUpdate => "Successfully updated.",
            OutcomeTag::MaxVotes => "You're at your max votes for this battle.",
            OutcomeTag::NotVoting => "This battle isn't currently accepting votes.",
            OutcomeTag::OwnTrack => "You can't vote for your own track.",
            OutcomeTag::Cache => "If this happens again, try clearing your cache.",
            OutcomeTag::FeedbackSelf => "You can't give yourself feedback.",
            OutcomeTag::InvalidPlacement => "That placement is out of range.",
            OutcomeTag::ValidationError => "Validation error, please try again.",
            OutcomeTag::NoData => "No data received.",
            OutcomeTag::NoAuth => "You need to be logged in to do that.",
            OutcomeTag::NotAuth => "Only the battle host can do that.",
            OutcomeTag::Forbidden => "You're not allowed to do that.",
            OutcomeTag::NotOpen => "That battle is not currently open.",
            OutcomeTag::NotFound => "Battle or beat not found.",
            OutcomeTag::ServerError => "Server error.",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self,
            OutcomeTag::Placement
                | OutcomeTag::Disqualified
                | OutcomeTag::Requalified
                | OutcomeTag::Liked
                | OutcomeTag::Unliked
                | OutcomeTag::SuccessVote
                | OutcomeTag::SuccessDelVote
                | OutcomeTag::SuccessAddFeedback
                | OutcomeTag::SuccessUpdate
        )
    }

    /// CSS class of the toast
    pub fn class(&self) -> &'static str {
        if self.is_success() {
            "toast-success"
        } else {
            "toast-error"
        }
    }

    /// HTTP status the envelope is sent with
    pub fn status_code(&self) -> u16 {
        match self {
            _ if self.is_success() => 201,
            OutcomeTag::NoAuth => 401,
            OutcomeTag::NotAuth | OutcomeTag::Forbidden => 403,
            OutcomeTag::NotFound => 404,
            OutcomeTag::ServerError => 502,
            OutcomeTag::InvalidPlacement | OutcomeTag::ValidationError | OutcomeTag::NoData => 422,
            _ => 409,
        }
    }

    /// Rejection tag for a failed operation
    pub fn from_error(err: &Error) -> Self {
        match err {
            Error::Vote(e) => match e {
                VoteError::NoVotesRemaining => OutcomeTag::MaxVotes,
                VoteError::ContestNotVoting(_) => OutcomeTag::NotVoting,
                VoteError::OwnEntry(_) => OutcomeTag::OwnTrack,
                VoteError::AlreadyVoted(_) | VoteError::NotVoted(_) => OutcomeTag::Cache,
                VoteError::UnknownEntry(_) => OutcomeTag::NotFound,
            },
            Error::Ranking(e) => match e {
                RankingError::InvalidPlacement { .. } => OutcomeTag::InvalidPlacement,
                RankingError::UnknownEntry(_) => OutcomeTag::NotFound,
                RankingError::EntryDisqualified(_) => OutcomeTag::ValidationError,
            },
            Error::NotFound(_) => OutcomeTag::NotFound,
            Error::InvalidInput(_) => OutcomeTag::ValidationError,
            Error::Dispatch(_) => OutcomeTag::NotFound,
            Error::Bridge(BridgeError::Protocol(_)) => OutcomeTag::ValidationError,
            Error::Database(_)
            | Error::Io(_)
            | Error::Config(_)
            | Error::Bridge(_)
            | Error::Internal(_) => OutcomeTag::ServerError,
        }
    }
}

impl std::fmt::Display for OutcomeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ========================================
// Envelope
// ========================================

/// Response body of every mutating endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResponse {
    #[serde(rename = "Redirect")]
    pub redirect: bool,
    #[serde(rename = "RedirectPath")]
    pub redirect_path: String,
    #[serde(rename = "ToastHTML")]
    pub toast_html: String,
    #[serde(rename = "ToastClass")]
    pub toast_class: String,
    #[serde(rename = "ToastQuery")]
    pub toast_query: OutcomeTag,
}

impl ActionResponse {
    /// Toast-only response
    pub fn toast(tag: OutcomeTag) -> Self {
        Self {
            redirect: false,
            redirect_path: String::new(),
            toast_html: tag.message().to_string(),
            toast_class: tag.class().to_string(),
            toast_query: tag,
        }
    }

    /// Response telling the client to navigate to `path`
    pub fn redirect(tag: OutcomeTag, path: impl Into<String>) -> Self {
        Self {
            redirect: true,
            redirect_path: path.into(),
            ..Self::toast(tag)
        }
    }

    pub fn from_error(err: &Error) -> Self {
        Self::toast(OutcomeTag::from_error(err))
    }

    /// Page the toast refers to, without asking the client to navigate
    pub fn at(mut self, path: impl Into<String>) -> Self {
        self.redirect_path = path.into();
        self
    }
}

// ========================================
// Requests
// ========================================

/// Form-encoded body shared by the action endpoints
///
/// Each endpoint reads the fields it needs; missing required fields are
/// answered with `nodata`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ActionForm {
    #[serde(rename = "battleID")]
    pub battle_id: Option<i64>,
    #[serde(rename = "beatID")]
    pub beat_id: Option<i64>,
    pub placement: Option<i64>,
    pub feedback: Option<String>,
    /// Artist of the entry as the client saw it; ownership is always
    /// checked against stored data instead
    #[serde(rename = "userID")]
    pub user_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ContestStatus;

    #[test]
    fn test_envelope_field_names() {
        let json = serde_json::to_value(ActionResponse::toast(OutcomeTag::SuccessVote)).unwrap();
        assert_eq!(json["Redirect"], false);
        assert_eq!(json["RedirectPath"], "");
        assert_eq!(json["ToastHTML"], "Vote successful.");
        assert_eq!(json["ToastClass"], "toast-success");
        assert_eq!(json["ToastQuery"], "successvote");
    }

    #[test]
    fn test_redirect_envelope() {
        let response = ActionResponse::redirect(OutcomeTag::NoAuth, "/login/");
        assert!(response.redirect);
        assert_eq!(response.redirect_path, "/login/");
        assert_eq!(response.toast_class, "toast-error");
    }

    #[test]
    fn test_serde_matches_as_str() {
        for tag in [
            OutcomeTag::Placement,
            OutcomeTag::SuccessDelVote,
            OutcomeTag::NotFound,
            OutcomeTag::ServerError,
            OutcomeTag::NotAuth,
        ] {
            assert_eq!(serde_json::to_value(tag).unwrap(), tag.as_str());
        }
    }

    #[test]
    fn test_vote_errors_map_to_tags() {
        let cases = [
            (VoteError::NoVotesRemaining, OutcomeTag::MaxVotes),
            (VoteError::ContestNotVoting(ContestStatus::Closed), OutcomeTag::NotVoting),
            (VoteError::OwnEntry(1), OutcomeTag::OwnTrack),
            (VoteError::AlreadyVoted(1), OutcomeTag::Cache),
            (VoteError::UnknownEntry(1), OutcomeTag::NotFound),
        ];
        for (err, tag) in cases {
            assert_eq!(OutcomeTag::from_error(&Error::Vote(err)), tag);
        }
    }

    #[test]
    fn test_storage_errors_are_502() {
        let err = Error::Database(sqlx::Error::RowNotFound);
        assert_eq!(OutcomeTag::from_error(&err), OutcomeTag::ServerError);
        assert_eq!(OutcomeTag::ServerError.status_code(), 502);
        assert_eq!(OutcomeTag::MaxVotes.status_code(), 409);
        assert_eq!(OutcomeTag::SuccessVote.status_code(), 201);
    }

    #[test]
    fn test_form_field_names() {
        let form: ActionForm =
            serde_json::from_str(r#"{"battleID": 3, "beatID": 9, "placement": 2}"#).unwrap();
        assert_eq!(form.battle_id, Some(3));
        assert_eq!(form.beat_id, Some(9));
        assert_eq!(form.placement, Some(2));
        assert!(form.feedback.is_none());
    }
}
