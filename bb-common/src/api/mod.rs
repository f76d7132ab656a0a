//! REST contract shared by the web service and its clients
//!
//! Every mutating endpoint answers with an [`ActionResponse`] whose
//! `ToastQuery` field carries an [`OutcomeTag`]. Clients reconcile optimistic
//! state against that tag, never against the HTTP status alone.

pub mod types;

pub use types::{ActionForm, ActionResponse, OutcomeTag};
