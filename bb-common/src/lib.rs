//! # Beat Battle Common Library
//!
//! Shared code for the beatbattle processes (web service, bot, trigger):
//! - Contest/entry data model and database access
//! - Placement ranking engine (dense placements, disqualification)
//! - Vote budget manager
//! - Named registries used by chat commands and bridge services
//! - Command bridge protocol, server and client
//! - Event bus and SSE helpers
//! - Configuration loading

pub mod api;
pub mod bridge;
pub mod config;
pub mod countdown;
pub mod db;
pub mod error;
pub mod events;
pub mod locks;
pub mod ranking;
pub mod reconcile;
pub mod registry;
pub mod sse;
pub mod votes;

pub use error::{Error, Result};
pub use ranking::{Placement, Standing};
pub use registry::Registry;
pub use votes::{VoteBudgetManager, VoteLedger, VoteOutcome};
