//! Common error types for beatbattle

use thiserror::Error;

use crate::bridge::BridgeError;
use crate::ranking::RankingError;
use crate::registry::DispatchError;
use crate::votes::VoteError;

/// Common result type for beatbattle operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the beatbattle processes
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Placement ranking rejected the operation
    #[error(transparent)]
    Ranking(#[from] RankingError),

    /// Vote budget rejected the operation
    #[error(transparent)]
    Vote(#[from] VoteError),

    /// Name lookup in a command or service table failed
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// Command bridge failure
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}
