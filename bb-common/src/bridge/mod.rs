//! Command bridge
//!
//! Lets a short-lived trigger process ask the long-lived bot process to run a
//! named service. The bot runs a [`BridgeServer`] on a well-known endpoint; a
//! [`BridgeClient`] connects, emits exactly one `service` event and closes
//! after a short grace period. There is no acknowledgement: delivery is
//! attempted at most once and the client never learns whether a handler ran.
//!
//! Endpoints are either a TCP address (`127.0.0.1:5761`) or, on unix, a
//! Unix-domain socket path written as `unix:/run/beatbattle/bridge.sock`.

mod client;
mod protocol;
mod server;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

pub use client::{BridgeClient, ClientConfig, ClientState};
pub use protocol::{Frame, ServiceInvocation, SERVICE_EVENT};
pub use server::{BridgeListener, BridgeServer, ServiceRegistry, MAX_FRAME_BYTES};

/// Default TCP endpoint shared by the bot and the trigger
pub const DEFAULT_ENDPOINT: &str = "127.0.0.1:5761";

/// Command bridge failures
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Could not reach the server within the retry bound
    #[error("Could not connect to {endpoint} after {attempts} attempts")]
    ConnectionFailed { endpoint: String, attempts: u32 },

    /// Malformed or unexpected frame
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Endpoint string could not be used
    #[error("Invalid bridge endpoint: {0}")]
    InvalidEndpoint(String),

    /// Socket I/O failure
    #[error("Bridge I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where the bridge server listens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEndpoint {
    /// `host:port`
    Tcp(String),
    /// Unix-domain socket path
    Unix(PathBuf),
}

impl FromStr for BridgeEndpoint {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(path) = s.strip_prefix("unix:") {
            if !cfg!(unix) {
                return Err(BridgeError::InvalidEndpoint(format!(
                    "Unix sockets are not supported on this platform: {}",
                    s
                )));
            }
            if path.is_empty() {
                return Err(BridgeError::InvalidEndpoint(s.to_string()));
            }
            return Ok(BridgeEndpoint::Unix(PathBuf::from(path)));
        }
        if s.is_empty() || !s.contains(':') {
            return Err(BridgeError::InvalidEndpoint(s.to_string()));
        }
        Ok(BridgeEndpoint::Tcp(s.to_string()))
    }
}

impl fmt::Display for BridgeEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeEndpoint::Tcp(addr) => f.write_str(addr),
            BridgeEndpoint::Unix(path) => write!(f, "unix:{}", path.display()),
        }
    }
}
