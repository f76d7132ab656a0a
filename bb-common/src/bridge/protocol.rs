//! Bridge wire format
//!
//! One JSON object per line:
//!
//! ```text
//! {"event":"service","data":["hourLeft","arg1","arg2"]}
//! ```
//!
//! `data` is the ordered argument list; its first element names the service.

use serde::{Deserialize, Serialize};

use super::BridgeError;

/// The only event the bridge carries
pub const SERVICE_EVENT: &str = "service";

/// Raw frame as it travels over the socket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,
    pub data: Vec<String>,
}

/// Request to run one named service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInvocation {
    pub service_name: String,
    pub args: Vec<String>,
}

impl ServiceInvocation {
    pub fn new(service_name: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            service_name: service_name.into(),
            args,
        }
    }

    /// Build from a positional list whose first element is the service name
    pub fn from_argv(mut argv: Vec<String>) -> Option<Self> {
        if argv.is_empty() || argv[0].trim().is_empty() {
            return None;
        }
        let service_name = argv.remove(0);
        Some(Self::new(service_name, argv))
    }

    pub fn to_frame(&self) -> Frame {
        let mut data = Vec::with_capacity(self.args.len() + 1);
        data.push(self.service_name.clone());
        data.extend(self.args.iter().cloned());
        Frame {
            event: SERVICE_EVENT.to_string(),
            data,
        }
    }

    /// Newline-terminated wire line
    pub fn encode(&self) -> Result<String, BridgeError> {
        let mut line = serde_json::to_string(&self.to_frame())
            .map_err(|e| BridgeError::Protocol(format!("Failed to encode frame: {}", e)))?;
        line.push('\n');
        Ok(line)
    }

    /// Parse one wire line
    pub fn decode(line: &str) -> Result<Self, BridgeError> {
        let frame: Frame = serde_json::from_str(line.trim())
            .map_err(|e| BridgeError::Protocol(format!("Malformed frame: {}", e)))?;

        if frame.event != SERVICE_EVENT {
            return Err(BridgeError::Protocol(format!(
                "Unexpected event: {}",
                frame.event
            )));
        }

        Self::from_argv(frame.data)
            .ok_or_else(|| BridgeError::Protocol("Service frame without a service name".to_string()))
    }
}
