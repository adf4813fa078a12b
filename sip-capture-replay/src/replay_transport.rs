use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::json;

use sip_capture_core::{CommandResponse, ManagementTransport, TransportError};

use crate::error::ReplayError;

/// Recorded manager replies, keyed by the exact CLI command.
#[derive(Debug, Deserialize)]
pub struct Recording {
    #[serde(default = "default_connected")]
    pub connected: bool,
    pub responses: HashMap<String, CommandResponse>,
    /// Commands the PBX never answered while recording.
    #[serde(default)]
    pub timeouts: Vec<String>,
}

fn default_connected() -> bool {
    true
}

/// Transport that answers from a [`Recording`] instead of a live PBX.
///
/// `pjsip set history ...` commands always succeed; any other command without
/// a recorded reply fails like a rejected AMI action. Commands listed under
/// `timeouts` fail with [`TransportError::Timeout`].
pub struct ReplayTransport {
    recording: Recording,
    issued: Mutex<Vec<String>>,
}

impl ReplayTransport {
    pub fn new(recording: Recording) -> Self {
        Self {
            recording,
            issued: Mutex::new(Vec::new()),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ReplayError> {
        let json = fs::read_to_string(path).map_err(|e| ReplayError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self, ReplayError> {
        let recording: Recording = serde_json::from_str(json).map_err(|e| ReplayError::Recording(e.to_string()))?;
        Ok(Self::new(recording))
    }

    /// Commands issued so far, in order.
    pub fn issued(&self) -> Vec<String> {
        self.issued.lock().clone()
    }
}

impl ManagementTransport for ReplayTransport {
    fn is_connected(&self) -> bool {
        self.recording.connected
    }

    fn send_command(&self, command: &str, _timeout: Duration) -> Result<CommandResponse, TransportError> {
        self.issued.lock().push(command.to_string());
        if !self.recording.connected {
            return Err(TransportError::NotConnected);
        }
        if self.recording.timeouts.iter().any(|c| c == command) {
            return Err(TransportError::Timeout);
        }
        if let Some(response) = self.recording.responses.get(command) {
            return Ok(response.clone());
        }
        if command.starts_with("pjsip set history") {
            return Ok(json!({"Response": "Success"}));
        }
        Err(TransportError::CommandFailed(format!("no recorded reply for '{}'", command)))
    }
}
