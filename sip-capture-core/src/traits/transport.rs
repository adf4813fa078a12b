use std::time::Duration;

use crate::models::error::TransportError;

/// Raw reply to a manager `Command` action.
///
/// Depending on the client library this is a bare string, an object carrying
/// the text under `Output` or `content`, or a list of either.
pub type CommandResponse = serde_json::Value;

/// Interface to the PBX management connection (Asterisk AMI).
///
/// Implemented by the application's AMI client. Calls block the calling
/// thread; implementations must give up after `timeout`.
pub trait ManagementTransport: Send + Sync {
    /// Whether the connection is currently up.
    fn is_connected(&self) -> bool;

    /// Run a CLI command on the PBX and return its reply.
    fn send_command(&self, command: &str, timeout: Duration) -> Result<CommandResponse, TransportError>;
}

/// CLI commands issued against `res_pjsip_history`.
pub mod commands {
    pub const HISTORY_ON: &str = "pjsip set history on";
    pub const HISTORY_CLEAR: &str = "pjsip set history clear";
    pub const HISTORY_OFF: &str = "pjsip set history off";
    pub const SHOW_HISTORY: &str = "pjsip show history";

    pub fn show_entry(number: u32) -> String {
        format!("pjsip show history entry {}", number)
    }
}
