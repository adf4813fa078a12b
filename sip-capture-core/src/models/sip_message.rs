use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which way a captured message travelled, seen from the PBX.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Sent,
    Received,
}

/// One captured SIP message.
///
/// Built once by the history parser and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SipMessage {
    pub timestamp: DateTime<Utc>,
    pub direction: Direction,
    /// Request method, empty for responses.
    pub method: String,
    /// Response status, 0 for requests.
    pub status_code: u16,
    pub call_id: String,
    #[serde(rename = "from")]
    pub from_header: String,
    #[serde(rename = "to")]
    pub to_header: String,
    pub cseq: String,
    pub raw_text: String,
    #[serde(rename = "addr")]
    pub remote_addr: String,
}

impl SipMessage {
    /// Requests carry a method; responses leave it empty, even when their
    /// status code could not be parsed.
    pub fn is_request(&self) -> bool {
        !self.method.is_empty()
    }
}

/// Per-call overview row, as listed by the call browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSummary {
    pub call_id: String,
    /// Timestamp of the earliest message still retained for the call.
    pub first_seen: DateTime<Utc>,
    pub from: String,
    pub to: String,
    /// First request method seen for the call, empty if only responses remain.
    pub method: String,
    pub message_count: usize,
}
