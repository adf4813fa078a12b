//! # sip-capture-core
//!
//! SIP message capture from Asterisk's `res_pjsip_history`.
//!
//! Polls `pjsip show history` over the manager interface, fetches the full
//! text of each new entry, and keeps the parsed messages in a bounded store
//! indexed by Call-ID for the admin UI's call browser.
//!
//! ## Architecture
//!
//! ```text
//! sip-capture-core (this crate)
//! ├── traits/       ← ManagementTransport, CaptureDelegate
//! ├── models/       ← CaptureError, SipMessage, CallSummary, CaptureConfiguration, CaptureStatus
//! ├── processing/   ← history list / entry detail parsers
//! ├── storage/      ← MessageStore (count + age eviction)
//! ├── session/      ← CaptureController, HistoryFetcher, poll worker
//! └── facade        ← SipDebugFacade (what the HTTP routes call)
//! ```

pub mod facade;
pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export key types at crate root for convenience.
pub use facade::SipDebugFacade;
pub use models::config::CaptureConfiguration;
pub use models::error::{CaptureError, EntryError, TransportError};
pub use models::sip_message::{CallSummary, Direction, SipMessage};
pub use models::state::{CaptureDiagnostics, CaptureStatus};
pub use processing::history_parser::{extract_command_output, parse_entry_detail, parse_history_list, HistoryEntry};
pub use session::controller::CaptureController;
pub use session::fetcher::CycleOutcome;
pub use storage::message_store::MessageStore;
pub use traits::capture_delegate::CaptureDelegate;
pub use traits::transport::{commands, CommandResponse, ManagementTransport};
