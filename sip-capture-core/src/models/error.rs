use thiserror::Error;

/// Errors reported by the management transport.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport not connected")]
    NotConnected,

    #[error("command timed out")]
    Timeout,

    #[error("command failed: {0}")]
    CommandFailed(String),
}

/// Errors surfaced by the capture controller and query facade.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// The management transport is not connected; nothing was changed.
    #[error("AMI not connected")]
    TransportUnavailable,

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("call-id not found: {0}")]
    CallNotFound(String),

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("failed to spawn poll worker: {0}")]
    WorkerSpawn(String),
}

/// Why a single history entry produced no message.
///
/// Never leaves the fetch step: each one is logged and the batch moves on.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EntryError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("empty command output")]
    EmptyOutput,

    #[error("entry has no message body")]
    EmptyBody,

    #[error("message has no Call-ID")]
    MissingCallId,
}
