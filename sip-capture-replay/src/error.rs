use thiserror::Error;

use sip_capture_core::CaptureError;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("io error: {0}")]
    Io(String),

    #[error("invalid recording: {0}")]
    Recording(String),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error("failed to encode output: {0}")]
    Output(String),
}
