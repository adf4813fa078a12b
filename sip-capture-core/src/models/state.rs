use serde::{Deserialize, Serialize};

/// Snapshot returned by the status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CaptureStatus {
    pub enabled: bool,
    pub message_count: usize,
    pub call_count: usize,
}

/// Counters for debugging the capture pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CaptureDiagnostics {
    pub cycles_run: u64,
    pub cycles_failed: u64,
    pub entries_fetched: u64,
    pub entries_failed: u64,
    /// Entries parsed but discarded because no Call-ID could be extracted.
    pub messages_dropped: u64,
    pub evicted_by_count: u64,
    pub evicted_by_age: u64,
}
