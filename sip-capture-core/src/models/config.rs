use std::time::Duration;

/// Configuration for a capture controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfiguration {
    /// Wait between two poll cycles (default: 3s).
    pub poll_interval: Duration,

    /// Maximum number of new history entries fetched per cycle (default: 50).
    /// Entries beyond the cap stay eligible for the next cycle.
    pub batch_limit: usize,

    /// Hard cap on retained messages (default: 10,000).
    pub max_messages: usize,

    /// Messages older than this are dropped on the next cleanup pass (default: 2h).
    pub max_age: Duration,

    /// Upper bound handed to the transport for every remote command (default: 10s).
    pub command_timeout: Duration,
}

impl CaptureConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if self.poll_interval.is_zero() {
            return Err("poll interval must be positive".into());
        }
        if self.batch_limit == 0 {
            return Err("batch limit must be positive".into());
        }
        if self.max_messages == 0 {
            return Err("max messages must be positive".into());
        }
        if self.max_age.is_zero() {
            return Err("max age must be positive".into());
        }
        if chrono::Duration::from_std(self.max_age).is_err() {
            return Err(format!("max age out of range: {:?}", self.max_age));
        }
        if self.command_timeout.is_zero() {
            return Err("command timeout must be positive".into());
        }
        Ok(())
    }
}

impl Default for CaptureConfiguration {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
            batch_limit: 50,
            max_messages: 10_000,
            max_age: Duration::from_secs(2 * 60 * 60),
            command_timeout: Duration::from_secs(10),
        }
    }
}
