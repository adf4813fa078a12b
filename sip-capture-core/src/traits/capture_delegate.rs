use crate::models::error::CaptureError;
use crate::models::state::CaptureStatus;

/// Event delegate for capture notifications.
///
/// Lifecycle callbacks run on the caller of `enable`/`disable`; the others
/// run on the poll worker thread. Implementations must not call back into
/// the controller from `on_messages_captured` or `on_cycle_failed`.
pub trait CaptureDelegate: Send + Sync {
    /// Called after capture was switched on or off.
    fn on_capture_changed(&self, enabled: bool);

    /// Called after a poll cycle stored at least one new message.
    fn on_messages_captured(&self, added: usize, status: &CaptureStatus);

    /// Called when a whole poll cycle failed.
    fn on_cycle_failed(&self, error: &CaptureError);
}
