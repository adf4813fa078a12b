use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::models::error::CaptureError;
use crate::session::fetcher::HistoryFetcher;
use crate::traits::capture_delegate::CaptureDelegate;

/// One-shot stop flag the poll worker can sleep on.
///
/// `stop()` wakes a pending [`StopSignal::wait_timeout`] immediately, so the
/// worker never finishes its inter-cycle sleep after a disable.
#[derive(Debug, Default)]
pub struct StopSignal {
    stopped: Mutex<bool>,
    condvar: Condvar,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        *self.stopped.lock() = true;
        self.condvar.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        *self.stopped.lock()
    }

    /// Sleep for up to `timeout`. Returns `true` if stopped.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut stopped = self.stopped.lock();
        if !*stopped {
            // Spurious wakeups just shorten one interval.
            let _ = self.condvar.wait_for(&mut stopped, timeout);
        }
        *stopped
    }
}

/// Handle to a running poll worker thread.
pub(crate) struct PollWorker {
    handle: thread::JoinHandle<()>,
    stop: Arc<StopSignal>,
}

impl PollWorker {
    /// Spawn the worker. It runs `fetcher` once per `interval` while
    /// `enabled` is set and no stop was requested.
    pub(crate) fn spawn(
        fetcher: HistoryFetcher,
        enabled: Arc<AtomicBool>,
        interval: Duration,
        delegate: Option<Arc<dyn CaptureDelegate>>,
    ) -> Result<Self, CaptureError> {
        let stop = Arc::new(StopSignal::new());
        let worker_stop = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name("sip-history-poll".into())
            .spawn(move || {
                poll_loop(&fetcher, &enabled, &worker_stop, interval, delegate.as_deref());
                log::debug!("SIP history poll loop exited");
            })
            .map_err(|e| CaptureError::WorkerSpawn(e.to_string()))?;

        Ok(Self { handle, stop })
    }

    pub(crate) fn thread_id(&self) -> thread::ThreadId {
        self.handle.thread().id()
    }

    pub(crate) fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Ask the worker to stop without waiting for it.
    pub(crate) fn signal_stop(&self) {
        self.stop.stop();
    }

    /// Stop the worker and wait until it has exited.
    pub(crate) fn shutdown(self) {
        self.stop.stop();
        if self.handle.join().is_err() {
            log::error!("SIP history poll worker panicked");
        }
    }
}

fn poll_loop(
    fetcher: &HistoryFetcher,
    enabled: &AtomicBool,
    stop: &StopSignal,
    interval: Duration,
    delegate: Option<&dyn CaptureDelegate>,
) {
    while enabled.load(Ordering::SeqCst) && !stop.is_stopped() {
        match fetcher.run_cycle(stop) {
            Ok(outcome) => {
                fetcher.record_cycle();
                if outcome.added > 0 {
                    if let Some(d) = delegate {
                        d.on_messages_captured(outcome.added, &fetcher.status(enabled.load(Ordering::SeqCst)));
                    }
                }
            }
            Err(e) => {
                log::error!("SIP debug poll error: {}", e);
                fetcher.record_failed_cycle();
                if let Some(d) = delegate {
                    d.on_cycle_failed(&e);
                }
            }
        }

        if stop.wait_timeout(interval) {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn wait_returns_early_when_stopped() {
        let signal = Arc::new(StopSignal::new());
        let waiter = Arc::clone(&signal);

        let handle = thread::spawn(move || {
            let start = Instant::now();
            let stopped = waiter.wait_timeout(Duration::from_secs(30));
            (stopped, start.elapsed())
        });

        thread::sleep(Duration::from_millis(50));
        signal.stop();

        let (stopped, elapsed) = handle.join().unwrap();
        assert!(stopped);
        assert!(elapsed < Duration::from_secs(10));
    }

    #[test]
    fn wait_times_out_when_not_stopped() {
        let signal = StopSignal::new();
        assert!(!signal.wait_timeout(Duration::from_millis(10)));
        assert!(!signal.is_stopped());
    }

    #[test]
    fn stop_is_sticky() {
        let signal = StopSignal::new();
        signal.stop();
        assert!(signal.is_stopped());
        assert!(signal.wait_timeout(Duration::from_secs(30)));
    }
}
