use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::config::CaptureConfiguration;
use crate::models::error::CaptureError;
use crate::models::sip_message::{CallSummary, SipMessage};
use crate::models::state::{CaptureDiagnostics, CaptureStatus};
use crate::session::fetcher::{CycleOutcome, HistoryFetcher};
use crate::session::poll_loop::{PollWorker, StopSignal};
use crate::session::SessionState;
use crate::storage::message_store::MessageStore;
use crate::traits::capture_delegate::CaptureDelegate;
use crate::traits::transport::{commands, ManagementTransport};

/// Owns the SIP history capture lifecycle.
///
/// ```text
/// enable:  [history on] → [history clear] → cursor = -1 → [poll worker]
///                                                              ↓ every poll_interval
///          [pjsip show history] → [entry N ...] → MessageStore → cleanup
/// disable: enabled = false → stop worker → [history off] → join worker
/// ```
///
/// All methods take `&self`; enable and disable are serialized on the
/// worker slot, so the controller can be shared behind an `Arc`.
pub struct CaptureController {
    transport: Arc<dyn ManagementTransport>,
    config: CaptureConfiguration,
    state: Arc<Mutex<SessionState>>,
    // Held for a whole fetch cycle; one cycle at a time per controller
    cycle: Arc<Mutex<()>>,
    enabled: Arc<AtomicBool>,
    delegate: Option<Arc<dyn CaptureDelegate>>,

    // Poll worker slot; also the lifecycle lock
    worker: Mutex<Option<PollWorker>>,
}

impl CaptureController {
    pub fn new(
        transport: Arc<dyn ManagementTransport>,
        config: CaptureConfiguration,
    ) -> Result<Self, CaptureError> {
        config.validate().map_err(CaptureError::ConfigurationFailed)?;

        let store = MessageStore::new(config.max_messages, config.max_age);
        Ok(Self {
            transport,
            config,
            state: Arc::new(Mutex::new(SessionState::new(store))),
            cycle: Arc::new(Mutex::new(())),
            enabled: Arc::new(AtomicBool::new(false)),
            delegate: None,
            worker: Mutex::new(None),
        })
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn CaptureDelegate>) {
        self.delegate = Some(delegate);
    }

    pub fn config(&self) -> &CaptureConfiguration {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Whether a poll worker thread is currently running.
    pub fn is_polling(&self) -> bool {
        self.worker.lock().as_ref().is_some_and(PollWorker::is_active)
    }

    /// Turn on PJSIP history on the PBX and start polling it.
    ///
    /// Fails with [`CaptureError::TransportUnavailable`] without touching any
    /// state when the manager connection is down. Calling it while already
    /// enabled restarts the remote history but keeps the running worker.
    pub fn enable(&self) -> Result<(), CaptureError> {
        let mut worker = self.worker.lock();

        if !self.transport.is_connected() {
            return Err(CaptureError::TransportUnavailable);
        }

        // On before clear, so the clear hits a history that is known to be on
        let timeout = self.config.command_timeout;
        self.transport.send_command(commands::HISTORY_ON, timeout)?;
        self.transport.send_command(commands::HISTORY_CLEAR, timeout)?;

        self.state.lock().restart_cursor();
        self.enabled.store(true, Ordering::SeqCst);

        let running = worker.as_ref().is_some_and(PollWorker::is_active);
        if !running {
            if let Some(finished) = worker.take() {
                finished.shutdown();
            }
            match PollWorker::spawn(
                self.fetcher(),
                Arc::clone(&self.enabled),
                self.config.poll_interval,
                self.delegate.clone(),
            ) {
                Ok(w) => *worker = Some(w),
                Err(e) => {
                    self.enabled.store(false, Ordering::SeqCst);
                    return Err(e);
                }
            }
        }
        drop(worker);

        log::info!("SIP debug capture enabled (pjsip history)");
        if let Some(ref d) = self.delegate {
            d.on_capture_changed(true);
        }
        Ok(())
    }

    /// Stop polling and turn PJSIP history off on the PBX.
    ///
    /// Always reaches the disabled state locally. A failing `history off` is
    /// logged only. Once this returns, the worker has exited and the store is
    /// no longer written to.
    pub fn disable(&self) {
        let mut worker = self.worker.lock();

        self.enabled.store(false, Ordering::SeqCst);
        let running = worker.take();
        if let Some(ref w) = running {
            w.signal_stop();
        }

        if self.transport.is_connected() {
            if let Err(e) = self
                .transport
                .send_command(commands::HISTORY_OFF, self.config.command_timeout)
            {
                log::warn!("Failed to disable pjsip history: {}", e);
            }
        }

        if let Some(w) = running {
            w.shutdown();
        }
        drop(worker);

        log::info!("SIP debug capture disabled");
        if let Some(ref d) = self.delegate {
            d.on_capture_changed(false);
        }
    }

    /// Run one fetch cycle on the calling thread.
    ///
    /// Used for offline replays and tests; does not require capture to be
    /// enabled. While the worker is mid-cycle this waits for that cycle to
    /// finish and then only picks up entries it left behind.
    pub fn poll_once(&self) -> Result<CycleOutcome, CaptureError> {
        let fetcher = self.fetcher();
        match fetcher.run_cycle(&StopSignal::new()) {
            Ok(outcome) => {
                fetcher.record_cycle();
                Ok(outcome)
            }
            Err(e) => {
                fetcher.record_failed_cycle();
                Err(e)
            }
        }
    }

    /// Highest history entry processed since the last reset, or -1.
    pub fn cursor(&self) -> i64 {
        self.state.lock().store.cursor()
    }

    pub fn status(&self) -> CaptureStatus {
        let mut s = self.state.lock();
        s.cleanup_old();
        CaptureStatus {
            enabled: self.is_enabled(),
            message_count: s.store.len(),
            call_count: s.store.call_count(),
        }
    }

    pub fn calls(&self) -> Vec<CallSummary> {
        let mut s = self.state.lock();
        s.cleanup_old();
        s.store.calls()
    }

    /// Messages of one call in capture order; empty if unknown.
    pub fn call_messages(&self, call_id: &str) -> Vec<SipMessage> {
        let mut s = self.state.lock();
        s.cleanup_old();
        s.store.call_messages(call_id)
    }

    /// Drop all captured messages and reset the cursor. Leaves `enabled` as is.
    pub fn clear(&self) {
        self.state.lock().clear();
    }

    pub fn diagnostics(&self) -> CaptureDiagnostics {
        self.state.lock().diagnostics
    }

    fn fetcher(&self) -> HistoryFetcher {
        HistoryFetcher::new(
            Arc::clone(&self.transport),
            Arc::clone(&self.state),
            Arc::clone(&self.cycle),
            self.config.batch_limit,
            self.config.command_timeout,
        )
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        self.enabled.store(false, Ordering::SeqCst);
        if let Some(w) = self.worker.get_mut().take() {
            w.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::{Duration, Instant};

    use crate::storage::message_store::NO_ENTRY;
    use crate::test_support::ScriptedTransport;

    #[derive(Default)]
    struct RecordingDelegate {
        changes: Mutex<Vec<bool>>,
        captured: Mutex<usize>,
        failures: Mutex<usize>,
    }

    impl CaptureDelegate for RecordingDelegate {
        fn on_capture_changed(&self, enabled: bool) {
            self.changes.lock().push(enabled);
        }

        fn on_messages_captured(&self, added: usize, _status: &CaptureStatus) {
            *self.captured.lock() += added;
        }

        fn on_cycle_failed(&self, _error: &CaptureError) {
            *self.failures.lock() += 1;
        }
    }

    fn fast_config() -> CaptureConfiguration {
        CaptureConfiguration {
            poll_interval: Duration::from_millis(10),
            ..Default::default()
        }
    }

    fn controller(transport: &Arc<ScriptedTransport>) -> CaptureController {
        CaptureController::new(transport.clone(), fast_config()).unwrap()
    }

    fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        cond()
    }

    #[test]
    fn rejects_invalid_config() {
        let transport = Arc::new(ScriptedTransport::new());
        let config = CaptureConfiguration {
            batch_limit: 0,
            ..Default::default()
        };
        let result = CaptureController::new(transport, config);
        assert!(matches!(result, Err(CaptureError::ConfigurationFailed(_))));
    }

    #[test]
    fn enable_requires_connection() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.set_connected(false);
        let ctl = controller(&transport);

        assert_eq!(ctl.enable(), Err(CaptureError::TransportUnavailable));
        assert!(!ctl.is_enabled());
        assert!(!ctl.is_polling());
        assert!(transport.commands().is_empty());
    }

    #[test]
    fn enable_turns_history_on_then_clears() {
        let transport = Arc::new(ScriptedTransport::new());
        let ctl = controller(&transport);

        ctl.enable().unwrap();

        let issued = transport.commands();
        assert_eq!(issued[0], commands::HISTORY_ON);
        assert_eq!(issued[1], commands::HISTORY_CLEAR);
        assert!(ctl.is_enabled());
        assert!(ctl.is_polling());
        ctl.disable();
    }

    #[test]
    fn failed_remote_enable_leaves_state_untouched() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.fail(commands::HISTORY_CLEAR);
        let ctl = controller(&transport);

        assert!(matches!(ctl.enable(), Err(CaptureError::Transport(_))));
        assert!(!ctl.is_enabled());
        assert!(!ctl.is_polling());
    }

    #[test]
    fn enable_twice_keeps_single_worker() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.script_history(1..=3);
        let ctl = controller(&transport);

        ctl.enable().unwrap();
        let first = ctl.worker.lock().as_ref().map(PollWorker::thread_id);
        ctl.enable().unwrap();
        let second = ctl.worker.lock().as_ref().map(PollWorker::thread_id);

        assert!(first.is_some());
        assert_eq!(first, second);
        let issued_on = transport
            .commands()
            .iter()
            .filter(|c| c.as_str() == commands::HISTORY_ON)
            .count();
        assert_eq!(issued_on, 2);
        assert!(wait_until(|| ctl.cursor() == 3));
        ctl.disable();
    }

    #[test]
    fn worker_captures_messages() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.script_history(1..=3);
        let mut ctl = controller(&transport);
        let delegate = Arc::new(RecordingDelegate::default());
        ctl.set_delegate(delegate.clone());

        ctl.enable().unwrap();
        assert!(wait_until(|| ctl.status().message_count == 3));
        ctl.disable();

        assert_eq!(ctl.cursor(), 3);
        assert_eq!(ctl.calls().len(), 3);
        assert_eq!(ctl.call_messages("call-2").len(), 1);
        assert_eq!(*delegate.captured.lock(), 3);
        assert_eq!(*delegate.changes.lock(), vec![true, false]);
        assert!(ctl.diagnostics().cycles_run >= 1);
    }

    #[test]
    fn failing_cycles_keep_worker_alive() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.fail(commands::SHOW_HISTORY);
        let mut ctl = controller(&transport);
        let delegate = Arc::new(RecordingDelegate::default());
        ctl.set_delegate(delegate.clone());

        ctl.enable().unwrap();
        assert!(wait_until(|| ctl.diagnostics().cycles_failed >= 3));
        assert!(ctl.is_polling());
        ctl.disable();

        assert!(*delegate.failures.lock() >= 3);
    }

    #[test]
    fn disable_stops_worker_even_if_remote_fails() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.fail(commands::HISTORY_OFF);
        let ctl = CaptureController::new(
            transport.clone(),
            CaptureConfiguration {
                poll_interval: Duration::from_secs(60),
                ..Default::default()
            },
        )
        .unwrap();
        ctl.enable().unwrap();

        let start = Instant::now();
        ctl.disable();

        assert!(start.elapsed() < Duration::from_secs(30));
        assert!(!ctl.is_enabled());
        assert!(!ctl.is_polling());
        assert!(transport.commands().contains(&commands::HISTORY_OFF.to_string()));
    }

    #[test]
    fn disable_skips_remote_when_disconnected() {
        let transport = Arc::new(ScriptedTransport::new());
        let ctl = controller(&transport);
        ctl.enable().unwrap();
        transport.set_connected(false);

        ctl.disable();

        assert!(!ctl.is_enabled());
        assert!(!transport.commands().contains(&commands::HISTORY_OFF.to_string()));
    }

    #[test]
    fn no_writes_after_disable() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.script_history(1..=3);
        let ctl = controller(&transport);
        ctl.enable().unwrap();
        ctl.disable();

        let before = ctl.status().message_count;
        transport.script_history(1..=10);
        thread::sleep(Duration::from_millis(50));

        assert_eq!(ctl.status().message_count, before);
    }

    #[test]
    fn poll_once_waits_for_running_worker_cycle() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.script_history(1..=3);
        let ctl = Arc::new(controller(&transport));

        type Manual = thread::JoinHandle<Result<CycleOutcome, CaptureError>>;
        let manual: Arc<Mutex<Option<Manual>>> = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&manual);
        let weak = Arc::downgrade(&ctl);
        transport.on_command(&commands::show_entry(1), move || {
            {
                let mut slot = slot.lock();
                if slot.is_some() {
                    return;
                }
                let Some(ctl) = weak.upgrade() else {
                    return;
                };
                *slot = Some(thread::spawn(move || ctl.poll_once()));
            }
            // Leave room for the manual cycle to overlap the worker's
            thread::sleep(Duration::from_millis(50));
        });

        ctl.enable().unwrap();
        assert!(wait_until(|| manual.lock().is_some()));
        let handle = manual.lock().take().unwrap();
        let outcome = handle.join().unwrap().unwrap();
        ctl.disable();

        assert_eq!(outcome.processed, 0);
        assert_eq!(outcome.cursor, 3);
        assert_eq!(ctl.status().message_count, 3);
        assert_eq!(ctl.call_messages("call-1").len(), 1);
        assert_eq!(ctl.diagnostics().entries_fetched, 3);
    }

    #[test]
    fn enable_resets_cursor_but_keeps_messages() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.script_history(1..=3);
        let ctl = controller(&transport);
        ctl.poll_once().unwrap();
        assert_eq!(ctl.cursor(), 3);

        transport.set_response(commands::SHOW_HISTORY, serde_json::json!(""));
        ctl.enable().unwrap();
        ctl.disable();

        assert_eq!(ctl.cursor(), NO_ENTRY);
        assert_eq!(ctl.status().message_count, 3);
    }

    #[test]
    fn clear_keeps_enabled_flag() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.script_history(1..=2);
        let ctl = CaptureController::new(
            transport.clone(),
            CaptureConfiguration {
                poll_interval: Duration::from_secs(60),
                ..Default::default()
            },
        )
        .unwrap();
        ctl.enable().unwrap();
        assert!(wait_until(|| ctl.cursor() == 2));

        ctl.clear();
        let status = ctl.status();
        ctl.disable();

        assert!(status.enabled);
        assert_eq!(ctl.status().call_count, 0);
    }

    #[test]
    fn drop_joins_worker() {
        let transport = Arc::new(ScriptedTransport::new());
        let ctl = controller(&transport);
        ctl.enable().unwrap();
        drop(ctl);

        let issued = transport.commands().len();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(transport.commands().len(), issued);
    }
}
