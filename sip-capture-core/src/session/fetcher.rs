use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;

use crate::models::error::{CaptureError, EntryError};
use crate::models::sip_message::SipMessage;
use crate::models::state::CaptureStatus;
use crate::processing::history_parser::{extract_command_output, parse_entry_detail, parse_history_list};
use crate::session::poll_loop::StopSignal;
use crate::session::SessionState;
use crate::traits::transport::{commands, ManagementTransport};

/// What one poll cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleOutcome {
    /// New entries found above the cursor, before the batch cap.
    pub discovered: usize,
    /// Entries attempted this cycle.
    pub processed: usize,
    /// Messages appended to the store.
    pub added: usize,
    /// Cursor after the cycle.
    pub cursor: i64,
}

/// Runs a single fetch cycle against the PBX history.
///
/// Lists the history, fetches the details of up to `batch_limit` entries
/// above the cursor, appends parsed messages and advances the cursor to the
/// highest entry actually attempted. The store lock is never held across a
/// remote command.
///
/// Fetchers built by one controller share a cycle lock, held for a whole
/// cycle, so the worker and [`poll_once`](crate::CaptureController::poll_once)
/// never read the same cursor and fetch the same entries twice.
#[derive(Clone)]
pub struct HistoryFetcher {
    transport: Arc<dyn ManagementTransport>,
    state: Arc<Mutex<SessionState>>,
    cycle: Arc<Mutex<()>>,
    batch_limit: usize,
    command_timeout: Duration,
}

impl HistoryFetcher {
    pub(crate) fn new(
        transport: Arc<dyn ManagementTransport>,
        state: Arc<Mutex<SessionState>>,
        cycle: Arc<Mutex<()>>,
        batch_limit: usize,
        command_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            state,
            cycle,
            batch_limit,
            command_timeout,
        }
    }

    /// Run one cycle. Per-entry failures are logged and skipped; only a
    /// failed history listing fails the cycle.
    pub fn run_cycle(&self, stop: &StopSignal) -> Result<CycleOutcome, CaptureError> {
        let _cycle = self.cycle.lock();

        if !self.transport.is_connected() {
            return Ok(self.idle_outcome());
        }

        let response = self
            .transport
            .send_command(commands::SHOW_HISTORY, self.command_timeout)?;
        let output = extract_command_output(&response);
        if output.trim().is_empty() {
            log::debug!("No output from pjsip show history");
            return Ok(self.idle_outcome());
        }

        let (cursor, generation) = {
            let s = self.state.lock();
            (s.store.cursor(), s.generation)
        };

        let mut pending: Vec<u32> = parse_history_list(&output)
            .into_iter()
            .map(|entry| entry.number)
            .filter(|&number| i64::from(number) > cursor)
            .collect();
        pending.sort_unstable();
        pending.dedup();

        let mut outcome = CycleOutcome {
            discovered: pending.len(),
            cursor,
            ..Default::default()
        };

        if pending.is_empty() {
            self.state.lock().cleanup_old();
            return Ok(outcome);
        }

        pending.truncate(self.batch_limit);
        let mut highest = None;

        for &number in &pending {
            if stop.is_stopped() {
                log::debug!("Stop requested, leaving entry {} for later", number);
                break;
            }

            let result = self.fetch_entry(number);
            outcome.processed += 1;
            highest = Some(number);

            let mut s = self.state.lock();
            if s.generation != generation {
                log::debug!("Capture restarted during poll, discarding cycle");
                return Ok(outcome);
            }
            match result {
                Ok(message) => {
                    s.diagnostics.entries_fetched += 1;
                    let evicted = s.store.append(message);
                    s.diagnostics.evicted_by_count += evicted as u64;
                    outcome.added += 1;
                }
                Err(EntryError::MissingCallId) => {
                    s.diagnostics.entries_fetched += 1;
                    s.diagnostics.messages_dropped += 1;
                    log::debug!("History entry {} has no Call-ID, dropped", number);
                }
                Err(e) => {
                    s.diagnostics.entries_failed += 1;
                    log::warn!("Failed to fetch history entry {}: {}", number, e);
                }
            }
        }

        let mut s = self.state.lock();
        if s.generation == generation {
            if let Some(number) = highest {
                s.store.advance_cursor(i64::from(number));
            }
            s.cleanup_old();
            outcome.cursor = s.store.cursor();
        }
        log::debug!(
            "SIP history poll: {} new, {} processed, {} stored, cursor {}",
            outcome.discovered,
            outcome.processed,
            outcome.added,
            outcome.cursor
        );
        Ok(outcome)
    }

    /// Fetch and parse one history entry.
    pub fn fetch_entry(&self, number: u32) -> Result<SipMessage, EntryError> {
        let response = self
            .transport
            .send_command(&commands::show_entry(number), self.command_timeout)?;
        let output = extract_command_output(&response);
        if output.trim().is_empty() {
            return Err(EntryError::EmptyOutput);
        }
        parse_entry_detail(&output, Utc::now())
    }

    pub(crate) fn record_failed_cycle(&self) {
        let mut s = self.state.lock();
        s.diagnostics.cycles_run += 1;
        s.diagnostics.cycles_failed += 1;
    }

    pub(crate) fn record_cycle(&self) {
        self.state.lock().diagnostics.cycles_run += 1;
    }

    pub(crate) fn status(&self, enabled: bool) -> CaptureStatus {
        let s = self.state.lock();
        CaptureStatus {
            enabled,
            message_count: s.store.len(),
            call_count: s.store.call_count(),
        }
    }

    fn idle_outcome(&self) -> CycleOutcome {
        CycleOutcome {
            cursor: self.state.lock().store.cursor(),
            ..Default::default()
        }
    }
}
