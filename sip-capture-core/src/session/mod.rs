pub mod controller;
pub mod fetcher;
pub mod poll_loop;

use crate::models::state::CaptureDiagnostics;
use crate::storage::message_store::MessageStore;

/// Mutable capture state, protected by one `parking_lot::Mutex`.
///
/// `generation` changes on every enable and clear. A poll cycle that started
/// under an older generation drops its results instead of writing stale
/// entries or a stale cursor into the fresh state.
#[derive(Debug)]
pub(crate) struct SessionState {
    pub(crate) store: MessageStore,
    pub(crate) diagnostics: CaptureDiagnostics,
    pub(crate) generation: u64,
}

impl SessionState {
    pub(crate) fn new(store: MessageStore) -> Self {
        Self {
            store,
            diagnostics: CaptureDiagnostics::default(),
            generation: 0,
        }
    }

    /// Start reading the remote history from scratch, keeping stored messages.
    pub(crate) fn restart_cursor(&mut self) {
        self.store.reset_cursor();
        self.generation += 1;
    }

    /// Empty the store, reset the cursor and invalidate in-flight cycles.
    pub(crate) fn clear(&mut self) {
        self.store.clear();
        self.generation += 1;
    }

    pub(crate) fn cleanup_old(&mut self) {
        let removed = self.store.cleanup_old();
        self.diagnostics.evicted_by_age += removed as u64;
    }
}
