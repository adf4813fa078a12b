use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::models::sip_message::{CallSummary, SipMessage};

/// Cursor value meaning "no history entry processed since the last reset".
pub const NO_ENTRY: i64 = -1;

/// Bounded, call-indexed store of captured SIP messages.
///
/// Two structures are kept in lockstep:
/// - `messages`: arrival order, oldest at the head.
/// - `by_call_id`: per-call sub-sequences in arrival order.
///
/// Every message in one is in the other, and no call maps to an empty list.
/// Not synchronized itself; the controller keeps it behind a
/// `parking_lot::Mutex` so both halves always change under one lock.
///
/// Eviction removes a message from its call list by identity, which is linear
/// in that call's message count. Calls hold a handful of messages in
/// practice, so that cost is accepted.
#[derive(Debug)]
pub struct MessageStore {
    messages: VecDeque<Arc<SipMessage>>,
    by_call_id: HashMap<String, Vec<Arc<SipMessage>>>,
    cursor: i64,
    max_messages: usize,
    max_age: chrono::Duration,
}

impl MessageStore {
    pub fn new(max_messages: usize, max_age: Duration) -> Self {
        Self {
            messages: VecDeque::new(),
            by_call_id: HashMap::new(),
            cursor: NO_ENTRY,
            max_messages,
            max_age: chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX),
        }
    }

    /// Append a message and enforce the count cap.
    ///
    /// Returns how many old messages were evicted to make room.
    pub fn append(&mut self, message: SipMessage) -> usize {
        let message = Arc::new(message);
        self.by_call_id
            .entry(message.call_id.clone())
            .or_default()
            .push(Arc::clone(&message));
        self.messages.push_back(message);

        let mut evicted = 0;
        while self.messages.len() > self.max_messages {
            if self.evict_oldest().is_none() {
                break;
            }
            evicted += 1;
        }
        evicted
    }

    /// Remove the head message from both structures.
    pub fn evict_oldest(&mut self) -> Option<Arc<SipMessage>> {
        let old = self.messages.pop_front()?;
        self.unindex(&old);
        Some(old)
    }

    /// Drop expired messages from the head, using the current time.
    pub fn cleanup_old(&mut self) -> usize {
        self.cleanup_old_at(Utc::now())
    }

    /// Drop messages older than `now - max_age` from the head.
    ///
    /// Stops at the first message that has not expired. Timestamps come from
    /// the PBX and are only roughly in arrival order, so an out-of-order stale
    /// message survives until it reaches the head.
    pub fn cleanup_old_at(&mut self, now: DateTime<Utc>) -> usize {
        let Some(cutoff) = now.checked_sub_signed(self.max_age) else {
            return 0;
        };
        let mut removed = 0;
        while self
            .messages
            .front()
            .is_some_and(|head| head.timestamp < cutoff)
        {
            if self.evict_oldest().is_none() {
                break;
            }
            removed += 1;
        }
        removed
    }

    /// Summaries of all retained calls, most recently first-seen call first.
    ///
    /// Calls sharing a `first_seen` second keep the arrival order of their
    /// first retained message.
    pub fn calls(&self) -> Vec<CallSummary> {
        let mut seen = HashSet::new();
        let mut calls: Vec<CallSummary> = self
            .messages
            .iter()
            .filter(|m| seen.insert(m.call_id.as_str()))
            .filter_map(|head| {
                let msgs = self.by_call_id.get(&head.call_id)?;
                let first = msgs.first()?;
                let method = msgs
                    .iter()
                    .find(|m| m.is_request())
                    .map(|m| m.method.clone())
                    .unwrap_or_default();
                Some(CallSummary {
                    call_id: head.call_id.clone(),
                    first_seen: first.timestamp,
                    from: first.from_header.clone(),
                    to: first.to_header.clone(),
                    method,
                    message_count: msgs.len(),
                })
            })
            .collect();
        calls.sort_by(|a, b| b.first_seen.cmp(&a.first_seen));
        calls
    }

    /// Messages of one call in arrival order, empty if unknown.
    pub fn call_messages(&self, call_id: &str) -> Vec<SipMessage> {
        self.by_call_id
            .get(call_id)
            .map(|msgs| msgs.iter().map(|m| SipMessage::clone(m)).collect())
            .unwrap_or_default()
    }

    /// Empty both structures and reset the cursor.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.by_call_id.clear();
        self.cursor = NO_ENTRY;
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn call_count(&self) -> usize {
        self.by_call_id.len()
    }

    /// Highest history entry number fully processed, or [`NO_ENTRY`].
    pub fn cursor(&self) -> i64 {
        self.cursor
    }

    /// Move the cursor forward. Never moves it back.
    pub fn advance_cursor(&mut self, entry: i64) {
        self.cursor = self.cursor.max(entry);
    }

    pub fn reset_cursor(&mut self) {
        self.cursor = NO_ENTRY;
    }

    fn unindex(&mut self, message: &Arc<SipMessage>) {
        let Some(list) = self.by_call_id.get_mut(&message.call_id) else {
            return;
        };
        if let Some(pos) = list.iter().position(|m| Arc::ptr_eq(m, message)) {
            list.remove(pos);
        }
        if list.is_empty() {
            self.by_call_id.remove(&message.call_id);
        }
    }
}
