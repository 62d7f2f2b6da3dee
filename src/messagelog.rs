//! The shared append-only message log.
//!
//! Guarded by a single mutex paired with a condition variable broadcast on
//! every append. Eviction only ever removes from the head, so the log stays
//! contiguous and densely indexed; a worker's notion of "how far I've read"
//! is a count, re-derived against the current length on every wake rather
//! than trusted as a stable index (see `wait_and_drain`).

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::topic::Topic;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublisherMessage {
    pub topic: Topic,
    pub value: Vec<u8>,
    pub timestamp: u64,
}

struct Inner {
    messages: VecDeque<PublisherMessage>,
}

pub struct MessageLog {
    inner: Mutex<Inner>,
    arrived: Condvar,
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageLog {
    pub fn new() -> Self {
        MessageLog {
            inner: Mutex::new(Inner {
                messages: VecDeque::new(),
            }),
            arrived: Condvar::new(),
        }
    }

    /// Appends a message, stamping its timestamp under the lock, then wakes
    /// every subscriber worker blocked on arrival. Returns the new count.
    pub fn append(&self, topic: Topic, value: Vec<u8>) -> usize {
        let mut guard = self.inner.lock().unwrap();
        let message = PublisherMessage {
            topic,
            value,
            timestamp: now_secs(),
        };
        guard.messages.push_back(message);
        let count = guard.messages.len();
        drop(guard);
        self.arrived.notify_all();
        count
    }

    pub fn count(&self) -> usize {
        self.inner.lock().unwrap().messages.len()
    }

    /// A copy of every message currently in the log, for persistent-replay.
    pub fn snapshot(&self) -> Vec<PublisherMessage> {
        self.inner.lock().unwrap().messages.iter().cloned().collect()
    }

    /// Blocks until the log's count differs from `cursor`, then — still
    /// holding the lock — computes the batch of newly-arrived messages a
    /// worker with that cursor should see, clamping the cursor to the
    /// current count first. A stale `cursor` larger than the current count
    /// (because the head was evicted while the worker slept) is clamped
    /// rather than underflowing.
    ///
    /// `persistent` selects whether the whole new tail is returned (in
    /// order) or only the single newest message.
    pub fn wait_and_drain(&self, cursor: usize, persistent: bool) -> (Vec<PublisherMessage>, usize) {
        let mut guard = self.inner.lock().unwrap();
        loop {
            let count = guard.messages.len();
            if count != cursor {
                break;
            }
            guard = self.arrived.wait(guard).unwrap();
        }

        let count = guard.messages.len();
        let cursor = cursor.min(count);

        let batch = if persistent {
            slice_locked(&guard.messages, cursor, count)
        } else if count > cursor {
            guard.messages.back().cloned().into_iter().collect()
        } else {
            Vec::new()
        };

        (batch, count)
    }

    /// A copy of the entries in `[from, to)`, clamped to the current length.
    pub fn slice(&self, from: usize, to: usize) -> Vec<PublisherMessage> {
        let guard = self.inner.lock().unwrap();
        slice_locked(&guard.messages, from, to)
    }

    /// Drops the head entry if it's older than `ttl_secs` relative to `now`,
    /// returning the evicted message for logging. At most one entry evicts
    /// per call; the cleaner relies on ticking at the TTL period to drain
    /// any backlog over successive calls.
    pub fn evict_head_if_older(&self, ttl_secs: u64, now: u64) -> Option<PublisherMessage> {
        let mut guard = self.inner.lock().unwrap();
        let should_evict = guard
            .messages
            .front()
            .is_some_and(|head| now.saturating_sub(head.timestamp) > ttl_secs);
        if should_evict {
            guard.messages.pop_front()
        } else {
            None
        }
    }
}

/// Shared by `slice` and `wait_and_drain`: a copy of `[from, to)`, clamped
/// to `messages`'s current length. Takes the deque directly rather than
/// `&MessageLog` so it can run under an already-held lock.
fn slice_locked(messages: &VecDeque<PublisherMessage>, from: usize, to: usize) -> Vec<PublisherMessage> {
    let to = to.min(messages.len());
    let from = from.min(to);
    messages.iter().skip(from).take(to - from).cloned().collect()
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(topic: &str, value: &str) -> (Topic, Vec<u8>) {
        (Topic::parse(topic).unwrap(), value.as_bytes().to_vec())
    }

    #[test]
    fn append_then_snapshot_contains_it_last() {
        let log = MessageLog::new();
        let (topic, value) = msg("a/b", "1");
        let before = now_secs();
        log.append(topic.clone(), value.clone());
        let snapshot = log.snapshot();
        let last = snapshot.last().unwrap();
        assert_eq!(last.topic, topic);
        assert_eq!(last.value, value);
        assert!(last.timestamp >= before);
    }

    #[test]
    fn eviction_only_removes_the_head() {
        let log = MessageLog::new();
        for i in 0..3 {
            let (topic, value) = msg("t", &i.to_string());
            log.append(topic, value);
        }
        {
            let mut guard = log.inner.lock().unwrap();
            guard.messages[0].timestamp = 0;
        }
        let evicted = log.evict_head_if_older(5, 100);
        assert_eq!(evicted.unwrap().value, b"0");
        assert_eq!(log.count(), 2);
        assert_eq!(log.snapshot()[0].value, b"1");
    }

    #[test]
    fn eviction_is_noop_when_head_is_fresh() {
        let log = MessageLog::new();
        let (topic, value) = msg("t", "0");
        log.append(topic, value);
        assert!(log.evict_head_if_older(100, now_secs()).is_none());
        assert_eq!(log.count(), 1);
    }

    #[test]
    fn slice_clamps_to_current_length() {
        let log = MessageLog::new();
        for i in 0..3 {
            let (topic, value) = msg("t", &i.to_string());
            log.append(topic, value);
        }
        let slice = log.slice(1, 100);
        assert_eq!(slice.len(), 2);
        assert_eq!(slice[0].value, b"1");
    }

    #[test]
    fn wait_and_drain_clamps_a_stale_cursor_past_eviction() {
        let log = MessageLog::new();
        for i in 0..3 {
            let (topic, value) = msg("t", &i.to_string());
            log.append(topic, value);
        }
        let stale_cursor = log.count(); // 3
        // Simulate a worker whose recorded cursor predates a head eviction
        // that dropped the count below what it last observed.
        {
            let mut guard = log.inner.lock().unwrap();
            guard.messages.pop_front();
        }
        assert_eq!(log.count(), 2);

        // Without clamping this would underflow `to - from` in `slice`-style
        // arithmetic; instead it returns an empty, correct batch.
        let (batch, count) = log.wait_and_drain(stale_cursor, true);
        assert_eq!(count, 2);
        assert!(batch.is_empty());
    }

    #[test]
    fn non_persistent_drain_returns_only_the_newest_of_several_appends() {
        let log = MessageLog::new();
        for i in 0..5 {
            let (topic, value) = msg("t", &i.to_string());
            log.append(topic, value);
        }
        // A non-persistent worker that last observed an empty log and only
        // now wakes up sees all 5 arrivals as one batch of appends between
        // two wake-ups; it must be handed only the newest, never the
        // intervening backlog.
        let (batch, count) = log.wait_and_drain(0, false);
        assert_eq!(count, 5);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].value, b"4");
    }
}
