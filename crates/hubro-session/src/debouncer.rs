//! Trailing-edge debouncing for outbound messages.
//!
//! Keeps the latest payload per key and releases it once the key has been
//! quiet for its delay, so a burst of keystrokes produces a single preview
//! request.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

/// Payload waiting for its deadline.
struct Pending<P> {
    payload: P,
    deadline: Instant,
}

/// Thread-safe keyed debouncer.
///
/// Each key has at most one pending payload. Scheduling a key again
/// replaces its payload and restarts its deadline.
pub struct Debouncer<K, P> {
    pending: Mutex<HashMap<K, Pending<P>>>,
    rearm: Notify,
}

impl<K, P> Default for Debouncer<K, P> {
    fn default() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            rearm: Notify::new(),
        }
    }
}

impl<K: Eq + Hash + Clone, P> Debouncer<K, P> {
    /// Create an empty debouncer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the latest payload for `key`, due `delay` from now.
    ///
    /// Any earlier payload for the key is dropped.
    pub fn schedule(&self, key: K, payload: P, delay: Duration) {
        let deadline = Instant::now() + delay;
        self.lock().insert(key, Pending { payload, deadline });
        self.rearm.notify_waiters();
    }

    /// Remove and return every payload whose deadline is at or before `now`.
    pub fn drain_ready(&self, now: Instant) -> Vec<(K, P)> {
        let mut pending = self.lock();

        let ready_keys: Vec<K> = pending
            .iter()
            .filter(|(_, entry)| entry.deadline <= now)
            .map(|(key, _)| key.clone())
            .collect();

        ready_keys
            .into_iter()
            .filter_map(|key| pending.remove(&key).map(|entry| (key, entry.payload)))
            .collect()
    }

    /// Returns the earliest deadline, for timer scheduling.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.lock().values().map(|entry| entry.deadline).min()
    }

    /// Drop the pending payload for `key`.
    pub fn cancel(&self, key: &K) -> Option<P> {
        let removed = self.lock().remove(key).map(|entry| entry.payload);
        self.rearm.notify_waiters();
        removed
    }

    /// Drop all pending payloads.
    pub fn clear(&self) {
        self.lock().clear();
        self.rearm.notify_waiters();
    }

    /// Number of keys with a pending payload.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Wait until the earliest deadline has elapsed.
    ///
    /// Pends while nothing is scheduled. Re-arms whenever the schedule
    /// changes, so a rescheduled key pushes the wake-up back.
    pub async fn ready(&self) {
        loop {
            let rearmed = self.rearm.notified();
            tokio::pin!(rearmed);
            rearmed.as_mut().enable();

            match self.next_deadline() {
                Some(deadline) => {
                    tokio::select! {
                        () = tokio::time::sleep_until(deadline) => return,
                        () = rearmed => {}
                    }
                }
                None => rearmed.await,
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, Pending<P>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
