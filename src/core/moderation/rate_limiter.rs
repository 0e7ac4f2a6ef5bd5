// Per-sender rate limiting over a rolling time window.
//
// Each sender gets its own timestamp queue behind its own mutex. The DashMap
// shard lock is only held long enough to fetch the sender's handle, so two
// senders never wait on each other while their windows are pruned.
//
// The idle sweep may drop a handle another caller has already fetched. Callers
// re-check the map after locking and retry with the live handle when theirs
// was dropped, and the sweep never blocks on a sender lock while it holds a
// shard lock.

use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

/// Is `now - t < window` for at least `max_messages` of the timestamps?
///
/// Works on a history the caller hands in, without touching any stored state.
#[allow(dead_code)]
pub fn exceeds_rate_limit(history: &[i64], now_ms: i64, window_ms: u64, max_messages: u32) -> bool {
    let in_window = history
        .iter()
        .filter(|&&t| in_window(t, now_ms, window_ms))
        .count();
    in_window >= max_messages as usize
}

fn in_window(timestamp_ms: i64, now_ms: i64, window_ms: u64) -> bool {
    (now_ms as i128 - timestamp_ms as i128) < window_ms as i128
}

type SenderWindow = Arc<Mutex<VecDeque<i64>>>;

/// Rolling per-sender message windows.
#[derive(Default)]
pub struct RateLimiter {
    windows: DashMap<String, SenderWindow>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            windows: DashMap::new(),
        }
    }

    fn window_for(&self, sender_id: &str) -> SenderWindow {
        if let Some(window) = self.windows.get(sender_id) {
            return Arc::clone(window.value());
        }
        Arc::clone(
            self.windows
                .entry(sender_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(VecDeque::new())))
                .value(),
        )
    }

    /// Is `window` still the handle the map holds for `sender_id`?
    fn is_current(&self, sender_id: &str, window: &SenderWindow) -> bool {
        self.windows
            .get(sender_id)
            .map_or(false, |live| Arc::ptr_eq(live.value(), window))
    }

    /// Run `f` on `window` under its lock, or return `None` if the handle was
    /// swept or cleared before the lock was taken.
    fn try_with<R>(
        &self,
        sender_id: &str,
        window: &SenderWindow,
        f: impl FnOnce(&mut VecDeque<i64>) -> R,
    ) -> Option<R> {
        let mut timestamps = lock(window);
        if !self.is_current(sender_id, window) {
            return None;
        }
        Some(f(&mut timestamps))
    }

    fn with_window<R>(&self, sender_id: &str, mut f: impl FnMut(&mut VecDeque<i64>) -> R) -> R {
        loop {
            let window = self.window_for(sender_id);
            if let Some(out) = self.try_with(sender_id, &window, &mut f) {
                return out;
            }
            tracing::trace!(sender_id, "Sender window swept mid-check, retrying");
        }
    }

    /// Would another message from `sender_id` at `now_ms` be throttled?
    ///
    /// Prunes timestamps that fell out of the window as a side effect.
    #[allow(dead_code)]
    pub fn should_rate_limit(
        &self,
        sender_id: &str,
        now_ms: i64,
        window_ms: u64,
        max_messages: u32,
    ) -> bool {
        self.with_window(sender_id, |timestamps| {
            prune(timestamps, now_ms, window_ms);
            timestamps.len() >= max_messages as usize
        })
    }

    /// Record a permitted message.
    #[allow(dead_code)]
    pub fn record_message(&self, sender_id: &str, timestamp_ms: i64) {
        self.with_window(sender_id, |timestamps| timestamps.push_back(timestamp_ms));
    }

    /// Prune, test and record in one step.
    ///
    /// Returns `true` when the message is throttled; throttled messages are not
    /// recorded.
    pub fn check_and_record(
        &self,
        sender_id: &str,
        now_ms: i64,
        window_ms: u64,
        max_messages: u32,
    ) -> bool {
        self.with_window(sender_id, |timestamps| {
            admit(timestamps, now_ms, window_ms, max_messages)
        })
    }

    /// Messages from `sender_id` still inside the window.
    #[allow(dead_code)]
    pub fn recent_count(&self, sender_id: &str, now_ms: i64, window_ms: u64) -> usize {
        // Clone the handle so no shard lock is held while the sender lock is taken
        let Some(window) = self.windows.get(sender_id).map(|w| Arc::clone(w.value())) else {
            return 0;
        };
        let count = lock(&window)
            .iter()
            .filter(|&&t| in_window(t, now_ms, window_ms))
            .count();
        count
    }

    /// Forget everything about a sender.
    #[allow(dead_code)]
    pub fn clear_sender(&self, sender_id: &str) -> bool {
        self.windows.remove(sender_id).is_some()
    }

    /// Drop senders with nothing left in the window. Returns how many were removed.
    pub fn sweep_idle(&self, now_ms: i64, window_ms: u64) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, window| {
            let mut timestamps = match window.try_lock() {
                Ok(guard) => guard,
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                // Someone is checking this sender right now, so it is not idle
                Err(TryLockError::WouldBlock) => return true,
            };
            prune(&mut timestamps, now_ms, window_ms);
            !timestamps.is_empty()
        });
        before.saturating_sub(self.windows.len())
    }

    #[allow(dead_code)]
    pub fn tracked_senders(&self) -> usize {
        self.windows.len()
    }
}

fn admit(timestamps: &mut VecDeque<i64>, now_ms: i64, window_ms: u64, max_messages: u32) -> bool {
    prune(timestamps, now_ms, window_ms);
    if timestamps.len() >= max_messages as usize {
        return true;
    }
    timestamps.push_back(now_ms);
    false
}

/// Drop timestamps that fell out of the window.
///
/// Timestamps are not required to arrive in order, so this scans the whole
/// queue instead of popping from the front.
fn prune(timestamps: &mut VecDeque<i64>, now_ms: i64, window_ms: u64) {
    timestamps.retain(|&t| in_window(t, now_ms, window_ms));
}

// The guarded queue is valid after any panic, so a poisoned lock is still usable.
fn lock(window: &Mutex<VecDeque<i64>>) -> MutexGuard<'_, VecDeque<i64>> {
    window.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
