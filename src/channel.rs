//! Latest-value handoff between the capture loop and the publisher.
//!
//! `LatestValue<T>` is a single-slot mailbox shared by exactly one writer and
//! one reader:
//!
//! - `put` stores a value, overwriting any unread predecessor. It never
//!   blocks, so the writer is never throttled by a slow reader.
//! - `take` removes and returns the stored value, blocking while the slot is
//!   empty. The value returned is always the most recent `put` that happened
//!   before the call unblocked.
//! - `close` marks the channel finished and wakes a blocked reader. A value
//!   pending at close time is still delivered before `take` reports closure.
//!
//! Overwrite and take happen under one mutex, so a value arriving while the
//! reader wakes up cannot be skipped or observed twice.

use std::sync::{Condvar, Mutex, PoisonError};

/// Single-slot mailbox with overwrite-on-write, block-on-empty semantics.
pub struct LatestValue<T> {
    slot: Mutex<Slot<T>>,
    ready: Condvar,
}

struct Slot<T> {
    value: Option<T>,
    closed: bool,
}

impl<T> LatestValue<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                value: None,
                closed: false,
            }),
            ready: Condvar::new(),
        }
    }

    /// Store `value`, discarding any unread predecessor. Never blocks.
    ///
    /// After `close` the value is dropped; the reader is already on its way
    /// out and must not observe writes from a finished producer.
    pub fn put(&self, value: T) {
        let mut slot = self.lock();
        if slot.closed {
            return;
        }
        slot.value = Some(value);
        drop(slot);
        self.ready.notify_one();
    }

    /// Remove and return the newest value, blocking while the slot is empty.
    ///
    /// Returns `None` once the channel is closed and drained.
    pub fn take(&self) -> Option<T> {
        let mut slot = self.lock();
        loop {
            if let Some(value) = slot.value.take() {
                return Some(value);
            }
            if slot.closed {
                return None;
            }
            slot = self
                .ready
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Mark the channel closed and wake a blocked reader. Idempotent.
    pub fn close(&self) {
        let mut slot = self.lock();
        slot.closed = true;
        drop(slot);
        self.ready.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    // A poisoned mutex only means the peer thread panicked mid-call; the
    // Option in the slot is still a coherent state, so keep going.
    fn lock(&self) -> std::sync::MutexGuard<'_, Slot<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Default for LatestValue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn take_returns_newest_value_only() {
        let slot = LatestValue::new();
        slot.put(1);
        slot.put(2);
        slot.put(3);

        assert_eq!(slot.take(), Some(3));

        // Nothing older is ever observed.
        slot.close();
        assert_eq!(slot.take(), None);
    }

    #[test]
    fn take_blocks_until_put() {
        let slot = Arc::new(LatestValue::new());

        let reader = {
            let slot = Arc::clone(&slot);
            thread::spawn(move || slot.take())
        };

        // Give the reader time to park on the condvar.
        thread::sleep(Duration::from_millis(50));
        slot.put(42u32);

        assert_eq!(reader.join().unwrap(), Some(42));
    }

    #[test]
    fn put_never_blocks_without_a_reader() {
        let slot = LatestValue::new();
        for i in 0..10_000 {
            slot.put(i);
        }
        assert_eq!(slot.take(), Some(9_999));
    }

    #[test]
    fn close_wakes_blocked_reader() {
        let slot = Arc::new(LatestValue::<u32>::new());

        let reader = {
            let slot = Arc::clone(&slot);
            thread::spawn(move || slot.take())
        };

        thread::sleep(Duration::from_millis(50));
        slot.close();

        assert_eq!(reader.join().unwrap(), None);
    }

    #[test]
    fn pending_value_survives_close() {
        let slot = LatestValue::new();
        slot.put(7);
        slot.close();

        assert_eq!(slot.take(), Some(7));
        assert_eq!(slot.take(), None);
    }

    #[test]
    fn put_after_close_is_dropped() {
        let slot = LatestValue::new();
        slot.close();
        slot.put(1);
        assert_eq!(slot.take(), None);
    }

    #[test]
    fn interleaved_writer_reader_sees_monotonic_values() {
        let slot = Arc::new(LatestValue::new());

        let writer = {
            let slot = Arc::clone(&slot);
            thread::spawn(move || {
                for i in 0..1_000u64 {
                    slot.put(i);
                }
                slot.close();
            })
        };

        let mut last_seen = None;
        while let Some(value) = slot.take() {
            if let Some(prev) = last_seen {
                assert!(value > prev, "observed {} after {}", value, prev);
            }
            last_seen = Some(value);
        }

        writer.join().unwrap();
        // The final value is always delivered: it was pending at close.
        assert_eq!(last_seen, Some(999));
    }
}
