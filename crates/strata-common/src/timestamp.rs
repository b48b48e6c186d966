//! Timestamp allocation for commit times.
//!
//! The factory is injected rather than accessed through a process-wide
//! singleton so that whoever assembles the storage engine owns the clock and
//! tests can supply deterministic timestamps.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Allocates strictly increasing timestamps.
///
/// Every call returns a value strictly greater than all previously returned
/// values from the same factory instance.
pub trait TimestampFactory: Send + Sync {
    /// Returns the next timestamp.
    fn next_timestamp(&self) -> u64;
}

/// Wall-clock factory producing strictly increasing millisecond timestamps.
///
/// If two calls land within the same millisecond, the second call waits for
/// the next millisecond rather than reusing or fabricating a value.
pub struct MillisTimestampFactory {
    last: Mutex<u64>,
}

impl MillisTimestampFactory {
    /// Creates a new factory.
    pub fn new() -> Self {
        Self { last: Mutex::new(0) }
    }

    fn current_millis() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

impl Default for MillisTimestampFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl TimestampFactory for MillisTimestampFactory {
    fn next_timestamp(&self) -> u64 {
        let mut last = self.last.lock();
        loop {
            let now = Self::current_millis();
            if now > *last {
                *last = now;
                return now;
            }
            // Same millisecond as the previous caller; wait it out.
            std::thread::sleep(Duration::from_micros(100));
        }
    }
}

/// Deterministic counter-backed factory for tests.
pub struct ManualTimestampFactory {
    next: AtomicU64,
}

impl ManualTimestampFactory {
    /// Creates a factory whose first timestamp is `start`.
    pub fn starting_at(start: u64) -> Self {
        Self {
            next: AtomicU64::new(start),
        }
    }
}

impl Default for ManualTimestampFactory {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

impl TimestampFactory for ManualTimestampFactory {
    fn next_timestamp(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }
}
