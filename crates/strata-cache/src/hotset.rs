//! FIFO hot-set cache with a recent-scan window.

use crate::listener::EvictionListener;
use std::collections::VecDeque;
use std::sync::Arc;

/// Bounded holder of strong references to recently touched objects.
///
/// The cache keeps at most `capacity` objects strongly reachable, evicting
/// from the head (oldest append) once the bound is exceeded. An append whose
/// object is already among the `scan_window` most recent entries is a no-op,
/// so repeated touches within a short window neither churn the eviction
/// order nor double-invoke the listener. Membership is decided by object
/// identity (`Arc::ptr_eq`), not by value equality.
///
/// Eviction order is FIFO over the appends that were actually admitted.
pub struct HotSet<T, L: EvictionListener<T>> {
    /// Admitted objects, oldest at the front.
    entries: VecDeque<Arc<T>>,
    /// Maximum number of strongly held objects.
    capacity: usize,
    /// How many of the most recent entries to scan for duplicates.
    scan_window: usize,
    /// Invoked once per evicted object.
    listener: L,
}

impl<T, L: EvictionListener<T>> HotSet<T, L> {
    /// Creates a hot set with the given capacity and recent-scan window.
    ///
    /// A window larger than the capacity is clamped to the capacity.
    pub fn new(capacity: usize, scan_window: usize, listener: L) -> Self {
        assert!(capacity > 0, "hot set capacity must be positive");
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
            scan_window: scan_window.min(capacity),
            listener,
        }
    }

    /// Returns the number of objects currently held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the hot set holds nothing.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the recent-scan window.
    pub fn scan_window(&self) -> usize {
        self.scan_window
    }

    /// Appends an object to the tail of the hot set.
    ///
    /// Returns false if the object was found by identity among the most
    /// recently appended `scan_window` entries (the append is a no-op).
    /// Otherwise the object is admitted and true is returned; if the size
    /// then exceeds the capacity, objects are evicted from the head, one at
    /// a time, until the size equals the capacity, invoking the listener
    /// exactly once per evicted object.
    pub fn append(&mut self, value: Arc<T>) -> bool {
        let scanned = self.entries.len().min(self.scan_window);
        if self
            .entries
            .iter()
            .rev()
            .take(scanned)
            .any(|held| Arc::ptr_eq(held, &value))
        {
            return false;
        }

        self.entries.push_back(value);
        while self.entries.len() > self.capacity {
            // Capacity check above guarantees the deque is non-empty here.
            if let Some(evicted) = self.entries.pop_front() {
                self.listener.evicted(&evicted);
            }
        }
        true
    }

    /// Evicts every held object in FIFO order through the listener.
    pub fn drain(&mut self) {
        while let Some(evicted) = self.entries.pop_front() {
            self.listener.evicted(&evicted);
        }
    }

    /// Iterates the held objects from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<T>> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::NoEviction;
    use parking_lot::Mutex;

    /// Listener that records evicted values in order.
    struct Recorder(Mutex<Vec<u32>>);

    impl Recorder {
        fn new() -> Arc<Self> {
            Arc::new(Self(Mutex::new(Vec::new())))
        }

        fn seen(&self) -> Vec<u32> {
            self.0.lock().clone()
        }
    }

    impl EvictionListener<u32> for Arc<Recorder> {
        fn evicted(&self, value: &Arc<u32>) {
            self.0.lock().push(**value);
        }
    }

    #[test]
    fn test_new_hot_set_is_empty() {
        let hot: HotSet<u32, NoEviction> = HotSet::new(5, 2, NoEviction);
        assert!(hot.is_empty());
        assert_eq!(hot.len(), 0);
        assert_eq!(hot.capacity(), 5);
        assert_eq!(hot.scan_window(), 2);
    }

    #[test]
    fn test_window_clamped_to_capacity() {
        let hot: HotSet<u32, NoEviction> = HotSet::new(3, 10, NoEviction);
        assert_eq!(hot.scan_window(), 3);
    }

    #[test]
    #[should_panic(expected = "capacity must be positive")]
    fn test_zero_capacity_panics() {
        let _: HotSet<u32, NoEviction> = HotSet::new(0, 0, NoEviction);
    }

    #[test]
    fn test_appends_under_capacity_do_not_evict() {
        let recorder = Recorder::new();
        let mut hot = HotSet::new(3, 3, Arc::clone(&recorder));

        assert!(hot.append(Arc::new(1)));
        assert!(hot.append(Arc::new(2)));
        assert!(hot.append(Arc::new(3)));

        assert_eq!(hot.len(), 3);
        assert!(recorder.seen().is_empty());
    }

    #[test]
    fn test_overflow_evicts_oldest_exactly_once() {
        let recorder = Recorder::new();
        let mut hot = HotSet::new(3, 3, Arc::clone(&recorder));

        for i in 1..=4 {
            hot.append(Arc::new(i));
        }

        // Appending K+1 distinct objects evicts exactly the first.
        assert_eq!(hot.len(), 3);
        assert_eq!(recorder.seen(), vec![1]);
    }

    #[test]
    fn test_eviction_order_is_fifo() {
        let recorder = Recorder::new();
        let mut hot = HotSet::new(2, 2, Arc::clone(&recorder));

        for i in 1..=5 {
            hot.append(Arc::new(i));
        }

        assert_eq!(recorder.seen(), vec![1, 2, 3]);
    }

    #[test]
    fn test_recent_duplicate_is_a_noop() {
        let recorder = Recorder::new();
        let mut hot = HotSet::new(3, 3, Arc::clone(&recorder));

        let obj = Arc::new(1);
        assert!(hot.append(Arc::clone(&obj)));
        assert!(hot.append(Arc::new(2)));
        assert!(hot.append(Arc::new(3)));

        // Still within the window: dropped, no eviction, no listener call.
        assert!(!hot.append(Arc::clone(&obj)));
        assert_eq!(hot.len(), 3);
        assert!(recorder.seen().is_empty());
    }

    #[test]
    fn test_duplicate_outside_window_is_admitted_again() {
        let recorder = Recorder::new();
        let mut hot = HotSet::new(4, 1, Arc::clone(&recorder));

        let obj = Arc::new(1);
        hot.append(Arc::clone(&obj));
        hot.append(Arc::new(2));

        // The window only covers the most recent append, so obj is re-admitted.
        assert!(hot.append(Arc::clone(&obj)));
        assert_eq!(hot.len(), 3);
    }

    #[test]
    fn test_identity_not_value_equality() {
        let recorder = Recorder::new();
        let mut hot = HotSet::new(4, 4, Arc::clone(&recorder));

        hot.append(Arc::new(7));
        // Same value, different allocation: admitted.
        assert!(hot.append(Arc::new(7)));
        assert_eq!(hot.len(), 2);
    }

    #[test]
    fn test_drain_evicts_everything_in_order() {
        let recorder = Recorder::new();
        let mut hot = HotSet::new(5, 5, Arc::clone(&recorder));

        for i in 1..=3 {
            hot.append(Arc::new(i));
        }
        hot.drain();

        assert!(hot.is_empty());
        assert_eq!(recorder.seen(), vec![1, 2, 3]);
    }

    #[test]
    fn test_eviction_releases_strong_hold() {
        let mut hot = HotSet::new(1, 1, NoEviction);

        let first = Arc::new(1u32);
        hot.append(Arc::clone(&first));
        assert_eq!(Arc::strong_count(&first), 2);

        hot.append(Arc::new(2));
        assert_eq!(Arc::strong_count(&first), 1);
    }

    #[test]
    fn test_listener_sees_object_before_release() {
        let hold = Mutex::new(Vec::<Arc<u32>>::new());
        let listener = |value: &Arc<u32>| hold.lock().push(Arc::clone(value));
        let mut hot = HotSet::new(1, 1, listener);

        hot.append(Arc::new(10));
        hot.append(Arc::new(20));

        let held = hold.lock();
        assert_eq!(held.len(), 1);
        assert_eq!(*held[0], 10);
    }

    #[test]
    fn test_iter_runs_oldest_to_newest() {
        let mut hot = HotSet::new(5, 5, NoEviction);
        for i in 1..=3u32 {
            hot.append(Arc::new(i));
        }
        let order: Vec<u32> = hot.iter().map(|v| **v).collect();
        assert_eq!(order, vec![1, 2, 3]);
    }
}
