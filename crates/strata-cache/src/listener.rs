//! Eviction listeners for the hot-set cache.

use std::sync::Arc;

/// Behavior invoked when an object falls out of the hot set.
///
/// The listener runs before the cache releases its strong hold, so it may
/// perform arbitrary cleanup such as flushing a dirty node to backing
/// storage. It is called exactly once per evicted object.
pub trait EvictionListener<T> {
    /// Called for each evicted object.
    fn evicted(&self, value: &Arc<T>);
}

/// Closures can be used directly as eviction listeners.
impl<T, F> EvictionListener<T> for F
where
    F: Fn(&Arc<T>),
{
    fn evicted(&self, value: &Arc<T>) {
        self(value)
    }
}

/// Listener that does nothing; eviction just drops the strong reference.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoEviction;

impl<T> EvictionListener<T> for NoEviction {
    fn evicted(&self, _value: &Arc<T>) {}
}
