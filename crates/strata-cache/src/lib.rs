//! Bounded hot-set cache for StrataDB.
//!
//! This crate provides:
//! - A FIFO hot-set cache that keeps at most a fixed number of recently
//!   touched objects strongly reachable
//! - A pluggable eviction listener invoked once per evicted object

mod hotset;
mod listener;

pub use hotset::HotSet;
pub use listener::{EvictionListener, NoEviction};
