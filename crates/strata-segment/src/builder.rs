//! One-shot bulk-load builder for index segments.

use crate::plan::{partition, plan_tree};
use crate::region::{LeafRegion, NodeRegion, SegmentFooter};
use crate::source::{ByteOrderComparator, KeyComparator, OrderedSource};
use crate::store::{FileRegionStore, RegionAddr, RegionStore};
use bytes::Bytes;
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;
use strata_common::{KeyType, Result, SegmentConfig, StrataError, TimestampFactory};
use strata_cache::HotSet;
use tracing::debug;

/// Compacts an ordered source index into an immutable segment.
///
/// The builder consumes the source's ascending entry sequence in a single
/// pass: entries are packed into leaves per the occupancy plan, leaves are
/// persisted child-before-parent through a bounded hot set whose eviction
/// listener flushes them to the store, then each internal level is built
/// bottom-up from the first keys of the level below. The footer is written
/// last, so a failed build never yields an openable segment.
///
/// A builder holds no per-build state and can be reused, but each `build`
/// call is an independent, all-or-nothing operation.
pub struct SegmentBuilder {
    config: SegmentConfig,
    key_type: KeyType,
    comparator: Arc<dyn KeyComparator>,
}

impl SegmentBuilder {
    /// Creates a builder for the given configuration.
    ///
    /// Fails if the branching factor is below 3 or the cache settings are
    /// inconsistent.
    pub fn new(config: SegmentConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            key_type: KeyType::Bytes,
            comparator: Arc::new(ByteOrderComparator),
        })
    }

    /// Sets the key type tag recorded in the footer.
    pub fn with_key_type(mut self, key_type: KeyType) -> Self {
        self.key_type = key_type;
        self
    }

    /// Replaces the key comparator used to validate source order.
    ///
    /// The same comparator must be supplied when opening the segment.
    pub fn with_comparator(mut self, comparator: Arc<dyn KeyComparator>) -> Self {
        self.comparator = comparator;
        self
    }

    /// Builds a segment into the given store.
    ///
    /// On success the store contains all leaves, all internal levels bottom
    /// level first, and the footer; the returned footer matches what
    /// `Segment::open` will read back. On failure the store contents are
    /// unspecified and must not be published.
    pub fn build<S: RegionStore>(
        &self,
        source: &dyn OrderedSource,
        store: &mut S,
        timestamps: &dyn TimestampFactory,
    ) -> Result<SegmentFooter> {
        let m = self.config.branching_factor;
        let n = source.len() as u64;
        let plan = plan_tree(n, m)?;

        debug!(
            entries = n,
            branching_factor = m,
            leaves = plan.leaf_count(),
            height = plan.height(),
            "starting segment build"
        );

        let leaves = self.write_leaves(source, store, &plan.leaf_sizes)?;

        // Build internal levels bottom-up. Each child is represented by the
        // first key reachable under it plus its region address.
        let mut children = leaves;
        let mut height = 0u32;
        let mut node_count = 0u32;
        while children.len() > 1 {
            let sizes = partition(children.len() as u64, m)?;
            let mut parents = Vec::with_capacity(sizes.len());
            let mut offset = 0usize;
            for &size in &sizes {
                let group = &children[offset..offset + size as usize];
                offset += size as usize;

                let separators: Vec<Bytes> =
                    group[1..].iter().map(|(key, _)| key.clone()).collect();
                let addrs: Vec<RegionAddr> = group.iter().map(|(_, addr)| *addr).collect();
                let node_addr = store.append(&NodeRegion::new(separators, addrs).encode())?;
                parents.push((group[0].0.clone(), node_addr));
            }
            node_count += parents.len() as u32;
            height += 1;
            children = parents;
        }

        if height != plan.height() || node_count != plan.node_count() {
            return Err(StrataError::InvariantViolation(format!(
                "built height {height} / {node_count} nodes, planned {} / {}",
                plan.height(),
                plan.node_count()
            )));
        }

        let root_addr = children
            .first()
            .map(|(_, addr)| *addr)
            .unwrap_or(RegionAddr::NULL);

        let footer = SegmentFooter {
            branching_factor: m,
            height,
            leaf_count: plan.leaf_count(),
            node_count,
            entry_count: n,
            key_type: self.key_type,
            commit_time: timestamps.next_timestamp(),
            root_addr,
        };
        store.append(&footer.to_bytes())?;
        store.flush()?;

        debug!(
            leaves = footer.leaf_count,
            nodes = footer.node_count,
            height = footer.height,
            commit_time = footer.commit_time,
            "segment build complete"
        );
        Ok(footer)
    }

    /// Builds a segment file at `path`, publishing it atomically on success.
    ///
    /// A failed build removes its staging file and leaves no openable
    /// segment at `path`.
    pub fn build_to_file(
        &self,
        path: impl AsRef<Path>,
        source: &dyn OrderedSource,
        timestamps: &dyn TimestampFactory,
    ) -> Result<SegmentFooter> {
        let mut store = FileRegionStore::create(path, self.config.fsync_enabled)?;
        match self.build(source, &mut store, timestamps) {
            Ok(footer) => {
                store.publish()?;
                Ok(footer)
            }
            Err(err) => {
                let _ = store.discard();
                Err(err)
            }
        }
    }

    /// Packs the source entries into leaves and persists them in order.
    ///
    /// Packed leaves flow through a hot set sized by the cache config; its
    /// eviction listener serializes and appends each leaf, and a final drain
    /// flushes whatever the window still holds. FIFO eviction preserves leaf
    /// order, so parents written later always reference earlier offsets.
    ///
    /// Returns the (first key, address) of every leaf, in key order.
    fn write_leaves<S: RegionStore>(
        &self,
        source: &dyn OrderedSource,
        store: &mut S,
        leaf_sizes: &[u32],
    ) -> Result<Vec<(Bytes, RegionAddr)>> {
        let flushed: Mutex<Vec<(Bytes, RegionAddr)>> =
            Mutex::new(Vec::with_capacity(leaf_sizes.len()));
        let flush_err: Mutex<Option<StrataError>> = Mutex::new(None);
        let shared_store = Mutex::new(store);

        {
            let listener = |leaf: &Arc<LeafRegion>| {
                if flush_err.lock().is_some() {
                    return;
                }
                match shared_store.lock().append(&leaf.encode()) {
                    Ok(addr) => {
                        let first = leaf.first_key().cloned().unwrap_or_else(Bytes::new);
                        flushed.lock().push((first, addr));
                    }
                    Err(err) => *flush_err.lock() = Some(err),
                }
            };
            let mut hot = HotSet::new(
                self.config.cache_capacity,
                self.config.cache_scan_window,
                listener,
            );

            let mut iter = source.iter_ascending();
            let mut prev_key: Option<Bytes> = None;
            for &size in leaf_sizes {
                let mut entries = Vec::with_capacity(size as usize);
                for _ in 0..size {
                    let (key, value) = iter.next().ok_or_else(|| {
                        StrataError::InvariantViolation(
                            "source yielded fewer entries than its reported length".to_string(),
                        )
                    })?;
                    // The wire format carries u16 key and u32 value lengths;
                    // anything larger would wrap its length prefix.
                    if key.len() > u16::MAX as usize {
                        return Err(StrataError::InvalidParameter {
                            name: "key".to_string(),
                            value: format!("{} bytes exceeds maximum {}", key.len(), u16::MAX),
                        });
                    }
                    if value.len() > u32::MAX as usize {
                        return Err(StrataError::InvalidParameter {
                            name: "value".to_string(),
                            value: format!("{} bytes exceeds maximum {}", value.len(), u32::MAX),
                        });
                    }
                    if let Some(prev) = &prev_key {
                        if self.comparator.compare(prev, &key) != Ordering::Less {
                            return Err(StrataError::InvalidParameter {
                                name: "source".to_string(),
                                value: "keys must be unique and strictly ascending".to_string(),
                            });
                        }
                    }
                    prev_key = Some(key.clone());
                    entries.push((key, value));
                }
                hot.append(Arc::new(LeafRegion::new(entries)));
            }
            if iter.next().is_some() {
                return Err(StrataError::InvariantViolation(
                    "source yielded more entries than its reported length".to_string(),
                ));
            }
            hot.drain();
        }

        if let Some(err) = flush_err.into_inner() {
            return Err(err);
        }
        let leaves = flushed.into_inner();
        if leaves.len() != leaf_sizes.len() {
            return Err(StrataError::InvariantViolation(format!(
                "flushed {} leaves, planned {}",
                leaves.len(),
                leaf_sizes.len()
            )));
        }
        Ok(leaves)
    }
}
