//! Read-optimized view over a built segment.

use crate::region::{SegmentFooter, TreeRegion, FOOTER_LEN};
use crate::source::{ByteOrderComparator, KeyComparator};
use crate::store::{RegionAddr, RegionStore};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use strata_common::{KeyType, Result, SegmentConfig, StrataError};
use strata_cache::{HotSet, NoEviction};
use tracing::debug;

/// Immutable index segment opened against a byte-region store.
///
/// Nodes and leaves are materialized from the store on demand. Each live
/// region is registered in an address-keyed weak map so concurrent descents
/// share one allocation per region, and routed through a hot set that keeps
/// the most recently touched regions strongly reachable. The backing
/// regions never change after the builder publishes the footer, so lookups
/// and scans are safe from any number of threads; only hot-set mutation is
/// serialized.
pub struct Segment<S: RegionStore> {
    store: S,
    footer: SegmentFooter,
    comparator: Arc<dyn KeyComparator>,
    /// Strong holds on recently touched regions.
    hot: Mutex<HotSet<TreeRegion, NoEviction>>,
    /// All currently materialized regions, by address.
    live: Mutex<HashMap<u64, Weak<TreeRegion>>>,
}

impl<S: RegionStore> Segment<S> {
    /// Opens a segment, validating its footer.
    ///
    /// Fails fast with `SegmentCorrupted` on a truncated file, bad magic,
    /// or inconsistent metadata; no partial tree is ever surfaced.
    pub fn open(store: S, config: &SegmentConfig) -> Result<Self> {
        Self::open_with_comparator(store, config, Arc::new(ByteOrderComparator))
    }

    /// Opens a segment with the comparator it was built with.
    pub fn open_with_comparator(
        store: S,
        config: &SegmentConfig,
        comparator: Arc<dyn KeyComparator>,
    ) -> Result<Self> {
        config.validate()?;
        let footer = SegmentFooter::from_bytes(&store.read_tail(FOOTER_LEN)?)?;

        let data_len = store.len()? - FOOTER_LEN as u64;
        if footer.leaf_count == 0 {
            if !footer.root_addr.is_null() || footer.entry_count != 0 || footer.height != 0 {
                return Err(StrataError::SegmentCorrupted(
                    "empty segment with inconsistent metadata".to_string(),
                ));
            }
        } else if footer.root_addr.is_null() || footer.root_addr.0 >= data_len {
            return Err(StrataError::SegmentCorrupted(format!(
                "root address {} outside segment data",
                footer.root_addr
            )));
        }

        debug!(
            entries = footer.entry_count,
            leaves = footer.leaf_count,
            nodes = footer.node_count,
            height = footer.height,
            "opened segment"
        );

        Ok(Self {
            store,
            footer,
            comparator,
            hot: Mutex::new(HotSet::new(
                config.cache_capacity,
                config.cache_scan_window,
                NoEviction,
            )),
            live: Mutex::new(HashMap::new()),
        })
    }

    /// Branching factor the segment was built with.
    pub fn branching_factor(&self) -> u32 {
        self.footer.branching_factor
    }

    /// Number of internal levels above the leaves (0 = the root is a leaf).
    pub fn height(&self) -> u32 {
        self.footer.height
    }

    /// Number of leaves.
    pub fn leaf_count(&self) -> u32 {
        self.footer.leaf_count
    }

    /// Number of internal nodes across all levels.
    pub fn node_count(&self) -> u32 {
        self.footer.node_count
    }

    /// Total number of entries.
    pub fn len(&self) -> u64 {
        self.footer.entry_count
    }

    /// Returns true if the segment holds no entries.
    pub fn is_empty(&self) -> bool {
        self.footer.entry_count == 0
    }

    /// Logical key type recorded at build time.
    pub fn key_type(&self) -> KeyType {
        self.footer.key_type
    }

    /// Commit timestamp recorded at build time.
    pub fn commit_time(&self) -> u64 {
        self.footer.commit_time
    }

    /// The full footer.
    pub fn footer(&self) -> &SegmentFooter {
        &self.footer
    }

    /// Looks up a key, returning its value or `None` on a miss.
    pub fn lookup(&self, key: &[u8]) -> Result<Option<Bytes>> {
        if self.footer.root_addr.is_null() {
            return Ok(None);
        }

        let mut region = self.materialize(self.footer.root_addr)?;
        for _ in 0..=self.footer.height {
            match &*region {
                TreeRegion::Node(node) => {
                    region = self.materialize(node.child_for(key, &*self.comparator))?;
                }
                TreeRegion::Leaf(leaf) => {
                    return Ok(leaf.search(key, &*self.comparator).cloned());
                }
            }
        }
        Err(StrataError::SegmentCorrupted(
            "descent exceeded recorded tree height".to_string(),
        ))
    }

    /// Returns every entry in ascending key order.
    ///
    /// The sequence is exactly the one the builder consumed.
    pub fn scan(&self) -> Result<Vec<(Bytes, Bytes)>> {
        self.range_scan(None, None)
    }

    /// Returns the entries with keys in `[start, end]`, ascending.
    ///
    /// Either bound may be omitted; both are inclusive.
    pub fn range_scan(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> Result<Vec<(Bytes, Bytes)>> {
        let mut out = Vec::new();
        if self.footer.root_addr.is_null() {
            return Ok(out);
        }
        self.collect(self.footer.root_addr, 0, start, end, &mut out)?;
        Ok(out)
    }

    /// Recursively gathers in-range entries under `addr`.
    ///
    /// Subtrees wholly outside the bounds are pruned via separator keys.
    fn collect(
        &self,
        addr: RegionAddr,
        depth: u32,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        out: &mut Vec<(Bytes, Bytes)>,
    ) -> Result<()> {
        if depth > self.footer.height {
            return Err(StrataError::SegmentCorrupted(
                "descent exceeded recorded tree height".to_string(),
            ));
        }
        let cmp = &*self.comparator;
        match &*self.materialize(addr)? {
            TreeRegion::Leaf(leaf) => {
                for (key, value) in &leaf.entries {
                    if let Some(start) = start {
                        if cmp.compare(key, start) == std::cmp::Ordering::Less {
                            continue;
                        }
                    }
                    if let Some(end) = end {
                        if cmp.compare(key, end) == std::cmp::Ordering::Greater {
                            break;
                        }
                    }
                    out.push((key.clone(), value.clone()));
                }
            }
            TreeRegion::Node(node) => {
                let lo = match start {
                    Some(start) => node.child_index_for(start, cmp),
                    None => 0,
                };
                let hi = match end {
                    Some(end) => node.child_index_for(end, cmp),
                    None => node.children.len() - 1,
                };
                for child in &node.children[lo..=hi] {
                    self.collect(*child, depth + 1, start, end, out)?;
                }
            }
        }
        Ok(())
    }

    /// Materializes the region at `addr`, reusing a live instance if one
    /// exists, and touches it in the hot set.
    fn materialize(&self, addr: RegionAddr) -> Result<Arc<TreeRegion>> {
        if let Some(region) = self.live.lock().get(&addr.0).and_then(Weak::upgrade) {
            self.hot.lock().append(Arc::clone(&region));
            return Ok(region);
        }

        // Decode outside the map lock; only registration is serialized.
        let decoded = Arc::new(TreeRegion::decode(&self.store.read(addr)?)?);
        let region = {
            let mut live = self.live.lock();
            match live.get(&addr.0).and_then(Weak::upgrade) {
                // Another reader materialized it first; keep one identity.
                Some(existing) => existing,
                None => {
                    live.insert(addr.0, Arc::downgrade(&decoded));
                    decoded
                }
            }
        };
        self.hot.lock().append(Arc::clone(&region));
        Ok(region)
    }
}
