//! Mutable source index and key ordering.

use bytes::Bytes;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Total order over keys.
///
/// The same comparator must be supplied when building a segment and when
/// opening it; separator routing depends on it.
pub trait KeyComparator: Send + Sync {
    /// Compares two keys.
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;
}

/// Lexicographic byte order with a u64-prefix fast path for 8+ byte keys.
#[derive(Debug, Default, Clone, Copy)]
pub struct ByteOrderComparator;

impl KeyComparator for ByteOrderComparator {
    #[inline]
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        // For 8+ byte keys, compare first 8 bytes as u64 (big-endian for sort order)
        if a.len() >= 8 && b.len() >= 8 {
            let a_prefix = u64::from_be_bytes([a[0], a[1], a[2], a[3], a[4], a[5], a[6], a[7]]);
            let b_prefix = u64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]);
            if a_prefix != b_prefix {
                return a_prefix.cmp(&b_prefix);
            }
            if a.len() == 8 && b.len() == 8 {
                return Ordering::Equal;
            }
        }
        a.cmp(b)
    }
}

/// Ascending view of unique entries consumed by the segment builder.
///
/// Implementations are read-only from the builder's perspective and must be
/// quiescent (no concurrent mutation) for the duration of a build.
pub trait OrderedSource {
    /// Total number of entries.
    fn len(&self) -> usize;

    /// Returns true if the source holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates the entries in ascending key order.
    fn iter_ascending(&self) -> Box<dyn Iterator<Item = (Bytes, Bytes)> + '_>;
}

/// Mutable, ordered in-memory index over byte-string keys and values.
///
/// This is the write side of the engine: entries accumulate here and are
/// periodically compacted into an immutable segment. Keys are unique and
/// byte-ordered.
#[derive(Debug, Default, Clone)]
pub struct MemIndex {
    entries: BTreeMap<Bytes, Bytes>,
}

impl MemIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a key/value pair, returning the previous value if the key
    /// was already present.
    pub fn insert(&mut self, key: impl Into<Bytes>, value: impl Into<Bytes>) -> Option<Bytes> {
        self.entries.insert(key.into(), value.into())
    }

    /// Looks up a key.
    pub fn get(&self, key: &[u8]) -> Option<&Bytes> {
        self.entries.get(key)
    }

    /// Removes a key, returning its value if present.
    pub fn remove(&mut self, key: &[u8]) -> Option<Bytes> {
        self.entries.remove(key)
    }

    /// Returns true if the key is present.
    pub fn contains(&self, key: &[u8]) -> bool {
        self.entries.contains_key(key)
    }
}

impl OrderedSource for MemIndex {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn iter_ascending(&self) -> Box<dyn Iterator<Item = (Bytes, Bytes)> + '_> {
        Box::new(self.entries.iter().map(|(k, v)| (k.clone(), v.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(i: u32) -> Bytes {
        Bytes::copy_from_slice(&i.to_be_bytes())
    }

    #[test]
    fn test_byte_order_comparator_short_keys() {
        let cmp = ByteOrderComparator;
        assert_eq!(cmp.compare(b"a", b"b"), Ordering::Less);
        assert_eq!(cmp.compare(b"b", b"a"), Ordering::Greater);
        assert_eq!(cmp.compare(b"ab", b"ab"), Ordering::Equal);
        assert_eq!(cmp.compare(b"a", b"ab"), Ordering::Less);
    }

    #[test]
    fn test_byte_order_comparator_long_keys() {
        let cmp = ByteOrderComparator;
        assert_eq!(cmp.compare(b"00000000a", b"00000000b"), Ordering::Less);
        assert_eq!(cmp.compare(b"00000001", b"00000000a"), Ordering::Greater);
        assert_eq!(cmp.compare(b"12345678", b"12345678"), Ordering::Equal);
    }

    #[test]
    fn test_byte_order_comparator_matches_slice_order() {
        let cmp = ByteOrderComparator;
        let keys: Vec<&[u8]> = vec![b"", b"a", b"aardvark", b"aardwolf!", b"zebra1234"];
        for a in &keys {
            for b in &keys {
                assert_eq!(cmp.compare(a, b), a.cmp(b), "{a:?} vs {b:?}");
            }
        }
    }

    #[test]
    fn test_mem_index_insert_get_remove() {
        let mut index = MemIndex::new();
        assert!(index.is_empty());

        assert!(index.insert(key(1), key(10)).is_none());
        assert_eq!(index.insert(key(1), key(11)), Some(key(10)));
        index.insert(key(2), key(20));

        assert_eq!(index.len(), 2);
        assert_eq!(index.get(&key(1)), Some(&key(11)));
        assert!(index.contains(&key(2)));
        assert!(index.get(&key(3)).is_none());

        assert_eq!(index.remove(&key(1)), Some(key(11)));
        assert_eq!(index.len(), 1);
        assert!(index.remove(&key(1)).is_none());
    }

    #[test]
    fn test_mem_index_iterates_ascending_and_unique() {
        let mut index = MemIndex::new();
        // Insert out of order with one duplicate key.
        for i in [5u32, 1, 9, 3, 1, 7] {
            index.insert(key(i), key(i * 10));
        }

        let keys: Vec<Bytes> = index.iter_ascending().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![key(1), key(3), key(5), key(7), key(9)]);
    }

    #[test]
    fn test_mem_index_len_matches_iteration() {
        let mut index = MemIndex::new();
        for i in 0..100u32 {
            index.insert(key(i), key(i));
        }
        assert_eq!(index.len(), index.iter_ascending().count());
    }
}
