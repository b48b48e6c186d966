//! Serialized leaf and node regions, and the segment footer.
//!
//! A segment file is a sequence of length-prefixed regions (all leaves
//! first, then internal nodes bottom level first) followed by a fixed-size
//! footer at the tail. Every multi-byte field is little-endian.

use crate::source::KeyComparator;
use crate::store::RegionAddr;
use bytes::{Bytes, BytesMut};
use strata_common::{KeyType, Result, StrataError};

/// Magic number at the start of the footer ("SEG1").
pub const SEGMENT_MAGIC: u32 = 0x5345_4731;

/// Size of the fixed footer at the end of a segment file.
pub const FOOTER_LEN: usize = 48;

/// Region tag for a serialized leaf.
const TAG_LEAF: u8 = 1;
/// Region tag for a serialized internal node.
const TAG_NODE: u8 = 2;

/// Ordered entries held by one leaf.
///
/// Layout:
/// - tag: 1 byte (TAG_LEAF)
/// - entry_count: 4 bytes
/// - keys: entry_count * (key_len: 2 bytes, key bytes)
/// - values: entry_count * (value_len: 4 bytes, value bytes)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafRegion {
    /// Entries in ascending key order.
    pub entries: Vec<(Bytes, Bytes)>,
}

impl LeafRegion {
    /// Creates a leaf from ordered entries.
    pub fn new(entries: Vec<(Bytes, Bytes)>) -> Self {
        Self { entries }
    }

    /// Number of entries.
    pub fn entry_count(&self) -> u32 {
        self.entries.len() as u32
    }

    /// First key in the leaf, if any.
    pub fn first_key(&self) -> Option<&Bytes> {
        self.entries.first().map(|(k, _)| k)
    }

    /// Binary-searches the leaf for an exact key match.
    pub fn search(&self, key: &[u8], cmp: &dyn KeyComparator) -> Option<&Bytes> {
        self.entries
            .binary_search_by(|(k, _)| cmp.compare(k, key))
            .ok()
            .map(|i| &self.entries[i].1)
    }

    /// Serializes the leaf.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[TAG_LEAF]);
        buf.extend_from_slice(&self.entry_count().to_le_bytes());
        for (key, _) in &self.entries {
            buf.extend_from_slice(&(key.len() as u16).to_le_bytes());
            buf.extend_from_slice(key);
        }
        for (_, value) in &self.entries {
            buf.extend_from_slice(&(value.len() as u32).to_le_bytes());
            buf.extend_from_slice(value);
        }
        buf.freeze()
    }

    fn decode_body(buf: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(buf);
        let entry_count = cursor.read_u32()? as usize;

        let mut keys = Vec::with_capacity(entry_count);
        for _ in 0..entry_count {
            let len = cursor.read_u16()? as usize;
            keys.push(cursor.read_bytes(len)?);
        }
        let mut entries = Vec::with_capacity(entry_count);
        for key in keys {
            let len = cursor.read_u32()? as usize;
            entries.push((key, cursor.read_bytes(len)?));
        }
        cursor.expect_end()?;
        Ok(Self { entries })
    }
}

/// Separator keys and child addresses held by one internal node.
///
/// A node with `childCount` children holds `childCount - 1` separators;
/// separator `i` is the first key reachable under child `i + 1`.
///
/// Layout:
/// - tag: 1 byte (TAG_NODE)
/// - child_count: 4 bytes
/// - separators: (child_count - 1) * (key_len: 2 bytes, key bytes)
/// - children: child_count * 8 bytes (region addresses)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRegion {
    /// Separator keys, one per child boundary.
    pub separators: Vec<Bytes>,
    /// Child region addresses.
    pub children: Vec<RegionAddr>,
}

impl NodeRegion {
    /// Creates a node from separators and child addresses.
    pub fn new(separators: Vec<Bytes>, children: Vec<RegionAddr>) -> Self {
        debug_assert_eq!(separators.len() + 1, children.len());
        Self {
            separators,
            children,
        }
    }

    /// Number of children.
    pub fn child_count(&self) -> u32 {
        self.children.len() as u32
    }

    /// Index of the child subtree that may contain `key`.
    ///
    /// Chooses child `i` such that `separator[i-1] <= key < separator[i]`,
    /// with implicit -inf/+inf sentinels at the ends.
    pub fn child_index_for(&self, key: &[u8], cmp: &dyn KeyComparator) -> usize {
        self.separators
            .partition_point(|sep| cmp.compare(sep, key) != std::cmp::Ordering::Greater)
    }

    /// Address of the child subtree that may contain `key`.
    pub fn child_for(&self, key: &[u8], cmp: &dyn KeyComparator) -> RegionAddr {
        self.children[self.child_index_for(key, cmp)]
    }

    /// Serializes the node.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[TAG_NODE]);
        buf.extend_from_slice(&self.child_count().to_le_bytes());
        for sep in &self.separators {
            buf.extend_from_slice(&(sep.len() as u16).to_le_bytes());
            buf.extend_from_slice(sep);
        }
        for child in &self.children {
            buf.extend_from_slice(&child.0.to_le_bytes());
        }
        buf.freeze()
    }

    fn decode_body(buf: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(buf);
        let child_count = cursor.read_u32()? as usize;
        if child_count == 0 {
            return Err(StrataError::SegmentCorrupted(
                "node region with zero children".to_string(),
            ));
        }

        let mut separators = Vec::with_capacity(child_count - 1);
        for _ in 0..child_count - 1 {
            let len = cursor.read_u16()? as usize;
            separators.push(cursor.read_bytes(len)?);
        }
        let mut children = Vec::with_capacity(child_count);
        for _ in 0..child_count {
            children.push(RegionAddr(cursor.read_u64()?));
        }
        cursor.expect_end()?;
        Ok(Self {
            separators,
            children,
        })
    }
}

/// A materialized region: either a leaf or an internal node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeRegion {
    /// Leaf holding entries.
    Leaf(LeafRegion),
    /// Internal node holding separators and child addresses.
    Node(NodeRegion),
}

impl TreeRegion {
    /// Deserializes a region, dispatching on its tag byte.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        match buf.first() {
            Some(&TAG_LEAF) => Ok(TreeRegion::Leaf(LeafRegion::decode_body(&buf[1..])?)),
            Some(&TAG_NODE) => Ok(TreeRegion::Node(NodeRegion::decode_body(&buf[1..])?)),
            Some(&tag) => Err(StrataError::SegmentCorrupted(format!(
                "unknown region tag {tag}"
            ))),
            None => Err(StrataError::SegmentCorrupted("empty region".to_string())),
        }
    }
}

/// Fixed-size metadata written at the very end of a segment file.
///
/// Layout (48 bytes):
/// - magic: 4 bytes
/// - branching_factor: 4 bytes
/// - height: 4 bytes
/// - leaf_count: 4 bytes
/// - node_count: 4 bytes
/// - key_type: 1 byte
/// - reserved: 3 bytes
/// - entry_count: 8 bytes
/// - commit_time: 8 bytes
/// - root_addr: 8 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentFooter {
    /// Branching factor the segment was built with.
    pub branching_factor: u32,
    /// Number of internal levels above the leaves (0 = the root is a leaf).
    pub height: u32,
    /// Number of leaves.
    pub leaf_count: u32,
    /// Number of internal nodes across all levels.
    pub node_count: u32,
    /// Total number of entries.
    pub entry_count: u64,
    /// Logical key type tag.
    pub key_type: KeyType,
    /// Commit timestamp assigned when the build completed.
    pub commit_time: u64,
    /// Address of the root region (null for an empty segment).
    pub root_addr: RegionAddr,
}

impl SegmentFooter {
    /// Serializes the footer.
    pub fn to_bytes(&self) -> [u8; FOOTER_LEN] {
        let mut buf = [0u8; FOOTER_LEN];
        buf[0..4].copy_from_slice(&SEGMENT_MAGIC.to_le_bytes());
        buf[4..8].copy_from_slice(&self.branching_factor.to_le_bytes());
        buf[8..12].copy_from_slice(&self.height.to_le_bytes());
        buf[12..16].copy_from_slice(&self.leaf_count.to_le_bytes());
        buf[16..20].copy_from_slice(&self.node_count.to_le_bytes());
        buf[20] = self.key_type.as_u8();
        // bytes 21-23 are reserved (already zeroed)
        buf[24..32].copy_from_slice(&self.entry_count.to_le_bytes());
        buf[32..40].copy_from_slice(&self.commit_time.to_le_bytes());
        buf[40..48].copy_from_slice(&self.root_addr.0.to_le_bytes());
        buf
    }

    /// Deserializes and validates a footer.
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() != FOOTER_LEN {
            return Err(StrataError::SegmentCorrupted(format!(
                "footer holds {} bytes, expected {FOOTER_LEN}",
                buf.len()
            )));
        }
        let magic = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        if magic != SEGMENT_MAGIC {
            return Err(StrataError::SegmentCorrupted(format!(
                "bad magic {magic:#010x}"
            )));
        }
        let key_type = KeyType::from_u8(buf[20]).ok_or_else(|| {
            StrataError::SegmentCorrupted(format!("unknown key type tag {}", buf[20]))
        })?;

        Ok(Self {
            branching_factor: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
            height: u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]),
            leaf_count: u32::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]),
            node_count: u32::from_le_bytes([buf[16], buf[17], buf[18], buf[19]]),
            key_type,
            entry_count: u64::from_le_bytes([
                buf[24], buf[25], buf[26], buf[27], buf[28], buf[29], buf[30], buf[31],
            ]),
            commit_time: u64::from_le_bytes([
                buf[32], buf[33], buf[34], buf[35], buf[36], buf[37], buf[38], buf[39],
            ]),
            root_addr: RegionAddr(u64::from_le_bytes([
                buf[40], buf[41], buf[42], buf[43], buf[44], buf[45], buf[46], buf[47],
            ])),
        })
    }
}

/// Bounds-checked reader over a region payload.
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let slice = self
            .buf
            .get(self.pos..self.pos + len)
            .ok_or_else(|| StrataError::SegmentCorrupted("region truncated".to_string()))?;
        self.pos += len;
        Ok(slice)
    }

    fn read_u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn read_u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_u64(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        Ok(u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
    }

    fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        Ok(Bytes::copy_from_slice(self.take(len)?))
    }

    fn expect_end(&self) -> Result<()> {
        if self.pos != self.buf.len() {
            return Err(StrataError::SegmentCorrupted(format!(
                "{} trailing bytes after region",
                self.buf.len() - self.pos
            )));
        }
        Ok(())
    }
}
