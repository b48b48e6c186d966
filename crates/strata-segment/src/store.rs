//! Append-only byte-region stores backing index segments.

use bytes::Bytes;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use strata_common::{Result, StrataError};

/// Opaque address of a region within a store.
///
/// Addresses are byte offsets assigned by `append` and are only meaningful
/// to the store that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionAddr(pub u64);

impl RegionAddr {
    /// Sentinel for "no region" (e.g. the root of an empty segment).
    pub const NULL: RegionAddr = RegionAddr(u64::MAX);

    /// Returns true if this is the null sentinel.
    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }
}

impl std::fmt::Display for RegionAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_null() {
            write!(f, "addr:null")
        } else {
            write!(f, "addr:{}", self.0)
        }
    }
}

/// Append-addressable backing storage for serialized regions.
///
/// Each appended region is written as a u32 length prefix followed by the
/// payload; the returned address points at the prefix. Stores are append-only
/// while a segment is being built and read-only thereafter.
pub trait RegionStore: Send + Sync {
    /// Appends a region and returns its address.
    fn append(&mut self, payload: &[u8]) -> Result<RegionAddr>;

    /// Reads the region at the given address.
    fn read(&self, addr: RegionAddr) -> Result<Bytes>;

    /// Returns the total number of bytes in the store.
    fn len(&self) -> Result<u64>;

    /// Returns true if the store holds no bytes.
    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Reads the last `n` bytes of the store (the segment footer lives there).
    fn read_tail(&self, n: usize) -> Result<Bytes>;

    /// Flushes buffered writes to the backing medium.
    fn flush(&mut self) -> Result<()>;
}

/// In-memory region store for tests and ephemeral segments.
#[derive(Debug, Default)]
pub struct MemRegionStore {
    data: Vec<u8>,
}

impl MemRegionStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw backing bytes, regions and footer included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl RegionStore for MemRegionStore {
    fn append(&mut self, payload: &[u8]) -> Result<RegionAddr> {
        let addr = RegionAddr(self.data.len() as u64);
        self.data
            .extend_from_slice(&(payload.len() as u32).to_le_bytes());
        self.data.extend_from_slice(payload);
        Ok(addr)
    }

    fn read(&self, addr: RegionAddr) -> Result<Bytes> {
        if addr.is_null() {
            return Err(StrataError::RegionNotFound { addr: addr.0 });
        }
        // Addresses from a corrupt node can sit near u64::MAX; checked
        // arithmetic keeps those a read error instead of an overflow.
        let start = addr.0 as usize;
        let body = start
            .checked_add(4)
            .ok_or(StrataError::RegionNotFound { addr: addr.0 })?;
        let prefix = self
            .data
            .get(start..body)
            .ok_or(StrataError::RegionNotFound { addr: addr.0 })?;
        let len = u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
        let end = body
            .checked_add(len)
            .ok_or_else(|| StrataError::SegmentCorrupted(format!("region at {addr} truncated")))?;
        let payload = self
            .data
            .get(body..end)
            .ok_or_else(|| StrataError::SegmentCorrupted(format!("region at {addr} truncated")))?;
        Ok(Bytes::copy_from_slice(payload))
    }

    fn len(&self) -> Result<u64> {
        Ok(self.data.len() as u64)
    }

    fn read_tail(&self, n: usize) -> Result<Bytes> {
        if self.data.len() < n {
            return Err(StrataError::SegmentCorrupted(format!(
                "store holds {} bytes, expected at least {}",
                self.data.len(),
                n
            )));
        }
        Ok(Bytes::copy_from_slice(&self.data[self.data.len() - n..]))
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// File-backed region store.
///
/// A builder writes regions to a staging file (`<path>.tmp`) and publishes
/// the finished segment by renaming it over the final path, so a failed
/// build never leaves an openable segment behind.
pub struct FileRegionStore {
    /// Open file handle; seeks are serialized through this lock.
    file: Mutex<File>,
    /// Final segment path.
    path: PathBuf,
    /// Staging path while the segment is being written, if unpublished.
    staging: Option<PathBuf>,
    /// Enable fsync on flush/publish.
    fsync_enabled: bool,
}

impl FileRegionStore {
    /// Creates a staging store for building a new segment at `path`.
    ///
    /// Any stale staging file from an earlier failed build is truncated.
    pub fn create(path: impl AsRef<Path>, fsync_enabled: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let staging = path.with_extension("tmp");
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&staging)?;
        Ok(Self {
            file: Mutex::new(file),
            path,
            staging: Some(staging),
            fsync_enabled,
        })
    }

    /// Opens an existing, published segment file read-only.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().read(true).open(&path)?;
        Ok(Self {
            file: Mutex::new(file),
            path,
            staging: None,
            fsync_enabled: false,
        })
    }

    /// Returns the final segment path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Atomically publishes the staging file to the final path.
    ///
    /// After this returns the segment is visible to `open`; before it, no
    /// openable segment exists at the final path.
    pub fn publish(&mut self) -> Result<()> {
        let staging = match self.staging.take() {
            Some(staging) => staging,
            None => return Ok(()), // already published
        };
        {
            let file = self.file.lock();
            if self.fsync_enabled {
                file.sync_all()?;
            }
        }
        std::fs::rename(&staging, &self.path)?;
        Ok(())
    }

    /// Removes the staging file after a failed build.
    pub fn discard(&mut self) -> Result<()> {
        if let Some(staging) = self.staging.take() {
            if staging.exists() {
                std::fs::remove_file(staging)?;
            }
        }
        Ok(())
    }
}

impl RegionStore for FileRegionStore {
    fn append(&mut self, payload: &[u8]) -> Result<RegionAddr> {
        let mut file = self.file.lock();
        let offset = file.seek(SeekFrom::End(0))?;
        file.write_all(&(payload.len() as u32).to_le_bytes())?;
        file.write_all(payload)?;
        Ok(RegionAddr(offset))
    }

    fn read(&self, addr: RegionAddr) -> Result<Bytes> {
        if addr.is_null() {
            return Err(StrataError::RegionNotFound { addr: addr.0 });
        }
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(addr.0))?;
        let mut prefix = [0u8; 4];
        file.read_exact(&mut prefix)
            .map_err(|_| StrataError::RegionNotFound { addr: addr.0 })?;
        let len = u32::from_le_bytes(prefix) as usize;
        let mut payload = vec![0u8; len];
        file.read_exact(&mut payload)
            .map_err(|_| StrataError::SegmentCorrupted(format!("region at {addr} truncated")))?;
        Ok(Bytes::from(payload))
    }

    fn len(&self) -> Result<u64> {
        let file = self.file.lock();
        Ok(file.metadata()?.len())
    }

    fn read_tail(&self, n: usize) -> Result<Bytes> {
        let mut file = self.file.lock();
        let total = file.metadata()?.len();
        if total < n as u64 {
            return Err(StrataError::SegmentCorrupted(format!(
                "file holds {total} bytes, expected at least {n}"
            )));
        }
        file.seek(SeekFrom::Start(total - n as u64))?;
        let mut buf = vec![0u8; n];
        file.read_exact(&mut buf)?;
        Ok(Bytes::from(buf))
    }

    fn flush(&mut self) -> Result<()> {
        let file = self.file.lock();
        if self.fsync_enabled {
            file.sync_all()?;
        }
        Ok(())
    }
}

impl Drop for FileRegionStore {
    fn drop(&mut self) {
        // An unpublished staging file means the build failed or was abandoned.
        let _ = self.discard();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_region_addr_null_sentinel() {
        assert!(RegionAddr::NULL.is_null());
        assert!(!RegionAddr(0).is_null());
        assert_eq!(RegionAddr::NULL.to_string(), "addr:null");
        assert_eq!(RegionAddr(16).to_string(), "addr:16");
    }

    #[test]
    fn test_mem_store_append_read() {
        let mut store = MemRegionStore::new();

        let a = store.append(b"hello").unwrap();
        let b = store.append(b"world!").unwrap();

        assert_eq!(a, RegionAddr(0));
        assert_eq!(b, RegionAddr(9)); // 4-byte prefix + 5 payload bytes
        assert_eq!(store.read(a).unwrap().as_ref(), b"hello");
        assert_eq!(store.read(b).unwrap().as_ref(), b"world!");
    }

    #[test]
    fn test_mem_store_read_null_addr_fails() {
        let store = MemRegionStore::new();
        assert!(store.read(RegionAddr::NULL).is_err());
    }

    #[test]
    fn test_mem_store_read_near_max_addr_fails_cleanly() {
        // A corrupt node region can carry a child address just under the
        // null sentinel; the read must error, not overflow.
        let mut store = MemRegionStore::new();
        store.append(b"payload").unwrap();

        let result = store.read(RegionAddr(u64::MAX - 1));
        assert!(matches!(
            result,
            Err(StrataError::RegionNotFound { .. })
        ));
    }

    #[test]
    fn test_mem_store_read_bad_addr_fails() {
        let mut store = MemRegionStore::new();
        store.append(b"data").unwrap();
        assert!(store.read(RegionAddr(1000)).is_err());
    }

    #[test]
    fn test_mem_store_read_tail() {
        let mut store = MemRegionStore::new();
        store.append(b"abcdef").unwrap();

        let tail = store.read_tail(3).unwrap();
        assert_eq!(tail.as_ref(), b"def");
        assert!(store.read_tail(100).is_err());
    }

    #[test]
    fn test_file_store_append_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.seg");

        let mut store = FileRegionStore::create(&path, false).unwrap();
        let a = store.append(b"first").unwrap();
        let b = store.append(b"second").unwrap();

        assert_eq!(store.read(a).unwrap().as_ref(), b"first");
        assert_eq!(store.read(b).unwrap().as_ref(), b"second");
    }

    #[test]
    fn test_file_store_publish_then_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.seg");
        let addr;

        {
            let mut store = FileRegionStore::create(&path, true).unwrap();
            addr = store.append(b"persisted").unwrap();
            assert!(!path.exists(), "unpublished segment must not be visible");
            store.publish().unwrap();
            assert!(path.exists());
        }

        let store = FileRegionStore::open(&path).unwrap();
        assert_eq!(store.read(addr).unwrap().as_ref(), b"persisted");
    }

    #[test]
    fn test_file_store_unpublished_build_leaves_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.seg");
        let staging = path.with_extension("tmp");

        {
            let mut store = FileRegionStore::create(&path, false).unwrap();
            store.append(b"partial").unwrap();
            assert!(staging.exists());
            // Dropped without publish: the build failed.
        }

        assert!(!path.exists());
        assert!(!staging.exists());
        assert!(FileRegionStore::open(&path).is_err());
    }

    #[test]
    fn test_file_store_discard_removes_staging() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.seg");

        let mut store = FileRegionStore::create(&path, false).unwrap();
        store.append(b"junk").unwrap();
        store.discard().unwrap();

        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_file_store_read_tail() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.seg");

        let mut store = FileRegionStore::create(&path, false).unwrap();
        store.append(b"0123456789").unwrap();

        let tail = store.read_tail(4).unwrap();
        assert_eq!(tail.as_ref(), b"6789");
    }

    #[test]
    fn test_stores_agree_on_addresses() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.seg");

        let mut mem = MemRegionStore::new();
        let mut file = FileRegionStore::create(&path, false).unwrap();

        for payload in [b"aa".as_ref(), b"bbb", b"cccc"] {
            let ma = mem.append(payload).unwrap();
            let fa = file.append(payload).unwrap();
            assert_eq!(ma, fa);
        }
        assert_eq!(mem.len().unwrap(), file.len().unwrap());
    }
}
