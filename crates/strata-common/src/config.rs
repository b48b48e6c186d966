//! Configuration structures for StrataDB.

use crate::error::{Result, StrataError};
use serde::{Deserialize, Serialize};

/// Minimum allowed branching factor for a segment.
pub const MIN_BRANCHING_FACTOR: u32 = 3;

/// Configuration for building and opening index segments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentConfig {
    /// Branching factor: maximum entries per leaf and children per node.
    pub branching_factor: u32,
    /// Capacity of the hot-set cache (strongly held nodes/leaves).
    pub cache_capacity: usize,
    /// Recent-scan window for the hot-set cache (must not exceed capacity).
    pub cache_scan_window: usize,
    /// Enable fsync when writing segment files.
    pub fsync_enabled: bool,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            branching_factor: 64,
            cache_capacity: 500,
            cache_scan_window: 20,
            fsync_enabled: true,
        }
    }
}

impl SegmentConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.branching_factor < MIN_BRANCHING_FACTOR {
            return Err(StrataError::InvalidBranchingFactor {
                m: self.branching_factor,
            });
        }
        if self.cache_capacity == 0 {
            return Err(StrataError::InvalidParameter {
                name: "cache_capacity".to_string(),
                value: "0".to_string(),
            });
        }
        if self.cache_scan_window > self.cache_capacity {
            return Err(StrataError::InvalidParameter {
                name: "cache_scan_window".to_string(),
                value: self.cache_scan_window.to_string(),
            });
        }
        Ok(())
    }
}
