//! Error types for StrataDB.

use thiserror::Error;

/// Result type alias using StrataError.
pub type Result<T> = std::result::Result<T, StrataError>;

/// Errors that can occur in StrataDB operations.
#[derive(Debug, Error)]
pub enum StrataError {
    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Argument errors
    #[error("Branching factor must be at least 3, got {m}")]
    InvalidBranchingFactor { m: u32 },

    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter { name: String, value: String },

    // Segment errors
    #[error("Segment corrupted: {0}")]
    SegmentCorrupted(String),

    #[error("Region not found at address {addr}")]
    RegionNotFound { addr: u64 },

    // Internal errors
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    // Lookup misses surface as Ok(None); this variant is for callers that
    // treat a required key as a hard error.
    #[error("Key not found")]
    KeyNotFound,
}
