//! StrataDB common types, errors, and utilities.
//!
//! This crate provides shared definitions used across all StrataDB components.

pub mod config;
pub mod error;
pub mod keytype;
pub mod timestamp;

pub use config::SegmentConfig;
pub use error::{Result, StrataError};
pub use keytype::KeyType;
pub use timestamp::{ManualTimestampFactory, MillisTimestampFactory, TimestampFactory};
