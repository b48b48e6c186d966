//! Read-optimized index segments for StrataDB.
//!
//! This crate provides:
//! - A mutable, ordered in-memory source index
//! - An append-only byte-region store (file-backed and in-memory)
//! - A one-shot bulk-load builder that compacts a source index into an
//!   immutable segment with a fixed branching factor
//! - A read view over a built segment supporting point lookup and ascending
//!   scans, with lazy materialization through a bounded hot-set cache

mod builder;
mod plan;
mod region;
mod segment;
mod source;
mod store;

pub use builder::SegmentBuilder;
pub use plan::{partition, plan_tree, TreePlan};
pub use region::{
    LeafRegion, NodeRegion, SegmentFooter, TreeRegion, FOOTER_LEN, SEGMENT_MAGIC,
};
pub use segment::Segment;
pub use source::{ByteOrderComparator, KeyComparator, MemIndex, OrderedSource};
pub use store::{FileRegionStore, MemRegionStore, RegionAddr, RegionStore};
