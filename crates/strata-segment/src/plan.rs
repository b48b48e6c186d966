//! Occupancy planning for bulk-loaded segments.
//!
//! Given a sorted entry count and a branching factor, these routines decide
//! how many entries each leaf takes and how many children each node at each
//! internal level takes, such that every leaf/node holds between ceil(m/2)
//! and m items (a sole root is exempt from the minimum).

use strata_common::config::MIN_BRANCHING_FACTOR;
use strata_common::{Result, StrataError};

/// Shape of a bulk-loaded tree: leaf sizes and per-level node counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreePlan {
    /// Entries per leaf, in ascending key order.
    pub leaf_sizes: Vec<u32>,
    /// Node counts per internal level, bottom level first.
    pub level_counts: Vec<u32>,
}

impl TreePlan {
    /// Number of leaves.
    pub fn leaf_count(&self) -> u32 {
        self.leaf_sizes.len() as u32
    }

    /// Number of internal levels above the leaves (0 = the root is a leaf).
    pub fn height(&self) -> u32 {
        self.level_counts.len() as u32
    }

    /// Total number of internal nodes across all levels.
    pub fn node_count(&self) -> u32 {
        self.level_counts.iter().sum()
    }
}

/// Minimum occupancy for a leaf or node with branching factor `m`.
#[inline]
pub(crate) fn min_occupancy(m: u32) -> u32 {
    m.div_ceil(2)
}

/// Partitions `count` ordered items into groups of at most `m`.
///
/// The group count is always `ceil(count / m)`. Groups are packed greedily
/// at `m` items with the remainder in the last group, unless that remainder
/// would fall below `ceil(m / 2)`; in that case the items are redistributed
/// as evenly as possible (group sizes differ by at most 1, the earliest
/// groups take the extra item) so no group underflows. A sole group takes
/// everything unconditionally.
///
/// Returns an empty vector for `count == 0`.
pub fn partition(count: u64, m: u32) -> Result<Vec<u32>> {
    if m < MIN_BRANCHING_FACTOR {
        return Err(StrataError::InvalidBranchingFactor { m });
    }
    if count == 0 {
        return Ok(Vec::new());
    }

    let max = m as u64;
    let groups = count.div_ceil(max);
    if groups == 1 {
        return Ok(vec![count as u32]);
    }

    let naive_last = count - (groups - 1) * max;
    let sizes = if naive_last < min_occupancy(m) as u64 {
        // Greedy packing would underflow the last group; spread evenly.
        let base = count / groups;
        let extra = count % groups;
        (0..groups)
            .map(|i| if i < extra { base as u32 + 1 } else { base as u32 })
            .collect::<Vec<u32>>()
    } else {
        let mut sizes = vec![m; (groups - 1) as usize];
        sizes.push(naive_last as u32);
        sizes
    };

    check_partition(&sizes, count, m)?;
    Ok(sizes)
}

/// Verifies the occupancy bounds and conservation for a computed partition.
fn check_partition(sizes: &[u32], count: u64, m: u32) -> Result<()> {
    let total: u64 = sizes.iter().map(|&s| s as u64).sum();
    if total != count {
        return Err(StrataError::InvariantViolation(format!(
            "partition of {count} items sums to {total}"
        )));
    }
    let min = if sizes.len() == 1 { 1 } else { min_occupancy(m) };
    for (i, &size) in sizes.iter().enumerate() {
        if size < min || size > m {
            return Err(StrataError::InvariantViolation(format!(
                "group {i} holds {size} items, bounds [{min}, {m}]"
            )));
        }
    }
    Ok(())
}

/// Plans the full shape of a tree over `n` entries with branching factor `m`.
///
/// Leaves are partitioned first; then each internal level is planned from
/// the count below it with the identical rule, until a single root remains.
/// An empty source yields a plan with no leaves and no levels.
pub fn plan_tree(n: u64, m: u32) -> Result<TreePlan> {
    let leaf_sizes = partition(n, m)?;

    let mut level_counts = Vec::new();
    let mut child_count = leaf_sizes.len() as u64;
    while child_count > 1 {
        let level = partition(child_count, m)?;
        child_count = level.len() as u64;
        level_counts.push(level.len() as u32);
    }

    Ok(TreePlan {
        leaf_sizes,
        level_counts,
    })
}
