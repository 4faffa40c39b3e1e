//! Window time allocation.
//!
//! # Algorithm
//!
//! Each window is worth exactly [`WINDOW_SIZE`] seconds. Every file seen in
//! the window gets `floor(count * 60 / total)` seconds. The rounding
//! remainder goes to the dominant file: highest count, ties broken by the
//! lexicographically smallest path. The per-window sum is therefore always
//! exactly 60.

use std::collections::BTreeMap;

use crate::event::{EventBucket, WindowCounts};
use crate::window::WINDOW_SIZE;

/// Seconds credited for one window.
pub const WINDOW_SECS: u64 = WINDOW_SIZE.unsigned_abs();

/// Seconds per file for one window.
pub type WindowAllocation = BTreeMap<String, u64>;

/// The file with the highest count; ties go to the smallest path.
#[must_use]
pub fn dominant_file(counts: &WindowCounts) -> Option<&str> {
    let mut best: Option<(&str, u32)> = None;
    for (path, &count) in counts {
        // BTreeMap iterates in ascending path order, so strict `>` keeps the
        // smallest path among equal counts.
        if best.is_none_or(|(_, best_count)| count > best_count) {
            best = Some((path.as_str(), count));
        }
    }
    best.map(|(path, _)| path)
}

/// Split one window's seconds across its files.
#[must_use]
pub fn allocate_window(counts: &WindowCounts) -> WindowAllocation {
    let total: u64 = counts.values().map(|&c| u64::from(c)).sum();
    if total == 0 {
        return WindowAllocation::new();
    }

    let mut out: WindowAllocation = counts
        .iter()
        .filter(|&(_, &count)| count > 0)
        .map(|(path, &count)| (path.clone(), u64::from(count) * WINDOW_SECS / total))
        .collect();

    let assigned: u64 = out.values().sum();
    let remainder = WINDOW_SECS - assigned;
    if remainder > 0
        && let Some(winner) = dominant_file(counts)
        && let Some(secs) = out.get_mut(winner)
    {
        *secs += remainder;
    }
    out
}

/// Allocate every window in a sweep bucket.
#[must_use]
pub fn allocate(bucket: &EventBucket) -> BTreeMap<i64, WindowAllocation> {
    bucket
        .iter()
        .map(|(&window, counts)| (window, allocate_window(counts)))
        .filter(|(_, alloc)| !alloc.is_empty())
        .collect()
}
