//! File-access events and their on-disk marker format.
//!
//! Each access is one marker file under `.tally/events/`:
//!
//! ```text
//! <window>-<16 hex>.event      name: window epoch + random suffix
//! <metrics_dir_abs>,<path>     content: owning .tally dir + root-relative path
//! ```
//!
//! Markers are append-only. The recorder creates them, the sweeper reads
//! and deletes them, and nothing else touches them.

pub mod recorder;
pub mod sweep;

use std::collections::BTreeMap;
use std::path::Path;

use crate::note::check_source_path;
use crate::window::WINDOW_SIZE;

pub use recorder::Recorder;
pub use sweep::{Sweep, Sweeper};

/// File extension of event markers.
pub const MARKER_EXT: &str = "event";

/// Suffix appended to application names recorded as file-like identifiers.
pub const APP_SUFFIX: &str = ".app";

/// Access counts for one window, keyed by root-relative path.
pub type WindowCounts = BTreeMap<String, u32>;

/// Access counts for every window seen in a sweep, keyed by window epoch.
pub type EventBucket = BTreeMap<i64, WindowCounts>;

/// One observed file access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    pub window: i64,
    pub file_path: String,
}

#[must_use]
pub fn is_app_identifier(source_file: &str) -> bool {
    source_file.ends_with(APP_SUFFIX)
}

/// Marker file name for an event in `window` with the given random suffix.
#[must_use]
pub fn marker_name(window: i64, suffix: u64) -> String {
    format!("{window}-{suffix:016x}.{MARKER_EXT}")
}

/// Extract the window epoch from a marker file name.
///
/// The window may be negative, so the suffix is split off from the right.
/// A window that is not a multiple of [`WINDOW_SIZE`] was not written by
/// the recorder and is rejected.
#[must_use]
pub fn parse_marker_name(name: &str) -> Option<i64> {
    let stem = name.strip_suffix(MARKER_EXT)?.strip_suffix('.')?;
    let (window, suffix) = stem.rsplit_once('-')?;
    if suffix.is_empty() || !suffix.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let window: i64 = window.parse().ok()?;
    (window.rem_euclid(WINDOW_SIZE) == 0).then_some(window)
}

/// Marker body for `relative` recorded into the metrics dir `tally_dir`.
#[must_use]
pub fn encode_content(tally_dir: &Path, relative: &str) -> String {
    format!("{},{relative}", tally_dir.display())
}

/// Decode a marker body, checking it belongs to `tally_dir`.
///
/// # Errors
///
/// Returns a short reason when the body names another metrics directory or
/// carries a path a note cannot hold.
pub fn decode_content(content: &str, tally_dir: &Path) -> Result<String, String> {
    let content = content.trim_end_matches(['\r', '\n']);
    let prefix = format!("{},", tally_dir.display());
    let Some(relative) = content.strip_prefix(&prefix) else {
        return Err(format!(
            "marker does not belong to {}",
            tally_dir.display()
        ));
    };
    if relative.is_empty() {
        return Err("marker has an empty path".to_string());
    }
    check_source_path(relative)?;
    Ok(relative.to_string())
}
