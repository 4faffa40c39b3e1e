//! Marker scanning, window bucketing, and idle continuation.
//!
//! A scan reads every marker under `.tally/events/`, counts accesses per
//! (window, file), and fills idle gaps: after the last real event in a
//! window, the window's dominant file keeps one synthetic access per window
//! until the next real window or until `IDLE_TIMEOUT` has elapsed.
//!
//! Scanning is read-only. Markers are deleted by [`Sweep::consume`] once the
//! caller has durably stored what the scan produced.

use std::io;
use std::path::PathBuf;

use tracing::{debug, warn};

use super::{EventBucket, FileEvent, MARKER_EXT, decode_content, parse_marker_name};
use crate::allocate::dominant_file;
use crate::clock::Clock;
use crate::error::{Result, TallyError};
use crate::paths::Project;
use crate::window::{IDLE_TIMEOUT, current_window, windows_between};

/// Outcome of one scan: the counts and the markers that produced them.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Sweep {
    pub bucket: EventBucket,
    /// Every marker read by the scan, malformed ones included.
    pub consumed: Vec<PathBuf>,
    /// Number of markers that decoded to an event.
    pub events: usize,
    /// Number of synthetic idle accesses added.
    pub synthesized: usize,
}

impl Sweep {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.consumed.is_empty()
    }

    /// Delete every consumed marker. Already-missing markers are ignored.
    ///
    /// # Errors
    ///
    /// Returns the first deletion failure other than `NotFound`.
    pub fn consume(&self) -> Result<usize> {
        let mut removed = 0;
        for marker in &self.consumed {
            match std::fs::remove_file(marker) {
                Ok(()) => removed += 1,
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        debug!(removed, "consumed event markers");
        Ok(removed)
    }
}

/// Reads markers for one project.
pub struct Sweeper<'a> {
    project: &'a Project,
    clock: &'a dyn Clock,
}

impl<'a> Sweeper<'a> {
    #[must_use]
    pub fn new(project: &'a Project, clock: &'a dyn Clock) -> Self {
        Self { project, clock }
    }

    /// Scan markers and build the per-window bucket with idle continuation.
    ///
    /// # Errors
    ///
    /// Propagates directory listing and read failures. Malformed markers
    /// are logged and skipped, not reported as errors.
    pub fn scan(&self) -> Result<Sweep> {
        let mut sweep = Sweep::default();
        let entries = match std::fs::read_dir(&self.project.events_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(sweep),
            Err(err) => return Err(err.into()),
        };

        let mut markers = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_marker = path.extension().is_some_and(|ext| ext == MARKER_EXT);
            if is_marker && path.is_file() {
                markers.push(path);
            }
        }
        markers.sort();

        for marker in markers {
            match self.read_marker(&marker) {
                Ok(event) => {
                    *sweep
                        .bucket
                        .entry(event.window)
                        .or_default()
                        .entry(event.file_path)
                        .or_insert(0) += 1;
                    sweep.events += 1;
                }
                Err(TallyError::InvalidMarker { path, reason }) => {
                    warn!(marker = %path.display(), %reason, "skipping malformed event marker");
                }
                Err(err) => return Err(err),
            }
            sweep.consumed.push(marker);
        }

        sweep.synthesized = fill_idle_gaps(&mut sweep.bucket, current_window(self.clock));
        debug!(
            markers = sweep.consumed.len(),
            events = sweep.events,
            windows = sweep.bucket.len(),
            synthesized = sweep.synthesized,
            "scanned event markers"
        );
        Ok(sweep)
    }

    /// Scan, then consume the markers unless `dry_run`.
    ///
    /// # Errors
    ///
    /// See [`Sweeper::scan`] and [`Sweep::consume`].
    pub fn sweep(&self, dry_run: bool) -> Result<Sweep> {
        let sweep = self.scan()?;
        if !dry_run {
            sweep.consume()?;
        }
        Ok(sweep)
    }

    fn read_marker(&self, marker: &std::path::Path) -> Result<FileEvent> {
        let invalid = |reason: String| TallyError::InvalidMarker {
            path: marker.to_path_buf(),
            reason,
        };

        let name = marker
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| invalid("marker name is not UTF-8".to_string()))?;
        let window = parse_marker_name(name)
            .ok_or_else(|| invalid(format!("unrecognized marker name {name:?}")))?;

        let bytes = std::fs::read(marker)?;
        let content =
            String::from_utf8(bytes).map_err(|_| invalid("marker body is not UTF-8".to_string()))?;
        let file_path = decode_content(&content, &self.project.tally_dir).map_err(invalid)?;

        Ok(FileEvent { window, file_path })
    }
}

/// Add one synthetic access for the previous dominant file in each idle
/// window. Returns how many were added.
///
/// Between two real windows, continuation stops at the next real window or
/// `prev + IDLE_TIMEOUT`, whichever comes first. After the last real window
/// it also stops before `current`, which is still in progress.
fn fill_idle_gaps(bucket: &mut EventBucket, current: i64) -> usize {
    let real: Vec<i64> = bucket.keys().copied().collect();
    let mut synthetic: Vec<(i64, String)> = Vec::new();

    for (i, &prev) in real.iter().enumerate() {
        let until = real.get(i + 1).copied().unwrap_or(current);
        let Some(winner) = bucket.get(&prev).and_then(dominant_file) else {
            continue;
        };
        let limit = prev.saturating_add(IDLE_TIMEOUT);
        for window in windows_between(prev, until).take_while(|w| *w <= limit) {
            synthetic.push((window, winner.to_string()));
        }
    }

    let added = synthetic.len();
    for (window, file) in synthetic {
        bucket.entry(window).or_default().entry(file).or_insert(1);
    }
    added
}
