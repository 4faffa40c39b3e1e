//! Persistent per-file time accumulated between commits.
//!
//! Stored as `.tally/metrics.json`:
//!
//! ```json
//! { "files": { "<file_id>": { "source_file": "src/main.rs", "seconds": 120,
//!                             "timeline": { "1700000040": 60, "1700000100": 60 } } } }
//! ```
//!
//! `file_id` is the first 16 hex chars of the BLAKE3 hash of the
//! root-relative path. Writes go through a temp file and rename so a crash
//! never leaves a truncated store.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::allocate::WindowAllocation;
use crate::error::{Result, TallyError};
use crate::event::is_app_identifier;
use crate::scm::{Scm, ScmError};

const FILE_ID_LEN: usize = 16;

/// Content-addressed id of a root-relative path.
#[must_use]
pub fn file_id(source_file: &str) -> String {
    let hash = blake3::hash(source_file.as_bytes());
    hash.to_hex().as_str()[..FILE_ID_LEN].to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricFile {
    pub source_file: String,
    #[serde(default)]
    pub seconds: u64,
    #[serde(default)]
    pub timeline: BTreeMap<i64, u64>,
    /// Resolved against the SCM on demand; never persisted.
    #[serde(skip)]
    pub git_tracked: Option<bool>,
}

impl MetricFile {
    #[must_use]
    pub fn new(source_file: impl Into<String>) -> Self {
        Self {
            source_file: source_file.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn file_id(&self) -> String {
        file_id(&self.source_file)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricStore {
    #[serde(default)]
    pub files: BTreeMap<String, MetricFile>,
}

impl MetricStore {
    /// Load the store, or an empty one if the file does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`TallyError::Store`] on malformed JSON and
    /// [`TallyError::Io`] on read failures.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(err.into()),
        };
        let store: Self = serde_json::from_slice(&bytes).map_err(|source| TallyError::Store {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), files = store.files.len(), "loaded metric store");
        Ok(store)
    }

    /// Atomically replace the store file.
    ///
    /// # Errors
    ///
    /// Returns [`TallyError::Io`] if the temp file cannot be written or
    /// renamed into place.
    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_vec_pretty(self).map_err(|source| TallyError::Store {
            path: path.to_path_buf(),
            source,
        })?;
        let parent = path.parent().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("no parent dir for {}", path.display()),
            )
        })?;
        std::fs::create_dir_all(parent)?;
        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        tmp.write_all(&data)?;
        tmp.write_all(b"\n")?;
        tmp.flush()?;
        tmp.persist(path).map_err(|err| err.error)?;
        debug!(path = %path.display(), files = self.files.len(), "saved metric store");
        Ok(())
    }

    /// Add `seconds` to `source_file` in `window`.
    pub fn add_time(&mut self, source_file: &str, window: i64, seconds: u64) {
        if seconds == 0 {
            return;
        }
        let entry = self
            .files
            .entry(file_id(source_file))
            .or_insert_with(|| MetricFile::new(source_file));
        entry.seconds += seconds;
        *entry.timeline.entry(window).or_insert(0) += seconds;
    }

    /// Add an allocator result to the store.
    pub fn add_allocation(&mut self, allocation: &BTreeMap<i64, WindowAllocation>) {
        for (&window, files) in allocation {
            for (source_file, &seconds) in files {
                self.add_time(source_file, window, seconds);
            }
        }
    }

    pub fn remove(&mut self, file_id: &str) -> Option<MetricFile> {
        self.files.remove(file_id)
    }

    #[must_use]
    pub fn get(&self, source_file: &str) -> Option<&MetricFile> {
        self.files.get(&file_id(source_file))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    #[must_use]
    pub fn total_seconds(&self) -> u64 {
        self.files.values().map(|f| f.seconds).sum()
    }

    /// Files ordered by descending time, then path.
    #[must_use]
    pub fn ranked(&self) -> Vec<&MetricFile> {
        let mut files: Vec<&MetricFile> = self.files.values().collect();
        files.sort_by(|a, b| {
            b.seconds
                .cmp(&a.seconds)
                .then_with(|| a.source_file.cmp(&b.source_file))
        });
        files
    }

    /// Resolve `git_tracked` for every file that has not been resolved yet.
    ///
    /// Application identifiers are never tracked.
    ///
    /// # Errors
    ///
    /// Propagates the first SCM failure.
    pub fn refresh_tracking(&mut self, scm: &dyn Scm) -> Result<(), ScmError> {
        for file in self.files.values_mut() {
            if file.git_tracked.is_some() {
                continue;
            }
            let tracked = if is_app_identifier(&file.source_file) {
                false
            } else {
                scm.is_tracked(&file.source_file)?
            };
            file.git_tracked = Some(tracked);
        }
        Ok(())
    }
}
