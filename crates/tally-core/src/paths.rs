//! Project discovery and the well-known paths under `.tally/`.

use std::path::{Component, Path, PathBuf};

use crate::error::{Result, TallyError};

/// Name of the per-project metrics directory.
pub const TALLY_DIR: &str = ".tally";

/// A discovered tally project. Passed explicitly to every operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub root: PathBuf,
    pub tally_dir: PathBuf,
    pub events_dir: PathBuf,
    pub metrics_json: PathBuf,
    pub lock_file: PathBuf,
    pub config_toml: PathBuf,
}

impl Project {
    /// Derive all paths from a project root. Pure computation, no I/O.
    pub fn at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let tally_dir = root.join(TALLY_DIR);
        Self {
            events_dir: tally_dir.join("events"),
            metrics_json: tally_dir.join("metrics.json"),
            lock_file: tally_dir.join("lock"),
            config_toml: tally_dir.join("config.toml"),
            tally_dir,
            root,
        }
    }

    /// Walk up from `start` looking for a directory containing `.tally/`.
    ///
    /// `start` may be a file or a directory. It is canonicalized first so the
    /// root and every relative path derived from it are stable regardless of
    /// how the caller spelled the path.
    ///
    /// # Errors
    ///
    /// Returns [`TallyError::NotInitialized`] when no ancestor has `.tally/`,
    /// or [`TallyError::Io`] if `start` cannot be canonicalized.
    pub fn discover(start: &Path) -> Result<Self> {
        let start = start.canonicalize()?;
        find_root(&start)
            .map(Self::at)
            .ok_or(TallyError::NotInitialized(start))
    }

    /// Check whether `.tally/` exists.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.tally_dir.is_dir()
    }

    /// Create `.tally/` and `.tally/events/`. Idempotent.
    ///
    /// # Errors
    ///
    /// Propagates directory creation failures.
    pub fn ensure_layout(&self) -> Result<()> {
        std::fs::create_dir_all(&self.events_dir)?;
        Ok(())
    }

    /// Express an absolute path relative to the project root, with `/`
    /// separators, the form stored in markers and notes.
    ///
    /// Returns `None` if `path` is not under the root, or if any component
    /// below the root is not valid UTF-8 or is not a plain name.
    #[must_use]
    pub fn relative(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let parts = rel
            .components()
            .map(|c| match c {
                Component::Normal(part) => part.to_str(),
                _ => None,
            })
            .collect::<Option<Vec<&str>>>()?;
        if parts.is_empty() {
            return None;
        }
        Some(parts.join("/"))
    }

    /// Absolute path of a root-relative source path.
    #[must_use]
    pub fn absolute(&self, relative: &str) -> PathBuf {
        relative
            .split('/')
            .fold(self.root.clone(), |acc, part| acc.join(part))
    }
}

fn find_root(start: &Path) -> Option<PathBuf> {
    let mut cur = start.to_path_buf();
    loop {
        if cur.join(TALLY_DIR).is_dir() {
            return Some(cur);
        }
        if !cur.pop() {
            return None;
        }
    }
}
