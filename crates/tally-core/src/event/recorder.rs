//! Lock-free event recording.
//!
//! Recording happens on every editor save, so it must be cheap and must
//! never block on the metrics lock. Each call creates exactly one new
//! marker with `create_new`; a name collision retries with a fresh suffix
//! instead of overwriting.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{APP_SUFFIX, FileEvent, encode_content, marker_name};
use crate::clock::Clock;
use crate::error::{Result, TallyError};
use crate::note::check_source_path;
use crate::paths::{Project, TALLY_DIR};
use crate::window::current_window;

const MAX_NAME_ATTEMPTS: usize = 8;

/// Writes event markers stamped with the current window.
pub struct Recorder<'a> {
    clock: &'a dyn Clock,
}

impl<'a> Recorder<'a> {
    #[must_use]
    pub fn new(clock: &'a dyn Clock) -> Self {
        Self { clock }
    }

    /// Record an access to `path`.
    ///
    /// The project is discovered by walking up from the file.
    ///
    /// # Errors
    ///
    /// - [`TallyError::FileNotFound`] if `path` does not exist.
    /// - [`TallyError::NotInitialized`] if no `.tally/` is found above it, or
    ///   the path lies inside `.tally/` itself.
    /// - [`TallyError::UnsupportedPath`] if the path is not UTF-8 or cannot be
    ///   written into a note.
    /// - [`TallyError::Io`] if the marker cannot be written.
    pub fn record(&self, path: &Path) -> Result<FileEvent> {
        if !path.exists() {
            return Err(TallyError::FileNotFound(path.to_path_buf()));
        }
        let canonical = path.canonicalize()?;
        if canonical.to_str().is_none() {
            return Err(TallyError::UnsupportedPath {
                path: canonical,
                reason: "path is not valid UTF-8",
            });
        }
        let project = Project::discover(&canonical)?;
        let relative = project
            .relative(&canonical)
            .filter(|rel| rel != TALLY_DIR && !rel.starts_with(&format!("{TALLY_DIR}/")))
            .ok_or_else(|| TallyError::NotInitialized(canonical.clone()))?;

        self.write_event(&project, relative)
    }

    /// Record that application `name` was in the foreground.
    ///
    /// Stored as the identifier `<name>.app`; no existence check is made.
    ///
    /// # Errors
    ///
    /// Returns [`TallyError::UnsupportedPath`] for a name a note cannot carry
    /// and [`TallyError::Io`] if the marker cannot be written.
    pub fn record_app(&self, project: &Project, name: &str) -> Result<FileEvent> {
        let identifier = if name.ends_with(APP_SUFFIX) {
            name.to_string()
        } else {
            format!("{name}{APP_SUFFIX}")
        };
        self.write_event(project, identifier)
    }

    fn write_event(&self, project: &Project, file_path: String) -> Result<FileEvent> {
        if let Err(reason) = check_source_path(&file_path) {
            return Err(TallyError::UnsupportedPath {
                path: PathBuf::from(file_path),
                reason,
            });
        }
        let window = current_window(self.clock);
        std::fs::create_dir_all(&project.events_dir)?;
        let content = encode_content(&project.tally_dir, &file_path);
        let marker = create_marker(&project.events_dir, window, content.as_bytes())?;
        debug!(marker = %marker.display(), file = %file_path, window, "recorded event");
        Ok(FileEvent { window, file_path })
    }
}

fn create_marker(events_dir: &Path, window: i64, content: &[u8]) -> io::Result<PathBuf> {
    for _ in 0..MAX_NAME_ATTEMPTS {
        let path = events_dir.join(marker_name(window, rand::random::<u64>()));
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(content)?;
                file.sync_all()?;
                return Ok(path);
            }
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {}
            Err(err) => return Err(err),
        }
    }
    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("could not pick a unique marker name in {}", events_dir.display()),
    ))
}
