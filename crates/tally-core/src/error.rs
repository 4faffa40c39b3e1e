use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::lock::LockError;
use crate::note::NoteError;
use crate::scm::ScmError;

/// Machine-readable error codes for scripts and editor integrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    FileNotFound,
    UnsupportedPath,
    FormatInvalid,
    ConfigParseError,
    MetricStoreCorrupt,
    ScmFailed,
    IoFailed,
    LockContention,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::FileNotFound => "E2001",
            Self::UnsupportedPath => "E2002",
            Self::FormatInvalid => "E3001",
            Self::MetricStoreCorrupt => "E3002",
            Self::ScmFailed => "E4001",
            Self::IoFailed => "E5001",
            Self::LockContention => "E5002",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Project not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::FileNotFound => "File not found",
            Self::UnsupportedPath => "Path cannot be tracked",
            Self::FormatInvalid => "Malformed marker or commit note",
            Self::MetricStoreCorrupt => "Metric store unreadable",
            Self::ScmFailed => "Version control command failed",
            Self::IoFailed => "Filesystem operation failed",
            Self::LockContention => "Lock contention",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `tally init` at the repository root."),
            Self::ConfigParseError => Some("Fix syntax in .tally/config.toml and retry."),
            Self::FileNotFound => None,
            Self::UnsupportedPath => Some(
                "Rename the file: tracked paths must be UTF-8 and free of ',' and line breaks.",
            ),
            Self::FormatInvalid => {
                Some("Inspect the note with `git notes --ref tally show <commit>`.")
            }
            Self::MetricStoreCorrupt => {
                Some("Run `tally clean` to discard pending metrics if the file cannot be repaired.")
            }
            Self::ScmFailed => Some("Check that `git` is installed and this is a git repository."),
            Self::IoFailed => Some("Check disk space and write permissions."),
            Self::LockContention => Some("Retry after the other `tally` process releases its lock."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors surfaced by every tally operation.
#[derive(Debug, thiserror::Error)]
pub enum TallyError {
    /// No `.tally/` directory was found at or above the given path.
    #[error("not a tally project (no .tally directory above {0})")]
    NotInitialized(PathBuf),

    /// The file passed to the recorder does not exist.
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    /// The file exists but its path cannot be stored in a marker or note.
    #[error("cannot track {path}: {reason}")]
    UnsupportedPath { path: PathBuf, reason: &'static str },

    /// A marker file could not be decoded.
    #[error("invalid event marker {path}: {reason}")]
    InvalidMarker { path: PathBuf, reason: String },

    /// A commit note failed to parse or violated an entry invariant.
    #[error("invalid commit note: {0}")]
    Note(#[from] NoteError),

    /// The metric store could not be decoded or encoded.
    #[error("metric store {path}: {source}")]
    Store {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// `.tally/config.toml` could not be parsed.
    #[error("failed to parse {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Lock acquisition failed.
    #[error(transparent)]
    Lock(#[from] LockError),

    /// The version control gateway failed.
    #[error(transparent)]
    Scm(#[from] ScmError),

    /// Local filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TallyError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized(_) => ErrorCode::NotInitialized,
            Self::FileNotFound(_) => ErrorCode::FileNotFound,
            Self::UnsupportedPath { .. } => ErrorCode::UnsupportedPath,
            Self::InvalidMarker { .. } | Self::Note(_) => ErrorCode::FormatInvalid,
            Self::Store { .. } => ErrorCode::MetricStoreCorrupt,
            Self::Config { .. } => ErrorCode::ConfigParseError,
            Self::Lock(err) => err.code(),
            Self::Scm(_) => ErrorCode::ScmFailed,
            Self::Io(_) => ErrorCode::IoFailed,
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }

    /// True for the recorder failures that callers may drop on the floor.
    ///
    /// Editor hooks fire on every save, including for files outside any
    /// tally project or files that were deleted in between.
    #[must_use]
    pub const fn is_recording_noise(&self) -> bool {
        matches!(self, Self::NotInitialized(_) | Self::FileNotFound(_))
    }
}

pub type Result<T, E = TallyError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::{ErrorCode, TallyError};
    use std::collections::HashSet;
    use std::path::PathBuf;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::NotInitialized,
            ErrorCode::FileNotFound,
            ErrorCode::UnsupportedPath,
            ErrorCode::FormatInvalid,
            ErrorCode::ConfigParseError,
            ErrorCode::MetricStoreCorrupt,
            ErrorCode::ScmFailed,
            ErrorCode::IoFailed,
            ErrorCode::LockContention,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::FormatInvalid.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn recording_noise_covers_missing_project_and_file() {
        assert!(TallyError::NotInitialized(PathBuf::from("/tmp")).is_recording_noise());
        assert!(TallyError::FileNotFound(PathBuf::from("/tmp/x")).is_recording_noise());
        let unsupported = TallyError::UnsupportedPath {
            path: PathBuf::from("/tmp/a,b.rs"),
            reason: "path contains ','",
        };
        assert!(!unsupported.is_recording_noise());
        assert_eq!(unsupported.code().code(), "E2002");
        let io = TallyError::Io(std::io::Error::other("disk full"));
        assert!(!io.is_recording_noise());
        assert_eq!(io.code(), ErrorCode::IoFailed);
    }
}
