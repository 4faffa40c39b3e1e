//! Commit notes: the per-commit record of time spent per file.
//!
//! A [`CommitNote`] is built fresh at commit time by the splitter, encoded
//! with [`codec`], and attached to the commit. When a commit is amended the
//! attached text is parsed again and merged with the new note, so a note
//! may accumulate several blocks describing the same file over time.
//!
//! # Merge rule
//!
//! When the same path appears twice, totals and timeline buckets are summed
//! and the status is replaced only if the incoming status is
//! [`Status::Modified`] or [`Status::Deleted`]. A readonly sighting never
//! downgrades a file that was modified or deleted.

pub mod codec;

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

pub use codec::{CURRENT_VERSION, marshal, unmarshal};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors produced while building or decoding a commit note.
///
/// Line numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteError {
    /// A line starting with `[` is not a valid `[ver:N,total:N]` header.
    MalformedHeader { line: usize, text: String },
    /// The header names a format version this build cannot read.
    UnsupportedVersion { line: usize, version: u32 },
    /// A data line appeared before any header or after a blank line.
    OutsideBlock { line: usize },
    /// A data line does not have the `path:total,epoch:secs,...,status` shape.
    MalformedEntry { line: usize, reason: String },
    /// The trailing status field is not `m`, `r`, or `d`.
    UnknownStatus { line: usize, token: String },
    /// The path cannot be written as a note entry.
    InvalidPath {
        source_file: String,
        reason: &'static str,
    },
    /// An entry's total differs from the sum of its timeline.
    TotalMismatch {
        source_file: String,
        total: u64,
        timeline_sum: u64,
    },
}

impl fmt::Display for NoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedHeader { line, text } => {
                write!(f, "line {line}: malformed header '{text}'")
            }
            Self::UnsupportedVersion { line, version } => {
                write!(
                    f,
                    "line {line}: note format version {version} is not supported (this build reads v{CURRENT_VERSION})"
                )
            }
            Self::OutsideBlock { line } => {
                write!(f, "line {line}: entry outside a [ver:...] block")
            }
            Self::MalformedEntry { line, reason } => write!(f, "line {line}: {reason}"),
            Self::UnknownStatus { line, token } => {
                write!(f, "line {line}: unknown status '{token}'")
            }
            Self::InvalidPath {
                source_file,
                reason,
            } => write!(f, "{source_file:?}: {reason}"),
            Self::TotalMismatch {
                source_file,
                total,
                timeline_sum,
            } => write!(
                f,
                "{source_file}: total {total} does not match timeline sum {timeline_sum}"
            ),
        }
    }
}

impl std::error::Error for NoteError {}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// Check that `path` survives a trip through the note format.
///
/// Entry fields are comma-separated, lines are trimmed, and a line starting
/// with `[` is a header, so paths that would be read back differently are
/// refused up front.
///
/// # Errors
///
/// Returns a short reason when the path is not representable.
pub fn check_source_path(path: &str) -> Result<(), &'static str> {
    if path.is_empty() {
        return Err("path is empty");
    }
    if path.contains(',') {
        return Err("path contains ','");
    }
    if path.contains(['\n', '\r']) {
        return Err("path contains a line break");
    }
    if path.starts_with('[') {
        return Err("path starts with '['");
    }
    if path.trim() != path {
        return Err("path has leading or trailing whitespace");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

/// How a file relates to the commit a note is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Changed by the commit.
    Modified,
    /// Worked on but unchanged; time carried alongside the commit.
    Readonly,
    /// Removed by the commit.
    Deleted,
}

impl Status {
    /// Single-letter wire token.
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::Modified => "m",
            Self::Readonly => "r",
            Self::Deleted => "d",
        }
    }

    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "m" => Some(Self::Modified),
            "r" => Some(Self::Readonly),
            "d" => Some(Self::Deleted),
            _ => None,
        }
    }

    /// Status after seeing `incoming` for a file already recorded as `self`.
    #[must_use]
    pub const fn merge(self, incoming: Self) -> Self {
        match incoming {
            Self::Modified | Self::Deleted => incoming,
            Self::Readonly => self,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Time spent on one file, attributed to one commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileNote {
    source_file: String,
    time_spent: u64,
    timeline: BTreeMap<i64, u64>,
    status: Status,
}

impl FileNote {
    /// Build an entry, checking `time_spent == sum(timeline)`.
    ///
    /// # Errors
    ///
    /// Returns [`NoteError::InvalidPath`] for a path the note format cannot
    /// carry and [`NoteError::TotalMismatch`] when the invariant does not
    /// hold.
    pub fn new(
        source_file: impl Into<String>,
        time_spent: u64,
        timeline: BTreeMap<i64, u64>,
        status: Status,
    ) -> Result<Self, NoteError> {
        let source_file = source_file.into();
        if let Err(reason) = check_source_path(&source_file) {
            return Err(NoteError::InvalidPath {
                source_file,
                reason,
            });
        }
        let timeline_sum = saturating_sum(timeline.values().copied());
        if timeline_sum != time_spent {
            return Err(NoteError::TotalMismatch {
                source_file,
                total: time_spent,
                timeline_sum,
            });
        }
        Ok(Self {
            source_file,
            time_spent,
            timeline,
            status,
        })
    }

    /// Build an entry whose total is derived from the timeline.
    ///
    /// # Errors
    ///
    /// Returns [`NoteError::InvalidPath`] for a path the note format cannot
    /// carry.
    pub fn from_timeline(
        source_file: impl Into<String>,
        timeline: BTreeMap<i64, u64>,
        status: Status,
    ) -> Result<Self, NoteError> {
        let time_spent = saturating_sum(timeline.values().copied());
        Self::new(source_file, time_spent, timeline, status)
    }

    #[must_use]
    pub fn source_file(&self) -> &str {
        &self.source_file
    }

    #[must_use]
    pub const fn time_spent(&self) -> u64 {
        self.time_spent
    }

    #[must_use]
    pub const fn timeline(&self) -> &BTreeMap<i64, u64> {
        &self.timeline
    }

    #[must_use]
    pub const fn status(&self) -> Status {
        self.status
    }

    /// Fold another entry for the same file into this one.
    fn absorb(&mut self, other: Self) {
        debug_assert_eq!(self.source_file, other.source_file);
        self.time_spent = self.time_spent.saturating_add(other.time_spent);
        for (epoch, secs) in other.timeline {
            let slot = self.timeline.entry(epoch).or_insert(0);
            *slot = slot.saturating_add(secs);
        }
        self.status = self.status.merge(other.status);
    }
}

// Hostile note text can carry values near u64::MAX.
fn saturating_sum(values: impl Iterator<Item = u64>) -> u64 {
    values.fold(0, u64::saturating_add)
}

// ---------------------------------------------------------------------------
// Notes
// ---------------------------------------------------------------------------

/// The set of entries attached to one commit, unique by path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommitNote {
    entries: Vec<FileNote>,
}

impl CommitNote {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry, merging it into an existing entry for the same path.
    pub fn push(&mut self, entry: FileNote) {
        if let Some(existing) = self
            .entries
            .iter_mut()
            .find(|e| e.source_file == entry.source_file)
        {
            existing.absorb(entry);
        } else {
            self.entries.push(entry);
        }
    }

    /// Merge every entry of `other` into this note.
    pub fn merge(&mut self, other: Self) {
        for entry in other.entries {
            self.push(entry);
        }
    }

    #[must_use]
    pub fn entries(&self) -> &[FileNote] {
        &self.entries
    }

    #[must_use]
    pub fn get(&self, source_file: &str) -> Option<&FileNote> {
        self.entries.iter().find(|e| e.source_file == source_file)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        saturating_sum(self.entries.iter().map(FileNote::time_spent))
    }

    /// Entries ordered by descending time, then path.
    #[must_use]
    pub fn ranked(&self) -> Vec<&FileNote> {
        let mut out: Vec<&FileNote> = self.entries.iter().collect();
        out.sort_by(|a, b| {
            b.time_spent
                .cmp(&a.time_spent)
                .then_with(|| a.source_file.cmp(&b.source_file))
        });
        out
    }

    /// Encode in the line-oriented note format.
    #[must_use]
    pub fn marshal(&self) -> String {
        marshal(self)
    }

    /// Decode note text, merging repeated paths.
    ///
    /// # Errors
    ///
    /// Any malformed line is an error; nothing is skipped.
    pub fn unmarshal(text: &str) -> Result<Self, NoteError> {
        unmarshal(text)
    }
}

impl FromIterator<FileNote> for CommitNote {
    fn from_iter<I: IntoIterator<Item = FileNote>>(iter: I) -> Self {
        let mut note = Self::new();
        for entry in iter {
            note.push(entry);
        }
        note
    }
}
