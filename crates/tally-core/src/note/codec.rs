//! Line-oriented commit note format (v1).
//!
//! ```text
//! [ver:1,total:<secs>]
//! <path>:<total>,<epoch>:<secs>,<epoch>:<secs>,...,<status>
//! ```
//!
//! - A blank line ends a block. Another `[ver:...]` header may follow.
//! - Entries are written by descending time, then path; timeline pairs by
//!   ascending epoch.
//! - The header total is informational and not checked on read. Each
//!   entry's total must equal the sum of its pairs.
//!
//! This text is what older and newer builds exchange through git, so the
//! writer output must stay byte-stable.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use super::{CommitNote, FileNote, NoteError, Status};

/// Note format version written by this build.
pub const CURRENT_VERSION: u32 = 1;

const HEADER_VERSION: &str = "ver:";
const HEADER_TOTAL: &str = "total:";

/// Encode `note` as a single v1 block.
///
/// Entries with an empty timeline carry no time and are omitted.
#[must_use]
pub fn marshal(note: &CommitNote) -> String {
    let entries: Vec<&FileNote> = note
        .ranked()
        .into_iter()
        .filter(|e| !e.timeline().is_empty())
        .collect();
    let total = note.total();

    let mut out = String::new();
    let _ = writeln!(out, "[{HEADER_VERSION}{CURRENT_VERSION},{HEADER_TOTAL}{total}]");
    for entry in entries {
        let _ = write!(out, "{}:{}", entry.source_file(), entry.time_spent());
        for (epoch, secs) in entry.timeline() {
            let _ = write!(out, ",{epoch}:{secs}");
        }
        let _ = writeln!(out, ",{}", entry.status().token());
    }
    out
}

/// Decode one or more blocks, merging entries that share a path.
///
/// # Errors
///
/// Returns the first [`NoteError`] encountered; malformed lines are never
/// skipped.
pub fn unmarshal(text: &str) -> Result<CommitNote, NoteError> {
    let mut note = CommitNote::new();
    let mut in_block = false;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();

        if line.is_empty() {
            in_block = false;
            continue;
        }
        if line.starts_with('[') {
            parse_header(line, line_no)?;
            in_block = true;
            continue;
        }
        if !in_block {
            return Err(NoteError::OutsideBlock { line: line_no });
        }
        note.push(parse_entry(line, line_no)?);
    }

    Ok(note)
}

/// Parse `[ver:N,total:N]`, returning the version.
fn parse_header(line: &str, line_no: usize) -> Result<u32, NoteError> {
    let malformed = || NoteError::MalformedHeader {
        line: line_no,
        text: line.to_string(),
    };

    let inner = line
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(malformed)?;
    let (ver, total) = inner.split_once(',').ok_or_else(malformed)?;
    let version: u32 = ver
        .strip_prefix(HEADER_VERSION)
        .and_then(|v| v.parse().ok())
        .ok_or_else(malformed)?;
    total
        .strip_prefix(HEADER_TOTAL)
        .and_then(|t| t.parse::<u64>().ok())
        .ok_or_else(malformed)?;

    if version == 0 || version > CURRENT_VERSION {
        return Err(NoteError::UnsupportedVersion {
            line: line_no,
            version,
        });
    }
    Ok(version)
}

fn parse_entry(line: &str, line_no: usize) -> Result<FileNote, NoteError> {
    let malformed = |reason: String| NoteError::MalformedEntry {
        line: line_no,
        reason,
    };

    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() < 3 {
        return Err(malformed(format!(
            "expected at least 3 comma-separated fields, found {}",
            fields.len()
        )));
    }
    let (head, rest) = fields.split_at(1);
    let (pairs, tail) = rest.split_at(rest.len() - 1);

    let (source_file, total) = head[0]
        .rsplit_once(':')
        .ok_or_else(|| malformed(format!("expected '<path>:<total>', found '{}'", head[0])))?;
    if source_file.is_empty() {
        return Err(malformed("empty path".to_string()));
    }
    let total: u64 = total
        .parse()
        .map_err(|_| malformed(format!("invalid total '{total}'")))?;

    let mut timeline = BTreeMap::new();
    for pair in pairs {
        let (epoch, secs) = pair
            .split_once(':')
            .ok_or_else(|| malformed(format!("expected '<epoch>:<secs>', found '{pair}'")))?;
        let epoch: i64 = epoch
            .parse()
            .map_err(|_| malformed(format!("invalid epoch '{epoch}'")))?;
        let secs: u64 = secs
            .parse()
            .map_err(|_| malformed(format!("invalid seconds '{secs}'")))?;
        let slot = timeline.entry(epoch).or_insert(0u64);
        *slot = slot.saturating_add(secs);
    }

    let status = Status::from_token(tail[0]).ok_or_else(|| NoteError::UnknownStatus {
        line: line_no,
        token: tail[0].to_string(),
    })?;

    FileNote::new(source_file, total, timeline, status)
}
