//! Plain-text rendering of notes and pending metrics.
//!
//! Pure functions only: nothing here reads the filesystem or feeds back
//! into the store.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::Serialize;

use crate::metric::MetricStore;
use crate::note::CommitNote;

const SHORT_HASH: usize = 10;

/// `3723` -> `1h 2m 3s`. Zero components are omitted; zero is `0s`.
#[must_use]
pub fn format_duration(secs: u64) -> String {
    if secs == 0 {
        return "0s".to_string();
    }
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    let mut parts = Vec::with_capacity(3);
    if h > 0 {
        parts.push(format!("{h}h"));
    }
    if m > 0 {
        parts.push(format!("{m}m"));
    }
    if s > 0 {
        parts.push(format!("{s}s"));
    }
    parts.join(" ")
}

fn short(commit: &str) -> &str {
    commit.get(..SHORT_HASH).unwrap_or(commit)
}

/// Render one commit's note, entries ranked by time.
#[must_use]
pub fn render_note(commit: &str, note: &CommitNote) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{}  {}  ({} files)",
        short(commit),
        format_duration(note.total()),
        note.len()
    );
    for entry in note.ranked() {
        let _ = writeln!(
            out,
            "  {}  {:>10}  {}",
            entry.status(),
            format_duration(entry.time_spent()),
            entry.source_file()
        );
    }
    out
}

/// Render time still pending in the metric store.
#[must_use]
pub fn render_pending(store: &MetricStore) -> String {
    if store.is_empty() {
        return "No pending time.\n".to_string();
    }
    let mut out = String::new();
    let _ = writeln!(out, "Pending: {}", format_duration(store.total_seconds()));
    for file in store.ranked() {
        let _ = writeln!(
            out,
            "  {:>10}  {}",
            format_duration(file.seconds),
            file.source_file
        );
    }
    out
}

/// Total time for one file across several commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileSummary {
    pub source_file: String,
    pub seconds: u64,
    pub commits: usize,
}

/// Sum time per file across `notes`, ranked by descending time then path.
#[must_use]
pub fn summarize<'a>(notes: impl IntoIterator<Item = &'a CommitNote>) -> Vec<FileSummary> {
    let mut totals: BTreeMap<&str, (u64, usize)> = BTreeMap::new();
    for note in notes {
        for entry in note.entries() {
            let slot = totals.entry(entry.source_file()).or_insert((0, 0));
            slot.0 += entry.time_spent();
            slot.1 += 1;
        }
    }

    let mut out: Vec<FileSummary> = totals
        .into_iter()
        .map(|(path, (seconds, commits))| FileSummary {
            source_file: path.to_string(),
            seconds,
            commits,
        })
        .collect();
    out.sort_by(|a, b| {
        b.seconds
            .cmp(&a.seconds)
            .then_with(|| a.source_file.cmp(&b.source_file))
    });
    out
}

/// Render a [`summarize`] result.
#[must_use]
pub fn render_summary(summary: &[FileSummary]) -> String {
    let total: u64 = summary.iter().map(|s| s.seconds).sum();
    let mut out = String::new();
    let _ = writeln!(out, "Total: {}", format_duration(total));
    for row in summary {
        let _ = writeln!(
            out,
            "  {:>10}  {:>3}x  {}",
            format_duration(row.seconds),
            row.commits,
            row.source_file
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::{FileNote, Status};

    fn note(entries: &[(&str, u64, Status)]) -> CommitNote {
        entries
            .iter()
            .map(|(p, s, st)| FileNote::from_timeline(*p, BTreeMap::from([(0, *s)]), *st).unwrap())
            .collect()
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(45), "45s");
        assert_eq!(format_duration(120), "2m");
        assert_eq!(format_duration(3600), "1h");
        assert_eq!(format_duration(3723), "1h 2m 3s");
        assert_eq!(format_duration(90_061), "25h 1m 1s");
    }

    #[test]
    fn render_note_lists_ranked_entries() {
        let n = note(&[("b.rs", 30, Status::Readonly), ("a.rs", 150, Status::Modified)]);
        let text = render_note("0123456789abcdef", &n);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "0123456789  3m  (2 files)");
        assert!(lines[1].starts_with("  m"));
        assert!(lines[1].ends_with("a.rs"));
        assert!(lines[2].contains("30s"));
        assert!(lines[2].ends_with("b.rs"));
    }

    #[test]
    fn short_commit_ids_are_kept_whole() {
        assert!(render_note("abc", &CommitNote::new()).starts_with("abc  0s"));
    }

    #[test]
    fn summarize_sums_across_commits() {
        let first = note(&[("a.rs", 60, Status::Modified), ("b.rs", 10, Status::Readonly)]);
        let second = note(&[("a.rs", 30, Status::Modified)]);
        let summary = summarize([&first, &second]);
        assert_eq!(
            summary,
            vec![
                FileSummary {
                    source_file: "a.rs".to_string(),
                    seconds: 90,
                    commits: 2
                },
                FileSummary {
                    source_file: "b.rs".to_string(),
                    seconds: 10,
                    commits: 1
                },
            ]
        );
        assert!(render_summary(&summary).starts_with("Total: 1m 40s\n"));
    }

    #[test]
    fn render_pending_handles_empty_store() {
        assert_eq!(render_pending(&MetricStore::default()), "No pending time.\n");
        let mut store = MetricStore::default();
        store.add_time("x.rs", 0, 75);
        assert_eq!(render_pending(&store), "Pending: 1m 15s\n      1m 15s  x.rs\n");
    }
}
