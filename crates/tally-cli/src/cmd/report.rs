use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;
use std::path::Path;
use tally_core::TallyError;
use tally_core::note::CommitNote;
use tally_core::report::{FileSummary, render_note, render_summary, summarize};
use tally_core::scm::Scm;
use tally_core::window::WINDOW_SIZE;
use tracing::warn;

use crate::cmd::open_project;
use crate::git::open_scm;
use crate::output::{OutputMode, render};

#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Commits to report on. Defaults to the most recent commits on HEAD.
    pub commits: Vec<String>,

    /// How many recent commits to walk when none are named.
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    /// Append per-file totals across all reported commits.
    #[arg(long)]
    pub summary: bool,
}

#[derive(Debug, Serialize)]
struct CommitEntry {
    commit: String,
    started: Option<DateTime<Utc>>,
    ended: Option<DateTime<Utc>>,
    note: CommitNote,
}

#[derive(Debug, Serialize)]
struct Report {
    commits: Vec<CommitEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<Vec<FileSummary>>,
}

/// First and last active window of a note, as wall-clock times.
fn active_span(note: &CommitNote) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
    let epochs = || note.entries().iter().flat_map(|e| e.timeline().keys().copied());
    let first = epochs().min().and_then(|t| DateTime::from_timestamp(t, 0));
    let last = epochs()
        .max()
        .and_then(|t| DateTime::from_timestamp(t.saturating_add(WINDOW_SIZE), 0));
    (first, last)
}

/// Execute `tally report`: print the time notes attached to commits.
///
/// Commits without a note are skipped. A note that fails to parse is
/// logged and skipped so one bad note does not hide the rest.
pub fn run_report(args: &ReportArgs, output: OutputMode, cwd: &Path) -> Result<()> {
    let (project, config) = open_project(cwd)?;
    let scm = open_scm(&project, &config)?;

    let commits = if args.commits.is_empty() {
        scm.log(args.limit.unwrap_or(config.report.limit))
            .map_err(TallyError::from)?
    } else {
        args.commits.clone()
    };

    let mut entries = Vec::new();
    for commit in commits {
        let Some(text) = scm.read_note(&commit).map_err(TallyError::from)? else {
            continue;
        };
        match CommitNote::unmarshal(&text) {
            Ok(note) => {
                let (started, ended) = active_span(&note);
                entries.push(CommitEntry {
                    commit,
                    started,
                    ended,
                    note,
                });
            }
            Err(err) => warn!(%commit, %err, "skipping unreadable note"),
        }
    }

    let report = Report {
        summary: args
            .summary
            .then(|| summarize(entries.iter().map(|e| &e.note))),
        commits: entries,
    };

    render(output, &report, |r, w| {
        if r.commits.is_empty() {
            return writeln!(w, "No tally notes found.");
        }
        for (i, entry) in r.commits.iter().enumerate() {
            if i > 0 {
                writeln!(w)?;
            }
            write!(w, "{}", render_note(&entry.commit, &entry.note))?;
            if let (Some(started), Some(ended)) = (entry.started, entry.ended) {
                writeln!(
                    w,
                    "  active {} .. {}",
                    started.format("%Y-%m-%d %H:%M"),
                    ended.format("%H:%M UTC")
                )?;
            }
        }
        if let Some(ref summary) = r.summary {
            writeln!(w)?;
            write!(w, "{}", render_summary(summary))?;
        }
        Ok(())
    })
}
