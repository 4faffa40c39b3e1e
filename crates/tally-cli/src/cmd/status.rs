use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::path::Path;
use tally_core::clock::Clock;
use tally_core::metric::MetricFile;
use tally_core::note::CommitNote;
use tally_core::pipeline;
use tally_core::report::{render_note, render_pending};
use tally_core::scm::Scm;

use crate::cmd::open_project;
use crate::git::open_scm;
use crate::output::{OutputMode, render};

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Show what `tally commit` would attach to HEAD right now.
    #[arg(long)]
    pub head: bool,
}

#[derive(Debug, Serialize)]
struct PendingReport<'a> {
    seconds: u64,
    files: Vec<&'a MetricFile>,
}

#[derive(Debug, Serialize)]
struct HeadReport<'a> {
    commit: Option<&'a str>,
    note: Option<&'a CommitNote>,
}

/// Execute `tally status`. Never writes the store or deletes markers.
pub fn run_status(
    args: &StatusArgs,
    output: OutputMode,
    clock: &dyn Clock,
    cwd: &Path,
) -> Result<()> {
    let (project, config) = open_project(cwd)?;

    if !args.head {
        let store = pipeline::process(&project, clock, &config, true)?;
        let report = PendingReport {
            seconds: store.total_seconds(),
            files: store.ranked(),
        };
        return render(output, &report, |_, w| write!(w, "{}", render_pending(&store)));
    }

    let scm = open_scm(&project, &config)?;
    let head = scm.head_commit().map_err(tally_core::TallyError::from)?;
    let note = pipeline::pending_note(&project, clock, &config, &scm)?;
    let report = HeadReport {
        commit: head.as_deref(),
        note: note.as_ref(),
    };
    render(output, &report, |r, w| match (r.commit, r.note) {
        (Some(commit), Some(note)) => write!(w, "{}", render_note(commit, note)),
        (Some(_), None) => writeln!(w, "Nothing to attach to HEAD."),
        (None, _) => writeln!(w, "No commits yet."),
    })
}
