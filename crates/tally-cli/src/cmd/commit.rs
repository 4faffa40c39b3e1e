use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::path::Path;
use tally_core::TallyError;
use tally_core::clock::Clock;
use tally_core::note::CommitNote;
use tally_core::pipeline;
use tally_core::report::render_note;
use tally_core::scm::Scm;

use crate::cmd::open_project;
use crate::git::open_scm;
use crate::output::{OutputMode, render};

#[derive(Args, Debug)]
pub struct CommitArgs {
    /// Compute the note without writing it or consuming pending data.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
struct CommitReport {
    commit: Option<String>,
    written: bool,
    note: Option<CommitNote>,
}

/// Execute `tally commit`: fold pending time into HEAD's note.
///
/// This is what the post-commit hook runs.
pub fn run_commit(
    args: &CommitArgs,
    output: OutputMode,
    clock: &dyn Clock,
    cwd: &Path,
) -> Result<()> {
    let (project, config) = open_project(cwd)?;
    let scm = open_scm(&project, &config)?;
    let commit = scm.head_commit().map_err(TallyError::from)?;
    let note = pipeline::commit(&project, clock, &config, &scm, args.dry_run)?;

    let report = CommitReport {
        written: note.is_some() && !args.dry_run,
        commit,
        note,
    };
    render(output, &report, |r, w| match (&r.commit, &r.note) {
        (Some(commit), Some(note)) => {
            if !r.written {
                writeln!(w, "(dry run) would attach:")?;
            }
            write!(w, "{}", render_note(commit, note))
        }
        (Some(_), None) => writeln!(w, "No pending time belongs to HEAD."),
        (None, _) => writeln!(w, "No commits yet; time stays pending."),
    })
}
