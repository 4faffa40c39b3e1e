use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::path::Path;
use tally_core::pipeline::{self, CleanReport};
use tally_core::report::format_duration;

use crate::cmd::open_project;
use crate::output::{OutputMode, render};

#[derive(Args, Debug)]
pub struct CleanArgs {
    /// Report what would be removed without removing it.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
struct CleanOutput {
    dry_run: bool,
    #[serde(flatten)]
    removed: CleanReport,
}

/// Execute `tally clean`: discard all pending markers and metrics.
pub fn run_clean(args: &CleanArgs, output: OutputMode, cwd: &Path) -> Result<()> {
    let (project, config) = open_project(cwd)?;
    let removed = pipeline::clean(&project, &config, args.dry_run)?;

    let out = CleanOutput {
        dry_run: args.dry_run,
        removed,
    };
    render(output, &out, |o, w| {
        let verb = if o.dry_run { "Would remove" } else { "Removed" };
        writeln!(
            w,
            "{verb} {} pending markers and {} of metrics across {} files.",
            o.removed.markers,
            format_duration(o.removed.seconds),
            o.removed.files
        )
    })
}
