use anyhow::Result;
use clap::{ArgGroup, Args};
use std::path::{Path, PathBuf};
use tally_core::Project;
use tally_core::clock::Clock;
use tally_core::event::{FileEvent, Recorder};
use tracing::debug;

use crate::output::{OutputMode, render};

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("target").required(true).args(["path", "app"])))]
pub struct RecordArgs {
    /// File that was just opened or saved.
    pub path: Option<PathBuf>,

    /// Record a foreground application instead of a file.
    #[arg(long, value_name = "NAME")]
    pub app: Option<String>,
}

/// Execute `tally record`.
///
/// Meant to be called from editor hooks on every save, so "not in a tally
/// project" and "file vanished" exit 0 quietly.
///
/// # Errors
///
/// Returns an error if the path cannot be tracked (see
/// [`tally_core::TallyError::UnsupportedPath`]) or writing the marker fails.
pub fn run_record(
    args: &RecordArgs,
    output: OutputMode,
    clock: &dyn Clock,
    cwd: &Path,
) -> Result<()> {
    let recorder = Recorder::new(clock);
    let result = match (&args.path, &args.app) {
        (Some(path), None) => recorder.record(&cwd.join(path)),
        (None, Some(app)) => Project::discover(cwd).and_then(|p| recorder.record_app(&p, app)),
        _ => anyhow::bail!("pass either a file path or --app <NAME>"),
    };

    match result {
        Ok(event) => {
            if output.is_json() {
                render(output, &RecordedEvent::from(&event), |_, _| Ok(()))?;
            }
            Ok(())
        }
        Err(err) if err.is_recording_noise() => {
            debug!(%err, "ignoring record request");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

#[derive(Debug, serde::Serialize)]
struct RecordedEvent<'a> {
    window: i64,
    file: &'a str,
}

impl<'a> From<&'a FileEvent> for RecordedEvent<'a> {
    fn from(event: &'a FileEvent) -> Self {
        Self {
            window: event.window,
            file: &event.file_path,
        }
    }
}
