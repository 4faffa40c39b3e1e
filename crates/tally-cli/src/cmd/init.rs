use crate::git;
use crate::output::{OutputMode, render};
use anyhow::{Context as _, Result};
use clap::Args;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tally_core::Project;
use tally_core::config::{CONFIG_TEMPLATE, load_project_config};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Re-initialize even if `.tally/` already exists. Keeps pending data.
    #[arg(long)]
    pub force: bool,

    /// Do not install the post-commit hook.
    #[arg(long)]
    pub no_hooks: bool,
}

const GITIGNORE: &str = "events/\nmetrics.json\nlock\n";

#[derive(Debug, Serialize)]
struct InitReport {
    root: PathBuf,
    git: bool,
    notes_ref: Option<String>,
    hook: Option<PathBuf>,
}

/// Execute `tally init`. Creates the project skeleton:
///
/// ```text
/// .tally/
///   events/        (pending access markers)
///   config.toml    (default config template, written once)
///   .gitignore     (events/, metrics.json, lock)
/// ```
///
/// In a git repository it also points `notes.rewriteRef` at the tally notes
/// ref and installs the post-commit hook.
///
/// # Errors
///
/// Returns an error if `.tally/` already exists and `--force` is not set,
/// or if any filesystem or git operation fails.
pub fn run_init(args: &InitArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let project = Project::at(project_root);

    if project.is_initialized() && !args.force {
        anyhow::bail!(".tally/ already exists. Use `tally init --force` to reinitialize.");
    }

    project.ensure_layout().with_context(|| {
        format!(
            "Failed to create events directory: {}",
            project.events_dir.display()
        )
    })?;

    if !project.config_toml.exists() {
        std::fs::write(&project.config_toml, CONFIG_TEMPLATE).with_context(|| {
            format!("Failed to write config: {}", project.config_toml.display())
        })?;
    }

    let gitignore_path = project.tally_dir.join(".gitignore");
    std::fs::write(&gitignore_path, GITIGNORE)
        .with_context(|| format!("Failed to write .gitignore: {}", gitignore_path.display()))?;

    let mut report = InitReport {
        root: project.root.clone(),
        git: project_root.join(".git").exists(),
        notes_ref: None,
        hook: None,
    };

    if report.git {
        let config = load_project_config(&project)?;
        let scm = git::open_scm(&project, &config)?;
        git::enable_notes_rewrite(&scm)?;
        report.notes_ref = Some(scm.notes_ref().to_string());
        if !args.no_hooks {
            report.hook = Some(git::hooks::install_hooks(project_root)?);
        }
    } else {
        tracing::warn!("no git repository detected; notes and hooks are unavailable");
    }

    render(output, &report, |r, w| {
        writeln!(w, "✓ Initialized .tally/ in {}", r.root.display())?;
        if let Some(ref notes_ref) = r.notes_ref {
            writeln!(w, "  Notes ref:  {notes_ref}")?;
        }
        match r.hook {
            Some(ref hook) => writeln!(w, "  Hook:       {}", hook.display())?,
            None if r.git => writeln!(w, "  Hook:       skipped (run `tally hooks install`)")?,
            None => {
                writeln!(w)?;
                writeln!(w, "Note: no git repository detected. Run `git init` and then")?;
                writeln!(w, "      `tally init --force` to enable commit notes.")?;
            }
        }
        writeln!(w)?;
        writeln!(w, "Next steps:")?;
        writeln!(w, "  Call `tally record <file>` from your editor's save hook.")?;
        writeln!(w, "  Run `tally status` to see pending time.")
    })
}
