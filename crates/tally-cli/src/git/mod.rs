//! Git integration for tally.
//!
//! Opening the git gateway for a project, and the managed post-commit hook.

pub mod hooks;

use anyhow::{Context as _, Result};
use tally_core::Project;
use tally_core::config::ProjectConfig;
use tally_core::scm::GitCli;

/// Open the git repository containing `project` with the configured notes ref.
pub fn open_scm(project: &Project, config: &ProjectConfig) -> Result<GitCli> {
    GitCli::discover(&project.root, config.notes.full_ref())
        .map_err(tally_core::TallyError::from)
        .with_context(|| format!("{} is not inside a git repository", project.root.display()))
}

/// Make `git commit --amend` and `git rebase` copy notes to the rewritten
/// commit, so the post-commit hook can merge into them.
pub fn enable_notes_rewrite(scm: &GitCli) -> Result<()> {
    scm.set_config("notes.rewriteRef", scm.notes_ref())
        .map_err(tally_core::TallyError::from)
        .context("Failed to set notes.rewriteRef")
}
