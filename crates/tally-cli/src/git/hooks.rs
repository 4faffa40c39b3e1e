//! Post-commit hook generation and installation.

use std::fs;
use std::path::Path;

use anyhow::{Context as _, Result};

const HOOK_MARKER: &str = "# tally-git-hook: managed";
const POST_COMMIT_HOOK: &str = "post-commit";

/// Body of the managed `post-commit` hook, without a shebang.
///
/// Runs after every commit and amend. Failures are reported but never
/// block the commit, which has already happened.
pub fn post_commit_hook_body() -> String {
    format!(
        "{HOOK_MARKER}\n\
if command -v tally >/dev/null 2>&1; then\n\
  tally commit >/dev/null || echo \"Warning: tally commit failed; run 'tally commit' to retry\" >&2\n\
fi\n"
    )
}

/// Install the managed hook into `.git/hooks`.
///
/// An existing hook is preserved and the managed block appended, unless it
/// is already present, so this is safe to run repeatedly. Returns the hook
/// path.
pub fn install_hooks(project_root: &Path) -> Result<std::path::PathBuf> {
    let git_dir = project_root.join(".git");
    if !git_dir.is_dir() {
        anyhow::bail!("No .git directory found. Run this at the root of a git repository.");
    }

    let hooks_dir = git_dir.join("hooks");
    fs::create_dir_all(&hooks_dir)
        .with_context(|| format!("Failed to create hook directory: {}", hooks_dir.display()))?;

    let hook_path = hooks_dir.join(POST_COMMIT_HOOK);
    install_single_hook(&hook_path, &post_commit_hook_body())
        .with_context(|| format!("Failed to install {POST_COMMIT_HOOK}"))?;

    tracing::info!(hook = %hook_path.display(), "installed post-commit hook");
    Ok(hook_path)
}

fn install_single_hook(path: &Path, body: &str) -> Result<()> {
    if path.exists() {
        let existing = fs::read_to_string(path)
            .with_context(|| format!("Failed to read existing hook: {}", path.display()))?;

        if existing.contains(HOOK_MARKER) {
            return Ok(());
        }

        let mut combined = existing;
        if !combined.ends_with('\n') {
            combined.push('\n');
        }
        if !combined.ends_with("\n\n") {
            combined.push('\n');
        }
        combined.push_str(body);

        fs::write(path, combined)
            .with_context(|| format!("Failed to write appended hook: {}", path.display()))?;
    } else {
        fs::write(path, format!("#!/bin/sh\n{body}"))
            .with_context(|| format!("Failed to write hook: {}", path.display()))?;
    }

    make_executable(path)
        .with_context(|| format!("Failed to make hook executable: {}", path.display()))?;

    Ok(())
}

fn make_executable(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perm = fs::metadata(path)?.permissions();
        perm.set_mode(0o755);
        fs::set_permissions(path, perm)?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hook_body_runs_commit_and_never_fails() {
        let body = post_commit_hook_body();
        assert!(body.starts_with(HOOK_MARKER));
        assert!(body.contains("tally commit"));
        assert!(body.contains("|| echo"));
    }

    #[test]
    fn install_requires_git_dir() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(install_hooks(tmp.path()).is_err());
    }

    #[test]
    fn fresh_install_writes_shebang_and_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join(".git")).unwrap();

        let path = install_hooks(tmp.path()).unwrap();
        let first = fs::read_to_string(&path).unwrap();
        assert!(first.starts_with("#!/bin/sh\n# tally-git-hook: managed\n"));

        install_hooks(tmp.path()).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), first);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o111, 0o111);
        }
    }

    #[test]
    fn existing_hook_is_preserved() {
        let tmp = tempfile::tempdir().unwrap();
        let hooks = tmp.path().join(".git/hooks");
        fs::create_dir_all(&hooks).unwrap();
        fs::write(hooks.join("post-commit"), "#!/bin/sh\necho custom").unwrap();

        let path = install_hooks(tmp.path()).unwrap();
        let text = fs::read_to_string(path).unwrap();
        assert!(text.starts_with("#!/bin/sh\necho custom\n\n"));
        assert!(text.contains(HOOK_MARKER));
        assert_eq!(text.matches("#!/bin/sh").count(), 1);
    }
}
