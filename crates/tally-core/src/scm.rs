//! Version-control gateway.
//!
//! The pipeline only needs a handful of questions answered about the
//! repository, expressed by the [`Scm`] trait. [`GitCli`] answers them by
//! shelling out to `git`.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tracing::{debug, trace};

/// Errors from the version-control gateway.
#[derive(Debug, thiserror::Error)]
pub enum ScmError {
    /// `git` could not be started at all.
    #[error("failed to run `git {args}`: {source}")]
    Spawn {
        args: String,
        #[source]
        source: io::Error,
    },
    /// `git` ran and exited unsuccessfully.
    #[error("`git {args}` exited with status {code}: {stderr}")]
    Command {
        args: String,
        code: i32,
        stderr: String,
    },
    /// `git` succeeded but printed something unexpected.
    #[error("unexpected git output: {0}")]
    Output(String),
}

/// How a commit changed one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

/// One path touched by a commit, relative to the repository root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitFile {
    pub path: String,
    pub kind: ChangeKind,
}

impl CommitFile {
    #[must_use]
    pub fn new(path: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// What the pipeline needs from version control.
///
/// File arguments are root-relative paths with `/` separators.
pub trait Scm {
    /// Absolute repository root.
    fn root_path(&self) -> Result<PathBuf, ScmError>;

    fn is_tracked(&self, file: &str) -> Result<bool, ScmError>;

    /// Whether the working tree differs from HEAD for `file`.
    fn is_modified(&self, file: &str) -> Result<bool, ScmError>;

    /// Note attached to `commit`, or `None` if there is none.
    fn read_note(&self, commit: &str) -> Result<Option<String>, ScmError>;

    /// Attach `text` to `commit`, replacing any existing note.
    fn write_note(&self, commit: &str, text: &str) -> Result<(), ScmError>;

    /// Full hash of HEAD, or `None` in a repository without commits.
    fn head_commit(&self) -> Result<Option<String>, ScmError>;

    /// Paths changed by `commit`. Renames are reported under the new path.
    fn commit_files(&self, commit: &str) -> Result<Vec<CommitFile>, ScmError>;

    /// Hashes of the most recent `limit` commits, newest first.
    fn log(&self, limit: usize) -> Result<Vec<String>, ScmError>;
}

// ---------------------------------------------------------------------------
// git CLI
// ---------------------------------------------------------------------------

/// [`Scm`] backed by the `git` executable.
#[derive(Debug, Clone)]
pub struct GitCli {
    root: PathBuf,
    notes_ref: String,
}

impl GitCli {
    /// Use the repository at `root` with the fully qualified `notes_ref`.
    pub fn new(root: impl Into<PathBuf>, notes_ref: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            notes_ref: notes_ref.into(),
        }
    }

    /// Locate the repository containing `start`.
    ///
    /// # Errors
    ///
    /// Fails if `start` is not inside a git work tree or git is unavailable.
    pub fn discover(start: &Path, notes_ref: impl Into<String>) -> Result<Self, ScmError> {
        let out = run_git(start, &["rev-parse", "--show-toplevel"])?;
        let root = stdout_line(&out)
            .ok_or_else(|| ScmError::Output("empty output from rev-parse".to_string()))?;
        Ok(Self::new(root, notes_ref))
    }

    #[must_use]
    pub fn notes_ref(&self) -> &str {
        &self.notes_ref
    }

    /// Set a repository-local config value.
    ///
    /// # Errors
    ///
    /// Propagates git failures.
    pub fn set_config(&self, key: &str, value: &str) -> Result<(), ScmError> {
        self.git(&["config", key, value]).map(drop)
    }

    fn git(&self, args: &[&str]) -> Result<Output, ScmError> {
        run_git(&self.root, args)
    }

    /// Run git and map exit code 1 to `None` instead of an error.
    fn git_optional(&self, args: &[&str]) -> Result<Option<Output>, ScmError> {
        match self.git(args) {
            Ok(out) => Ok(Some(out)),
            Err(ScmError::Command { code: 1, .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

impl Scm for GitCli {
    fn root_path(&self) -> Result<PathBuf, ScmError> {
        Ok(self.root.clone())
    }

    fn is_tracked(&self, file: &str) -> Result<bool, ScmError> {
        let out = self.git_optional(&["ls-files", "--error-unmatch", "--", file])?;
        Ok(out.is_some())
    }

    fn is_modified(&self, file: &str) -> Result<bool, ScmError> {
        let out = self.git(&["status", "--porcelain", "--", file])?;
        Ok(!String::from_utf8_lossy(&out.stdout).trim().is_empty())
    }

    fn read_note(&self, commit: &str) -> Result<Option<String>, ScmError> {
        let out = self.git_optional(&["notes", "--ref", &self.notes_ref, "show", commit])?;
        Ok(out.map(|o| String::from_utf8_lossy(&o.stdout).into_owned()))
    }

    fn write_note(&self, commit: &str, text: &str) -> Result<(), ScmError> {
        self.git(&["notes", "--ref", &self.notes_ref, "add", "-f", "-m", text, commit])?;
        debug!(commit, notes_ref = %self.notes_ref, "wrote commit note");
        Ok(())
    }

    fn head_commit(&self) -> Result<Option<String>, ScmError> {
        let out = self.git_optional(&["rev-parse", "--verify", "-q", "HEAD"])?;
        Ok(out.as_ref().and_then(stdout_line))
    }

    fn commit_files(&self, commit: &str) -> Result<Vec<CommitFile>, ScmError> {
        let out = self.git(&["show", "--name-status", "-z", "-M", "--format=", commit])?;
        parse_name_status(&String::from_utf8_lossy(&out.stdout))
    }

    fn log(&self, limit: usize) -> Result<Vec<String>, ScmError> {
        if self.head_commit()?.is_none() {
            return Ok(Vec::new());
        }
        let n = limit.to_string();
        let out = self.git(&["log", "-n", &n, "--format=%H"])?;
        Ok(String::from_utf8_lossy(&out.stdout)
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(ToString::to_string)
            .collect())
    }
}

fn run_git(cwd: &Path, args: &[&str]) -> Result<Output, ScmError> {
    trace!(cwd = %cwd.display(), ?args, "running git");
    let output = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .env("GIT_LITERAL_PATHSPECS", "1")
        .output()
        .map_err(|source| ScmError::Spawn {
            args: args.join(" "),
            source,
        })?;

    if !output.status.success() {
        return Err(ScmError::Command {
            args: args.join(" "),
            code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output)
}

fn stdout_line(out: &Output) -> Option<String> {
    String::from_utf8_lossy(&out.stdout)
        .lines()
        .next()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(ToString::to_string)
}

/// Parse `git show --name-status -z` output.
///
/// Fields are NUL-terminated and paths are verbatim (no C-quoting):
///
/// ```text
/// M\0src/lib.rs\0D\0old.rs\0R087\0from.rs\0to.rs\0
/// ```
fn parse_name_status(text: &str) -> Result<Vec<CommitFile>, ScmError> {
    let mut fields = text.split('\0');
    let mut files = Vec::new();
    while let Some(raw) = fields.next() {
        let status = raw.trim();
        if status.is_empty() {
            continue;
        }
        let (kind, path) = match status.chars().next() {
            Some('D') => (ChangeKind::Deleted, next_path(&mut fields, status)?),
            Some('A') => (ChangeKind::Added, next_path(&mut fields, status)?),
            Some('M' | 'T') => (ChangeKind::Modified, next_path(&mut fields, status)?),
            Some(c @ ('R' | 'C')) => {
                next_path(&mut fields, status)?;
                let to = next_path(&mut fields, status)?;
                let kind = if c == 'R' {
                    ChangeKind::Modified
                } else {
                    ChangeKind::Added
                };
                (kind, to)
            }
            _ => return Err(ScmError::Output(format!("unrecognized name-status '{status}'"))),
        };
        files.push(CommitFile::new(path, kind));
    }
    Ok(files)
}

fn next_path<'a>(
    fields: &mut impl Iterator<Item = &'a str>,
    status: &str,
) -> Result<&'a str, ScmError> {
    fields
        .next()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ScmError::Output(format!("missing path after name-status '{status}'")))
}

// ---------------------------------------------------------------------------
// In-memory fake for unit tests
// ---------------------------------------------------------------------------
