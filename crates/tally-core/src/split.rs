//! Partition pending metrics into "this commit" and "carry forward".
//!
//! | File                                         | Note | Store   |
//! |----------------------------------------------|------|---------|
//! | changed by the commit                        | `m`  | purged  |
//! | deleted by the commit                        | `d`  | purged  |
//! | application identifier (`*.app`)             | `r`  | purged  |
//! | tracked, unmodified, not in the commit       | `r`  | kept    |
//! | untracked or modified, not in the commit     | -    | kept    |
//! | path a note cannot carry (e.g. contains `,`) | -    | purged  |

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::event::is_app_identifier;
use crate::metric::MetricStore;
use crate::note::{CommitNote, FileNote, Status};
use crate::scm::{ChangeKind, CommitFile, Scm, ScmError};

/// Result of splitting the store against one commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Split {
    /// Entries to attach to the commit.
    pub note: CommitNote,
    /// File ids whose time is spent by this commit.
    pub purge: Vec<String>,
    /// Files left pending for a later commit.
    pub pending: Vec<String>,
}

impl Split {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.note.is_empty()
    }

    /// Remove the purged files from `store`.
    pub fn apply(&self, store: &mut MetricStore) {
        for id in &self.purge {
            store.remove(id);
        }
        debug!(purged = self.purge.len(), remaining = store.files.len(), "applied split");
    }
}

/// Decide what `commit_files` finalizes.
///
/// Tracking status is refreshed against `scm` first; modification status
/// is only queried for tracked files outside the commit.
///
/// # Errors
///
/// Propagates SCM failures.
pub fn split(
    store: &mut MetricStore,
    commit_files: &[CommitFile],
    scm: &dyn Scm,
) -> Result<Split, ScmError> {
    store.refresh_tracking(scm)?;
    let in_commit: BTreeMap<&str, ChangeKind> = commit_files
        .iter()
        .map(|f| (f.path.as_str(), f.kind))
        .collect();

    let mut out = Split::default();
    for file in store.ranked() {
        let status = if let Some(kind) = in_commit.get(file.source_file.as_str()) {
            out.purge.push(file.file_id());
            match kind {
                ChangeKind::Deleted => Status::Deleted,
                ChangeKind::Added | ChangeKind::Modified => Status::Modified,
            }
        } else if is_app_identifier(&file.source_file) {
            out.purge.push(file.file_id());
            Status::Readonly
        } else if file.git_tracked == Some(true) && !scm.is_modified(&file.source_file)? {
            Status::Readonly
        } else {
            out.pending.push(file.source_file.clone());
            continue;
        };

        match FileNote::from_timeline(file.source_file.clone(), file.timeline.clone(), status) {
            Ok(entry) => out.note.push(entry),
            Err(err) => {
                warn!(%err, "dropping time for a path a note cannot carry");
                if !out.purge.contains(&file.file_id()) {
                    out.purge.push(file.file_id());
                }
            }
        }
    }

    debug!(
        entries = out.note.len(),
        purge = out.purge.len(),
        pending = out.pending.len(),
        "split metric store"
    );
    Ok(out)
}
