//! End-to-end flows over one project: markers -> store -> commit note.
//!
//! Every flow that reads markers holds the [`MetricsLock`] for its whole
//! read-modify-write cycle. Durable state is written in a fixed order:
//! commit note, then metric store, then marker deletion. A crash between
//! steps can at worst re-count markers into a note that already has them,
//! never lose time.

use std::io;

use tracing::{debug, info};

use crate::allocate::allocate;
use crate::clock::Clock;
use crate::config::ProjectConfig;
use crate::error::{Result, TallyError};
use crate::event::{MARKER_EXT, Sweep, Sweeper};
use crate::lock::MetricsLock;
use crate::metric::MetricStore;
use crate::note::CommitNote;
use crate::paths::Project;
use crate::scm::Scm;
use crate::split::split;

/// Fold pending markers into the metric store.
///
/// With `dry_run` the returned store includes pending markers but nothing
/// is written and no marker is deleted.
///
/// # Errors
///
/// Fails on lock timeout, unreadable store, or marker I/O errors. Nothing
/// is consumed when any step fails.
pub fn process(
    project: &Project,
    clock: &dyn Clock,
    config: &ProjectConfig,
    dry_run: bool,
) -> Result<MetricStore> {
    let _lock = MetricsLock::acquire(&project.lock_file, config.lock.timeout())?;
    let (store, sweep) = accumulate(project, clock)?;
    if !dry_run {
        persist(project, &store, &sweep)?;
    }
    info!(
        files = store.files.len(),
        seconds = store.total_seconds(),
        markers = sweep.consumed.len(),
        dry_run,
        "processed events"
    );
    Ok(store)
}

/// What [`commit`] would attach to HEAD right now, without writing anything.
///
/// # Errors
///
/// Same as [`commit`].
pub fn pending_note(
    project: &Project,
    clock: &dyn Clock,
    config: &ProjectConfig,
    scm: &dyn Scm,
) -> Result<Option<CommitNote>> {
    commit(project, clock, config, scm, true)
}

/// Finalize pending time into HEAD's note.
///
/// Returns the full note now attached to HEAD (existing blocks merged with
/// the new entries), or `None` when there is no HEAD or nothing in the
/// store belongs to it. Pending markers are consumed either way unless
/// `dry_run`.
///
/// # Errors
///
/// Fails on lock timeout, SCM errors, a malformed existing note, or I/O
/// errors. On failure no marker is deleted.
pub fn commit(
    project: &Project,
    clock: &dyn Clock,
    config: &ProjectConfig,
    scm: &dyn Scm,
    dry_run: bool,
) -> Result<Option<CommitNote>> {
    let _lock = MetricsLock::acquire(&project.lock_file, config.lock.timeout())?;
    let (mut store, sweep) = accumulate(project, clock)?;

    let Some(head) = scm.head_commit()? else {
        debug!("no HEAD commit; keeping time pending");
        if !dry_run {
            persist(project, &store, &sweep)?;
        }
        return Ok(None);
    };

    let files = scm.commit_files(&head)?;
    let split = split(&mut store, &files, scm)?;
    if split.is_empty() {
        debug!(commit = %head, "no pending time belongs to HEAD");
        if !dry_run {
            persist(project, &store, &sweep)?;
        }
        return Ok(None);
    }

    let mut note = match scm.read_note(&head)? {
        Some(text) => CommitNote::unmarshal(&text)?,
        None => CommitNote::new(),
    };
    note.merge(split.note.clone());

    if dry_run {
        return Ok(Some(note));
    }

    scm.write_note(&head, &note.marshal())?;
    split.apply(&mut store);
    persist(project, &store, &sweep)?;
    info!(
        commit = %head,
        entries = note.len(),
        seconds = note.total(),
        pending = split.pending.len(),
        "attached commit note"
    );
    Ok(Some(note))
}

/// What [`clean`] removed (or would remove).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct CleanReport {
    pub markers: usize,
    pub files: usize,
    pub seconds: u64,
}

/// Drop all pending markers and the metric store.
///
/// A store that cannot be parsed is still removed.
///
/// # Errors
///
/// Fails on lock timeout or I/O errors.
pub fn clean(project: &Project, config: &ProjectConfig, dry_run: bool) -> Result<CleanReport> {
    let _lock = MetricsLock::acquire(&project.lock_file, config.lock.timeout())?;

    let markers = list_markers(project)?;
    let store = match MetricStore::load(&project.metrics_json) {
        Ok(store) => store,
        Err(TallyError::Store { .. }) => MetricStore::default(),
        Err(err) => return Err(err),
    };
    let report = CleanReport {
        markers: markers.len(),
        files: store.files.len(),
        seconds: store.total_seconds(),
    };

    if !dry_run {
        Sweep {
            consumed: markers,
            ..Sweep::default()
        }
        .consume()?;
        match std::fs::remove_file(&project.metrics_json) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        info!(markers = report.markers, files = report.files, "cleaned pending metrics");
    }
    Ok(report)
}

fn accumulate(project: &Project, clock: &dyn Clock) -> Result<(MetricStore, Sweep)> {
    let mut store = MetricStore::load(&project.metrics_json)?;
    let sweep = Sweeper::new(project, clock).scan()?;
    store.add_allocation(&allocate(&sweep.bucket));
    Ok((store, sweep))
}

fn persist(project: &Project, store: &MetricStore, sweep: &Sweep) -> Result<()> {
    if sweep.is_empty() && !project.metrics_json.exists() && store.is_empty() {
        return Ok(());
    }
    store.save(&project.metrics_json)?;
    sweep.consume()?;
    Ok(())
}

fn list_markers(project: &Project) -> Result<Vec<std::path::PathBuf>> {
    let entries = match std::fs::read_dir(&project.events_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };
    let mut out = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == MARKER_EXT) {
            out.push(path);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::event::Recorder;
    use crate::note::Status;
    use crate::scm::fake::FakeScm;
    use crate::scm::{ChangeKind, CommitFile};

    fn project_with(files: &[&str]) -> (tempfile::TempDir, Project) {
        let tmp = tempfile::tempdir().unwrap();
        let project = Project::at(tmp.path().canonicalize().unwrap());
        project.ensure_layout().unwrap();
        for f in files {
            std::fs::write(project.root.join(f), "x\n").unwrap();
        }
        (tmp, project)
    }

    fn record(project: &Project, at: i64, file: &str) {
        let clock = FixedClock::new(at);
        Recorder::new(&clock).record(&project.root.join(file)).unwrap();
    }

    fn marker_count(project: &Project) -> usize {
        list_markers(project).unwrap().len()
    }

    #[test]
    fn process_accumulates_and_consumes() {
        let (_tmp, project) = project_with(&["a.rs", "b.rs"]);
        record(&project, 0, "a.rs");
        record(&project, 10, "a.rs");
        record(&project, 20, "b.rs");
        let clock = FixedClock::new(60);
        let cfg = ProjectConfig::default();

        let preview = process(&project, &clock, &cfg, true).unwrap();
        assert_eq!(preview.get("a.rs").unwrap().seconds, 40);
        assert_eq!(marker_count(&project), 3);
        assert!(!project.metrics_json.exists());

        let store = process(&project, &clock, &cfg, false).unwrap();
        assert_eq!(store, preview);
        assert_eq!(marker_count(&project), 0);
        assert_eq!(MetricStore::load(&project.metrics_json).unwrap(), store);

        let again = process(&project, &clock, &cfg, false).unwrap();
        assert_eq!(again, store);
    }

    #[test]
    fn commit_writes_note_and_purges() {
        let (_tmp, project) = project_with(&["a.rs", "b.rs"]);
        record(&project, 0, "a.rs");
        record(&project, 0, "b.rs");
        let clock = FixedClock::new(60);
        let cfg = ProjectConfig::default();
        let scm = FakeScm::default()
            .tracked(["a.rs", "b.rs"])
            .head("c1", vec![CommitFile::new("a.rs", ChangeKind::Modified)]);

        let preview = pending_note(&project, &clock, &cfg, &scm).unwrap().unwrap();
        assert_eq!(scm.note("c1"), None);
        assert_eq!(marker_count(&project), 2);

        let note = commit(&project, &clock, &cfg, &scm, false).unwrap().unwrap();
        assert_eq!(note, preview);
        assert_eq!(note.get("a.rs").unwrap().status(), Status::Modified);
        assert_eq!(note.get("b.rs").unwrap().status(), Status::Readonly);
        assert_eq!(scm.note("c1").unwrap(), note.marshal());

        let store = MetricStore::load(&project.metrics_json).unwrap();
        assert!(store.get("a.rs").is_none());
        assert_eq!(store.get("b.rs").unwrap().seconds, 30);
        assert_eq!(marker_count(&project), 0);
    }

    #[test]
    fn amend_merges_with_existing_note() {
        let (_tmp, project) = project_with(&["event.go"]);
        let cfg = ProjectConfig::default();
        let scm = FakeScm::default()
            .tracked(["event.go"])
            .head("c1", vec![CommitFile::new("event.go", ChangeKind::Modified)]);
        scm.write_note("c1", "[ver:1,total:100]\nevent.go:100,1000:100,m\n")
            .unwrap();

        record(&project, 1_000, "event.go");
        let clock = FixedClock::new(1_020);
        let note = commit(&project, &clock, &cfg, &scm, false).unwrap().unwrap();

        let entry = note.get("event.go").unwrap();
        assert_eq!(entry.time_spent(), 160);
        assert_eq!(entry.timeline()[&960], 60);
        assert_eq!(entry.timeline()[&1000], 100);
        assert_eq!(CommitNote::unmarshal(&scm.note("c1").unwrap()).unwrap(), note);
    }

    #[test]
    fn malformed_existing_note_aborts_without_consuming() {
        let (_tmp, project) = project_with(&["a.rs"]);
        let cfg = ProjectConfig::default();
        let scm = FakeScm::default()
            .tracked(["a.rs"])
            .head("c1", vec![CommitFile::new("a.rs", ChangeKind::Modified)]);
        scm.write_note("c1", "garbage\n").unwrap();
        record(&project, 0, "a.rs");

        let err = commit(&project, &FixedClock::new(60), &cfg, &scm, false).unwrap_err();
        assert!(matches!(err, TallyError::Note(_)));
        assert_eq!(marker_count(&project), 1);
        assert_eq!(scm.note("c1").unwrap(), "garbage\n");
    }

    #[test]
    fn commit_without_head_keeps_time_pending() {
        let (_tmp, project) = project_with(&["a.rs"]);
        record(&project, 0, "a.rs");
        let cfg = ProjectConfig::default();

        let out = commit(&project, &FixedClock::new(60), &cfg, &FakeScm::default(), false).unwrap();
        assert!(out.is_none());
        assert_eq!(marker_count(&project), 0);
        let store = MetricStore::load(&project.metrics_json).unwrap();
        assert_eq!(store.get("a.rs").unwrap().seconds, 60);
    }

    #[test]
    fn lock_contention_fails_fast() {
        let (_tmp, project) = project_with(&[]);
        let cfg: ProjectConfig = toml::from_str("[lock]\ntimeout_ms = 20\n").unwrap();
        let _held = MetricsLock::acquire(&project.lock_file, cfg.lock.timeout()).unwrap();

        let err = process(&project, &FixedClock::new(0), &cfg, true).unwrap_err();
        assert!(matches!(err, TallyError::Lock(_)));
    }

    #[test]
    fn clean_removes_markers_and_store() {
        let (_tmp, project) = project_with(&["a.rs"]);
        let cfg = ProjectConfig::default();
        record(&project, 0, "a.rs");
        process(&project, &FixedClock::new(60), &cfg, false).unwrap();
        record(&project, 60, "a.rs");

        let preview = clean(&project, &cfg, true).unwrap();
        assert_eq!(
            preview,
            CleanReport {
                markers: 1,
                files: 1,
                seconds: 60
            }
        );
        assert_eq!(marker_count(&project), 1);

        clean(&project, &cfg, false).unwrap();
        assert_eq!(marker_count(&project), 0);
        assert!(!project.metrics_json.exists());
    }

    #[test]
    fn clean_discards_corrupt_store() {
        let (_tmp, project) = project_with(&[]);
        std::fs::write(&project.metrics_json, "{oops").unwrap();
        let report = clean(&project, &ProjectConfig::default(), false).unwrap();
        assert_eq!(report.files, 0);
        assert!(!project.metrics_json.exists());
    }
}
