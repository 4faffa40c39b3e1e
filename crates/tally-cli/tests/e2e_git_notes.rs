//! E2E tests for `tally commit` and `tally report` against a real git repo.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const NOW: i64 = 1_700_000_000;
const WINDOW: i64 = NOW - NOW % 60;

fn git_available() -> bool {
    std::process::Command::new("git")
        .arg("--version")
        .output()
        .is_ok_and(|o| o.status.success())
}

fn git(dir: &Path, args: &[&str]) -> String {
    let out = std::process::Command::new("git")
        .args([
            "-c",
            "user.name=Tally Test",
            "-c",
            "user.email=tally@example.com",
            "-c",
            "commit.gpgsign=false",
        ])
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git runs");
    assert!(
        out.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn tally_cmd(dir: &Path, now: i64) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("tally"));
    cmd.current_dir(dir);
    cmd.env("TALLY_LOG", "error");
    cmd.env("TALLY_NOW", now.to_string());
    cmd.env("GIT_AUTHOR_NAME", "Tally Test");
    cmd.env("GIT_AUTHOR_EMAIL", "tally@example.com");
    cmd.env("GIT_COMMITTER_NAME", "Tally Test");
    cmd.env("GIT_COMMITTER_EMAIL", "tally@example.com");
    cmd
}

/// A repo with `a.rs` and `b.rs` committed and tally initialized.
fn repo() -> TempDir {
    let dir = TempDir::new().unwrap();
    git(dir.path(), &["init", "-q"]);
    fs::write(dir.path().join("a.rs"), "fn a() {}\n").unwrap();
    fs::write(dir.path().join("b.rs"), "fn b() {}\n").unwrap();
    git(dir.path(), &["add", "a.rs", "b.rs"]);
    git(dir.path(), &["commit", "-q", "-m", "initial"]);

    tally_cmd(dir.path(), NOW)
        .args(["init", "--no-hooks"])
        .assert()
        .success()
        .stdout(predicate::str::contains("refs/notes/tally"));
    dir
}

fn commit_json(dir: &Path, now: i64) -> Value {
    let out = tally_cmd(dir, now).args(["commit", "--json"]).output().unwrap();
    assert!(
        out.status.success(),
        "commit failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    serde_json::from_slice(&out.stdout).expect("valid commit JSON")
}

#[test]
fn init_points_notes_rewrite_at_tally_ref() {
    if !git_available() {
        return;
    }
    let dir = repo();
    assert_eq!(
        git(dir.path(), &["config", "--get", "notes.rewriteRef"]).trim(),
        "refs/notes/tally"
    );
}

#[test]
fn commit_attaches_finalized_time_and_keeps_the_rest_pending() {
    if !git_available() {
        return;
    }
    let dir = repo();
    fs::write(dir.path().join("a.rs"), "fn a() { todo!() }\n").unwrap();
    fs::write(dir.path().join("c.rs"), "fn c() {}\n").unwrap();

    tally_cmd(dir.path(), NOW).args(["record", "a.rs"]).assert().success();
    tally_cmd(dir.path(), NOW).args(["record", "a.rs"]).assert().success();
    tally_cmd(dir.path(), NOW).args(["record", "b.rs"]).assert().success();
    tally_cmd(dir.path(), NOW + 60)
        .args(["record", "c.rs"])
        .assert()
        .success();

    git(dir.path(), &["add", "a.rs"]);
    git(dir.path(), &["commit", "-q", "-m", "touch a"]);

    let result = commit_json(dir.path(), NOW + 120);
    assert_eq!(result["written"], true);
    let entries = result["note"]["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    let entry = |name: &str| {
        entries
            .iter()
            .find(|e| e["source_file"] == name)
            .unwrap_or_else(|| panic!("{name} missing from note"))
    };
    assert_eq!(entry("a.rs")["time_spent"], 40);
    assert_eq!(entry("a.rs")["status"], "modified");
    assert_eq!(entry("b.rs")["time_spent"], 20);
    assert_eq!(entry("b.rs")["status"], "readonly");

    let note = git(dir.path(), &["notes", "--ref", "tally", "show", "HEAD"]);
    assert!(note.starts_with("[ver:1,total:60]\n"), "note was {note:?}");
    assert!(note.contains(&format!("a.rs:40,{WINDOW}:40,m")));
    assert!(note.contains(&format!("b.rs:20,{WINDOW}:20,r")));

    // c.rs is untracked and uncommitted: still pending. b.rs stays too.
    let out = tally_cmd(dir.path(), NOW + 120)
        .args(["status", "--json"])
        .output()
        .unwrap();
    let status: Value = serde_json::from_slice(&out.stdout).unwrap();
    let pending: Vec<&str> = status["files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["source_file"].as_str().unwrap())
        .collect();
    assert!(pending.contains(&"c.rs"));
    assert!(pending.contains(&"b.rs"));
    assert!(!pending.contains(&"a.rs"));
}

#[test]
fn non_ascii_paths_are_matched_against_the_commit() {
    if !git_available() {
        return;
    }
    let dir = repo();
    fs::create_dir(dir.path().join("dïr")).unwrap();
    fs::write(dir.path().join("é.rs"), "fn e() {}\n").unwrap();
    fs::write(dir.path().join("dïr/ü b.rs"), "fn u() {}\n").unwrap();
    tally_cmd(dir.path(), NOW).args(["record", "é.rs"]).assert().success();
    tally_cmd(dir.path(), NOW)
        .args(["record", "dïr/ü b.rs"])
        .assert()
        .success();
    git(dir.path(), &["add", "."]);
    git(dir.path(), &["commit", "-q", "-m", "unicode"]);

    let result = commit_json(dir.path(), NOW + 60);
    let entries = result["note"]["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    for entry in entries {
        assert_eq!(entry["status"], "modified", "{entry}");
        assert_eq!(entry["time_spent"], 30, "{entry}");
    }

    let note = git(dir.path(), &["notes", "--ref", "tally", "show", "HEAD"]);
    assert!(note.contains(&format!("é.rs:30,{WINDOW}:30,m")), "note was {note:?}");
    assert!(note.contains(&format!("dïr/ü b.rs:30,{WINDOW}:30,m")), "note was {note:?}");
}

#[test]
fn second_commit_run_merges_into_existing_note() {
    if !git_available() {
        return;
    }
    let dir = repo();
    fs::write(dir.path().join("a.rs"), "fn a() { 1 }\n").unwrap();
    tally_cmd(dir.path(), NOW).args(["record", "a.rs"]).assert().success();
    git(dir.path(), &["commit", "-q", "-am", "first"]);
    commit_json(dir.path(), NOW + 60);

    // More work lands on the same commit, e.g. before an amend.
    fs::write(dir.path().join("a.rs"), "fn a() { 2 }\n").unwrap();
    tally_cmd(dir.path(), NOW + 300)
        .args(["record", "a.rs"])
        .assert()
        .success();
    git(dir.path(), &["commit", "-q", "--amend", "-am", "first"]);
    commit_json(dir.path(), NOW + 360);

    let note = git(dir.path(), &["notes", "--ref", "tally", "show", "HEAD"]);
    assert!(note.starts_with("[ver:1,total:120]\n"), "note was {note:?}");
    assert!(note.contains(&format!("a.rs:120,{WINDOW}:60,{}:60,m", WINDOW + 300)));
}

#[test]
fn commit_without_pending_time_writes_nothing() {
    if !git_available() {
        return;
    }
    let dir = repo();
    tally_cmd(dir.path(), NOW)
        .args(["commit"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No pending time"));

    let out = std::process::Command::new("git")
        .args(["notes", "--ref", "tally", "show", "HEAD"])
        .current_dir(dir.path())
        .output()
        .unwrap();
    assert!(!out.status.success());
}

#[test]
fn report_lists_notes_and_summary() {
    if !git_available() {
        return;
    }
    let dir = repo();
    fs::write(dir.path().join("a.rs"), "fn a() { 1 }\n").unwrap();
    tally_cmd(dir.path(), NOW).args(["record", "a.rs"]).assert().success();
    git(dir.path(), &["commit", "-q", "-am", "first"]);
    commit_json(dir.path(), NOW + 60);

    fs::write(dir.path().join("a.rs"), "fn a() { 2 }\n").unwrap();
    tally_cmd(dir.path(), NOW + 600)
        .args(["record", "a.rs"])
        .assert()
        .success();
    git(dir.path(), &["commit", "-q", "-am", "second"]);
    commit_json(dir.path(), NOW + 660);

    let out = tally_cmd(dir.path(), NOW + 660)
        .args(["report", "--summary", "--json"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let report: Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(report["commits"].as_array().unwrap().len(), 2);
    assert_eq!(report["summary"][0]["source_file"], "a.rs");
    assert_eq!(report["summary"][0]["seconds"], 120);
    assert_eq!(report["summary"][0]["commits"], 2);

    tally_cmd(dir.path(), NOW + 660)
        .args(["report", "-n", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1m"))
        .stdout(predicate::str::contains("a.rs"))
        .stdout(predicate::str::contains("active"));
}
