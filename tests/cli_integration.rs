//! Integration tests for the `dlog` CLI.
//!
//! Each test points `dlog` at a store inside a temp directory, runs it as a
//! subprocess, and verifies stdout and/or the store file.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use pretty_assertions::assert_eq;

const DAY: &str = "2024-01-15";

/// Get the path to the built `dlog` binary.
fn dlog_bin() -> PathBuf {
    // cargo test builds to target/debug/
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("dlog");
    path
}

/// Run `dlog` against the store in `dir`, returning (stdout, stderr, success).
fn run_dlog(dir: &Path, args: &[&str]) -> (String, String, bool) {
    let store = dir.join("store.json");
    let output = Command::new(dlog_bin())
        .arg("--store")
        .arg(&store)
        .args(args)
        .current_dir(dir)
        .env("XDG_CONFIG_HOME", dir.join("config"))
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run dlog");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

/// Run `dlog` expecting success, return stdout.
fn run_ok(dir: &Path, args: &[&str]) -> String {
    let (stdout, stderr, success) = run_dlog(dir, args);
    if !success {
        panic!(
            "dlog {:?} failed:\nstdout: {}\nstderr: {}",
            args, stdout, stderr
        );
    }
    stdout
}

fn json(dir: &Path, args: &[&str]) -> serde_json::Value {
    let mut full = args.to_vec();
    full.push("--json");
    serde_json::from_str(&run_ok(dir, &full)).unwrap()
}

/// A temp store with the active day pinned.
fn setup() -> tempfile::TempDir {
    let tmp = tempfile::TempDir::new().unwrap();
    run_ok(tmp.path(), &["day", DAY]);
    tmp
}

fn stored(dir: &Path) -> serde_json::Value {
    let content = fs::read_to_string(dir.join("store.json")).unwrap();
    serde_json::from_str(&content).unwrap()
}

fn bucket(dir: &Path, day: &str) -> serde_json::Value {
    let store = stored(dir);
    serde_json::from_str(store[day].as_str().unwrap()).unwrap()
}

// ---------------------------------------------------------------------------
// Day selection and listing
// ---------------------------------------------------------------------------

#[test]
fn test_day_selects_and_persists() {
    let tmp = setup();
    let out = json(tmp.path(), &["day"]);
    assert_eq!(out["day"], DAY);
    assert!(tmp.path().join(".state.json").exists());

    // a fresh day gets a draft that is persisted
    let b = bucket(tmp.path(), DAY);
    assert!(b.get("1").is_some());
}

#[test]
fn test_day_rejects_bad_date() {
    let tmp = setup();
    let (_, stderr, ok) = run_dlog(tmp.path(), &["day", "2024-02-30"]);
    assert!(!ok);
    assert!(stderr.contains("invalid date"));
}

#[test]
fn test_list_json() {
    let tmp = setup();
    let out = json(tmp.path(), &["list"]);
    assert_eq!(out["day"], DAY);
    let notes = out["notes"].as_array().unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0]["status"], "draft");
    assert_eq!(notes[0]["label"], "1");
}

#[test]
fn test_list_other_day_keeps_selection() {
    let tmp = setup();
    run_ok(tmp.path(), &["set", "1", "project", "P-1"]);
    run_ok(tmp.path(), &["day", "2024-01-16"]);

    let out = json(tmp.path(), &["list", "--day", DAY]);
    assert_eq!(out["day"], DAY);
    assert_eq!(out["notes"][0]["project_id"], "P-1");
    let out = json(tmp.path(), &["day"]);
    assert_eq!(out["day"], "2024-01-16");
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[test]
fn test_set_starts_clock_and_done_appends_draft() {
    let tmp = setup();
    let out = json(tmp.path(), &["set", "1", "failing", "crash on save"]);
    assert_eq!(out["applied"], true);
    assert_eq!(out["status"], "running");

    let out = json(tmp.path(), &["done", "1"]);
    assert_eq!(out["applied"], true);
    assert_eq!(out["status"], "completed");

    let b = bucket(tmp.path(), DAY);
    assert_eq!(b["1"]["failingIssues"], "crash on save");
    assert_eq!(b["1"]["completed"], true);
    assert_eq!(b["1"]["hasStarted"], true);
    assert!(b["1"]["endTimestamp"].is_number());
    assert_eq!(b["2"]["hasStarted"], false);
}

#[test]
fn test_done_on_draft_is_not_applied() {
    let tmp = setup();
    let out = json(tmp.path(), &["done", "1"]);
    assert_eq!(out["applied"], false);
    assert_eq!(out["status"], "draft");
}

#[test]
fn test_cancel_and_reopen_keeps_cancel_flag() {
    let tmp = setup();
    run_ok(tmp.path(), &["set", "1", "discussion", "talked"]);
    run_ok(tmp.path(), &["cancel", "1"]);

    let out = json(tmp.path(), &["show", "1"]);
    assert_eq!(out["status"], "canceled");
    assert_eq!(out["label"], "Canceled");

    let out = json(tmp.path(), &["reopen", "1"]);
    assert_eq!(out["status"], "running");
    let out = json(tmp.path(), &["show", "1"]);
    assert_eq!(out["was_canceled"], true);
}

#[test]
fn test_delete_renumbers() {
    let tmp = setup();
    run_ok(tmp.path(), &["new"]);
    run_ok(tmp.path(), &["set", "2", "project", "P-2"]);
    run_ok(tmp.path(), &["delete", "1"]);

    let b = bucket(tmp.path(), DAY);
    let keys: Vec<&String> = b.as_object().unwrap().keys().collect();
    assert_eq!(keys, vec!["1"]);
    assert_eq!(b["1"]["projectID"], "P-2");
}

#[test]
fn test_unknown_note_fails() {
    let tmp = setup();
    let (_, stderr, ok) = run_dlog(tmp.path(), &["done", "42"]);
    assert!(!ok);
    assert!(stderr.contains("note not found: 42"));
}

#[test]
fn test_unknown_field_fails() {
    let tmp = setup();
    let (_, stderr, ok) = run_dlog(tmp.path(), &["set", "1", "colour", "x"]);
    assert!(!ok);
    assert!(stderr.contains("unknown field"));
}

#[test]
fn test_copy_prints_summary_and_identifiers() {
    let tmp = setup();
    run_ok(tmp.path(), &["set", "1", "failing", "bad output"]);
    run_ok(tmp.path(), &["set", "1", "discussion", "raised it"]);
    run_ok(tmp.path(), &["set", "1", "attempt", "A-7"]);

    let out = run_ok(tmp.path(), &["copy", "1"]);
    assert_eq!(out, "Failing issues:\nbad output\n\nDiscussion:\nraised it\n");
    let out = run_ok(tmp.path(), &["copy", "1", "--identifiers"]);
    assert_eq!(out, "Attempt ID: A-7\n");
}

// ---------------------------------------------------------------------------
// Search, stats, export
// ---------------------------------------------------------------------------

#[test]
fn test_search_across_days() {
    let tmp = setup();
    run_ok(tmp.path(), &["set", "1", "project", "ALPHA-1"]);
    run_ok(tmp.path(), &["day", "2024-01-16"]);
    run_ok(tmp.path(), &["set", "1", "attempt", "alpha-2"]);

    let out = json(tmp.path(), &["search", "Alpha"]);
    let hits = out.as_array().unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0]["day"], "2024-01-16");
    assert_eq!(hits[1]["day"], DAY);

    let state: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(tmp.path().join(".state.json")).unwrap()).unwrap();
    assert_eq!(state["last_search"], "Alpha");
}

#[test]
fn test_stats_and_projects() {
    let tmp = setup();
    run_ok(tmp.path(), &["set", "1", "project", "P"]);
    run_ok(tmp.path(), &["set", "1", "failing", "x"]);
    run_ok(tmp.path(), &["done", "1"]);
    run_ok(tmp.path(), &["set", "2", "project", "P"]);
    run_ok(tmp.path(), &["done", "2"]);

    let stats = json(tmp.path(), &["stats"]);
    assert_eq!(stats["failing"], 1);
    assert_eq!(stats["no_issue"], 1);
    assert_eq!(stats["total"], 2);

    let rates = json(tmp.path(), &["projects", "--all"]);
    assert_eq!(rates[0]["project_id"], "P");
    assert_eq!(rates[0]["count"], 2);
    assert_eq!(rates[0]["fail_rate"], 0.5);
}

#[test]
fn test_export_csv() {
    let tmp = setup();
    run_ok(tmp.path(), &["set", "1", "operation", "OP-1"]);
    run_ok(tmp.path(), &["done", "1"]);
    run_ok(tmp.path(), &["set", "2", "discussion", "dropped"]);
    run_ok(tmp.path(), &["cancel", "2"]);

    let out = run_ok(tmp.path(), &["export", "--from", DAY, "--to", DAY]);
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("date,"));
    assert!(lines[1].starts_with("2024-01-15,1,1,"));
    assert!(lines[1].contains("OP-1"));

    let out = run_ok(tmp.path(), &["export", "--include-canceled"]);
    assert_eq!(out.lines().count(), 3);
}

// ---------------------------------------------------------------------------
// Category timers
// ---------------------------------------------------------------------------

#[test]
fn test_timer_start_switch_and_stop_all() {
    let tmp = setup();
    run_ok(tmp.path(), &["timer", "start", "meeting"]);
    run_ok(tmp.path(), &["timer", "start", "review"]);

    let status = json(tmp.path(), &["timer", "status"]);
    let running: Vec<&str> = status["timers"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|t| t["running"] == true)
        .map(|t| t["category"].as_str().unwrap())
        .collect();
    assert_eq!(running, vec!["review"]);

    let stopped = json(tmp.path(), &["timer", "stop-all"]);
    assert_eq!(stopped.as_array().unwrap().len(), 1);
    assert_eq!(stopped[0]["category"], "review");
}

#[test]
fn test_timer_set_overwrites_total() {
    let tmp = setup();
    let out = run_ok(tmp.path(), &["timer", "set", "training", "01:30:00"]);
    assert!(out.contains("01:30:00"));

    let status = json(tmp.path(), &["timer", "status"]);
    assert_eq!(status["total_seconds"], 5400);
    let store = stored(tmp.path());
    assert!(store.get(format!("offPlatform_{}", DAY)).is_some());
}

#[test]
fn test_timer_rejects_unknown_category() {
    let tmp = setup();
    let (_, stderr, ok) = run_dlog(tmp.path(), &["timer", "start", "lunch"]);
    assert!(!ok);
    assert!(stderr.contains("unknown category"));
}

#[test]
fn test_watch_with_nothing_running() {
    let tmp = setup();
    let (_, stderr, ok) = run_dlog(tmp.path(), &["watch", "--ticks", "1"]);
    assert!(ok);
    assert!(stderr.contains("nothing running"));
}

#[test]
fn test_corrupt_config_is_reported() {
    let tmp = setup();
    let config_dir = tmp.path().join("config").join("daylog");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(config_dir.join("config.toml"), "[display\n").unwrap();
    let (_, stderr, ok) = run_dlog(tmp.path(), &["list"]);
    assert!(!ok);
    assert!(stderr.contains("could not parse"));
}

#[test]
fn test_config_canceled_label() {
    let tmp = setup();
    let config_dir = tmp.path().join("config").join("daylog");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(
        config_dir.join("config.toml"),
        "[display]\ncanceled_label = \"X\"\n",
    )
    .unwrap();
    run_ok(tmp.path(), &["set", "1", "discussion", "d"]);
    run_ok(tmp.path(), &["cancel", "1"]);
    let out = json(tmp.path(), &["show", "1"]);
    assert_eq!(out["label"], "X");
}
