//! Smoke tests for the ticketflow CLI
//!
//! These never launch a browser; they cover argument parsing and the
//! configuration commands.

#![allow(deprecated)] // Command::cargo_bin until assert_cmd settles its replacement
#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Get a command for the ticketflow binary with no env overrides leaking in
fn ticketflow() -> Command {
    let mut cmd = Command::cargo_bin("ticketflow").expect("ticketflow binary should exist");
    cmd.env_remove("TICKETFLOW_BASE_URL")
        .env_remove("TICKETFLOW_BROWSER")
        .env_remove("TICKETFLOW_HEADLESS")
        .env_remove("TICKETFLOW_CONFIG");
    cmd
}

// ============================================================================
// Basic CLI Tests
// ============================================================================

#[test]
fn test_version_flag() {
    ticketflow()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.4.0"));
}

#[test]
fn test_help_flag() {
    ticketflow()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_no_args_fails() {
    ticketflow().assert().failure();
}

#[test]
fn test_run_help_lists_scenarios() {
    ticketflow()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("invalid-mobile"))
        .stdout(predicate::str::contains("movie-details"))
        .stdout(predicate::str::contains("events"));
}

#[test]
fn test_unknown_scenario_rejected() {
    ticketflow()
        .args(["run", "checkout"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn test_list() {
    ticketflow()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("movie-details"));
}

// ============================================================================
// Config Tests
// ============================================================================

#[test]
fn test_config_defaults() {
    ticketflow()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("in.bookmyshow.com"))
        .stdout(predicate::str::contains("candidate_ms: 2000"));
}

#[test]
fn test_config_file_and_env_override() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ticketflow.yaml");
    fs::write(&path, "events_path: events/mumbai\ntimeouts:\n  default_ms: 15000\n").unwrap();

    ticketflow()
        .arg("--config")
        .arg(&path)
        .arg("config")
        .env("TICKETFLOW_HEADLESS", "false")
        .assert()
        .success()
        .stdout(predicate::str::contains("events_path: events/mumbai"))
        .stdout(predicate::str::contains("default_ms: 15000"))
        .stdout(predicate::str::contains("headless: false"));
}

#[test]
fn test_config_check_is_silent() {
    ticketflow()
        .args(["config", "--check"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_invalid_config_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.yaml");
    fs::write(&path, "timeouts:\n  poll_interval_ms: 0\n").unwrap();

    ticketflow()
        .arg("--config")
        .arg(&path)
        .args(["config", "--check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("poll_interval_ms"));
}

#[test]
fn test_bad_browser_env_fails() {
    ticketflow()
        .arg("config")
        .env("TICKETFLOW_BROWSER", "safari")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported browser"));
}

#[test]
fn test_missing_config_file_fails() {
    ticketflow()
        .args(["--config", "/nonexistent/ticketflow.yaml", "config"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_run_rejects_invalid_base_url_before_launch() {
    ticketflow()
        .args(["run", "events", "--base-url", "ftp://example.test"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("http(s)"));
}
