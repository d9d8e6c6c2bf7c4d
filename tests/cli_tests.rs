//! Integration tests for the CLI interface
//!
//! End-to-end runs use throwaway shell scripts as stand-in workers via
//! `--interpreter sh --worker <script>`.

#![cfg(unix)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn fake_worker(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("worker.sh");
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    path
}

/// A fully specified invocation against a stand-in worker script.
fn tilespawn_with_worker(script: &Path) -> Command {
    let mut cmd = Command::cargo_bin("tilespawn").unwrap();
    cmd.arg("--interpreter")
        .arg("sh")
        .arg("--worker")
        .arg(script)
        .arg("-j")
        .arg("cli-test")
        .arg("-i")
        .arg("/maps/field.tif")
        .arg("-p")
        .arg("mercator")
        .arg("-z")
        .arg("15-18")
        .arg("-a")
        .arg("0,0,0")
        .arg("-t")
        .arg("5")
        .arg("--no-progress");
    cmd
}

#[test]
fn test_help_shows_usage() {
    let mut cmd = Command::cargo_bin("tilespawn").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("--zoom"))
        .stdout(predicate::str::contains("--profile"));
}

#[test]
fn test_version_flag() {
    let mut cmd = Command::cargo_bin("tilespawn").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("tilespawn"));
}

#[test]
fn test_missing_required_arguments_rejected() {
    let mut cmd = Command::cargo_bin("tilespawn").unwrap();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

#[test]
fn test_rejects_malformed_zoom() {
    let mut cmd = Command::cargo_bin("tilespawn").unwrap();
    cmd.args([
        "-j", "cli-test", "-i", "/maps/field.tif", "-p", "mercator", "-z", "22-15", "-a", "0,0,0",
        "-t", "5",
    ])
    .assert()
    .failure()
    .stderr(predicate::str::contains("malformed zoom range"));
}

#[test]
fn test_rejects_unknown_profile() {
    let mut cmd = Command::cargo_bin("tilespawn").unwrap();
    cmd.args([
        "-j",
        "cli-test",
        "-i",
        "/maps/field.tif",
        "-p",
        "cylindrical",
        "-z",
        "15",
        "-a",
        "0,0,0",
        "-t",
        "5",
    ])
    .assert()
    .failure()
    .stderr(predicate::str::contains("possible values"));
}

#[test]
fn test_fake_worker_runs_to_completion() {
    let dir = TempDir::new().unwrap();
    let script = fake_worker(&dir, "printf 'tiles generated'");
    tilespawn_with_worker(&script).assert().success();
}

#[test]
fn test_worker_exit_code_passes_through() {
    let dir = TempDir::new().unwrap();
    let script = fake_worker(&dir, "exit 7");
    tilespawn_with_worker(&script).assert().code(7);
}

#[test]
fn test_stalled_worker_times_out_with_conventional_code() {
    let dir = TempDir::new().unwrap();
    // Close stdout, then hang; the run should end at the one second timeout.
    let script = fake_worker(&dir, "exec 1>&-\nsleep 30");
    let mut cmd = Command::cargo_bin("tilespawn").unwrap();
    cmd.arg("--interpreter")
        .arg("sh")
        .arg("--worker")
        .arg(&script)
        .arg("-j")
        .arg("cli-test")
        .arg("-i")
        .arg("/maps/field.tif")
        .arg("-p")
        .arg("mercator")
        .arg("-z")
        .arg("15")
        .arg("-a")
        .arg("0,0,0")
        .arg("-t")
        .arg("1")
        .arg("--no-progress")
        .timeout(Duration::from_secs(20))
        .assert()
        .code(124);
}

#[test]
fn test_sigterm_terminates_worker_group_and_exits_143() {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;
    use std::process::{Command as StdCommand, Stdio};
    use std::time::Instant;

    let dir = TempDir::new().unwrap();
    // The worker would write the marker if it survived its nap; a group
    // kill must prevent that.
    let marker = dir.path().join("worker-finished");
    let script = fake_worker(
        &dir,
        &format!("printf 'start '\nsleep 3\ntouch {}", marker.display()),
    );

    let started = Instant::now();
    let mut supervisor = StdCommand::new(env!("CARGO_BIN_EXE_tilespawn"))
        .args([
            "--interpreter",
            "sh",
            "--worker",
            script.to_str().unwrap(),
            "-j",
            "cli-test",
            "-i",
            "/maps/field.tif",
            "-p",
            "mercator",
            "-z",
            "15",
            "-a",
            "0,0,0",
            "-t",
            "5",
            "--no-progress",
        ])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    // Give it time to install handlers and spawn the worker.
    std::thread::sleep(Duration::from_millis(800));
    signal::kill(Pid::from_raw(supervisor.id() as i32), Signal::SIGTERM).unwrap();

    let status = supervisor.wait().unwrap();
    assert_eq!(status.code(), Some(143));
    assert!(
        started.elapsed() < Duration::from_secs(10),
        "signalled supervisor must return promptly, not wait the worker out"
    );

    // Wait past the point the worker would have finished on its own.
    std::thread::sleep(Duration::from_secs(4).saturating_sub(started.elapsed()));
    assert!(
        !marker.exists(),
        "worker group should have died with the supervisor"
    );
}

#[test]
fn test_missing_interpreter_reports_error() {
    let dir = TempDir::new().unwrap();
    let script = fake_worker(&dir, "exit 0");
    let mut cmd = Command::cargo_bin("tilespawn").unwrap();
    cmd.arg("--interpreter")
        .arg("./definitely-not-a-real-interpreter")
        .arg("--worker")
        .arg(&script)
        .arg("-j")
        .arg("cli-test")
        .arg("-i")
        .arg("/maps/field.tif")
        .arg("-p")
        .arg("geodetic")
        .arg("-z")
        .arg("15")
        .arg("-a")
        .arg("0,0,0")
        .arg("-t")
        .arg("5")
        .arg("--no-progress")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("worker command not found"));
}
