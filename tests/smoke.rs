//! Smoke tests -- verify the binary runs, rejects bad input, and stops on time.

use assert_cmd::Command;
use predicates::prelude::*;

fn coreburn() -> Command {
    let mut cmd = Command::cargo_bin("coreburn").unwrap();
    cmd.env_remove("COREBURN_CONFIG")
        .env_remove("COREBURN_STATUS_BIND")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_cli_help() {
    coreburn()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicates::str::contains("Burn-in CPU load generator"));
}

#[test]
fn test_cli_version() {
    coreburn()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicates::str::contains("coreburn"));
}

#[test]
fn test_invalid_thread_counts_fail() {
    for bad in ["0", "-2", "many", "1.5"] {
        coreburn()
            .arg(bad)
            .assert()
            .failure()
            .stderr(predicates::str::contains("thread_count"));
    }
}

#[test]
fn test_zero_idle_is_rejected() {
    coreburn()
        .args(["1", "--idle-ms", "0"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("idle_ms"));
}

#[test]
fn test_bad_duration_is_rejected() {
    coreburn()
        .args(["1", "--duration", "forever"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("duration"));
}

#[test]
fn test_short_run_reports_json() {
    coreburn()
        .args([
            "2",
            "--duration",
            "300ms",
            "--integer-iterations",
            "1000",
            "--float-iterations",
            "1000",
            "--buffer-size",
            "1024",
            "--idle-ms",
            "1",
            "--json",
        ])
        .assert()
        .success()
        .stdout(predicates::str::contains("\"run_id\""))
        .stdout(predicates::str::contains("\"workers\""));
}

#[test]
fn test_short_run_prints_table() {
    coreburn()
        .args([
            "1",
            "--duration",
            "200ms",
            "--integer-iterations",
            "1000",
            "--float-iterations",
            "1000",
            "--buffer-size",
            "256",
            "--idle-ms",
            "1",
        ])
        .assert()
        .success()
        .stdout(predicates::str::contains("coreburn CPU Stress Report"))
        .stdout(predicates::str::contains("1 worker").and(predicates::str::contains("cycle")));
}

#[test]
fn test_config_file_is_honoured() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("coreburn.toml");
    std::fs::write(
        &path,
        "[stress]\nthread_count = 1\ninteger_iterations = 500\nfloat_iterations = 500\nbuffer_size = 128\nidle_ms = 1\nduration_secs = 1\n",
    )
    .unwrap();

    coreburn()
        .arg("--config")
        .arg(&path)
        .arg("--json")
        .assert()
        .success()
        .stdout(predicates::str::contains("\"index\": 0"));
}
