//! Integration tests for the `entitle` CLI binary.
//!
//! These validate argument parsing, help output, and the local certificate
//! commands — nothing here needs a live registration server.
#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `entitle` binary with env isolation.
fn entitle_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("entitle");
    cmd.env_remove("ENTITLE_URL")
        .env_remove("ENTITLE_INSECURE")
        .env_remove("ENTITLE_TIMEOUT");
    cmd
}

// A PEM wrapping the DER bytes `abc`; fingerprints are pure functions of
// those bytes, so the expected digests are stable.
const TEST_PEM: &str = "-----BEGIN CERTIFICATE-----\nYWJj\n-----END CERTIFICATE-----\n";
const TEST_SHA1: &str = "A9:99:3E:36:47:06:81:6A:BA:3E:25:71:78:50:C2:6C:9C:D0:D8:9D";

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_usage() {
    let output = entitle_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "expected exit code 2");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Usage"), "expected 'Usage' in:\n{stderr}");
}

#[test]
fn test_help_lists_commands() {
    entitle_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("register")
            .and(predicate::str::contains("deregister"))
            .and(predicate::str::contains("status"))
            .and(predicate::str::contains("cert")),
    );
}

#[test]
fn test_unknown_command_fails_with_usage_code() {
    entitle_cmd().arg("frobnicate").assert().code(2);
}

#[test]
fn test_register_requires_regcode() {
    entitle_cmd().arg("register").assert().code(2).stderr(
        predicate::str::contains("--regcode"),
    );
}

// ── Certificate commands ────────────────────────────────────────────

#[test]
fn test_cert_fingerprint_prints_both_digests() {
    let dir = tempfile::tempdir().unwrap();
    let cert_path = dir.path().join("server.pem");
    std::fs::write(&cert_path, TEST_PEM).unwrap();

    entitle_cmd()
        .args(["cert", "fingerprint"])
        .arg(&cert_path)
        .assert()
        .success()
        .stdout(
            predicate::str::contains(TEST_SHA1).and(predicate::str::contains("SHA256:")),
        );
}

#[test]
fn test_cert_fingerprint_json_output() {
    let dir = tempfile::tempdir().unwrap();
    let cert_path = dir.path().join("server.pem");
    std::fs::write(&cert_path, TEST_PEM).unwrap();

    let output = entitle_cmd()
        .args(["--json", "cert", "fingerprint"])
        .arg(&cert_path)
        .output()
        .unwrap();
    assert!(output.status.success());

    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["sha1"], TEST_SHA1);
    assert_eq!(parsed["sha256"].as_str().unwrap().len(), 32 * 3 - 1);
}

#[test]
fn test_cert_fingerprint_missing_file_fails() {
    entitle_cmd()
        .args(["cert", "fingerprint", "/nonexistent/server.pem"])
        .assert()
        .failure();
}
