#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;

fn clusterflow() -> Command {
    let mut cmd = Command::cargo_bin("clusterflow").unwrap();
    cmd.env_remove("AWS_ACCESS_KEY_ID")
        .env_remove("AWS_SECRET_ACCESS_KEY")
        .env_remove("CLUSTERFLOW_IDENTITY_FILE")
        .env_remove("CLUSTERFLOW_DEPLOY_DIR");
    cmd
}

/// Help lists the actions and options
#[test]
fn test_cli_help() {
    clusterflow()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("get-master"))
        .stdout(predicate::str::contains("--identity-file"))
        .stdout(predicate::str::contains("--ebs-vol-size"));
}

/// A missing cluster name is a usage error
#[test]
fn test_missing_cluster_name_is_usage_error() {
    clusterflow()
        .arg("launch")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("CLUSTER_NAME"));
}

/// An unknown action is rejected
#[test]
fn test_unknown_action() {
    clusterflow()
        .args(["reboot", "demo"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid action: reboot"));
}

/// shutdown points to its replacements
#[test]
fn test_shutdown_points_to_replacements() {
    // reported before credentials are looked at
    clusterflow()
        .args(["shutdown", "demo"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no longer available"))
        .stderr(predicate::str::contains("destroy"));
}

/// Launch without an identity file fails
#[test]
fn test_launch_requires_identity_file() {
    clusterflow()
        .args(["launch", "demo"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("identity file"));
}

/// Launching zero slaves is rejected
#[test]
fn test_launch_rejects_zero_slaves() {
    clusterflow()
        .args(["launch", "demo", "-i", "/tmp/key.pem", "-s", "0"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("slaves"));
}

/// Missing credentials name the variable
#[test]
fn test_missing_credentials() {
    clusterflow()
        .args(["get-master", "demo"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("AWS_ACCESS_KEY_ID"));
}

/// An empty secret key counts as missing
#[test]
fn test_empty_secret_counts_as_missing() {
    clusterflow()
        .args(["destroy", "demo"])
        .env("AWS_ACCESS_KEY_ID", "AKIDEXAMPLE")
        .env("AWS_SECRET_ACCESS_KEY", "")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("AWS_SECRET_ACCESS_KEY"));
}

/// An unknown download source is rejected
#[test]
fn test_invalid_download_source() {
    clusterflow()
        .args(["get-master", "demo", "-d", "svn"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("svn"));
}
