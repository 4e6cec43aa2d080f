//! CLI smoke tests

use assert_cmd::Command;

#[test]
fn test_help() {
    Command::cargo_bin("trajlens")
        .unwrap()
        .arg("--help")
        .assert()
        .success();
}

#[test]
fn test_list_empty_store() {
    let dir = tempfile::tempdir().unwrap();
    Command::cargo_bin("trajlens")
        .unwrap()
        .arg("--store-root")
        .arg(dir.path())
        .arg("list")
        .assert()
        .success()
        .stdout("No log files found.\n");
}

#[test]
fn test_unknown_format_fails() {
    let dir = tempfile::tempdir().unwrap();
    Command::cargo_bin("trajlens")
        .unwrap()
        .arg("--format")
        .arg("yaml")
        .arg("--store-root")
        .arg(dir.path())
        .arg("list")
        .assert()
        .failure();
}
