mod common;

use assert_cmd::Command;
use std::io::Write;
use tempfile::NamedTempFile;

fn manifest_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    let json = serde_json::to_string(&common::manifest()).unwrap();
    file.write_all(json.as_bytes()).unwrap();
    file
}

#[test]
fn validate_prints_rewritten_sql() {
    let file = manifest_file();
    let output = Command::cargo_bin("sqlgate")
        .unwrap()
        .args([
            "validate",
            "--manifest",
            file.path().to_str().unwrap(),
            "--user",
            "456",
            "SELECT e.first_name FROM employee AS e",
        ])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("e.id = 456"));
    assert!(stdout.contains("LIMIT 50"));
}

#[test]
fn validate_fails_on_policy_violation() {
    let file = manifest_file();
    let output = Command::cargo_bin("sqlgate")
        .unwrap()
        .args([
            "validate",
            "--manifest",
            file.path().to_str().unwrap(),
            "--user",
            "456",
            "DROP TABLE employee",
        ])
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Only SELECT"));
}

#[test]
fn validate_honors_skip_and_limit_flags() {
    let file = manifest_file();
    let output = Command::cargo_bin("sqlgate")
        .unwrap()
        .args([
            "validate",
            "--manifest",
            file.path().to_str().unwrap(),
            "--user",
            "456",
            "--skip-user-filter",
            "--limit",
            "7",
            "SELECT e.first_name FROM employee AS e",
        ])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!stdout.contains("e.id = 456"));
    assert!(stdout.contains("LIMIT 7"));
}

#[test]
fn policy_prints_scope_summary() {
    let file = manifest_file();
    let output = Command::cargo_bin("sqlgate")
        .unwrap()
        .args(["policy", "--manifest", file.path().to_str().unwrap()])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("employee (scoped by `id`)"));
    assert!(stdout.contains("GLOBAL tables"));
}
