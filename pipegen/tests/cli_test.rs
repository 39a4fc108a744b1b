//! Tests for the `pg` binary

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const VALID: &str = "PIPELINE_YAML:
pipeline:
  name: DailySales
  activities:
    - name: CopyRaw
      type: Copy
      source: { type: Lakehouse, path: Files/raw/sales.csv }
      sink: { type: Lakehouse, path: Tables/sales_raw }
  schedule: { type: Daily, interval: 1 }
";

fn pg(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("pg").unwrap();
    cmd.env("HOME", home.path()).env("XDG_DATA_HOME", home.path()).current_dir(home.path());
    cmd
}

fn write(dir: &TempDir, name: &str, body: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, body).unwrap();
    path
}

#[test]
fn test_validate_valid_artifact() {
    let dir = TempDir::new().unwrap();
    let artifact = write(&dir, "artifact.txt", VALID);

    pg(&dir)
        .arg("validate")
        .arg(&artifact)
        .assert()
        .success()
        .stdout(predicate::str::contains("Pipeline is valid"));
}

#[test]
fn test_validate_invalid_artifact_exits_nonzero() {
    let dir = TempDir::new().unwrap();
    let artifact = write(&dir, "artifact.txt", "PIPELINE_YAML:\npipeline:\n  activities: []\n");

    pg(&dir)
        .arg("validate")
        .arg(&artifact)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Pipeline is missing required field: name"));
}

#[test]
fn test_validate_json_output() {
    let dir = TempDir::new().unwrap();
    let artifact = write(&dir, "artifact.txt", VALID);

    let output = pg(&dir)
        .args(["validate", "--format", "json"])
        .arg(&artifact)
        .output()
        .unwrap();
    assert!(output.status.success());
    let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["isValid"], true);
}

#[test]
fn test_validate_strict_with_metadata() {
    let dir = TempDir::new().unwrap();
    let artifact = write(&dir, "artifact.txt", &VALID.replace("Files/raw/sales.csv", "Tables/sales_raw"));
    let metadata = write(
        &dir,
        "metadata.json",
        r#"{"lakehouses":[{"name":"bronze","tables":["orders"]}]}"#,
    );

    pg(&dir)
        .args(["validate", "--strict", "--metadata"])
        .arg(&metadata)
        .arg(&artifact)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("sales_raw"));
}

#[test]
fn test_validate_missing_file() {
    let dir = TempDir::new().unwrap();
    pg(&dir)
        .args(["validate", "does-not-exist.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read artifact"));
}
