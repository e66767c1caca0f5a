use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn gale() -> Command {
    Command::cargo_bin("gale").unwrap()
}

fn write_scenario(dir: &TempDir, name: &str, doc: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, doc).unwrap();
    path
}

const PIPELINE: &str = r#"
name: smoke
actions:
  - name: db
    action: Service
    service:
      templateRef: templates/db
  - name: loader
    action: Service
    dependsOn:
      success: [db]
    service:
      templateRef: templates/loader
  - name: cleanup
    action: Delete
    dependsOn:
      success: [loader]
    delete:
      jobs: [db]
"#;

const SURGE: &str = r#"
name: surge
createdAt: 2024-05-01T10:00:00Z
actions:
  - name: workers
    action: Cluster
    cluster:
      templateRef: templates/worker
      instances: 5
      schedule:
        timeline:
          distribution:
            name: uniform
          totalDurationSeconds: 3600
  - name: cleanup
    action: Delete
    dependsOn:
      success: [workers]
    delete:
      jobs: [workers]
"#;

// ---------------------------------------------------------------------------
// gale validate
// ---------------------------------------------------------------------------

#[test]
fn validate_accepts_a_well_formed_pipeline() {
    let dir = TempDir::new().unwrap();
    let file = write_scenario(&dir, "smoke.yaml", PIPELINE);

    gale()
        .arg("validate")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("smoke (valid)"))
        .stdout(predicate::str::contains("loader"));
}

#[test]
fn validate_json_output() {
    let dir = TempDir::new().unwrap();
    let file = write_scenario(&dir, "smoke.yaml", PIPELINE);

    let output = gale()
        .arg("validate")
        .arg(&file)
        .arg("--json")
        .assert()
        .success();

    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(parsed["scenario"], "smoke");
    assert_eq!(parsed["valid"], true);
    assert_eq!(parsed["actions"], 3);
}

#[test]
fn validate_rejects_unbounded_scenarios() {
    let dir = TempDir::new().unwrap();
    let file = write_scenario(
        &dir,
        "forever.yaml",
        r#"
name: forever
actions:
  - name: db
    action: Service
    service:
      templateRef: templates/db
"#,
    );

    gale()
        .arg("validate")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unbounded execution"));
}

#[test]
fn validate_rejects_forward_references() {
    let dir = TempDir::new().unwrap();
    let file = write_scenario(
        &dir,
        "forward.yaml",
        r#"
name: forward
actions:
  - name: loader
    action: Service
    dependsOn:
      success: [db]
    service:
      templateRef: templates/loader
  - name: db
    action: Service
    service:
      templateRef: templates/db
"#,
    );

    gale()
        .arg("validate")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid success dependency"));
}

#[test]
fn validate_reports_missing_files() {
    gale()
        .arg("validate")
        .arg("no-such-scenario.yaml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read"));
}

// ---------------------------------------------------------------------------
// gale graph
// ---------------------------------------------------------------------------

#[test]
fn graph_lists_edges_in_declaration_order() {
    let dir = TempDir::new().unwrap();
    let file = write_scenario(&dir, "smoke.yaml", PIPELINE);

    gale()
        .arg("graph")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("db -> loader -> cleanup"))
        .stdout(predicate::str::contains("delete"));
}

#[test]
fn graph_json_output() {
    let dir = TempDir::new().unwrap();
    let file = write_scenario(&dir, "smoke.yaml", PIPELINE);

    let output = gale()
        .arg("graph")
        .arg(&file)
        .arg("--json")
        .assert()
        .success();

    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let edges = parsed["edges"].as_array().unwrap();
    assert_eq!(edges.len(), 3);
    assert!(edges
        .iter()
        .any(|e| e["kind"] == "delete" && e["dependency"] == "db"));
}

// ---------------------------------------------------------------------------
// gale timeline
// ---------------------------------------------------------------------------

#[test]
fn timeline_spreads_uniform_instances_evenly() {
    let dir = TempDir::new().unwrap();
    let file = write_scenario(&dir, "surge.yaml", SURGE);

    gale()
        .arg("timeline")
        .arg(&file)
        .assert()
        .success()
        // Weights sit right-aligned under the WEIGHT header.
        .stdout(predicate::str::contains("  0.20  2024-"))
        .stdout(predicate::str::contains("2024-05-01T11:00:00"));
}

#[test]
fn timeline_json_weights_sum_to_one() {
    let dir = TempDir::new().unwrap();
    let file = write_scenario(&dir, "surge.yaml", SURGE);

    let output = gale()
        .arg("timeline")
        .arg(&file)
        .arg("--action")
        .arg("workers")
        .arg("--json")
        .assert()
        .success();

    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let weights: Vec<f64> = parsed["weights"]
        .as_array()
        .unwrap()
        .iter()
        .map(|w| w.as_f64().unwrap())
        .collect();
    assert_eq!(weights.len(), 5);
    assert!((weights.iter().sum::<f64>() - 1.0).abs() < 0.05);
}

#[test]
fn timeline_requires_a_timeline_policy() {
    let dir = TempDir::new().unwrap();
    let file = write_scenario(&dir, "smoke.yaml", PIPELINE);

    gale()
        .arg("timeline")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("no action with a timeline"));
}
