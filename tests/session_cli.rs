//! Config-driven sessions through the command layer, using fake shells.
#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use script_bench::BenchError;
use script_bench::bench::{RunArgs, execute, run};
use script_bench::core::RunStatus;
use script_bench::storage::JsonlWriter;
use tempfile::tempdir;

const GOOD_SHELL: &str = r#"#!/usr/bin/env bash
if [ "$1" = "--version" ]; then echo "v1.2.3-fake"; exit 0; fi
echo ready
while IFS= read -r line; do
  case "$line" in
    run) echo ok ;;
    quit) exit 0 ;;
  esac
done
"#;

const BROKEN_SHELL: &str = r#"#!/usr/bin/env bash
if [ "$1" = "--version" ]; then echo "v1.2.3-fake"; exit 0; fi
echo "load-error ReferenceError: ts is not defined"
"#;

fn executable(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}

fn session_dir() -> (tempfile::TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    let resources = dir.path().join("resources");
    fs::create_dir(&resources).unwrap();
    fs::write(resources.join("typescript.js"), "var ts = {};").unwrap();
    fs::write(resources.join("libPack.js"), "function getLibFileContent() {}").unwrap();

    let good = executable(dir.path(), "good.sh", GOOD_SHELL);
    let broken = executable(dir.path(), "broken.sh", BROKEN_SHELL);
    let config = dir.path().join("bench.toml");
    fs::write(
        &config,
        format!(
            r#"
warmup = 2
iterations = 3
resources = "{resources}"

[[backend]]
name = "broken"
kind = "node"
program = "{broken}"

[[backend]]
name = "good"
kind = "node"
program = "{good}"
args = "--stack-size=4000"

[[backend]]
name = "legacy"
kind = "nashorn"
program = "/nonexistent/jjs"
"#,
            resources = resources.display(),
            broken = broken.display(),
            good = good.display(),
        ),
    )
    .unwrap();
    (dir, config)
}

#[test]
fn test_config_session_isolates_failures() {
    let (_dir, config) = session_dir();
    let args = RunArgs {
        config: Some(config),
        ..Default::default()
    };

    let outcome = execute(&args).unwrap();

    assert_eq!(outcome.workload, "typescript-typecheck");
    assert_eq!(outcome.config.warmup_iterations, 2);
    let labels: Vec<&str> = outcome.results.iter().map(|r| r.status().label()).collect();
    assert_eq!(labels, vec!["failed", "completed", "unavailable"]);
    match outcome.results[0].status() {
        RunStatus::Failed { error } => assert!(error.contains("ts is not defined")),
        other => panic!("expected failed, got {other:?}"),
    }
    assert_eq!(outcome.results[1].iteration_durations().len(), 3);
    assert!(outcome.mandatory_failed.is_empty());
}

#[test]
fn test_cli_flags_override_config() {
    let (_dir, config) = session_dir();
    let args = RunArgs {
        config: Some(config),
        backends: vec!["good".into()],
        iterations: Some(5),
        parallel: true,
        ..Default::default()
    };

    let outcome = execute(&args).unwrap();

    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.results[0].iteration_durations().len(), 5);
}

#[test]
fn test_mandatory_failure_fails_session_but_writes_history() {
    let (dir, config) = session_dir();
    let jsonl = dir.path().join("out/history.jsonl");
    let args = RunArgs {
        config: Some(config),
        mandatory: vec!["broken".into()],
        jsonl: Some(jsonl.clone()),
        ..Default::default()
    };

    let err = run(args).unwrap_err();

    match &err {
        BenchError::MandatoryBackendFailed(names) => assert_eq!(names, &vec!["broken".to_string()]),
        other => panic!("unexpected error: {other}"),
    }
    let records = JsonlWriter::new(&jsonl).read_all().unwrap();
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.workload == "typescript-typecheck"));
}
