//! External validator adapter tests
//!
//! A shell script stands in for the real tool. It receives the same subcommands
//! (`init ...`, `validate ...`) and runs inside the workspace directory.

#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempDir;

use iac_agent::iac::{FailureKind, TerraformValidator, Validator, ValidatorConfig};

/// Write a fake tool script and return a validator that runs it through `sh`
fn fake_tool(dir: &Path, body: &str, timeout_secs: u64) -> TerraformValidator {
    let script = dir.join("fake_tool.sh");
    std::fs::write(&script, body).unwrap();
    TerraformValidator::new(
        ValidatorConfig {
            program: "sh".to_string(),
            prefix_args: vec![script.to_string_lossy().into_owned()],
            timeout_secs,
        },
        ".tf",
    )
}

/// A workspace with one configuration file
fn workspace(root: &Path) -> PathBuf {
    let dir = root.join("workspace");
    std::fs::create_dir(&dir).unwrap();
    std::fs::write(dir.join("main.tf"), "resource \"null_resource\" \"x\" {}\n").unwrap();
    dir
}

#[tokio::test]
async fn test_both_phases_succeed() {
    let tmp = TempDir::new().unwrap();
    let validator = fake_tool(tmp.path(), "touch \"ran_$1\"\nexit 0\n", 10);
    let dir = workspace(tmp.path());

    let outcome = validator.validate(Some(&dir)).await;

    assert!(outcome.passed, "{}", outcome.diagnostic_text);
    assert!(outcome.diagnostic_text.is_empty());
    assert_eq!(outcome.failure, None);
    // Both subcommands ran inside the workspace
    assert!(dir.join("ran_init").exists());
    assert!(dir.join("ran_validate").exists());
}

#[tokio::test]
async fn test_init_failure_skips_validate() {
    let tmp = TempDir::new().unwrap();
    let script = r#"touch "ran_$1"
if [ "$1" = "init" ]; then
  echo "Error: Failed to query available provider packages" >&2
  exit 1
fi
exit 0
"#;
    let validator = fake_tool(tmp.path(), script, 10);
    let dir = workspace(tmp.path());

    let outcome = validator.validate(Some(&dir)).await;

    assert!(!outcome.passed);
    assert_eq!(outcome.failure, Some(FailureKind::InitFailed));
    assert_eq!(
        outcome.diagnostic_text,
        "sh init failed:\nError: Failed to query available provider packages"
    );
    assert!(!dir.join("ran_validate").exists());
}

#[tokio::test]
async fn test_validate_failure_falls_back_to_stdout() {
    let tmp = TempDir::new().unwrap();
    let script = r#"if [ "$1" = "validate" ]; then
  echo "Error: Reference to undeclared input variable"
  exit 1
fi
exit 0
"#;
    let validator = fake_tool(tmp.path(), script, 10);
    let dir = workspace(tmp.path());

    let outcome = validator.validate(Some(&dir)).await;

    assert_eq!(outcome.failure, Some(FailureKind::CheckFailed));
    assert_eq!(
        outcome.diagnostic_text,
        "sh validate failed:\nError: Reference to undeclared input variable"
    );
}

#[tokio::test]
async fn test_subcommand_flags_are_passed() {
    let tmp = TempDir::new().unwrap();
    let script = r#"echo "$@" >> args.log
exit 0
"#;
    let validator = fake_tool(tmp.path(), script, 10);
    let dir = workspace(tmp.path());

    assert!(validator.validate(Some(&dir)).await.passed);

    let log = std::fs::read_to_string(dir.join("args.log")).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(
        lines,
        vec!["init -backend=false -input=false -no-color", "validate -no-color"]
    );
}

#[tokio::test]
async fn test_hanging_tool_times_out() {
    let tmp = TempDir::new().unwrap();
    let validator = fake_tool(tmp.path(), "sleep 30\n", 1);
    let dir = workspace(tmp.path());

    let started = Instant::now();
    let outcome = validator.validate(Some(&dir)).await;

    assert_eq!(outcome.failure, Some(FailureKind::TimedOut));
    assert!(outcome.diagnostic_text.contains("init timed out after 1s"));
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn test_empty_workspace_never_runs_tool() {
    let tmp = TempDir::new().unwrap();
    let validator = fake_tool(tmp.path(), "touch \"ran_$1\"\nexit 0\n", 10);
    let dir = tmp.path().join("empty");
    std::fs::create_dir(&dir).unwrap();

    let outcome = validator.validate(Some(&dir)).await;

    assert_eq!(outcome.failure, Some(FailureKind::MissingInput));
    assert!(!dir.join("ran_init").exists());
}

#[tokio::test]
async fn test_missing_tool_is_environment_failure() {
    let tmp = TempDir::new().unwrap();
    let dir = workspace(tmp.path());
    let validator = TerraformValidator::new(
        ValidatorConfig {
            program: "iac-agent-missing-validator".to_string(),
            ..Default::default()
        },
        ".tf",
    );

    let outcome = validator.validate(Some(&dir)).await;

    assert_eq!(outcome.failure, Some(FailureKind::ToolNotFound));
    assert!(outcome.failure.unwrap().is_environment_failure());
    assert!(outcome
        .diagnostic_text
        .starts_with("iac-agent-missing-validator CLI not found"));
}
