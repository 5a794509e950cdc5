//! Repair loop controller tests

use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use iac_agent::iac::{
    GateError, IacWorkflow, Node, ProgressEvent, RepairPolicy, StepOutcome, Terminal,
    WorkflowError,
};

use super::common::*;

#[tokio::test]
async fn test_first_try_success() {
    let tmp = TempDir::new().unwrap();
    let generator = Arc::new(ScriptedGenerator::new(VALID_GATE, MAIN_AND_VARS_TF));
    let validator = Arc::new(ScriptedValidator::always_pass());
    let workflow = build_workflow(tmp.path(), generator.clone(), validator.clone());

    let result = workflow.run("web server", &CancellationToken::new()).await.unwrap();

    assert_eq!(result.terminal, Terminal::Succeeded);
    assert_eq!(result.state.attempt_count, 0);
    assert_eq!(result.state.validation_rounds, 1);
    assert!(result.state.requirements_valid);
    assert!(result.state.files_valid);
    assert_eq!(result.state.files.names(), vec!["main.tf", "variables.tf"]);
    assert_eq!(result.state.written_paths.len(), 2);
    assert!(result.state.final_message.starts_with("✅"));
    assert!(!result.state.final_message.contains("fix attempt"));
    assert_eq!(generator.count(PromptKind::Fix), 0);
    assert_eq!(
        validator.seen_files.lock().unwrap()[0],
        vec!["main.tf", "variables.tf"]
    );
}

#[tokio::test]
async fn test_always_failing_validator_exhausts_ceiling() {
    let tmp = TempDir::new().unwrap();
    let generator = Arc::new(ScriptedGenerator::new(VALID_GATE, MAIN_TF));
    let validator = Arc::new(ScriptedValidator::always_fail());
    let workflow = build_workflow(tmp.path(), generator.clone(), validator.clone());

    let result = workflow.run("web server", &CancellationToken::new()).await.unwrap();

    assert_eq!(result.terminal, Terminal::Exhausted);
    assert_eq!(result.state.attempt_count, 3);
    assert_eq!(result.state.validation_rounds, 4);
    assert!(!result.state.files_valid);
    assert_eq!(generator.count(PromptKind::Gate), 1);
    assert_eq!(generator.count(PromptKind::Generate), 1);
    assert_eq!(generator.count(PromptKind::Fix), 3);
    assert_eq!(validator.calls(), 4);

    let report = &result.state.final_message;
    assert!(report.starts_with("❌"));
    assert!(report.contains("terraform validate failed:\nError: Unsupported argument"));
    assert!(report.contains("main.tf"));
}

#[tokio::test]
async fn test_success_after_two_repairs() {
    let tmp = TempDir::new().unwrap();
    let generator = Arc::new(ScriptedGenerator::new(VALID_GATE, MAIN_TF));
    let validator = Arc::new(ScriptedValidator::fail_then_pass(2));
    let workflow = build_workflow(tmp.path(), generator.clone(), validator.clone());

    let result = workflow.run("web server", &CancellationToken::new()).await.unwrap();

    assert_eq!(result.terminal, Terminal::Succeeded);
    assert_eq!(result.state.attempt_count, 2);
    assert_eq!(result.state.validation_rounds, 3);
    assert_eq!(generator.count(PromptKind::Fix), 2);
    assert!(result.state.final_message.contains("(after 2 fix attempts)"));
}

#[tokio::test]
async fn test_fix_prompt_carries_latest_diagnostics_and_files() {
    let tmp = TempDir::new().unwrap();
    let generator = Arc::new(ScriptedGenerator::new(VALID_GATE, MAIN_TF));
    let validator = Arc::new(ScriptedValidator::fail_then_pass(2));
    let workflow = build_workflow(tmp.path(), generator.clone(), validator);

    workflow.run("web server", &CancellationToken::new()).await.unwrap();

    let fixes = generator.prompts(PromptKind::Fix);
    assert_eq!(fixes.len(), 2);
    assert!(fixes[0].contains("Error: round 1"));
    assert!(fixes[1].contains("Error: round 2"));
    assert!(!fixes[1].contains("Error: round 1"));
    assert!(fixes[0].contains("# main.tf\n```hcl\nresource \"aws_instance\" \"web\""));
    assert!(fixes[0].contains("web server"));
}

#[tokio::test]
async fn test_gate_rejection_short_circuits() {
    let tmp = TempDir::new().unwrap();
    let gate = "validation_result: NOT_VALID\nerrors:\n- Both AWS and GCP requested for the same VM";
    let generator = Arc::new(ScriptedGenerator::new(gate, MAIN_TF));
    let validator = Arc::new(ScriptedValidator::always_pass());
    let output = tmp.path().join("out");
    let workflow = build_workflow(&output, generator.clone(), validator.clone());

    let result = workflow.run("vm on aws and gcp", &CancellationToken::new()).await.unwrap();

    assert_eq!(result.terminal, Terminal::Rejected);
    assert!(!result.state.requirements_valid);
    assert_eq!(result.state.requirements_errors, gate);
    assert_eq!(result.state.final_message, gate);
    assert_eq!(generator.total_calls(), 1);
    assert_eq!(validator.calls(), 0);
    assert!(!output.exists());
}

#[tokio::test]
async fn test_ambiguous_gate_verdict_is_hard_error() {
    let tmp = TempDir::new().unwrap();
    let generator = Arc::new(ScriptedGenerator::new("Sure, sounds good!", MAIN_TF));
    let validator = Arc::new(ScriptedValidator::always_pass());
    let workflow = build_workflow(tmp.path(), generator.clone(), validator.clone());

    let err = workflow
        .run("web server", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        WorkflowError::Gate(GateError::AmbiguousVerdict { .. })
    ));
    assert_eq!(generator.total_calls(), 1);
    assert_eq!(validator.calls(), 0);
}

#[tokio::test]
async fn test_generation_transport_error_is_hard_failure() {
    let tmp = TempDir::new().unwrap();
    let generator = Arc::new(
        ScriptedGenerator::new(VALID_GATE, MAIN_TF).failing_generation("API error 500"),
    );
    let validator = Arc::new(ScriptedValidator::always_pass());
    let workflow = build_workflow(tmp.path(), generator, validator.clone());

    let err = workflow
        .run("web server", &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        WorkflowError::Generation { node, source } => {
            assert_eq!(node, Node::Generate);
            assert!(source.to_string().contains("API error 500"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(validator.calls(), 0);
}

#[tokio::test]
async fn test_empty_generation_still_writes_and_validates() {
    let tmp = TempDir::new().unwrap();
    let generator = Arc::new(
        ScriptedGenerator::new(VALID_GATE, "I'm not sure what you want.").with_fixes(&[MAIN_TF]),
    );
    let validator = Arc::new(ScriptedValidator::fail_then_pass(1));
    let workflow = build_workflow(tmp.path(), generator, validator.clone());

    let result = workflow.run("web server", &CancellationToken::new()).await.unwrap();

    assert_eq!(result.terminal, Terminal::Succeeded);
    let seen = validator.seen_files.lock().unwrap().clone();
    assert!(seen[0].is_empty());
    assert_eq!(seen[1], vec!["main.tf"]);
}

#[tokio::test]
async fn test_empty_repair_keeps_previous_files() {
    let tmp = TempDir::new().unwrap();
    let generator = Arc::new(
        ScriptedGenerator::new(VALID_GATE, MAIN_AND_VARS_TF)
            .with_fixes(&["I could not find anything to change."]),
    );
    let validator = Arc::new(ScriptedValidator::fail_then_pass(1));
    let observer = Arc::new(RecordingObserver::default());
    let workflow =
        build_workflow(tmp.path(), generator, validator.clone()).with_observer(observer.clone());

    let result = workflow.run("web server", &CancellationToken::new()).await.unwrap();

    assert_eq!(result.terminal, Terminal::Succeeded);
    assert_eq!(result.state.files.names(), vec!["main.tf", "variables.tf"]);
    assert_eq!(
        validator.seen_files.lock().unwrap()[1],
        vec!["main.tf", "variables.tf"]
    );
    assert!(observer.exited.lock().unwrap().iter().any(|(_, outcome)| {
        *outcome
            == StepOutcome::Repaired {
                files: 2,
                kept_previous: true,
            }
    }));
}

#[tokio::test]
async fn test_repaired_files_replace_previous_set() {
    let tmp = TempDir::new().unwrap();
    let generator =
        Arc::new(ScriptedGenerator::new(VALID_GATE, MAIN_AND_VARS_TF).with_fixes(&[MAIN_TF]));
    let validator = Arc::new(ScriptedValidator::fail_then_pass(1));
    let workflow = build_workflow(tmp.path(), generator, validator.clone());

    let result = workflow.run("web server", &CancellationToken::new()).await.unwrap();

    assert_eq!(result.state.files.names(), vec!["main.tf"]);
    assert_eq!(validator.seen_files.lock().unwrap()[1], vec!["main.tf"]);
}

#[tokio::test]
async fn test_each_round_gets_a_fresh_attempt_directory() {
    let tmp = TempDir::new().unwrap();
    let generator = Arc::new(ScriptedGenerator::new(VALID_GATE, MAIN_TF));
    let validator = Arc::new(ScriptedValidator::always_fail());
    let workflow = build_workflow(tmp.path(), generator, validator.clone());

    let result = workflow.run("web server", &CancellationToken::new()).await.unwrap();

    let dirs = validator.dirs();
    assert_eq!(dirs.len(), 4);
    let names: Vec<String> = dirs
        .iter()
        .map(|d| d.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert!(!names[0].contains("_attempt"));
    assert!(names[1].ends_with("_attempt1"));
    assert!(names[2].ends_with("_attempt2"));
    assert!(names[3].ends_with("_attempt3"));
    assert!(names.iter().all(|n| n.contains(&result.state.run_id)));
    assert!(dirs.iter().all(|d| d.starts_with(tmp.path())));
    assert_eq!(result.state.workspace_dir.as_ref(), dirs.last());
}

#[tokio::test]
async fn test_unwritable_output_dir_reports_missing_workspace() {
    let tmp = TempDir::new().unwrap();
    let blocker = tmp.path().join("blocker");
    std::fs::write(&blocker, "file, not a directory").unwrap();

    let generator = Arc::new(ScriptedGenerator::new(VALID_GATE, MAIN_TF));
    let validator = Arc::new(ScriptedValidator::always_fail());
    let workflow = build_workflow(&blocker, generator, validator.clone())
        .with_policy(RepairPolicy::new(0));

    let result = workflow.run("web server", &CancellationToken::new()).await.unwrap();

    assert_eq!(result.terminal, Terminal::Exhausted);
    assert_eq!(result.state.workspace_dir, None);
    assert!(result.state.written_paths.is_empty());
    assert_eq!(*validator.seen_dirs.lock().unwrap(), vec![None]);
}

#[tokio::test]
async fn test_custom_policy_limits_repairs() {
    let tmp = TempDir::new().unwrap();
    let generator = Arc::new(ScriptedGenerator::new(VALID_GATE, MAIN_TF));
    let validator = Arc::new(ScriptedValidator::always_fail());
    let workflow = build_workflow(tmp.path(), generator.clone(), validator.clone())
        .with_policy(RepairPolicy::new(1));

    let result = workflow.run("web server", &CancellationToken::new()).await.unwrap();

    assert_eq!(result.terminal, Terminal::Exhausted);
    assert_eq!(result.state.attempt_count, 1);
    assert_eq!(validator.calls(), 2);
    assert_eq!(generator.count(PromptKind::Fix), 1);
}

#[tokio::test]
async fn test_process_stream_reports_each_node() {
    let tmp = TempDir::new().unwrap();
    let generator = Arc::new(ScriptedGenerator::new(VALID_GATE, MAIN_TF));
    let validator = Arc::new(ScriptedValidator::fail_then_pass(1));
    let workflow = build_workflow(tmp.path(), generator, validator);

    let events: Vec<ProgressEvent> = workflow
        .process("web server".to_string(), CancellationToken::new())
        .map(|event| event.unwrap())
        .collect()
        .await;

    let nodes: Vec<Node> = events
        .iter()
        .filter_map(|event| match event {
            ProgressEvent::NodeCompleted { node, .. } => Some(*node),
            ProgressEvent::Finished { .. } => None,
        })
        .collect();
    assert_eq!(
        nodes,
        vec![
            Node::Gate,
            Node::Generate,
            Node::Write,
            Node::Validate,
            Node::Fix,
            Node::Write,
            Node::Validate,
            Node::Finalize,
        ]
    );
    assert_eq!(events[0].to_string(), "🔄 **Validate Requirements**");

    match events.last().unwrap() {
        ProgressEvent::Finished { terminal, report } => {
            assert_eq!(*terminal, Terminal::Succeeded);
            assert!(report.contains("(after 1 fix attempt)"));
        }
        other => panic!("expected Finished, got {:?}", other),
    }
}

#[tokio::test]
async fn test_process_stream_for_rejection() {
    let tmp = TempDir::new().unwrap();
    let generator = Arc::new(ScriptedGenerator::new("NOT_VALID: no region", MAIN_TF));
    let validator = Arc::new(ScriptedValidator::always_pass());
    let workflow = build_workflow(tmp.path(), generator, validator);

    let events: Vec<_> = workflow
        .process("something".to_string(), CancellationToken::new())
        .collect()
        .await;

    assert_eq!(events.len(), 2);
    assert_eq!(
        events[1].as_ref().unwrap(),
        &ProgressEvent::Finished {
            terminal: Terminal::Rejected,
            report: "NOT_VALID: no region".to_string(),
        }
    );
}

#[tokio::test]
async fn test_observers_see_every_node() {
    let tmp = TempDir::new().unwrap();
    let generator = Arc::new(ScriptedGenerator::new(VALID_GATE, MAIN_TF));
    let validator = Arc::new(ScriptedValidator::always_pass());
    let observer = Arc::new(RecordingObserver::default());
    let workflow =
        build_workflow(tmp.path(), generator, validator).with_observer(observer.clone());

    workflow.run("web server", &CancellationToken::new()).await.unwrap();

    let entered = observer.entered.lock().unwrap().clone();
    let exited: Vec<Node> = observer
        .exited
        .lock()
        .unwrap()
        .iter()
        .map(|(node, _)| *node)
        .collect();
    assert_eq!(
        entered,
        vec![
            Node::Gate,
            Node::Generate,
            Node::Write,
            Node::Validate,
            Node::Finalize
        ]
    );
    assert_eq!(entered, exited);
    assert!(observer.errors.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let tmp = TempDir::new().unwrap();
    let generator = Arc::new(ScriptedGenerator::new(VALID_GATE, MAIN_TF));
    let validator = Arc::new(ScriptedValidator::always_pass());
    let workflow = build_workflow(tmp.path(), generator.clone(), validator);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = workflow.run("web server", &cancel).await.unwrap_err();

    assert!(matches!(err, WorkflowError::Cancelled(Node::Gate)));
    assert_eq!(generator.total_calls(), 0);
}

#[tokio::test]
async fn test_cancel_interrupts_in_flight_call() {
    let tmp = TempDir::new().unwrap();
    let generator = Arc::new(
        ScriptedGenerator::new(VALID_GATE, MAIN_TF).with_delay(Duration::from_secs(30)),
    );
    let validator = Arc::new(ScriptedValidator::always_pass());
    let observer = Arc::new(RecordingObserver::default());
    let workflow =
        build_workflow(tmp.path(), generator, validator).with_observer(observer.clone());

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let err = workflow.run("web server", &cancel).await.unwrap_err();

    assert!(matches!(err, WorkflowError::Cancelled(Node::Gate)));
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(observer.errors.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_step_by_step_driving() {
    let tmp = TempDir::new().unwrap();
    let generator = Arc::new(ScriptedGenerator::new(VALID_GATE, MAIN_TF));
    let validator = Arc::new(ScriptedValidator::always_pass());
    let workflow: IacWorkflow = build_workflow(tmp.path(), generator, validator);
    let cancel = CancellationToken::new();

    let mut run = workflow.start("web server");
    assert_eq!(run.next_node(), Some(Node::Gate));

    let (node, outcome) = run.step(&cancel).await.unwrap().unwrap();
    assert_eq!(node, Node::Gate);
    assert_eq!(outcome, StepOutcome::Admitted);
    assert_eq!(run.next_node(), Some(Node::Generate));

    while run.step(&cancel).await.unwrap().is_some() {}
    assert_eq!(run.terminal(), Some(Terminal::Succeeded));
    assert!(run.step(&cancel).await.unwrap().is_none());

    let result = run.finish().unwrap();
    assert_eq!(result.terminal, Terminal::Succeeded);
}

#[tokio::test]
async fn test_concurrent_runs_use_disjoint_directories() {
    let tmp = TempDir::new().unwrap();
    let generator = Arc::new(ScriptedGenerator::new(VALID_GATE, MAIN_TF));
    let validator = Arc::new(ScriptedValidator::fail_then_pass(1));
    let workflow = build_workflow(tmp.path(), generator, validator.clone());
    let cancel = CancellationToken::new();

    let runs = (0..8).map(|i| workflow.run(format!("server {}", i), &cancel));
    let results = futures::future::join_all(runs).await;

    let mut run_ids: Vec<String> = results
        .into_iter()
        .map(|r| r.unwrap().state.run_id)
        .collect();
    run_ids.sort();
    run_ids.dedup();
    assert_eq!(run_ids.len(), 8);

    let mut dirs = validator.dirs();
    let total = dirs.len();
    dirs.sort();
    dirs.dedup();
    assert_eq!(dirs.len(), total);
}
