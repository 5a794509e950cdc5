//! Phase 5: user-facing report

use crate::iac::types::WorkflowState;

/// Render the terminal report for a finished run
///
/// Pure: reads the state only. `fence_lang` tags the code blocks in the success report.
pub fn summarize(state: &WorkflowState, fence_lang: &str) -> String {
    if state.files_valid {
        success_report(state, fence_lang)
    } else {
        failure_report(state)
    }
}

fn written_paths_list(state: &WorkflowState) -> String {
    if state.written_paths.is_empty() {
        return "(no files were written)".to_string();
    }
    state
        .written_paths
        .iter()
        .map(|path| format!("- {}", path.display()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn success_report(state: &WorkflowState, fence_lang: &str) -> String {
    let mut report = String::from("✅ Infrastructure code generated and validated successfully!");
    if state.attempt_count > 0 {
        let plural = if state.attempt_count == 1 { "" } else { "s" };
        report.push_str(&format!(
            " (after {} fix attempt{})",
            state.attempt_count, plural
        ));
    }

    report.push_str("\n\n**Files written:**\n");
    report.push_str(&written_paths_list(state));

    if let Some(dir) = &state.workspace_dir {
        report.push_str(&format!("\n\n**Workspace:** {}", dir.display()));
    }

    report.push_str("\n\n**Generated code:**");
    for file in &state.files {
        report.push_str(&format!(
            "\n\n### {}\n```{}\n{}\n```",
            file.name, fence_lang, file.content
        ));
    }

    report
}

fn failure_report(state: &WorkflowState) -> String {
    let mut report = format!(
        "❌ Validation still failing after {} fix attempt{}.",
        state.attempt_count,
        if state.attempt_count == 1 { "" } else { "s" }
    );

    if state
        .validation_failure
        .is_some_and(|kind| kind.is_environment_failure())
    {
        report.push_str(
            "\nThe last failure came from the validation environment, not the generated files.",
        );
    }

    report.push_str("\n\n**Last validation errors:**\n```\n");
    report.push_str(&state.validation_errors);
    report.push_str("\n```");

    report.push_str("\n\n**Files written (may be invalid):**\n");
    report.push_str(&written_paths_list(state));

    report.push_str(
        "\n\nPlease review the errors above, revise your requirements with more detail, and try again.",
    );
    report
}
