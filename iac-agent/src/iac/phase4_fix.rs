//! Phase 4: repair from validator diagnostics

use anyhow::Result;
use iac_agent_sdk::{log_debug, log_found, log_warning};

use crate::iac::extract::BlockExtractor;
use crate::iac::prompts::fix_prompt;
use crate::iac::types::{FileSet, WorkflowState};
use crate::workflow_utils::{execute_agent, AgentConfig, Generator};

/// Ask for corrected files and re-extract them
///
/// Returns the extracted set as-is; an empty result means the caller should keep
/// the files it already has. `state.attempt_count` must already count this repair.
pub async fn fix_files(
    generator: &dyn Generator,
    extractor: &BlockExtractor,
    state: &WorkflowState,
    fence_lang: &str,
    debug: bool,
) -> Result<FileSet> {
    let prompt = fix_prompt(
        &state.requirement_text,
        &state.validation_errors,
        &state.files,
        fence_lang,
    );
    if debug {
        log_debug!("Fix prompt (attempt {}):\n{}", state.attempt_count, prompt);
    }

    let config = AgentConfig::new(
        format!("fix_errors_{}", state.attempt_count),
        format!("Error Fixer {}", state.attempt_count),
        format!(
            "Repairing {} files after failed validation (attempt {})",
            state.files.len(),
            state.attempt_count
        ),
        prompt,
    );
    let response = execute_agent(generator, config).await?;

    if debug {
        log_debug!("Fix response:\n{}", response);
    }

    let files = extractor.extract(&response);
    if files.is_empty() {
        log_warning!("Repair response contained no files, keeping the previous set");
    } else {
        log_found!(files.len(), "repaired files");
    }

    Ok(files)
}
