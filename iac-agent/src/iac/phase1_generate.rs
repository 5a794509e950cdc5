//! Phase 1: initial file generation

use anyhow::Result;
use iac_agent_sdk::{log_debug, log_found, log_warning};

use crate::iac::extract::BlockExtractor;
use crate::iac::prompts::generation_prompt;
use crate::iac::types::FileSet;
use crate::workflow_utils::{execute_agent, AgentConfig, Generator};

/// Generate the first candidate file set
///
/// A response without usable code blocks yields an empty set; the write and validate
/// steps then report the absence of files and the repair loop takes over.
pub async fn generate_files(
    generator: &dyn Generator,
    extractor: &BlockExtractor,
    requirement_text: &str,
    fence_lang: &str,
    debug: bool,
) -> Result<FileSet> {
    let prompt = generation_prompt(requirement_text, extractor.extension(), fence_lang);
    if debug {
        log_debug!("Generation prompt:\n{}", prompt);
    }

    let config = AgentConfig::new(
        "generate_files",
        "File Generator",
        format!("Generating {} files from requirements", extractor.extension()),
        prompt,
    );
    let response = execute_agent(generator, config).await?;

    if debug {
        log_debug!("Generation response:\n{}", response);
    }

    let files = extractor.extract(&response);
    if files.is_empty() {
        log_warning!("No files could be extracted from the generation response");
    } else {
        log_found!(files.len(), "generated files");
    }

    Ok(files)
}
