//! Phase 3: external validation
//!
//! Runs `<tool> init -backend=false` followed by `<tool> validate` inside the
//! workspace directory. Each subprocess is bounded by the configured timeout and
//! killed when it expires. The validator never retries internally; every failure
//! becomes a [`ValidationOutcome`] that feeds the next repair round.

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::fs;
use tokio::process::Command;

use iac_agent_sdk::{async_trait, log_info};

use crate::iac::config::ValidatorConfig;
use crate::iac::extract::normalize_extension;
use crate::iac::types::{FailureKind, ValidationOutcome};

/// Checks a workspace directory
#[async_trait]
pub trait Validator: Send + Sync {
    /// `None` means the write step could not create a workspace
    async fn validate(&self, workspace_dir: Option<&Path>) -> ValidationOutcome;
}

pub const NO_OUTPUT_DIR: &str = "No output directory found";

const INIT_ARGS: &[&str] = &["init", "-backend=false", "-input=false", "-no-color"];
const VALIDATE_ARGS: &[&str] = &["validate", "-no-color"];

/// Why a subprocess did not produce an exit status
#[derive(Debug)]
enum PhaseError {
    TimedOut,
    NotFound,
    Io(std::io::Error),
}

/// Terraform-style CLI validator (`terraform`, `tofu`, or a stand-in)
#[derive(Debug, Clone)]
pub struct TerraformValidator {
    config: ValidatorConfig,
    extension: String,
}

impl TerraformValidator {
    pub fn new(config: ValidatorConfig, extension: &str) -> Self {
        Self {
            config,
            extension: normalize_extension(extension),
        }
    }

    /// Display name of the tool, e.g. `terraform` for `/usr/bin/terraform`
    fn tool_name(&self) -> String {
        Path::new(&self.config.program)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.config.program.clone())
    }

    fn not_found_message(&self) -> String {
        let tool = self.tool_name();
        format!(
            "{tool} CLI not found. Please install {tool} and make sure it is on PATH. \
             This is an environment problem; regenerating the files cannot fix it."
        )
    }

    /// Count files with the target extension directly inside `dir`
    async fn count_config_files(&self, dir: &Path) -> std::io::Result<usize> {
        let mut count = 0;
        let mut entries = fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if name.to_string_lossy().ends_with(&self.extension)
                && entry.file_type().await?.is_file()
            {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn run_phase(
        &self,
        program: &Path,
        dir: &Path,
        args: &[&str],
        timeout: Duration,
    ) -> Result<Output, PhaseError> {
        let mut cmd = Command::new(program);
        cmd.args(&self.config.prefix_args)
            .args(args)
            .current_dir(dir)
            .env("TF_IN_AUTOMATION", "1")
            .kill_on_drop(true)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let child = cmd.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PhaseError::NotFound,
            _ => PhaseError::Io(e),
        })?;

        // Dropping the wait future on expiry drops the child, which kills it
        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(PhaseError::Io(e)),
            Err(_) => Err(PhaseError::TimedOut),
        }
    }

    fn phase_failure(&self, phase: &str, err: PhaseError) -> ValidationOutcome {
        match err {
            PhaseError::TimedOut => ValidationOutcome::fail(
                FailureKind::TimedOut,
                format!(
                    "{} {} timed out after {}s",
                    self.tool_name(),
                    phase,
                    self.config.timeout_secs
                ),
            ),
            PhaseError::NotFound => {
                ValidationOutcome::fail(FailureKind::ToolNotFound, self.not_found_message())
            }
            PhaseError::Io(e) => ValidationOutcome::fail(
                FailureKind::Unexpected,
                format!("Unexpected validation error: {}", e),
            ),
        }
    }
}

/// Prefer stderr, fall back to stdout
fn diagnostic_from(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        return stderr.trim_end().to_string();
    }
    String::from_utf8_lossy(&output.stdout).trim_end().to_string()
}

#[async_trait]
impl Validator for TerraformValidator {
    async fn validate(&self, workspace_dir: Option<&Path>) -> ValidationOutcome {
        let Some(dir) = workspace_dir.filter(|dir| dir.is_dir()) else {
            return ValidationOutcome::fail(FailureKind::MissingInput, NO_OUTPUT_DIR);
        };

        match self.count_config_files(dir).await {
            Ok(0) => {
                return ValidationOutcome::fail(
                    FailureKind::MissingInput,
                    format!(
                        "No configuration files found: the workspace {} contains no {} files. \
                         Produce at least one {} file.",
                        dir.display(),
                        self.extension,
                        self.extension
                    ),
                )
            }
            Ok(_) => {}
            Err(e) => {
                return ValidationOutcome::fail(
                    FailureKind::Unexpected,
                    format!("Unexpected validation error: {}", e),
                )
            }
        }

        let program: PathBuf = match which::which(&self.config.program) {
            Ok(path) => path,
            Err(_) => {
                return ValidationOutcome::fail(
                    FailureKind::ToolNotFound,
                    self.not_found_message(),
                )
            }
        };
        let tool = self.tool_name();
        let timeout = self.config.timeout();

        log_info!("Running {} init in {}", tool, dir.display());
        match self.run_phase(&program, dir, INIT_ARGS, timeout).await {
            Ok(output) if output.status.success() => {}
            Ok(output) => {
                return ValidationOutcome::fail(
                    FailureKind::InitFailed,
                    format!("{} init failed:\n{}", tool, diagnostic_from(&output)),
                )
            }
            Err(e) => return self.phase_failure("init", e),
        }

        log_info!("Running {} validate", tool);
        match self.run_phase(&program, dir, VALIDATE_ARGS, timeout).await {
            Ok(output) if output.status.success() => ValidationOutcome::pass(),
            Ok(output) => ValidationOutcome::fail(
                FailureKind::CheckFailed,
                format!("{} validate failed:\n{}", tool, diagnostic_from(&output)),
            ),
            Err(e) => self.phase_failure("validate", e),
        }
    }
}
