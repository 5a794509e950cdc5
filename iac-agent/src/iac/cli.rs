//! CLI argument parsing for the IaC workflow

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::io::AsyncReadExt;

use iac_agent_sdk::{FieldSchema, FieldType, WorkflowDefinition, WorkflowMetadata};

use crate::iac::config::WorkflowConfig;

/// IaC Agent CLI Arguments
#[derive(Parser, Debug, Clone, Default)]
#[command(
    name = "iac-agent",
    about = "Generate Terraform from natural-language requirements, validate it, and repair it until it passes"
)]
pub struct Args {
    /// Infrastructure requirements (falls back to --input-file, then stdin)
    #[arg(short, long)]
    pub input: Option<String>,

    /// File containing the infrastructure requirements
    #[arg(long, conflicts_with = "input")]
    pub input_file: Option<PathBuf>,

    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Base directory for generated workspaces
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Maximum number of repair attempts after the first validation
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Validator executable (terraform, tofu, ...)
    #[arg(long)]
    pub validator: Option<String>,

    /// Timeout in seconds for each validator subprocess
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Model used for generation
    #[arg(short, long)]
    pub model: Option<String>,

    /// Print prompts and raw model responses
    #[arg(long)]
    pub debug: bool,

    // Hidden metadata flag
    #[arg(long, hide = true)]
    pub workflow_metadata: bool,
}

impl Args {
    /// Apply command-line overrides on top of a loaded configuration
    pub fn apply_overrides(&self, config: &mut WorkflowConfig) {
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(max) = self.max_attempts {
            config.max_repair_attempts = max;
        }
        if let Some(program) = &self.validator {
            config.validator.program = program.clone();
        }
        if let Some(timeout) = self.timeout {
            config.validator.timeout_secs = timeout;
        }
        if let Some(model) = &self.model {
            config.generator.model = model.clone();
        }
        if self.debug {
            config.debug = true;
        }
    }

    /// Load `--config` (if any) and apply the overrides
    pub async fn load_config(&self) -> Result<WorkflowConfig> {
        let mut config = match &self.config {
            Some(path) => WorkflowConfig::load(path).await?,
            None => WorkflowConfig::default(),
        };
        self.apply_overrides(&mut config);
        Ok(config)
    }

    /// Resolve the requirement text from --input, --input-file or stdin
    pub async fn read_requirement(&self) -> Result<String> {
        let text = if let Some(input) = &self.input {
            input.clone()
        } else if let Some(path) = &self.input_file {
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read input file: {}", path.display()))?
        } else {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("Failed to read requirements from stdin")?;
            buf
        };

        let text = text.trim().to_string();
        if text.is_empty() {
            bail!("No requirements given. Use --input, --input-file, or pipe them on stdin.");
        }
        Ok(text)
    }
}

impl From<Args> for WorkflowConfig {
    fn from(args: Args) -> Self {
        let mut config = WorkflowConfig::default();
        args.apply_overrides(&mut config);
        config
    }
}

impl WorkflowDefinition for Args {
    fn metadata() -> WorkflowMetadata {
        WorkflowMetadata {
            id: "iac_agent".to_string(),
            name: "IaC Agent".to_string(),
            description: "Validate requirements → Generate Terraform → Write → Validate → Fix (bounded) → Report".to_string(),
        }
    }

    fn fields() -> Vec<FieldSchema> {
        vec![
            FieldSchema {
                name: "input".to_string(),
                field_type: FieldType::Text,
                label: "Requirements".to_string(),
                description: "[TEXT] Infrastructure to build, in plain language".to_string(),
                cli_arg: "--input".to_string(),
                required: true,
                default: None,
            },
            FieldSchema {
                name: "config".to_string(),
                field_type: FieldType::FilePath {
                    pattern: Some("*.yaml".to_string()),
                },
                label: "Config File".to_string(),
                description: "[TEXT] Optional YAML configuration".to_string(),
                cli_arg: "--config".to_string(),
                required: false,
                default: None,
            },
            FieldSchema {
                name: "output_dir".to_string(),
                field_type: FieldType::FilePath { pattern: None },
                label: "Output Directory".to_string(),
                description: "[TEXT] Base directory for generated workspaces".to_string(),
                cli_arg: "--output-dir".to_string(),
                required: false,
                default: Some("generated_tf".to_string()),
            },
            FieldSchema {
                name: "max_attempts".to_string(),
                field_type: FieldType::Number {
                    min: Some(0),
                    max: Some(10),
                },
                label: "Max Fix Attempts".to_string(),
                description: "[NUMBER] Repair attempts after the first validation".to_string(),
                cli_arg: "--max-attempts".to_string(),
                required: false,
                default: Some("3".to_string()),
            },
            FieldSchema {
                name: "validator".to_string(),
                field_type: FieldType::Select {
                    options: vec!["terraform".to_string(), "tofu".to_string()],
                },
                label: "Validator".to_string(),
                description: "[SELECT] Validator executable".to_string(),
                cli_arg: "--validator".to_string(),
                required: false,
                default: Some("terraform".to_string()),
            },
        ]
    }
}
