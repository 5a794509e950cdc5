//! Workflow configuration
//!
//! Every field has a default, so a YAML file only needs the keys it overrides:
//!
//! ```yaml
//! output_dir: build/terraform
//! max_repair_attempts: 2
//! validator:
//!   program: tofu
//!   timeout_secs: 120
//! generator:
//!   model: gpt-4o
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::iac::extract::{BlockExtractor, DEFAULT_EXTENSION, DEFAULT_STEM};
use crate::iac::machine::RepairPolicy;

/// External validator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Executable to run (looked up on PATH)
    pub program: String,
    /// Arguments placed before the `init` / `validate` subcommands
    pub prefix_args: Vec<String>,
    /// Per-subprocess timeout
    pub timeout_secs: u64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            program: "terraform".to_string(),
            prefix_args: Vec::new(),
            timeout_secs: 60,
        }
    }
}

impl ValidatorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Chat completions settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub model: String,
    /// Overrides `OPENAI_API_BASE`
    pub base_url: Option<String>,
    /// Overrides `OPENAI_API_KEY`
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            api_key: None,
            timeout_secs: 120,
            max_tokens: None,
            temperature: None,
        }
    }
}

impl GeneratorConfig {
    pub const API_KEY_ENV: &'static str = "OPENAI_API_KEY";
    pub const BASE_URL_ENV: &'static str = "OPENAI_API_BASE";
    pub const DEFAULT_BASE_URL: &'static str = "https://api.openai.com/v1";

    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(Self::API_KEY_ENV).ok())
            .filter(|key| !key.trim().is_empty())
    }

    pub fn resolve_base_url(&self) -> String {
        self.base_url
            .clone()
            .or_else(|| std::env::var(Self::BASE_URL_ENV).ok())
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| Self::DEFAULT_BASE_URL.to_string())
    }
}

/// Configuration for the IaC workflow
///
/// # Examples
///
/// ```
/// use iac_agent::iac::WorkflowConfig;
///
/// let config = WorkflowConfig {
///     output_dir: "out".into(),
///     max_repair_attempts: 1,
///     ..Default::default()
/// };
/// assert_eq!(config.extension, ".tf");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Base directory for per-attempt workspaces
    pub output_dir: PathBuf,
    /// Target file extension
    pub extension: String,
    /// Language tag used when fencing files in prompts and reports
    pub fence_lang: String,
    /// File stem used for unlabeled blocks
    pub default_stem: String,
    /// Repair ceiling
    pub max_repair_attempts: u32,
    pub validator: ValidatorConfig,
    pub generator: GeneratorConfig,
    /// Print prompts and raw responses
    pub debug: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("generated_tf"),
            extension: DEFAULT_EXTENSION.to_string(),
            fence_lang: "hcl".to_string(),
            default_stem: DEFAULT_STEM.to_string(),
            max_repair_attempts: RepairPolicy::DEFAULT_MAX_REPAIR_ATTEMPTS,
            validator: ValidatorConfig::default(),
            generator: GeneratorConfig::default(),
            debug: false,
        }
    }
}

impl WorkflowConfig {
    /// Load a YAML config file
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config YAML from: {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn repair_policy(&self) -> RepairPolicy {
        RepairPolicy::new(self.max_repair_attempts)
    }

    pub fn extractor(&self) -> Result<BlockExtractor> {
        BlockExtractor::new(&self.extension, &self.default_stem)
    }
}
