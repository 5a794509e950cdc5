//! Generative call execution with agent lifecycle logging

use anyhow::Result;
use iac_agent_sdk::{
    async_trait, log_agent_complete, log_agent_failed, log_agent_message, log_agent_start,
};

/// Opaque text generation: prompt in, free-form text out
///
/// Responses are untrusted and carry no schema; callers parse them heuristically.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Configuration for one generative call
pub struct AgentConfig {
    /// Task ID this call belongs to
    pub task_id: String,
    /// Agent name (for logging)
    pub agent_name: String,
    /// Description of what this call is doing
    pub description: String,
    /// Prompt to send
    pub prompt: String,
}

impl AgentConfig {
    /// Create a new agent configuration
    pub fn new(
        task_id: impl Into<String>,
        agent_name: impl Into<String>,
        description: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            agent_name: agent_name.into(),
            description: description.into(),
            prompt: prompt.into(),
        }
    }
}

/// Run one generative call, bracketing it with agent start/complete/failed events
///
/// # Example
/// ```no_run
/// use iac_agent::workflow_utils::{execute_agent, AgentConfig, Generator};
///
/// # async fn example(generator: &dyn Generator) -> anyhow::Result<()> {
/// let config = AgentConfig::new(
///     "generate_0",
///     "Terraform Generator",
///     "Drafting configuration files",
///     "Deploy a web server on AWS",
/// );
/// let response = execute_agent(generator, config).await?;
/// # Ok(())
/// # }
/// ```
pub async fn execute_agent(generator: &dyn Generator, config: AgentConfig) -> Result<String> {
    log_agent_start!(&config.task_id, &config.agent_name, &config.description);
    log_agent_message!(
        &config.task_id,
        &config.agent_name,
        format!("Prompt length: {} chars", config.prompt.len())
    );

    match generator.generate(&config.prompt).await {
        Ok(response) => {
            log_agent_complete!(
                &config.task_id,
                &config.agent_name,
                format!("Received {} chars", response.len())
            );
            Ok(response)
        }
        Err(e) => {
            log_agent_failed!(&config.task_id, &config.agent_name, e.to_string());
            Err(e)
        }
    }
}
