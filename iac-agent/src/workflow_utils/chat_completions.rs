//! OpenAI-compatible chat completions client
//!
//! Talks to any endpoint exposing `POST {base_url}/chat/completions`. Rate limits
//! and server errors are retried with exponential backoff.

use anyhow::{anyhow, Context, Result};
use iac_agent_sdk::{async_trait, log_warning};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::iac::config::GeneratorConfig;
use crate::iac::prompts::SYSTEM_PROMPT;
use crate::workflow_utils::agent::Generator;

/// Rate limit retry configuration
const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 2000;
const BACKOFF_MULTIPLIER: u64 = 2;

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    #[serde(default)]
    content: Option<String>,
}

/// Generator backed by an OpenAI-compatible HTTP API
pub struct ChatCompletionsGenerator {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

impl ChatCompletionsGenerator {
    /// Build a client from configuration; fails when no API key is available
    pub fn from_config(config: &GeneratorConfig) -> Result<Self> {
        let api_key = config.resolve_api_key().ok_or_else(|| {
            anyhow!(
                "No API key configured. Set {} or add api_key to the config file.",
                GeneratorConfig::API_KEY_ENV
            )
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: chat_endpoint(&config.resolve_base_url()),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    fn request_for(&self, prompt: &str) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stream: false,
        }
    }
}

#[async_trait]
impl Generator for ChatCompletionsGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = self.request_for(prompt);
        let mut retry_count = 0;

        loop {
            let response = self
                .client
                .post(&self.endpoint)
                .header("Content-Type", "application/json")
                .bearer_auth(&self.api_key)
                .json(&request)
                .send()
                .await
                .with_context(|| format!("Request to {} failed", self.endpoint))?;

            let status = response.status();
            let text = response.text().await?;

            if status.is_success() {
                let parsed: ChatResponse = serde_json::from_str(&text).map_err(|e| {
                    anyhow!(
                        "Failed to parse chat completions response: {}\n{}",
                        e,
                        truncate_str(&text, 500)
                    )
                })?;

                return Ok(parsed
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message.content)
                    .unwrap_or_default()
                    .trim()
                    .to_string());
            }

            let retryable = status.as_u16() == 429 || status.is_server_error();
            if retryable && retry_count < MAX_RETRIES {
                retry_count += 1;
                let delay = parse_retry_after(&text)
                    .map(Duration::from_secs)
                    .unwrap_or_else(|| backoff_delay(retry_count));

                log_warning!(
                    "Model API returned {}. Retrying in {}s (attempt {}/{})",
                    status,
                    delay.as_secs(),
                    retry_count,
                    MAX_RETRIES
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            let error_msg = match status.as_u16() {
                401 => "Invalid API key for the model endpoint.".to_string(),
                429 => format!("Rate limited after {} retries. Try again later.", retry_count),
                500..=599 => format!(
                    "Model server error ({}) after {} retries: {}",
                    status,
                    retry_count,
                    truncate_str(&text, 200)
                ),
                _ => format!("API error {}: {}", status, truncate_str(&text, 200)),
            };
            return Err(anyhow!("{}", error_msg));
        }
    }
}

/// Join a base URL and the chat completions path
fn chat_endpoint(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.ends_with("/chat/completions") {
        base.to_string()
    } else {
        format!("{}/chat/completions", base)
    }
}

/// Exponential backoff for the given (1-based) retry
fn backoff_delay(retry: u32) -> Duration {
    let factor = BACKOFF_MULTIPLIER.pow(retry.saturating_sub(1));
    Duration::from_millis(INITIAL_BACKOFF_MS * factor)
}

/// Extract a "retry after N seconds" hint from an error body, if present
fn parse_retry_after(text: &str) -> Option<u64> {
    let text_lower = text.to_lowercase();
    let pos = text_lower.find("retry")?;
    text_lower[pos..]
        .split_whitespace()
        .skip(1)
        .take(5)
        .filter_map(|word| {
            word.trim_matches(|c: char| !c.is_ascii_digit())
                .parse::<u64>()
                .ok()
        })
        .find(|secs| *secs > 0 && *secs < 300)
}

/// Truncate a string for display (Unicode-safe)
fn truncate_str(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
