//! Phase 0: requirements admission
//!
//! One generative call decides whether the requirement text is complete enough to
//! build. The model is told to fill gaps with sensible defaults and refuse only when
//! something critical has no safe default. The response must carry exactly one of the
//! standalone tokens `VALID` / `NOT_VALID`; anything else is a hard error.

use regex::Regex;
use std::sync::{Arc, OnceLock};
use thiserror::Error;

use iac_agent_sdk::log_debug;

use crate::iac::prompts::requirements_gate_prompt;
use crate::workflow_utils::{execute_agent, AgentConfig, Generator};

/// Gate decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateVerdict {
    Valid,
    /// Carries the full response as the error detail
    NotValid(String),
}

impl GateVerdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, GateVerdict::Valid)
    }

    /// Error detail surfaced to the user (empty when valid)
    pub fn errors(&self) -> &str {
        match self {
            GateVerdict::Valid => "",
            GateVerdict::NotValid(detail) => detail,
        }
    }
}

#[derive(Debug, Error)]
pub enum GateError {
    #[error("requirements check returned no usable verdict (expected exactly one of VALID or NOT_VALID): {}", preview(.response))]
    AmbiguousVerdict { response: String },

    #[error("requirements check call failed: {0}")]
    Generation(#[from] anyhow::Error),
}

fn preview(response: &str) -> String {
    const MAX: usize = 200;
    match response.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &response[..idx]),
        None => response.to_string(),
    }
}

fn not_valid_token() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bNOT_VALID\b").expect("constant pattern"))
}

fn valid_token() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // `\b` never matches between `_` and `V`, so this skips the tail of NOT_VALID
    RE.get_or_init(|| Regex::new(r"\bVALID\b").expect("constant pattern"))
}

/// Classify a gate response by its marker tokens
pub fn classify_verdict(response: &str) -> Result<GateVerdict, GateError> {
    let not_valid = not_valid_token().is_match(response);
    let valid = valid_token().is_match(response);

    match (valid, not_valid) {
        (true, false) => Ok(GateVerdict::Valid),
        (false, true) => Ok(GateVerdict::NotValid(response.to_string())),
        _ => Err(GateError::AmbiguousVerdict {
            response: response.to_string(),
        }),
    }
}

/// Single-shot admission check
pub struct RequirementsGate {
    generator: Arc<dyn Generator>,
    debug: bool,
}

impl RequirementsGate {
    pub fn new(generator: Arc<dyn Generator>, debug: bool) -> Self {
        Self { generator, debug }
    }

    pub async fn check(&self, requirement_text: &str) -> Result<GateVerdict, GateError> {
        let prompt = requirements_gate_prompt(requirement_text);
        if self.debug {
            log_debug!("Gate prompt:\n{}", prompt);
        }

        let config = AgentConfig::new(
            "validate_requirements",
            "Requirements Gate",
            "Checking requirements for missing or conflicting information",
            prompt,
        );
        let response = execute_agent(self.generator.as_ref(), config).await?;

        if self.debug {
            log_debug!("Gate response:\n{}", response);
        }

        classify_verdict(&response)
    }
}
