//! Workflow utilities for generative calls
//!
//! - **agent**: the `Generator` contract and lifecycle-logged execution
//! - **chat_completions**: `Generator` backed by an OpenAI-compatible HTTP API

pub mod agent;
pub mod chat_completions;

// Re-export commonly used types and functions
pub use agent::{execute_agent, AgentConfig, Generator};
pub use chat_completions::ChatCompletionsGenerator;
