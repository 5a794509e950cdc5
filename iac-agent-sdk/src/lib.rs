use serde::{Deserialize, Serialize};

// Re-export async trait for convenience
pub use async_trait::async_trait;

/// Workflow metadata (id, name, description)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowMetadata {
    pub id: String,
    pub name: String,
    pub description: String,
}

/// Complete workflow metadata with fields (for JSON export)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullWorkflowMetadata {
    #[serde(flatten)]
    pub metadata: WorkflowMetadata,
    pub fields: Vec<FieldSchema>,
}

/// Field schema definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    pub field_type: FieldType,
    pub label: String,
    pub description: String,
    pub cli_arg: String,
    pub required: bool,
    pub default: Option<String>,
}

/// Field type enum
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Number {
        #[serde(skip_serializing_if = "Option::is_none")]
        min: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max: Option<i64>,
    },
    FilePath {
        #[serde(skip_serializing_if = "Option::is_none")]
        pattern: Option<String>,
    },
    Select {
        options: Vec<String>,
    },
}

/// Trait that workflows implement so a manager can discover their inputs
pub trait WorkflowDefinition {
    fn metadata() -> WorkflowMetadata;
    fn fields() -> Vec<FieldSchema>;

    fn full_metadata() -> FullWorkflowMetadata {
        FullWorkflowMetadata {
            metadata: Self::metadata(),
            fields: Self::fields(),
        }
    }

    fn print_metadata(&self) {
        match serde_json::to_string_pretty(&Self::full_metadata()) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Failed to serialize workflow metadata: {}", e),
        }
    }
}

/// Structured logging events emitted by workflows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowLog {
    /// Workflow node entered
    NodeStarted {
        node: String,
        label: String,
        attempt: u32,
    },
    /// Workflow node finished
    NodeCompleted {
        node: String,
        label: String,
        attempt: u32,
        summary: Option<String>,
    },
    /// Workflow node aborted with an error
    NodeFailed {
        node: String,
        label: String,
        error: String,
    },
    /// Generative call started
    AgentStarted {
        task_id: String,
        agent_name: String,
        description: String,
    },
    /// Generative call progress message
    AgentMessage {
        task_id: String,
        agent_name: String,
        message: String,
    },
    /// Generative call completed
    AgentCompleted {
        task_id: String,
        agent_name: String,
        result: Option<String>,
    },
    /// Generative call failed
    AgentFailed {
        task_id: String,
        agent_name: String,
        error: String,
    },
    /// Attempt workspace created
    WorkspaceCreated {
        attempt: u32,
        path: String,
    },
    /// Validation round finished
    ValidationFinished {
        attempt: u32,
        passed: bool,
        diagnostic: Option<String>,
    },
}

impl WorkflowLog {
    /// Prefix used when emitting events on stderr
    pub const PREFIX: &'static str = "__WF_EVENT__:";

    /// Emit this log event to stderr for manager parsing
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            use std::io::Write;
            eprintln!("{}{}", Self::PREFIX, json);
            // Force flush stderr in async/concurrent contexts
            let _ = std::io::stderr().flush();
        }
    }

    /// Parse one stderr line back into an event, if it carries one
    pub fn parse_line(line: &str) -> Option<Self> {
        let json = line.trim().strip_prefix(Self::PREFIX)?;
        serde_json::from_str(json).ok()
    }
}

/// Helper macros for workflow logging
#[macro_export]
macro_rules! log_node_start {
    ($node:expr, $label:expr, $attempt:expr) => {
        $crate::WorkflowLog::NodeStarted {
            node: $node.to_string(),
            label: $label.to_string(),
            attempt: $attempt,
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_node_complete {
    ($node:expr, $label:expr, $attempt:expr) => {
        $crate::WorkflowLog::NodeCompleted {
            node: $node.to_string(),
            label: $label.to_string(),
            attempt: $attempt,
            summary: None,
        }
        .emit();
    };
    ($node:expr, $label:expr, $attempt:expr, $summary:expr) => {
        $crate::WorkflowLog::NodeCompleted {
            node: $node.to_string(),
            label: $label.to_string(),
            attempt: $attempt,
            summary: Some($summary.to_string()),
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_node_failed {
    ($node:expr, $label:expr, $error:expr) => {
        $crate::WorkflowLog::NodeFailed {
            node: $node.to_string(),
            label: $label.to_string(),
            error: $error.to_string(),
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_agent_start {
    ($task_id:expr, $agent:expr, $desc:expr) => {
        $crate::WorkflowLog::AgentStarted {
            task_id: $task_id.to_string(),
            agent_name: $agent.to_string(),
            description: $desc.to_string(),
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_agent_message {
    ($task_id:expr, $agent:expr, $msg:expr) => {
        $crate::WorkflowLog::AgentMessage {
            task_id: $task_id.to_string(),
            agent_name: $agent.to_string(),
            message: $msg.to_string(),
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_agent_complete {
    ($task_id:expr, $agent:expr) => {
        $crate::WorkflowLog::AgentCompleted {
            task_id: $task_id.to_string(),
            agent_name: $agent.to_string(),
            result: None,
        }
        .emit();
    };
    ($task_id:expr, $agent:expr, $result:expr) => {
        $crate::WorkflowLog::AgentCompleted {
            task_id: $task_id.to_string(),
            agent_name: $agent.to_string(),
            result: Some($result.to_string()),
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_agent_failed {
    ($task_id:expr, $agent:expr, $error:expr) => {
        $crate::WorkflowLog::AgentFailed {
            task_id: $task_id.to_string(),
            agent_name: $agent.to_string(),
            error: $error.to_string(),
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_workspace {
    ($attempt:expr, $path:expr) => {
        $crate::WorkflowLog::WorkspaceCreated {
            attempt: $attempt,
            path: $path.to_string(),
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_validation {
    ($attempt:expr, $passed:expr) => {
        $crate::WorkflowLog::ValidationFinished {
            attempt: $attempt,
            passed: $passed,
            diagnostic: None,
        }
        .emit();
    };
    ($attempt:expr, $passed:expr, $diagnostic:expr) => {
        $crate::WorkflowLog::ValidationFinished {
            attempt: $attempt,
            passed: $passed,
            diagnostic: Some($diagnostic.to_string()),
        }
        .emit();
    };
}

// ============================================================================
// Console Logging Macros
// ============================================================================
// Colored console output for human-readable logs, complementing the
// structured WorkflowLog events.
// ============================================================================

/// Logs the start of a workflow node with a header and description.
///
/// # Example
/// ```
/// use iac_agent_sdk::log_node_start_console;
/// log_node_start_console!(1, "Generate Files", "Drafting configuration");
/// ```
///
/// Outputs:
/// ```text
/// ═══ STEP 1: Generate Files ═══
/// Drafting configuration
/// ```
#[macro_export]
macro_rules! log_node_start_console {
    ($step:expr, $title:expr, $description:expr) => {
        println!("\x1b[1;36m═══ STEP {}: {} ═══\x1b[0m", $step, $title);
        println!("\x1b[36m{}\x1b[0m", $description);
    };
}

/// Logs the completion of a workflow node.
///
/// # Example
/// ```
/// use iac_agent_sdk::log_node_complete_console;
/// log_node_complete_console!(1);
/// ```
///
/// Outputs:
/// ```text
/// ✓ Step 1 complete
/// ```
#[macro_export]
macro_rules! log_node_complete_console {
    ($step:expr) => {
        println!("\x1b[32m✓ Step {} complete\x1b[0m", $step);
    };
}

/// Logs the number of items found.
///
/// # Example
/// ```
/// use iac_agent_sdk::log_found;
/// log_found!(3, "configuration files");
/// ```
#[macro_export]
macro_rules! log_found {
    ($count:expr, $item_type:expr) => {
        println!("\x1b[36mFound {} {}\x1b[0m", $count, $item_type);
    };
}

/// Logs an informational message.
///
/// # Example
/// ```
/// use iac_agent_sdk::log_info;
/// log_info!("Running terraform init...");
/// ```
///
/// Outputs:
/// ```text
/// ℹ Running terraform init...
/// ```
#[macro_export]
macro_rules! log_info {
    ($message:expr) => {
        println!("\x1b[36mℹ {}\x1b[0m", $message);
    };
    ($fmt:expr, $($arg:tt)*) => {
        println!("\x1b[36mℹ {}\x1b[0m", format!($fmt, $($arg)*));
    };
}

/// Logs a warning message.
///
/// # Example
/// ```
/// use iac_agent_sdk::log_warning;
/// log_warning!("No files extracted from response");
/// ```
///
/// Outputs:
/// ```text
/// ⚠ Warning: No files extracted from response
/// ```
#[macro_export]
macro_rules! log_warning {
    ($message:expr) => {
        println!("\x1b[33m⚠ Warning: {}\x1b[0m", $message);
    };
    ($fmt:expr, $($arg:tt)*) => {
        println!("\x1b[33m⚠ Warning: {}\x1b[0m", format!($fmt, $($arg)*));
    };
}

/// Logs an error message.
///
/// # Example
/// ```
/// use iac_agent_sdk::log_error;
/// let name = "main.tf";
/// log_error!("Error writing file {}", name);
/// ```
///
/// Outputs:
/// ```text
/// ✗ Error: Error writing file main.tf
/// ```
#[macro_export]
macro_rules! log_error {
    ($message:expr) => {
        println!("\x1b[31m✗ Error: {}\x1b[0m", $message);
    };
    ($fmt:expr, $($arg:tt)*) => {
        println!("\x1b[31m✗ Error: {}\x1b[0m", format!($fmt, $($arg)*));
    };
}

/// Logs that a file has been saved.
///
/// # Example
/// ```
/// use iac_agent_sdk::log_file_saved;
/// log_file_saved!("generated_tf/20250101_120000/main.tf");
/// ```
#[macro_export]
macro_rules! log_file_saved {
    ($path:expr) => {
        println!("\x1b[32m✓ Saved: {}\x1b[0m", $path);
    };
}

/// Logs a debug message (intended to be used conditionally).
///
/// # Example
/// ```
/// use iac_agent_sdk::log_debug;
/// log_debug!("Parsed response");
/// let count = 2;
/// log_debug!("Extracted {} files", count);
/// ```
#[macro_export]
macro_rules! log_debug {
    ($message:expr) => {
        println!("\x1b[2m[DEBUG] {}\x1b[0m", $message);
    };
    ($fmt:expr, $($arg:tt)*) => {
        println!("\x1b[2m[DEBUG] {}\x1b[0m", format!($fmt, $($arg)*));
    };
}

// ============================================================================
// End of Console Logging Macros
// ============================================================================
