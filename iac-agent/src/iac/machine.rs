//! Workflow graph: nodes, step outcomes and the transition function
//!
//! ```text
//! GATE ──valid──> GENERATE ──> WRITE ──> VALIDATE ──pass──────────────> FINALIZE
//!   │                            ^          │
//!   │                            │          ├─fail, attempts < max──> FIX ──┐
//!   │                            └──────────┼───────────────────────────────┘
//!   │                                       └─fail, attempts >= max──> FINALIZE
//!   └─not valid──> (halt: rejected)
//! ```
//!
//! [`transition`] is pure: the controller executes a node, reports what happened as a
//! [`StepOutcome`], and asks where to go next.

use serde::{Deserialize, Serialize};

use crate::iac::types::FileSet;

/// A step of the workflow graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    Gate,
    Generate,
    Write,
    Validate,
    Fix,
    Finalize,
}

impl Node {
    /// Stable identifier used in structured events
    pub fn id(self) -> &'static str {
        match self {
            Node::Gate => "validate_requirements",
            Node::Generate => "generate_files",
            Node::Write => "write_files",
            Node::Validate => "validate_files",
            Node::Fix => "fix_errors",
            Node::Finalize => "finalize",
        }
    }

    /// Human-readable title
    pub fn label(self) -> &'static str {
        match self {
            Node::Gate => "Validate Requirements",
            Node::Generate => "Generate Files",
            Node::Write => "Write Files To Disk",
            Node::Validate => "Validate Files",
            Node::Fix => "Fix Validation Errors",
            Node::Finalize => "Finalize",
        }
    }

    /// Short description shown under the console step header
    pub fn description(self) -> &'static str {
        match self {
            Node::Gate => "Checking that the requirements are complete enough to build",
            Node::Generate => "Drafting configuration files from the requirements",
            Node::Write => "Persisting the candidate files to a fresh workspace",
            Node::Validate => "Running the external validator on the workspace",
            Node::Fix => "Repairing the files using the validator diagnostics",
            Node::Finalize => "Summarizing the outcome",
        }
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// What a node produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Admitted,
    Rejected,
    Generated { files: usize },
    Written { files: usize },
    Validated { passed: bool },
    Repaired { files: usize, kept_previous: bool },
    Finalized { success: bool },
}

impl StepOutcome {
    /// The node that produces this outcome
    pub fn node(&self) -> Node {
        match self {
            StepOutcome::Admitted | StepOutcome::Rejected => Node::Gate,
            StepOutcome::Generated { .. } => Node::Generate,
            StepOutcome::Written { .. } => Node::Write,
            StepOutcome::Validated { .. } => Node::Validate,
            StepOutcome::Repaired { .. } => Node::Fix,
            StepOutcome::Finalized { .. } => Node::Finalize,
        }
    }

    /// One-line summary for structured events
    pub fn summary(&self) -> String {
        match self {
            StepOutcome::Admitted => "Requirements accepted".to_string(),
            StepOutcome::Rejected => "Requirements rejected".to_string(),
            StepOutcome::Generated { files } => format!("Extracted {} files", files),
            StepOutcome::Written { files } => format!("Wrote {} files", files),
            StepOutcome::Validated { passed: true } => "Validation passed".to_string(),
            StepOutcome::Validated { passed: false } => "Validation failed".to_string(),
            StepOutcome::Repaired {
                kept_previous: true,
                ..
            } => "Repair produced no files, kept previous set".to_string(),
            StepOutcome::Repaired { files, .. } => format!("Repaired into {} files", files),
            StepOutcome::Finalized { success: true } => "Succeeded".to_string(),
            StepOutcome::Finalized { success: false } => "Failed".to_string(),
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Terminal {
    /// The requirements gate refused the input
    Rejected,
    /// Validation passed
    Succeeded,
    /// Validation still failing after the last permitted repair
    Exhausted,
}

impl Terminal {
    pub fn is_success(self) -> bool {
        self == Terminal::Succeeded
    }
}

/// Where to go after a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Next(Node),
    Halt(Terminal),
}

/// Repair ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairPolicy {
    /// Maximum number of FIX steps per run
    pub max_repair_attempts: u32,
}

impl RepairPolicy {
    pub const DEFAULT_MAX_REPAIR_ATTEMPTS: u32 = 3;

    pub fn new(max_repair_attempts: u32) -> Self {
        Self {
            max_repair_attempts,
        }
    }

    pub fn allows_repair(&self, attempt_count: u32) -> bool {
        attempt_count < self.max_repair_attempts
    }
}

impl Default for RepairPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_REPAIR_ATTEMPTS)
    }
}

/// Next step given the outcome of the current one
pub fn transition(outcome: &StepOutcome, attempt_count: u32, policy: &RepairPolicy) -> Transition {
    match outcome {
        StepOutcome::Admitted => Transition::Next(Node::Generate),
        StepOutcome::Rejected => Transition::Halt(Terminal::Rejected),
        StepOutcome::Generated { .. } => Transition::Next(Node::Write),
        StepOutcome::Written { .. } => Transition::Next(Node::Validate),
        StepOutcome::Validated { passed: true } => Transition::Next(Node::Finalize),
        StepOutcome::Validated { passed: false } if policy.allows_repair(attempt_count) => {
            Transition::Next(Node::Fix)
        }
        StepOutcome::Validated { passed: false } => Transition::Next(Node::Finalize),
        StepOutcome::Repaired { .. } => Transition::Next(Node::Write),
        StepOutcome::Finalized { success: true } => Transition::Halt(Terminal::Succeeded),
        StepOutcome::Finalized { success: false } => Transition::Halt(Terminal::Exhausted),
    }
}

/// Outcome of a FIX step given the files before and the files re-extracted
pub fn repair_outcome(previous: &FileSet, extracted: &FileSet) -> StepOutcome {
    if extracted.is_empty() {
        StepOutcome::Repaired {
            files: previous.len(),
            kept_previous: true,
        }
    } else {
        StepOutcome::Repaired {
            files: extracted.len(),
            kept_previous: false,
        }
    }
}
