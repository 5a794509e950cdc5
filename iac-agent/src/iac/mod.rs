//! IaC generation workflow
//!
//! Turns natural-language infrastructure requirements into validated Terraform:
//! requirements gate, generation, per-attempt workspaces, external validation and a
//! bounded repair loop driven by the validator's diagnostics.

pub mod cli;
pub mod config;
pub mod extract;
pub mod machine;
pub mod observer;
pub mod phase0_gate;
pub mod phase1_generate;
pub mod phase2_write;
pub mod phase3_validate;
pub mod phase4_fix;
pub mod phase5_finalize;
pub mod prompts;
pub mod types;
pub mod workflow;

// Re-export commonly used types
pub use config::{GeneratorConfig, ValidatorConfig, WorkflowConfig};
pub use extract::{extract, BlockExtractor};
pub use machine::{transition, Node, RepairPolicy, StepOutcome, Terminal, Transition};
pub use observer::{ConsoleObserver, EventLogObserver, WorkflowObserver};
pub use phase0_gate::{GateError, GateVerdict, RequirementsGate};
pub use phase2_write::{WorkspaceWrite, WorkspaceWriter};
pub use phase3_validate::{TerraformValidator, Validator};
pub use phase5_finalize::summarize;
pub use types::{FailureKind, FileSet, GeneratedFile, ValidationOutcome, WorkflowState};
pub use workflow::{IacWorkflow, ProgressEvent, WorkflowError, WorkflowResult, WorkflowRun};
