//! Repair loop controller
//!
//! [`IacWorkflow`] owns the collaborators (generator, validator, observers) and the
//! configuration. Each call to [`IacWorkflow::start`] creates a [`WorkflowRun`] with
//! its own [`WorkflowState`] and run id, so any number of runs can execute
//! concurrently against the same output directory.
//!
//! A run executes one node per [`WorkflowRun::step`]; the next node comes from the
//! pure [`transition`] function. [`IacWorkflow::process`] exposes the same loop as a
//! progress stream and [`IacWorkflow::run`] drives it to completion.

use anyhow::Result;
use async_stream::stream;
use futures::Stream;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use iac_agent_sdk::{log_error, log_validation, log_workspace};

use crate::iac::config::WorkflowConfig;
use crate::iac::extract::BlockExtractor;
use crate::iac::machine::{
    repair_outcome, transition, Node, RepairPolicy, StepOutcome, Terminal, Transition,
};
use crate::iac::observer::WorkflowObserver;
use crate::iac::phase0_gate::{GateError, RequirementsGate};
use crate::iac::phase1_generate::generate_files;
use crate::iac::phase2_write::WorkspaceWriter;
use crate::iac::phase3_validate::{TerraformValidator, Validator};
use crate::iac::phase4_fix::fix_files;
use crate::iac::phase5_finalize::summarize;
use crate::iac::types::WorkflowState;
use crate::workflow_utils::{ChatCompletionsGenerator, Generator};

/// Errors that end a run early
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Gate(#[from] GateError),

    #[error("generation failed during {node}: {source}")]
    Generation {
        node: Node,
        source: anyhow::Error,
    },

    #[error("workflow cancelled during {0}")]
    Cancelled(Node),

    #[error("workflow run stopped before reaching a terminal state")]
    Incomplete,
}

/// Progress reported by [`IacWorkflow::process`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    NodeCompleted { node: Node, label: String },
    Finished { terminal: Terminal, report: String },
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressEvent::NodeCompleted { label, .. } => write!(f, "🔄 **{}**", label),
            ProgressEvent::Finished { report, .. } => write!(f, "\n---\n\n{}", report),
        }
    }
}

/// Final state of a completed run
#[derive(Debug, Clone)]
pub struct WorkflowResult {
    pub state: WorkflowState,
    pub terminal: Terminal,
}

/// Generation/validation workflow with a bounded repair loop
pub struct IacWorkflow {
    config: WorkflowConfig,
    generator: Arc<dyn Generator>,
    validator: Arc<dyn Validator>,
    extractor: BlockExtractor,
    policy: RepairPolicy,
    observers: Vec<Arc<dyn WorkflowObserver>>,
}

impl IacWorkflow {
    pub fn new(
        config: WorkflowConfig,
        generator: Arc<dyn Generator>,
        validator: Arc<dyn Validator>,
    ) -> Result<Self> {
        let extractor = config.extractor()?;
        let policy = config.repair_policy();
        Ok(Self {
            config,
            generator,
            validator,
            extractor,
            policy,
            observers: Vec::new(),
        })
    }

    /// Build with the chat completions generator and the CLI validator
    pub fn from_config(config: WorkflowConfig) -> Result<Self> {
        let generator = Arc::new(ChatCompletionsGenerator::from_config(&config.generator)?);
        let validator = Arc::new(TerraformValidator::new(
            config.validator.clone(),
            &config.extension,
        ));
        Self::new(config, generator, validator)
    }

    pub fn with_observer(mut self, observer: Arc<dyn WorkflowObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn with_policy(mut self, policy: RepairPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Begin a run at the requirements gate
    pub fn start(&self, requirement_text: impl Into<String>) -> WorkflowRun<'_> {
        let run_id = Uuid::new_v4().simple().to_string()[..12].to_string();
        let writer = WorkspaceWriter::new(self.config.output_dir.clone(), run_id.clone());
        WorkflowRun {
            workflow: self,
            state: WorkflowState::new(run_id, requirement_text),
            writer,
            next: Some(Node::Gate),
            terminal: None,
        }
    }

    /// Run to completion
    pub async fn run(
        &self,
        requirement_text: impl Into<String>,
        cancel: &CancellationToken,
    ) -> Result<WorkflowResult, WorkflowError> {
        let mut run = self.start(requirement_text);
        while run.step(cancel).await?.is_some() {}
        run.finish()
    }

    /// Run as a stream of progress events, ending with [`ProgressEvent::Finished`]
    ///
    /// The stream yields one `Err` and ends if the run fails or is cancelled.
    pub fn process(
        &self,
        requirement_text: String,
        cancel: CancellationToken,
    ) -> impl Stream<Item = Result<ProgressEvent, WorkflowError>> + '_ {
        stream! {
            let mut run = self.start(requirement_text);
            loop {
                match run.step(&cancel).await {
                    Ok(Some((node, _))) => {
                        yield Ok(ProgressEvent::NodeCompleted {
                            node,
                            label: node.label().to_string(),
                        });
                    }
                    Ok(None) => break,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
            match run.finish() {
                Ok(result) => {
                    yield Ok(ProgressEvent::Finished {
                        terminal: result.terminal,
                        report: result.state.final_message,
                    });
                }
                Err(e) => {
                    yield Err(e);
                }
            }
        }
    }
}

/// One in-flight execution of the workflow
pub struct WorkflowRun<'a> {
    workflow: &'a IacWorkflow,
    state: WorkflowState,
    writer: WorkspaceWriter,
    next: Option<Node>,
    terminal: Option<Terminal>,
}

impl<'a> WorkflowRun<'a> {
    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    /// Node that the next [`step`](Self::step) will execute
    pub fn next_node(&self) -> Option<Node> {
        self.next
    }

    pub fn terminal(&self) -> Option<Terminal> {
        self.terminal
    }

    /// Execute the next node
    ///
    /// Returns the node and its outcome, or `None` once the run has halted.
    pub async fn step(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Option<(Node, StepOutcome)>, WorkflowError> {
        let Some(node) = self.next else {
            return Ok(None);
        };

        if cancel.is_cancelled() {
            return Err(self.fail(node, WorkflowError::Cancelled(node)));
        }

        for observer in &self.workflow.observers {
            observer.on_enter(node, &self.state);
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(WorkflowError::Cancelled(node)),
            outcome = self.execute(node) => outcome,
        };

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => return Err(self.fail(node, e)),
        };

        for observer in &self.workflow.observers {
            observer.on_exit(node, &self.state, &outcome);
        }

        match transition(&outcome, self.state.attempt_count, &self.workflow.policy) {
            Transition::Next(next) => self.next = Some(next),
            Transition::Halt(terminal) => {
                self.next = None;
                self.terminal = Some(terminal);
                if terminal == Terminal::Rejected {
                    self.state.final_message = self.state.requirements_errors.clone();
                }
            }
        }

        Ok(Some((node, outcome)))
    }

    /// Consume a halted run
    pub fn finish(self) -> Result<WorkflowResult, WorkflowError> {
        let terminal = self.terminal.ok_or(WorkflowError::Incomplete)?;
        Ok(WorkflowResult {
            state: self.state,
            terminal,
        })
    }

    fn fail(&mut self, node: Node, error: WorkflowError) -> WorkflowError {
        self.next = None;
        let message = error.to_string();
        for observer in &self.workflow.observers {
            observer.on_error(node, &message);
        }
        error
    }

    async fn execute(&mut self, node: Node) -> Result<StepOutcome, WorkflowError> {
        let workflow = self.workflow;
        let config = &workflow.config;

        match node {
            Node::Gate => {
                let gate = RequirementsGate::new(workflow.generator.clone(), config.debug);
                let verdict = gate.check(&self.state.requirement_text).await?;

                self.state.requirements_valid = verdict.is_valid();
                self.state.requirements_errors = verdict.errors().to_string();
                Ok(if verdict.is_valid() {
                    StepOutcome::Admitted
                } else {
                    StepOutcome::Rejected
                })
            }

            Node::Generate => {
                let files = generate_files(
                    workflow.generator.as_ref(),
                    &workflow.extractor,
                    &self.state.requirement_text,
                    &config.fence_lang,
                    config.debug,
                )
                .await
                .map_err(|source| WorkflowError::Generation { node, source })?;

                self.state.files = files;
                Ok(StepOutcome::Generated {
                    files: self.state.files.len(),
                })
            }

            Node::Write => {
                let attempt = self.state.attempt_count;
                match self.writer.write(&self.state.files, attempt).await {
                    Ok(write) => {
                        log_workspace!(attempt, write.workspace_dir.display());
                        self.state.workspace_dir = Some(write.workspace_dir);
                        self.state.written_paths = write.written_paths;
                    }
                    Err(e) => {
                        log_error!(
                            "Failed to create workspace under {}: {}",
                            self.writer.base_dir().display(),
                            e
                        );
                        self.state.workspace_dir = None;
                        self.state.written_paths.clear();
                    }
                }
                Ok(StepOutcome::Written {
                    files: self.state.written_paths.len(),
                })
            }

            Node::Validate => {
                let outcome = workflow
                    .validator
                    .validate(self.state.workspace_dir.as_deref())
                    .await;

                let attempt = self.state.attempt_count;
                if outcome.passed {
                    log_validation!(attempt, true);
                } else {
                    log_validation!(attempt, false, &outcome.diagnostic_text);
                }

                let passed = outcome.passed;
                self.state.apply_validation(outcome);
                Ok(StepOutcome::Validated { passed })
            }

            Node::Fix => {
                self.state.attempt_count += 1;
                let extracted = fix_files(
                    workflow.generator.as_ref(),
                    &workflow.extractor,
                    &self.state,
                    &config.fence_lang,
                    config.debug,
                )
                .await
                .map_err(|source| WorkflowError::Generation { node, source })?;

                let outcome = repair_outcome(&self.state.files, &extracted);
                if !extracted.is_empty() {
                    self.state.files = extracted;
                }
                Ok(outcome)
            }

            Node::Finalize => {
                self.state.final_message = summarize(&self.state, &config.fence_lang);
                Ok(StepOutcome::Finalized {
                    success: self.state.files_valid,
                })
            }
        }
    }
}
