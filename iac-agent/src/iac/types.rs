//! Data structures shared by the IaC workflow nodes

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A single generated configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedFile {
    pub name: String,
    pub content: String,
}

/// Ordered mapping of filename -> content
///
/// Keeps files in the order they appeared in the generated response. Names are
/// unique; callers that need collision handling go through the extractor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileSet {
    files: Vec<GeneratedFile>,
}

impl FileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a file, keeping its original position on replace
    pub fn insert(&mut self, name: impl Into<String>, content: impl Into<String>) {
        let name = name.into();
        let content = content.into();
        match self.files.iter_mut().find(|f| f.name == name) {
            Some(existing) => existing.content = content,
            None => self.files.push(GeneratedFile { name, content }),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.files
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.content.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.iter().any(|f| f.name == name)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GeneratedFile> {
        self.files.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.files.iter().map(|f| f.name.as_str()).collect()
    }
}

impl<'a> IntoIterator for &'a FileSet {
    type Item = &'a GeneratedFile;
    type IntoIter = std::slice::Iter<'a, GeneratedFile>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.iter()
    }
}

impl<N: Into<String>, C: Into<String>> FromIterator<(N, C)> for FileSet {
    fn from_iter<I: IntoIterator<Item = (N, C)>>(iter: I) -> Self {
        let mut set = FileSet::new();
        for (name, content) in iter {
            set.insert(name, content);
        }
        set
    }
}

/// Why a validation round failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No workspace directory, or no configuration files inside it
    MissingInput,
    /// The tool's init subcommand exited non-zero
    InitFailed,
    /// The tool's validate subcommand exited non-zero
    CheckFailed,
    /// A subprocess exceeded its timeout and was killed
    TimedOut,
    /// The tool executable could not be found
    ToolNotFound,
    /// Any other error while running the tool
    Unexpected,
}

impl FailureKind {
    /// True when the failure comes from the environment rather than the files
    pub fn is_environment_failure(self) -> bool {
        matches!(
            self,
            FailureKind::TimedOut | FailureKind::ToolNotFound | FailureKind::Unexpected
        )
    }
}

/// Result of one validation round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub passed: bool,
    pub diagnostic_text: String,
    pub failure: Option<FailureKind>,
}

impl ValidationOutcome {
    pub fn pass() -> Self {
        Self {
            passed: true,
            diagnostic_text: String::new(),
            failure: None,
        }
    }

    pub fn fail(kind: FailureKind, diagnostic_text: impl Into<String>) -> Self {
        let mut diagnostic_text = diagnostic_text.into();
        if diagnostic_text.trim().is_empty() {
            diagnostic_text = format!("Validation failed ({:?}) without diagnostic output", kind);
        }
        Self {
            passed: false,
            diagnostic_text,
            failure: Some(kind),
        }
    }
}

/// The single mutable record threaded through every workflow node
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowState {
    /// Identifier of this run, used to keep workspace directories disjoint
    pub run_id: String,
    pub requirement_text: String,
    pub requirements_valid: bool,
    pub requirements_errors: String,
    pub files: FileSet,
    pub written_paths: Vec<PathBuf>,
    pub workspace_dir: Option<PathBuf>,
    pub files_valid: bool,
    pub validation_errors: String,
    /// Last validation failure category, if the last round failed
    pub validation_failure: Option<FailureKind>,
    /// Repair cycles executed so far
    pub attempt_count: u32,
    /// Validate steps executed so far
    pub validation_rounds: u32,
    pub final_message: String,
}

impl WorkflowState {
    pub fn new(run_id: impl Into<String>, requirement_text: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            requirement_text: requirement_text.into(),
            ..Default::default()
        }
    }

    /// Record a validator result
    pub fn apply_validation(&mut self, outcome: ValidationOutcome) {
        self.validation_rounds += 1;
        self.files_valid = outcome.passed;
        self.validation_errors = outcome.diagnostic_text;
        self.validation_failure = outcome.failure;
    }
}
