//! Phase 2: materialize the candidate files
//!
//! Every call gets its own directory under the base output directory:
//! `<YYYYmmdd_HHMMSS_micros>_<run_id>` for the first write, with `_attemptN` appended
//! for repair rounds. The leaf directory is created non-recursively so two writes can
//! never share one.

use chrono::Local;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

use iac_agent_sdk::{log_error, log_file_saved, log_warning};

use crate::iac::types::FileSet;

/// Result of one write call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceWrite {
    pub workspace_dir: PathBuf,
    /// Files that were written successfully, in file set order
    pub written_paths: Vec<PathBuf>,
}

/// Writes file sets into fresh per-attempt directories
#[derive(Debug, Clone)]
pub struct WorkspaceWriter {
    base_dir: PathBuf,
    run_id: String,
}

impl WorkspaceWriter {
    pub fn new(base_dir: impl Into<PathBuf>, run_id: impl Into<String>) -> Self {
        Self {
            base_dir: base_dir.into(),
            run_id: run_id.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn dir_name(&self, attempt_number: u32) -> String {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S_%6f");
        if attempt_number > 0 {
            format!("{}_{}_attempt{}", timestamp, self.run_id, attempt_number)
        } else {
            format!("{}_{}", timestamp, self.run_id)
        }
    }

    /// Create the workspace directory and write every file into it
    ///
    /// Only directory creation failures are returned. A file that cannot be written is
    /// logged and left out of `written_paths`.
    pub async fn write(&self, files: &FileSet, attempt_number: u32) -> io::Result<WorkspaceWrite> {
        fs::create_dir_all(&self.base_dir).await?;
        let workspace_dir = self.create_leaf(attempt_number).await?;

        if files.is_empty() {
            log_warning!(
                "No files to write, created empty workspace {}",
                workspace_dir.display()
            );
        }

        let mut written_paths = Vec::with_capacity(files.len());
        for file in files {
            let path = workspace_dir.join(&file.name);
            match fs::write(&path, &file.content).await {
                Ok(()) => {
                    log_file_saved!(path.display());
                    written_paths.push(path);
                }
                Err(e) => {
                    log_error!("Error writing file {}: {}", file.name, e);
                }
            }
        }

        Ok(WorkspaceWrite {
            workspace_dir,
            written_paths,
        })
    }

    async fn create_leaf(&self, attempt_number: u32) -> io::Result<PathBuf> {
        // Same-microsecond collisions within one run retry with a fresh timestamp
        const MAX_TRIES: usize = 10;
        let mut last_err = None;
        for _ in 0..MAX_TRIES {
            let dir = self.base_dir.join(self.dir_name(attempt_number));
            match fs::create_dir(&dir).await {
                Ok(()) => return Ok(dir),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    last_err = Some(e);
                    tokio::time::sleep(std::time::Duration::from_millis(1)).await;
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or_else(|| io::Error::other("could not create workspace directory")))
    }
}
