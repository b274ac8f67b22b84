//! The site generator behind the orchestrator.
//!
//! The orchestrator decides *what* to build and *when*; a [`BuildExecutor`]
//! does the rendering. Two granularities are supported and can be combined:
//!
//! - **Per batch** ([`BuildExecutor::build_batch`]): render exactly the pages
//!   that changed, reporting failures page by page.
//! - **Whole project** ([`BuildExecutor::finish`]): one monolithic build after
//!   every batch has been scheduled (e.g. `next build`).
//!
//! [`CommandExecutor`] drives both through external commands. With no
//! `batch_command` configured it only does manifest bookkeeping per batch and
//! leaves all rendering to the final whole-project build.
//!
//! ## Batch command protocol
//!
//! ```text
//! stdin    page ids, one per line
//! env      BUILD_GROUP=<group>  BUILD_BATCH=<n>  BUILD_MEMORY_CEILING_MB=<mb>
//! stdout   failed<TAB><page-id><TAB><message>   one line per failed page
//! exit     0 = batch processed (individual failures allowed), else fatal
//! ```

use crate::catalog::{Group, PageRecord};
use crate::config::{ExecutorConfig, MemoryConfig};
use std::collections::{BTreeMap, HashSet};
use std::io::{self, Write as _};
use std::process::{Command, ExitStatus, Stdio};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Failed to start `{program}`: {source}")]
    Spawn { program: String, source: io::Error },
    #[error("`{program}` exited with {status}")]
    Failed { program: String, status: ExitStatus },
    #[error("IO error talking to `{program}`: {source}")]
    Io { program: String, source: io::Error },
    #[error("Executor failed: {0}")]
    Other(String),
}

/// The pages of one batch that need rendering.
#[derive(Debug, Clone)]
pub struct BuildRequest<'a> {
    pub group: Group,
    /// One-based batch number within the group.
    pub batch: usize,
    pub pages: Vec<&'a PageRecord>,
}

/// A page the executor could not render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFailure {
    pub page_id: String,
    pub message: String,
}

/// Result of a batch. Pages not listed in `failures` succeeded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub failures: Vec<PageFailure>,
}

impl BatchOutcome {
    pub fn all_succeeded() -> Self {
        Self::default()
    }

    pub fn failure(&self, page_id: &str) -> Option<&PageFailure> {
        self.failures.iter().find(|f| f.page_id == page_id)
    }
}

/// A site generator the orchestrator can drive.
pub trait BuildExecutor {
    /// Render the requested pages.
    ///
    /// Per-page problems go in the returned [`BatchOutcome`]. An `Err` means
    /// the generator itself is broken and aborts the run.
    fn build_batch(&mut self, request: &BuildRequest<'_>) -> Result<BatchOutcome, ExecutorError>;

    /// Run once after all batches.
    fn finish(&mut self) -> Result<(), ExecutorError>;

    /// Advisory hint that memory is running high. Default: nothing to free.
    fn relieve_pressure(&mut self) {}
}

/// Drives external commands.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    command: Vec<String>,
    batch_command: Vec<String>,
    env: BTreeMap<String, String>,
}

impl CommandExecutor {
    pub fn from_config(executor: &ExecutorConfig, memory: &MemoryConfig) -> Self {
        let mut env = executor.env.clone();
        env.insert(
            "BUILD_MEMORY_CEILING_MB".to_string(),
            memory.ceiling_mb.to_string(),
        );
        Self {
            command: executor.command.clone(),
            batch_command: executor.batch_command.clone(),
            env,
        }
    }

    fn command_for(&self, argv: &[String]) -> Option<(String, Command)> {
        let (program, args) = argv.split_first()?;
        let mut cmd = Command::new(program);
        cmd.args(args).envs(&self.env);
        Some((program.clone(), cmd))
    }
}

impl BuildExecutor for CommandExecutor {
    fn build_batch(&mut self, request: &BuildRequest<'_>) -> Result<BatchOutcome, ExecutorError> {
        let Some((program, mut cmd)) = self.command_for(&self.batch_command) else {
            return Ok(BatchOutcome::all_succeeded());
        };

        let mut child = cmd
            .env("BUILD_GROUP", request.group.name())
            .env("BUILD_BATCH", request.batch.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| ExecutorError::Spawn {
                program: program.clone(),
                source,
            })?;

        let payload: String = request
            .pages
            .iter()
            .map(|p| format!("{}\n", p.id()))
            .collect();
        // Fed from a separate thread so a chatty child cannot deadlock us on
        // a full stdout pipe while we are still writing its stdin.
        let writer = child.stdin.take().map(|mut stdin| {
            std::thread::spawn(move || match stdin.write_all(payload.as_bytes()) {
                Err(err) if err.kind() == io::ErrorKind::BrokenPipe => Ok(()),
                other => other,
            })
        });

        let output = child
            .wait_with_output()
            .map_err(|source| ExecutorError::Io {
                program: program.clone(),
                source,
            })?;
        if let Some(writer) = writer {
            match writer.join() {
                Ok(Ok(())) => {}
                Ok(Err(source)) => {
                    return Err(ExecutorError::Io { program, source });
                }
                Err(_) => return Err(ExecutorError::Other("stdin writer panicked".into())),
            }
        }

        if !output.status.success() {
            return Err(ExecutorError::Failed {
                program,
                status: output.status,
            });
        }

        let requested: HashSet<&str> = request.pages.iter().map(|p| p.id()).collect();
        Ok(parse_batch_report(
            &String::from_utf8_lossy(&output.stdout),
            &requested,
        ))
    }

    fn finish(&mut self) -> Result<(), ExecutorError> {
        let Some((program, mut cmd)) = self.command_for(&self.command) else {
            return Ok(());
        };
        tracing::info!(command = %self.command.join(" "), "running whole-project build");
        let status = cmd.status().map_err(|source| ExecutorError::Spawn {
            program: program.clone(),
            source,
        })?;
        if status.success() {
            Ok(())
        } else {
            Err(ExecutorError::Failed { program, status })
        }
    }
}

/// Collect `failed<TAB>id<TAB>message` lines for pages that were requested.
fn parse_batch_report(stdout: &str, requested: &HashSet<&str>) -> BatchOutcome {
    let mut failures = Vec::new();
    for line in stdout.lines() {
        let mut parts = line.splitn(3, '\t');
        match (parts.next(), parts.next(), parts.next()) {
            (Some("failed"), Some(id), message) if requested.contains(id) => {
                failures.push(PageFailure {
                    page_id: id.to_string(),
                    message: message.unwrap_or("build failed").to_string(),
                });
            }
            (Some("failed"), Some(id), _) => {
                tracing::warn!(page = id, "batch command reported a page it was not asked to build");
            }
            _ => tracing::debug!(line, "batch command output"),
        }
    }
    BatchOutcome { failures }
}
