//! Transformation tool invocation behind a capability trait.
//!
//! The [`ToolInvoker`] trait decouples the transformation agent from the
//! actual tool binary (dbt or compatible). The tool is opaque: the agent only
//! sees success/failure plus captured output. Tests use scripted invokers
//! that return predetermined outcomes without spawning processes.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::io::process::run_command_with_timeout;

/// Parameters for one tool invocation.
#[derive(Debug, Clone)]
pub struct ToolRequest {
    /// Program to run, e.g. `dbt`.
    pub program: String,
    pub args: Vec<String>,
    /// Working directory, the transformation project root.
    pub workdir: PathBuf,
    pub timeout: Duration,
    /// Truncate captured stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,
}

/// Captured outcome of a finished tool process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutcome {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Abstraction over the external transformation tool.
pub trait ToolInvoker {
    /// Run the tool to completion. `Err` means the tool could not be run at
    /// all (spawn failure, timeout); a non-zero exit is a normal
    /// unsuccessful [`ToolOutcome`].
    fn invoke(&self, request: &ToolRequest) -> Result<ToolOutcome>;
}

/// Invoker that spawns the real subprocess.
pub struct ProcessToolInvoker;

impl ToolInvoker for ProcessToolInvoker {
    #[instrument(skip_all, fields(program = %request.program, timeout_secs = request.timeout.as_secs()))]
    fn invoke(&self, request: &ToolRequest) -> Result<ToolOutcome> {
        info!(
            workdir = %request.workdir.display(),
            args = ?request.args,
            "invoking transformation tool"
        );
        let mut cmd = Command::new(&request.program);
        cmd.args(&request.args).current_dir(&request.workdir);

        let output = run_command_with_timeout(cmd, request.timeout, request.output_limit_bytes)
            .with_context(|| format!("run {}", request.program))?;

        if output.timed_out {
            warn!(
                timeout_secs = request.timeout.as_secs(),
                "transformation tool timed out"
            );
            return Err(anyhow!(
                "{} timed out after {:?}",
                request.program,
                request.timeout
            ));
        }

        debug!(exit_code = ?output.status.code(), "transformation tool finished");
        Ok(ToolOutcome {
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: output.stdout_text(),
            stderr: output.stderr_text(),
        })
    }
}
