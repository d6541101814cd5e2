//! Transformation runs through the external dbt-style tool.

use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::agents::AgentCore;
use crate::core::context::TaskInput;
use crate::core::types::ValidationOutcome;
use crate::io::config::TransformConfig;
use crate::io::invoker::{ToolInvoker, ToolRequest};

/// Transformation run report, returned as the agent's output payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformSummary {
    /// The full rendered command line.
    pub command: String,
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Runs the transformation tool (dbt or compatible) in the project directory.
///
/// Task input: `command` (a tool subcommand such as `run` or `test`),
/// optional `models` (list of selectors) and `vars` (JSON object passed to
/// the tool as compact JSON). The tool itself is opaque; this agent only
/// builds the invocation and interprets success or failure.
pub struct TransformationAgent {
    invoker: Box<dyn ToolInvoker>,
    config: TransformConfig,
}

impl TransformationAgent {
    pub fn new(invoker: Box<dyn ToolInvoker>, config: TransformConfig) -> Self {
        Self { invoker, config }
    }

    fn build_args(&self, command: &str, input: &TaskInput) -> Result<Vec<String>> {
        let mut args = vec![command.to_string()];
        if let Some(models) = input.str_list_field("models") {
            if !models.is_empty() {
                args.push("--models".to_string());
                args.extend(models);
            }
        }
        if let Some(vars) = input.object_field("vars") {
            if !vars.is_empty() {
                args.push("--vars".to_string());
                args.push(serde_json::to_string(vars)?);
            }
        }
        Ok(args)
    }
}

impl AgentCore for TransformationAgent {
    fn name(&self) -> &str {
        "data-transformation"
    }

    fn description(&self) -> &str {
        "runs the external transformation tool against the project's models"
    }

    fn validate_inputs(&self, input: &TaskInput) -> ValidationOutcome {
        let mut errors = Vec::new();

        match (input.has("command"), input.str_field("command")) {
            (false, _) => errors.push("missing required field: command".to_string()),
            (true, None) => errors.push("command must be a string".to_string()),
            (true, Some(command)) if command.trim().is_empty() => {
                errors.push("command must not be empty".to_string());
            }
            _ => {}
        }

        if input.has("models") && input.str_list_field("models").is_none() {
            errors.push("models must be a list of strings".to_string());
        }

        if input.has("vars") && input.object_field("vars").is_none() {
            errors.push("vars must be an object".to_string());
        }

        if !self.config.project_dir.is_dir() {
            errors.push(format!(
                "transformation project directory not found: {}",
                self.config.project_dir.display()
            ));
        }

        if errors.is_empty() {
            ValidationOutcome::ok()
        } else {
            ValidationOutcome::fail(errors)
        }
    }

    fn run_core(&self, input: &TaskInput) -> Result<Value> {
        let command = input
            .str_field("command")
            .ok_or_else(|| anyhow!("missing command"))?;
        let args = self.build_args(command, input)?;
        let request = ToolRequest {
            program: self.config.tool.clone(),
            args,
            workdir: self.config.project_dir.clone(),
            timeout: Duration::from_secs(self.config.timeout_secs),
            output_limit_bytes: self.config.output_limit_bytes,
        };

        let outcome = self.invoker.invoke(&request)?;
        if !outcome.success {
            let exit_code = outcome
                .exit_code
                .map_or("signal".to_string(), |code| code.to_string());
            bail!(
                "{} {command} failed with exit code {exit_code}: {}",
                self.config.tool,
                outcome.stderr.trim()
            );
        }

        info!(
            command,
            exit_code = ?outcome.exit_code,
            "transformation finished"
        );
        let summary = TransformSummary {
            command: format!("{} {}", self.config.tool, request.args.join(" ")),
            success: true,
            exit_code: outcome.exit_code,
            stdout: outcome.stdout,
            stderr: outcome.stderr,
        };
        Ok(serde_json::to_value(summary)?)
    }
}
