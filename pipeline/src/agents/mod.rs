//! The uniform agent execution lifecycle.
//!
//! Concrete behavior (what to validate, what work to do) is supplied through
//! [`AgentCore`]. The [`Agent`] wrapper owns the lifecycle every unit of work
//! shares: validate the input, run the core with every fault captured at this
//! boundary, and record an immutable [`ExecutionResult`] in the agent's
//! history exactly once per invocation, on every path.

use std::collections::BTreeMap;
use std::time::Instant;

use anyhow::Result;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::core::context::TaskInput;
use crate::core::types::{AgentStatus, ExecutionResult, ValidationOutcome};

pub mod ingestion;
pub mod quality;
pub mod transformation;

/// Most recent results kept per agent; older entries drop off the front.
pub const HISTORY_LIMIT: usize = 32;

/// Core behavior supplied by a concrete agent.
pub trait AgentCore {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// Check the task input before any work happens, accumulating every
    /// problem found rather than stopping at the first.
    fn validate_inputs(&self, input: &TaskInput) -> ValidationOutcome;
    /// Do the work. Only invoked for valid input; any error is captured by
    /// [`Agent::execute`] and never propagates further.
    fn run_core(&self, input: &TaskInput) -> Result<Value>;
}

/// Uniform validate-then-execute lifecycle around an [`AgentCore`].
pub struct Agent {
    core: Box<dyn AgentCore>,
    status: AgentStatus,
    history: Vec<ExecutionResult>,
}

impl Agent {
    pub fn new(core: Box<dyn AgentCore>) -> Self {
        Self {
            core,
            status: AgentStatus::Idle,
            history: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.core.name()
    }

    pub fn description(&self) -> &str {
        self.core.description()
    }

    pub fn status(&self) -> AgentStatus {
        self.status
    }

    /// Results of past invocations, oldest first, at most [`HISTORY_LIMIT`].
    pub fn history(&self) -> &[ExecutionResult] {
        &self.history
    }

    /// Run one invocation to a recorded result.
    ///
    /// Invalid input fails without invoking the core; a core error becomes a
    /// failed result carrying the error's display chain. Either way the
    /// result lands in the history exactly once and is returned by clone.
    pub fn execute(&mut self, input: &TaskInput) -> ExecutionResult {
        let started = Instant::now();
        self.status = AgentStatus::Running;
        info!(agent = self.core.name(), "starting execution");

        let outcome = self.core.validate_inputs(input);
        let result = if outcome.valid {
            match self.core.run_core(input) {
                Ok(output) => {
                    let mut metrics = BTreeMap::new();
                    metrics.insert(
                        "duration_ms".to_string(),
                        Value::from(started.elapsed().as_millis() as u64),
                    );
                    let mut metadata = BTreeMap::new();
                    metadata.insert("agent_name".to_string(), Value::from(self.core.name()));
                    metadata.insert("context".to_string(), input.as_value());
                    ExecutionResult::success(output, metrics, metadata)
                }
                Err(err) => {
                    warn!(agent = self.core.name(), err = %format!("{err:#}"), "core execution failed");
                    ExecutionResult::failure(vec![format!("{err:#}")])
                }
            }
        } else {
            warn!(
                agent = self.core.name(),
                errors = outcome.errors.len(),
                "input validation failed"
            );
            ExecutionResult::failure(outcome.errors)
        };

        self.status = result.status;
        self.record(result.clone());
        debug!(agent = self.core.name(), status = ?self.status, "result recorded");
        result
    }

    /// Return to `Idle` and forget past results.
    pub fn reset(&mut self) {
        self.status = AgentStatus::Idle;
        self.history.clear();
    }

    fn record(&mut self, result: ExecutionResult) {
        if self.history.len() == HISTORY_LIMIT {
            self.history.remove(0);
        }
        self.history.push(result);
    }
}
