//! Report types produced by crews and workflows.
//!
//! Reports are plain serde data with stable key order; run artifacts are
//! written and printed as pretty JSON.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::types::{ExecutionResult, RunStatus};

/// Outcome of one crew run.
///
/// `results` maps task name to its execution result; skipped tasks have no
/// entry. `failed_at` is present only for failed reports and names the task
/// that stopped the crew.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrewReport {
    pub status: RunStatus,
    pub results: BTreeMap<String, ExecutionResult>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub failed_at: Option<String>,
}

impl CrewReport {
    pub fn success(results: BTreeMap<String, ExecutionResult>) -> Self {
        Self {
            status: RunStatus::Success,
            results,
            failed_at: None,
        }
    }

    pub fn failed(results: BTreeMap<String, ExecutionResult>, failed_at: &str) -> Self {
        Self {
            status: RunStatus::Failed,
            results,
            failed_at: Some(failed_at.to_string()),
        }
    }

    /// Convenience constructor for scripted reports in tests and fakes.
    pub fn success_from(pairs: Vec<(&str, ExecutionResult)>) -> Self {
        Self::success(
            pairs
                .into_iter()
                .map(|(task, result)| (task.to_string(), result))
                .collect(),
        )
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }

    /// The `output` payload of a named task's result, if the task ran and
    /// produced one.
    pub fn task_output(&self, task: &str) -> Option<&Value> {
        self.results.get(task)?.output.as_ref()
    }
}

/// A gate evaluation, kept in the workflow report for auditability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateRecord {
    pub metric: String,
    pub threshold: f64,
    pub observed: f64,
    pub met: bool,
}

/// One executed stage inside a workflow report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrewRecord {
    pub crew: String,
    pub report: CrewReport,
    pub duration_ms: u64,
    /// Present when the stage had a gate and the crew succeeded.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub gate: Option<GateRecord>,
}

/// Outcome of one orchestrated workflow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowReport {
    pub workflow_status: RunStatus,
    pub total_duration_ms: u64,
    pub crews_executed: usize,
    pub crews_succeeded: usize,
    pub crews_failed: usize,
    pub crew_reports: Vec<CrewRecord>,
    pub timestamp: DateTime<Utc>,
}

impl WorkflowReport {
    /// Build the summary from executed stage records.
    pub fn summarize(
        workflow_status: RunStatus,
        crew_reports: Vec<CrewRecord>,
        total_duration_ms: u64,
    ) -> Self {
        let crews_succeeded = crew_reports
            .iter()
            .filter(|record| record.report.is_success())
            .count();
        let crews_failed = crew_reports
            .iter()
            .filter(|record| record.report.status == RunStatus::Failed)
            .count();
        Self {
            workflow_status,
            total_duration_ms,
            crews_executed: crew_reports.len(),
            crews_succeeded,
            crews_failed,
            crew_reports,
            timestamp: Utc::now(),
        }
    }
}
