//! Workflow orchestration: crews in stages with decision gates between them.

use std::time::Instant;

use tracing::{info, warn};

use crate::core::context::WorkflowContext;
use crate::core::gate::{DecisionGate, data_quality_gate, model_performance_gate};
use crate::core::report::{CrewRecord, WorkflowReport};
use crate::core::types::RunStatus;
use crate::crew::CrewRunner;

/// One orchestrated stage: a crew and an optional gate evaluated after it.
struct WorkflowStage {
    crew: Box<dyn CrewRunner>,
    gate: Option<DecisionGate>,
}

/// Runs crews in a fixed sequence with decision gates between stages.
///
/// A failed crew fails the workflow and stops it. A missed gate stops it as
/// `partial_success`: everything that ran succeeded and downstream crews are
/// skipped, not failed.
#[derive(Default)]
pub struct WorkflowOrchestrator {
    stages: Vec<WorkflowStage>,
}

impl WorkflowOrchestrator {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Append a stage; the gate, when given, is evaluated after the crew
    /// succeeds.
    #[must_use]
    pub fn with_stage(mut self, crew: Box<dyn CrewRunner>, gate: Option<DecisionGate>) -> Self {
        self.stages.push(WorkflowStage { crew, gate });
        self
    }

    pub fn run(&mut self, context: &WorkflowContext) -> WorkflowReport {
        let started = Instant::now();
        info!(stages = self.stages.len(), "workflow starting");
        let mut records = Vec::new();
        let mut status = RunStatus::Success;

        for stage in &mut self.stages {
            let crew_name = stage.crew.name().to_string();
            let crew_context = context.crew(&crew_name).cloned().unwrap_or_default();
            let crew_started = Instant::now();
            let report = stage.crew.kickoff(&crew_context);
            let duration_ms = crew_started.elapsed().as_millis() as u64;

            if !report.is_success() {
                warn!(
                    crew = %crew_name,
                    failed_at = ?report.failed_at,
                    "crew failed, stopping workflow"
                );
                records.push(CrewRecord {
                    crew: crew_name,
                    report,
                    duration_ms,
                    gate: None,
                });
                status = RunStatus::Failed;
                break;
            }

            let gate = stage.gate.as_ref().map(|gate| gate.evaluate(&report));
            let gate_missed = gate.as_ref().is_some_and(|record| !record.met);
            if let Some(record) = &gate {
                if record.met {
                    info!(
                        crew = %crew_name,
                        metric = %record.metric,
                        observed = record.observed,
                        "gate passed"
                    );
                } else {
                    warn!(
                        crew = %crew_name,
                        metric = %record.metric,
                        observed = record.observed,
                        threshold = record.threshold,
                        "gate missed, skipping downstream crews"
                    );
                }
            }
            records.push(CrewRecord {
                crew: crew_name,
                report,
                duration_ms,
                gate,
            });
            if gate_missed {
                status = RunStatus::PartialSuccess;
                break;
            }
        }

        let report =
            WorkflowReport::summarize(status, records, started.elapsed().as_millis() as u64);
        info!(
            status = ?report.workflow_status,
            crews_executed = report.crews_executed,
            total_duration_ms = report.total_duration_ms,
            "workflow finished"
        );
        report
    }
}

/// The standard three-stage workflow: `data-pipeline` gated on data quality,
/// `model-development` gated on model performance, then `deployment`.
pub fn standard_workflow(
    data_pipeline: Box<dyn CrewRunner>,
    model_development: Box<dyn CrewRunner>,
    deployment: Box<dyn CrewRunner>,
) -> WorkflowOrchestrator {
    WorkflowOrchestrator::new()
        .with_stage(data_pipeline, Some(data_quality_gate()))
        .with_stage(model_development, Some(model_performance_gate()))
        .with_stage(deployment, None)
}
