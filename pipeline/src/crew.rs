//! Crews: named tasks executed fail-fast in a fixed order.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::agents::Agent;
use crate::core::context::CrewContext;
use crate::core::gate::{DATA_QUALITY_THRESHOLD, ScoreThreshold};
use crate::core::report::CrewReport;

/// Seam between the orchestrator and concrete crews.
pub trait CrewRunner {
    fn name(&self) -> &str;
    /// Run the crew's tasks against one context to an aggregated report.
    fn kickoff(&mut self, context: &CrewContext) -> CrewReport;
}

/// One named task slot: an agent plus an optional post-condition on its
/// successful output.
struct TaskSlot {
    task: String,
    agent: Agent,
    post_condition: Option<ScoreThreshold>,
}

/// An ordered set of task slots executed fail-fast.
///
/// Task order is fixed at construction; the context only decides which tasks
/// run. A task absent from the context is skipped without touching its agent.
/// The first non-success result, including a post-condition miss on an
/// otherwise successful task, fails the crew and leaves later tasks
/// untouched.
pub struct Crew {
    name: String,
    tasks: Vec<TaskSlot>,
}

impl Crew {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            tasks: Vec::new(),
        }
    }

    /// Append a task slot.
    #[must_use]
    pub fn with_task(mut self, task: &str, agent: Agent) -> Self {
        self.tasks.push(TaskSlot {
            task: task.to_string(),
            agent,
            post_condition: None,
        });
        self
    }

    /// Append a task slot whose successful output must satisfy `check`.
    #[must_use]
    pub fn with_checked_task(mut self, task: &str, agent: Agent, check: ScoreThreshold) -> Self {
        self.tasks.push(TaskSlot {
            task: task.to_string(),
            agent,
            post_condition: Some(check),
        });
        self
    }
}

impl CrewRunner for Crew {
    fn name(&self) -> &str {
        &self.name
    }

    fn kickoff(&mut self, context: &CrewContext) -> CrewReport {
        info!(crew = %self.name, "crew starting");
        let mut results = BTreeMap::new();

        for slot in &mut self.tasks {
            let Some(input) = context.task(&slot.task) else {
                debug!(crew = %self.name, task = %slot.task, "task absent from context, skipped");
                continue;
            };

            info!(crew = %self.name, task = %slot.task, "task starting");
            let result = slot.agent.execute(input);

            if !result.is_success() {
                warn!(crew = %self.name, task = %slot.task, "task failed, stopping crew");
                results.insert(slot.task.clone(), result);
                return CrewReport::failed(results, &slot.task);
            }

            if let Some(check) = &slot.post_condition {
                let record = check.evaluate(result.output.as_ref());
                if !record.met {
                    warn!(
                        crew = %self.name,
                        task = %slot.task,
                        metric = %record.metric,
                        observed = record.observed,
                        threshold = record.threshold,
                        "post-condition not met, stopping crew"
                    );
                    results.insert(slot.task.clone(), result);
                    return CrewReport::failed(results, &slot.task);
                }
                debug!(
                    crew = %self.name,
                    task = %slot.task,
                    observed = record.observed,
                    "post-condition met"
                );
            }

            results.insert(slot.task.clone(), result);
        }

        info!(crew = %self.name, tasks = results.len(), "crew finished");
        CrewReport::success(results)
    }
}

/// The standard data-pipeline crew: `ingestion`, `transformation`, `quality`
/// in that order, with the data quality post-condition on the quality task.
pub fn data_pipeline_crew(ingestion: Agent, transformation: Agent, quality: Agent) -> Crew {
    Crew::new("data-pipeline")
        .with_task("ingestion", ingestion)
        .with_task("transformation", transformation)
        .with_checked_task(
            "quality",
            quality,
            ScoreThreshold::new("overall_score", DATA_QUALITY_THRESHOLD),
        )
}
