//! Threshold policy for crew post-conditions and workflow decision gates.
//!
//! Thresholds are deliberate policy constants, not configuration. Callers
//! that need different policy construct their own [`ScoreThreshold`].

use serde_json::Value;

use crate::core::report::{CrewReport, GateRecord};

/// Minimum acceptable data quality score (crew post-condition and gate).
pub const DATA_QUALITY_THRESHOLD: f64 = 0.90;
/// Minimum acceptable model performance metric for promotion.
pub const MODEL_PERFORMANCE_THRESHOLD: f64 = 0.80;

/// Check of a named numeric field against a minimum value.
///
/// A missing or non-numeric field reads as 0.0, so an absent score can never
/// pass a gate.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreThreshold {
    pub metric: String,
    pub threshold: f64,
}

impl ScoreThreshold {
    pub fn new(metric: &str, threshold: f64) -> Self {
        Self {
            metric: metric.to_string(),
            threshold,
        }
    }

    /// Evaluate against a payload (an agent output object).
    pub fn evaluate(&self, payload: Option<&Value>) -> GateRecord {
        let observed = payload
            .and_then(|value| value.get(&self.metric))
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        GateRecord {
            metric: self.metric.clone(),
            threshold: self.threshold,
            observed,
            met: observed >= self.threshold,
        }
    }
}

/// A between-stages workflow gate: inspects one task's output in the
/// preceding crew's report.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionGate {
    pub task: String,
    pub check: ScoreThreshold,
}

impl DecisionGate {
    pub fn new(task: &str, metric: &str, threshold: f64) -> Self {
        Self {
            task: task.to_string(),
            check: ScoreThreshold::new(metric, threshold),
        }
    }

    pub fn evaluate(&self, report: &CrewReport) -> GateRecord {
        self.check.evaluate(report.task_output(&self.task))
    }
}

/// Gate applied after the data-pipeline crew.
pub fn data_quality_gate() -> DecisionGate {
    DecisionGate::new("quality", "overall_score", DATA_QUALITY_THRESHOLD)
}

/// Gate applied after the model-development crew.
pub fn model_performance_gate() -> DecisionGate {
    DecisionGate::new("training", "auroc", MODEL_PERFORMANCE_THRESHOLD)
}
