//! Shared deterministic types for pipeline core logic.
//!
//! These types define stable contracts between agents, crews, and the
//! orchestrator. They carry no I/O and serialize with stable field order so
//! reports stay diffable across runs.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle state of an agent.
///
/// `Paused` is part of the contract but never produced by current flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Idle,
    Running,
    Success,
    Failed,
    Paused,
}

/// Overall outcome of a crew or workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Failed,
    /// A decision gate stopped the workflow; everything executed so far
    /// succeeded and downstream stages were skipped, not failed.
    PartialSuccess,
}

/// Outcome of input validation, prior to any core work.
///
/// `valid == true` implies `errors` is empty; the constructors are the only
/// producers, so the implication holds by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationOutcome {
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    pub fn fail(errors: Vec<String>) -> Self {
        Self {
            valid: false,
            errors,
        }
    }
}

/// Immutable record of one agent invocation.
///
/// `status == Success` iff `errors` is empty and `output` is present. The
/// constructors are the only producers; nothing mutates a result after
/// creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: AgentStatus,
    /// Opaque agent payload; shape is owned by the producing agent.
    pub output: Option<Value>,
    /// Human-readable failure descriptions, in the order they were found.
    pub errors: Vec<String>,
    pub metrics: BTreeMap<String, Value>,
    pub metadata: BTreeMap<String, Value>,
    pub timestamp: DateTime<Utc>,
}

impl ExecutionResult {
    pub fn success(
        output: Value,
        metrics: BTreeMap<String, Value>,
        metadata: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            status: AgentStatus::Success,
            output: Some(output),
            errors: Vec::new(),
            metrics,
            metadata,
            timestamp: Utc::now(),
        }
    }

    pub fn failure(errors: Vec<String>) -> Self {
        Self {
            status: AgentStatus::Failed,
            output: None,
            errors,
            metrics: BTreeMap::new(),
            metadata: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == AgentStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_constructor_upholds_invariant() {
        let result = ExecutionResult::success(json!({"rows": 3}), BTreeMap::new(), BTreeMap::new());
        assert_eq!(result.status, AgentStatus::Success);
        assert!(result.errors.is_empty());
        assert!(result.output.is_some());
        assert!(result.is_success());
    }

    #[test]
    fn failure_constructor_upholds_invariant() {
        let result = ExecutionResult::failure(vec!["missing field".to_string()]);
        assert_eq!(result.status, AgentStatus::Failed);
        assert!(result.output.is_none());
        assert_eq!(result.errors, vec!["missing field".to_string()]);
        assert!(!result.is_success());
    }

    #[test]
    fn validation_outcome_ok_has_no_errors() {
        let outcome = ValidationOutcome::ok();
        assert!(outcome.valid);
        assert!(outcome.errors.is_empty());
    }

    #[test]
    fn validation_outcome_fail_carries_errors_in_order() {
        let outcome = ValidationOutcome::fail(vec!["a".to_string(), "b".to_string()]);
        assert!(!outcome.valid);
        assert_eq!(outcome.errors, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn statuses_serialize_to_stable_strings() {
        assert_eq!(
            serde_json::to_value(AgentStatus::Success).expect("serialize"),
            json!("success")
        );
        assert_eq!(
            serde_json::to_value(AgentStatus::Idle).expect("serialize"),
            json!("idle")
        );
        assert_eq!(
            serde_json::to_value(RunStatus::PartialSuccess).expect("serialize"),
            json!("partial_success")
        );
        assert_eq!(
            serde_json::to_value(RunStatus::Failed).expect("serialize"),
            json!("failed")
        );
    }
}
