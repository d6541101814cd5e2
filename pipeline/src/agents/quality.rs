//! Data quality checks against destination tables.

use anyhow::{Result, anyhow, bail};
use serde_json::{Map, Value, json};
use tracing::info;

use crate::agents::AgentCore;
use crate::core::context::TaskInput;
use crate::core::gate::DATA_QUALITY_THRESHOLD;
use crate::core::table::TableRef;
use crate::core::types::ValidationOutcome;
use crate::io::store::{Storage, StorageConnection};

/// Checks run when the task input does not name any.
pub const DEFAULT_CHECKS: [&str; 2] = ["completeness", "uniqueness"];

/// Scores a destination table on named checks and reports the result.
///
/// Task input: `table_name` (`schema.table`), optional `checks` (default
/// [`DEFAULT_CHECKS`]), optional `key_column` for the uniqueness check
/// (default: the table's first column). The agent only measures and reports;
/// threshold enforcement lives in the crew post-condition and the workflow
/// gate.
pub struct QualityAgent {
    storage: Box<dyn Storage>,
}

impl QualityAgent {
    pub fn new(storage: Box<dyn Storage>) -> Self {
        Self { storage }
    }
}

impl AgentCore for QualityAgent {
    fn name(&self) -> &str {
        "data-quality"
    }

    fn description(&self) -> &str {
        "scores destination tables on completeness and uniqueness checks"
    }

    fn validate_inputs(&self, input: &TaskInput) -> ValidationOutcome {
        let mut errors = Vec::new();

        match (input.has("table_name"), input.str_field("table_name")) {
            (false, _) => errors.push("missing required field: table_name".to_string()),
            (true, None) => errors.push("table_name must be a string".to_string()),
            (true, Some(raw)) => {
                if let Err(err) = TableRef::parse(raw) {
                    errors.push(err.to_string());
                }
            }
        }

        if input.has("checks") {
            match input.str_list_field("checks") {
                Some(checks) => {
                    for check in &checks {
                        if !DEFAULT_CHECKS.contains(&check.as_str()) {
                            errors.push(format!("unknown check: {check}"));
                        }
                    }
                }
                None => errors.push("checks must be a list of strings".to_string()),
            }
        }

        if input.has("key_column") && input.str_field("key_column").is_none() {
            errors.push("key_column must be a string".to_string());
        }

        if errors.is_empty() {
            ValidationOutcome::ok()
        } else {
            ValidationOutcome::fail(errors)
        }
    }

    fn run_core(&self, input: &TaskInput) -> Result<Value> {
        let table_raw = input
            .str_field("table_name")
            .ok_or_else(|| anyhow!("missing table_name"))?;
        let table = TableRef::parse(table_raw)?;
        let checks = input
            .str_list_field("checks")
            .unwrap_or_else(|| DEFAULT_CHECKS.iter().map(|c| (*c).to_string()).collect());

        let conn = self.storage.connect()?;
        let columns = conn.column_names(&table)?;
        let row_count = conn.count_rows(&table)?;
        let key_column = match input.str_field("key_column") {
            Some(key) => key,
            None => columns
                .first()
                .map(String::as_str)
                .ok_or_else(|| anyhow!("table {table} has no columns"))?,
        };

        let mut results = Map::new();
        let mut scores = Vec::new();
        for check in &checks {
            let (score, detail) = match check.as_str() {
                "completeness" => completeness(conn.as_ref(), &table, &columns, row_count)?,
                "uniqueness" => uniqueness(conn.as_ref(), &table, key_column, row_count)?,
                other => bail!("unknown check: {other}"),
            };
            scores.push(score);
            results.insert(check.clone(), detail);
        }

        let overall_score = if scores.is_empty() {
            0.0
        } else {
            scores.iter().sum::<f64>() / scores.len() as f64
        };
        let passed = overall_score >= DATA_QUALITY_THRESHOLD;
        info!(
            table = %table,
            row_count,
            overall_score,
            passed,
            "quality checks finished"
        );

        results.insert("table_name".to_string(), json!(table.qualified()));
        results.insert("row_count".to_string(), json!(row_count));
        results.insert("overall_score".to_string(), json!(overall_score));
        results.insert("passed".to_string(), json!(passed));
        Ok(Value::Object(results))
    }
}

/// Average over all columns of `non_null / row_count`; 1.0 for an empty table.
fn completeness(
    conn: &dyn StorageConnection,
    table: &TableRef,
    columns: &[String],
    row_count: u64,
) -> Result<(f64, Value)> {
    if row_count == 0 {
        let detail = json!({
            "score": 1.0,
            "columns_checked": columns.len(),
            "non_null_values": 0,
            "total_values": 0,
        });
        return Ok((1.0, detail));
    }
    let mut non_null = 0u64;
    for column in columns {
        non_null += conn.count_non_null(table, column)?;
    }
    let total = row_count * columns.len() as u64;
    let score = non_null as f64 / total as f64;
    let detail = json!({
        "score": score,
        "columns_checked": columns.len(),
        "non_null_values": non_null,
        "total_values": total,
    });
    Ok((score, detail))
}

/// `distinct(key_column) / row_count`; 1.0 for an empty table.
fn uniqueness(
    conn: &dyn StorageConnection,
    table: &TableRef,
    key_column: &str,
    row_count: u64,
) -> Result<(f64, Value)> {
    if row_count == 0 {
        let detail = json!({
            "score": 1.0,
            "key_column": key_column,
            "distinct_values": 0,
        });
        return Ok((1.0, detail));
    }
    let distinct = conn.count_distinct(table, key_column)?;
    let score = distinct as f64 / row_count as f64;
    let detail = json!({
        "score": score,
        "key_column": key_column,
        "distinct_values": distinct,
    });
    Ok((score, detail))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::Agent;
    use crate::core::types::AgentStatus;
    use crate::io::store::SqliteStorage;
    use serde_json::json;

    fn seeded_storage(temp: &tempfile::TempDir, rows: &[(&str, &str)]) -> SqliteStorage {
        let storage = SqliteStorage::new(&temp.path().join("destination.db"));
        let table = TableRef::parse("raw.patients").expect("parse");
        let cols = vec!["subject_id".to_string(), "age".to_string()];
        let mut conn = storage.connect().expect("connect");
        conn.ensure_table(&table, &cols).expect("ensure");
        let rows: Vec<Vec<String>> = rows
            .iter()
            .map(|(id, age)| vec![(*id).to_string(), (*age).to_string()])
            .collect();
        conn.insert_rows(&table, &cols, &rows).expect("insert");
        storage
    }

    fn quality_agent(storage: SqliteStorage) -> Agent {
        Agent::new(Box::new(QualityAgent::new(Box::new(storage))))
    }

    fn table_input() -> TaskInput {
        TaskInput::new().with("table_name", json!("raw.patients"))
    }

    #[test]
    fn validation_accumulates_all_problems() {
        let agent = QualityAgent::new(Box::new(crate::test_support::RecordingStorage::new()));
        let input = TaskInput::new()
            .with("table_name", json!("no_schema"))
            .with("checks", json!(["completeness", "volume"]));

        let outcome = agent.validate_inputs(&input);
        assert_eq!(outcome.errors.len(), 2);
        assert!(outcome.errors[0].contains("schema.table"));
        assert_eq!(outcome.errors[1], "unknown check: volume");
    }

    #[test]
    fn validation_requires_table_name() {
        let agent = QualityAgent::new(Box::new(crate::test_support::RecordingStorage::new()));
        let outcome = agent.validate_inputs(&TaskInput::new());
        assert_eq!(
            outcome.errors,
            vec!["missing required field: table_name".to_string()]
        );
    }

    #[test]
    fn perfect_table_passes_with_full_scores() {
        let temp = tempfile::tempdir().expect("tempdir");
        let storage = seeded_storage(&temp, &[("1", "70"), ("2", "64"), ("3", "81")]);
        let mut agent = quality_agent(storage);

        let result = agent.execute(&table_input());

        assert!(result.is_success());
        let output = result.output.expect("output");
        assert_eq!(output["table_name"], json!("raw.patients"));
        assert_eq!(output["row_count"], json!(3));
        assert_eq!(output["completeness"]["score"], json!(1.0));
        assert_eq!(output["uniqueness"]["score"], json!(1.0));
        // Default key column is the table's first column.
        assert_eq!(output["uniqueness"]["key_column"], json!("subject_id"));
        assert_eq!(output["overall_score"], json!(1.0));
        assert_eq!(output["passed"], json!(true));
    }

    #[test]
    fn nulls_lower_completeness_below_the_threshold() {
        let temp = tempfile::tempdir().expect("tempdir");
        let storage = seeded_storage(&temp, &[("1", "70"), ("2", ""), ("3", "")]);
        let mut agent = quality_agent(storage);

        let result = agent.execute(&table_input());

        assert!(result.is_success());
        let output = result.output.expect("output");
        let completeness = output["completeness"]["score"].as_f64().expect("score");
        assert!((completeness - 4.0 / 6.0).abs() < f64::EPSILON);
        assert_eq!(output["completeness"]["non_null_values"], json!(4));
        assert_eq!(output["completeness"]["total_values"], json!(6));
        let overall = output["overall_score"].as_f64().expect("overall");
        assert!((overall - (4.0 / 6.0 + 1.0) / 2.0).abs() < f64::EPSILON);
        assert_eq!(output["passed"], json!(false));
    }

    #[test]
    fn duplicate_keys_lower_uniqueness() {
        let temp = tempfile::tempdir().expect("tempdir");
        let storage = seeded_storage(&temp, &[("1", "70"), ("2", "70"), ("3", "60")]);
        let mut agent = quality_agent(storage);
        let input = table_input().with("key_column", json!("age"));

        let result = agent.execute(&input);

        assert!(result.is_success());
        let output = result.output.expect("output");
        assert_eq!(output["uniqueness"]["key_column"], json!("age"));
        assert_eq!(output["uniqueness"]["distinct_values"], json!(2));
        let uniqueness = output["uniqueness"]["score"].as_f64().expect("score");
        assert!((uniqueness - 2.0 / 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_table_scores_one_on_every_check() {
        let temp = tempfile::tempdir().expect("tempdir");
        let storage = seeded_storage(&temp, &[]);
        let mut agent = quality_agent(storage);

        let result = agent.execute(&table_input());

        assert!(result.is_success());
        let output = result.output.expect("output");
        assert_eq!(output["row_count"], json!(0));
        assert_eq!(output["completeness"]["score"], json!(1.0));
        assert_eq!(output["uniqueness"]["score"], json!(1.0));
        assert_eq!(output["overall_score"], json!(1.0));
        assert_eq!(output["passed"], json!(true));
    }

    #[test]
    fn requested_checks_limit_the_run() {
        let temp = tempfile::tempdir().expect("tempdir");
        let storage = seeded_storage(&temp, &[("1", "70"), ("1", "64")]);
        let mut agent = quality_agent(storage);
        let input = table_input().with("checks", json!(["completeness"]));

        let result = agent.execute(&input);

        assert!(result.is_success());
        let output = result.output.expect("output");
        assert_eq!(output["completeness"]["score"], json!(1.0));
        assert!(output.get("uniqueness").is_none());
        assert_eq!(output["overall_score"], json!(1.0));
    }

    #[test]
    fn missing_table_fails_the_run() {
        let temp = tempfile::tempdir().expect("tempdir");
        let storage = SqliteStorage::new(&temp.path().join("destination.db"));
        let mut agent = quality_agent(storage);

        let result = agent.execute(&table_input());

        assert_eq!(result.status, AgentStatus::Failed);
        assert!(result.errors[0].contains("unknown table raw.patients"));
    }
}
