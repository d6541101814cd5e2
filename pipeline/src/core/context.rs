//! Context maps that drive crews and workflows.
//!
//! A [`CrewContext`] maps task names to their input configuration; key
//! presence decides whether a task runs at all. A [`WorkflowContext`] maps
//! crew names to crew contexts. Both deserialize directly from the JSON
//! context documents the CLI accepts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Input configuration for one named task: a JSON object with typed accessors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskInput(Map<String, Value>);

impl TaskInput {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builder-style insert, used by the CLI and tests.
    #[must_use]
    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.0.insert(key.to_string(), value);
        self
    }

    pub fn has(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The field as a string, `None` when absent or not a string.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// The field as an unsigned integer, `None` when absent or not one.
    pub fn u64_field(&self, key: &str) -> Option<u64> {
        self.0.get(key).and_then(Value::as_u64)
    }

    /// The field as a list of strings, `None` when absent or when any element
    /// is not a string.
    pub fn str_list_field(&self, key: &str) -> Option<Vec<String>> {
        let items = self.0.get(key)?.as_array()?;
        items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect()
    }

    pub fn object_field(&self, key: &str) -> Option<&Map<String, Value>> {
        self.0.get(key).and_then(Value::as_object)
    }

    /// The full input as a JSON value, for result metadata.
    pub fn as_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

/// Map of task name to task input for one crew run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrewContext(BTreeMap<String, TaskInput>);

impl CrewContext {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    #[must_use]
    pub fn with_task(mut self, name: &str, input: TaskInput) -> Self {
        self.0.insert(name.to_string(), input);
        self
    }

    /// Input for the named task; `None` means the task is skipped.
    pub fn task(&self, name: &str) -> Option<&TaskInput> {
        self.0.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Map of crew name to crew context for one workflow run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowContext(BTreeMap<String, CrewContext>);

impl WorkflowContext {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    #[must_use]
    pub fn with_crew(mut self, name: &str, context: CrewContext) -> Self {
        self.0.insert(name.to_string(), context);
        self
    }

    pub fn crew(&self, name: &str) -> Option<&CrewContext> {
        self.0.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn crew_context_deserializes_from_json_document() {
        let raw = json!({
            "ingestion": {"source_file": "a.csv", "target_table": "raw.a", "batch_size": 500},
            "quality": {"table_name": "raw.a", "checks": ["completeness"]}
        });

        let context: CrewContext = serde_json::from_value(raw).expect("deserialize");
        let ingestion = context.task("ingestion").expect("ingestion present");
        assert_eq!(ingestion.str_field("source_file"), Some("a.csv"));
        assert_eq!(ingestion.u64_field("batch_size"), Some(500));
        assert!(context.task("transformation").is_none());
    }

    #[test]
    fn typed_accessors_reject_wrong_types() {
        let input = TaskInput::new()
            .with("source_file", json!(42))
            .with("batch_size", json!("many"))
            .with("models", json!(["staging", 7]));

        assert!(input.has("source_file"));
        assert_eq!(input.str_field("source_file"), None);
        assert_eq!(input.u64_field("batch_size"), None);
        assert_eq!(input.str_list_field("models"), None);
        assert_eq!(input.str_field("missing"), None);
    }

    #[test]
    fn str_list_field_collects_strings() {
        let input = TaskInput::new().with("models", json!(["staging", "marts"]));
        assert_eq!(
            input.str_list_field("models"),
            Some(vec!["staging".to_string(), "marts".to_string()])
        );
    }

    #[test]
    fn as_value_round_trips_the_object() {
        let input = TaskInput::new().with("command", json!("run"));
        assert_eq!(input.as_value(), json!({"command": "run"}));
    }
}
