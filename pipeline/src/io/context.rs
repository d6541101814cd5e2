//! Crew context loading with schema validation.
//!
//! The CLI accepts a JSON context document describing the task inputs for one
//! crew run. The document is validated against the embedded schema before
//! deserializing, so typos in task names or field types fail up front with
//! schema messages instead of mid-pipeline.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result, anyhow};
use jsonschema::{Validator, validator_for};
use serde_json::Value;

use crate::core::context::CrewContext;

const CREW_CONTEXT_SCHEMA: &str = include_str!("../../schemas/crew_context.schema.json");

static SCHEMA_VALIDATOR: LazyLock<Validator> = LazyLock::new(|| {
    let schema: Value =
        serde_json::from_str(CREW_CONTEXT_SCHEMA).expect("embedded schema should be valid json");
    validator_for(&schema).expect("embedded schema should compile")
});

/// Load and validate a crew context document from disk.
pub fn load_crew_context(path: &Path) -> Result<CrewContext> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read context {}", path.display()))?;
    parse_crew_context(&contents).with_context(|| format!("load context {}", path.display()))
}

/// Parse and validate a crew context document.
pub fn parse_crew_context(contents: &str) -> Result<CrewContext> {
    let value: Value = serde_json::from_str(contents).context("parse context json")?;
    validate_against_schema(&value)?;
    let context: CrewContext =
        serde_json::from_value(value).context("deserialize crew context")?;
    Ok(context)
}

fn validate_against_schema(value: &Value) -> Result<()> {
    let messages = SCHEMA_VALIDATOR
        .iter_errors(value)
        .map(|err| err.to_string())
        .collect::<Vec<_>>();
    if !messages.is_empty() {
        return Err(anyhow!(
            "context schema validation failed: {}",
            messages.join("; ")
        ));
    }
    Ok(())
}
