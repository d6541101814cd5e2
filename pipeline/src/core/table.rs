//! Two-part destination table references (`schema.table`).

use std::fmt;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// A validated `schema.table` destination reference.
///
/// Both parts must be plain identifiers, so a reference can be spliced into
/// SQL as a quoted name without further escaping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRef {
    schema: String,
    table: String,
}

impl TableRef {
    /// Parse `schema.table`; exactly one dot, both parts identifiers.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut parts = raw.split('.');
        let (Some(schema), Some(table), None) = (parts.next(), parts.next(), parts.next()) else {
            bail!("table reference '{raw}' must be in 'schema.table' form");
        };
        if !is_valid_identifier(schema) {
            bail!("invalid schema name '{schema}' in table reference '{raw}'");
        }
        if !is_valid_identifier(table) {
            bail!("invalid table name '{table}' in table reference '{raw}'");
        }
        Ok(Self {
            schema: schema.to_string(),
            table: table.to_string(),
        })
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// The dotted form, e.g. `raw.patients`.
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

/// ASCII identifier check: `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return false;
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
