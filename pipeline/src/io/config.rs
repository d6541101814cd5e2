//! Pipeline configuration loaded from `pipeline.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::batch::DEFAULT_BATCH_SIZE;

/// Pipeline configuration (TOML).
///
/// This file is intended to be edited by humans and must remain stable and
/// automatable. Missing fields default to sensible values, so an absent file
/// is a fully working setup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Embedded destination database file.
    pub database_path: PathBuf,

    pub ingest: IngestConfig,
    pub transform: TransformConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct IngestConfig {
    /// Rows per transactional chunk when the task input sets none.
    pub batch_size: u64,
    /// Connection attempts before an ingestion run gives up.
    pub max_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TransformConfig {
    /// Transformation tool binary (dbt or compatible).
    pub tool: String,
    /// Project directory the tool runs in.
    pub project_dir: PathBuf,
    /// Wall-clock budget for one tool invocation.
    pub timeout_secs: u64,
    /// Truncate captured tool stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("pipeline.db"),
            ingest: IngestConfig::default(),
            transform: TransformConfig::default(),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_retries: 3,
        }
    }
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            tool: "dbt".to_string(),
            project_dir: PathBuf::from("transform"),
            timeout_secs: 30 * 60,
            output_limit_bytes: 100_000,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.ingest.batch_size == 0 {
            return Err(anyhow!("ingest.batch_size must be > 0"));
        }
        if self.ingest.max_retries == 0 {
            return Err(anyhow!("ingest.max_retries must be > 0"));
        }
        if self.transform.tool.trim().is_empty() {
            return Err(anyhow!("transform.tool must not be empty"));
        }
        if self.transform.timeout_secs == 0 {
            return Err(anyhow!("transform.timeout_secs must be > 0"));
        }
        if self.transform.output_limit_bytes == 0 {
            return Err(anyhow!("transform.output_limit_bytes must be > 0"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `PipelineConfig::default()`.
pub fn load_config(path: &Path) -> Result<PipelineConfig> {
    if !path.exists() {
        let cfg = PipelineConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: PipelineConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, PipelineConfig::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("pipeline.toml");
        fs::write(
            &path,
            "database_path = \"clinical.db\"\n\n[ingest]\nbatch_size = 500\n",
        )
        .expect("write");

        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.database_path, PathBuf::from("clinical.db"));
        assert_eq!(cfg.ingest.batch_size, 500);
        assert_eq!(cfg.ingest.max_retries, 3);
        assert_eq!(cfg.transform.tool, "dbt");
    }

    #[test]
    fn serialized_default_round_trips() {
        let cfg = PipelineConfig::default();
        let raw = toml::to_string_pretty(&cfg).expect("serialize");
        let parsed: PipelineConfig = toml::from_str(&raw).expect("parse");
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("pipeline.toml");
        fs::write(&path, "[ingest]\nbatch_size = 0\n").expect("write");

        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("batch_size must be > 0"));
    }

    #[test]
    fn empty_tool_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("pipeline.toml");
        fs::write(&path, "[transform]\ntool = \"  \"\n").expect("write");

        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("transform.tool"));
    }
}
