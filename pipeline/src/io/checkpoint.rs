//! Durable resume offsets for checkpointed ingestion.
//!
//! A checkpoint file holds one JSON object, `{"last_row": N}`, counting data
//! rows already processed (the header is never part of the count). Writes go
//! through a temp file + rename so a crash never leaves a torn record.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Persisted resume offset for one source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub last_row: u64,
}

/// Load a checkpoint, `None` when the file does not exist.
pub fn load_checkpoint(path: &Path) -> Result<Option<Checkpoint>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents =
        fs::read_to_string(path).with_context(|| format!("read checkpoint {}", path.display()))?;
    let checkpoint: Checkpoint = serde_json::from_str(&contents)
        .with_context(|| format!("parse checkpoint {}", path.display()))?;
    debug!(path = %path.display(), last_row = checkpoint.last_row, "checkpoint loaded");
    Ok(Some(checkpoint))
}

/// Atomically write a checkpoint to disk (temp file + rename).
pub fn write_checkpoint(path: &Path, checkpoint: &Checkpoint) -> Result<()> {
    debug!(path = %path.display(), last_row = checkpoint.last_row, "writing checkpoint");
    let mut buf = serde_json::to_string_pretty(checkpoint)?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("checkpoint path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp checkpoint {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("replace checkpoint {}", path.display()))?;
    Ok(())
}
