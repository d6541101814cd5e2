//! Checkpointed batch ingestion from CSV sources.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::agents::AgentCore;
use crate::core::batch::{DEFAULT_BATCH_SIZE, IngestSummary, IngestTally};
use crate::core::context::TaskInput;
use crate::core::table::TableRef;
use crate::core::types::ValidationOutcome;
use crate::io::checkpoint::{Checkpoint, load_checkpoint, write_checkpoint};
use crate::io::source::CsvSource;
use crate::io::store::{Storage, StorageConnection, StoreError};

/// Sleep policy between connection attempts.
///
/// The backoff sleep is the pipeline's only blocking point; injecting it lets
/// tests assert retry timing without waiting.
pub trait Sleeper {
    fn sleep(&self, wait: Duration);
}

/// Production sleeper backed by `std::thread::sleep`.
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, wait: Duration) {
        thread::sleep(wait);
    }
}

/// Loads CSV sources into the destination store in transactional chunks.
///
/// Task input: `source_file`, `target_table` (`schema.table`), optional
/// `batch_size` and `checkpoint_file`. With a checkpoint file configured the
/// run resumes past already-processed data rows and persists progress after
/// every successful chunk.
pub struct IngestionAgent {
    storage: Box<dyn Storage>,
    sleeper: Box<dyn Sleeper>,
    default_batch_size: u64,
    max_retries: u32,
}

impl IngestionAgent {
    pub fn new(storage: Box<dyn Storage>) -> Self {
        Self {
            storage,
            sleeper: Box::new(ThreadSleeper),
            default_batch_size: DEFAULT_BATCH_SIZE,
            max_retries: 3,
        }
    }

    #[must_use]
    pub fn with_default_batch_size(mut self, batch_size: u64) -> Self {
        self.default_batch_size = batch_size;
        self
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Box<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Connect to the destination, retrying transient faults with
    /// exponential backoff (1s, 2s, ...). Non-transient connect errors and
    /// the final failed attempt propagate to the caller.
    fn connect_with_retry(&self) -> Result<Box<dyn StorageConnection>> {
        let mut attempt = 0u32;
        loop {
            match self.storage.connect() {
                Ok(conn) => {
                    if attempt > 0 {
                        info!(attempt, "destination connected after retry");
                    }
                    return Ok(conn);
                }
                Err(StoreError::Unavailable(reason)) => {
                    attempt += 1;
                    if attempt >= self.max_retries {
                        return Err(anyhow!(
                            "destination unavailable after {} attempts: {reason}",
                            self.max_retries
                        ));
                    }
                    let wait = Duration::from_secs(2u64.pow(attempt - 1));
                    warn!(
                        attempt,
                        wait_secs = wait.as_secs(),
                        "destination connection failed, backing off"
                    );
                    self.sleeper.sleep(wait);
                }
                Err(other) => return Err(other).context("connect to destination"),
            }
        }
    }
}

impl AgentCore for IngestionAgent {
    fn name(&self) -> &str {
        "data-ingestion"
    }

    fn description(&self) -> &str {
        "loads CSV sources into the destination store in checkpointed transactional batches"
    }

    fn validate_inputs(&self, input: &TaskInput) -> ValidationOutcome {
        let mut errors = Vec::new();

        match (input.has("source_file"), input.str_field("source_file")) {
            (false, _) => errors.push("missing required field: source_file".to_string()),
            (true, None) => errors.push("source_file must be a string".to_string()),
            (true, Some(path)) if path.trim().is_empty() => {
                errors.push("source_file must not be empty".to_string());
            }
            (true, Some(path)) if !Path::new(path).exists() => {
                errors.push(format!("source file not found: {path}"));
            }
            _ => {}
        }

        match (input.has("target_table"), input.str_field("target_table")) {
            (false, _) => errors.push("missing required field: target_table".to_string()),
            (true, None) => errors.push("target_table must be a string".to_string()),
            (true, Some(raw)) => {
                if let Err(err) = TableRef::parse(raw) {
                    errors.push(err.to_string());
                }
            }
        }

        if input.has("batch_size") {
            match input.u64_field("batch_size") {
                Some(batch_size) if batch_size > 0 => {}
                _ => errors.push("batch_size must be a positive integer".to_string()),
            }
        }

        if errors.is_empty() {
            ValidationOutcome::ok()
        } else {
            ValidationOutcome::fail(errors)
        }
    }

    fn run_core(&self, input: &TaskInput) -> Result<Value> {
        let source_path = input
            .str_field("source_file")
            .ok_or_else(|| anyhow!("missing source_file"))?;
        let table_raw = input
            .str_field("target_table")
            .ok_or_else(|| anyhow!("missing target_table"))?;
        let table = TableRef::parse(table_raw)?;
        let batch_size = input.u64_field("batch_size").unwrap_or(self.default_batch_size);
        let checkpoint_path = input.str_field("checkpoint_file").map(PathBuf::from);

        let resume_offset = match &checkpoint_path {
            Some(path) => load_checkpoint(path)?
                .map(|checkpoint| checkpoint.last_row)
                .unwrap_or(0),
            None => 0,
        };
        if resume_offset > 0 {
            info!(resume_offset, source = source_path, "resuming from checkpoint");
        }

        let mut conn = self.connect_with_retry()?;

        let source = CsvSource::new(Path::new(source_path));
        let total_rows = source.count_data_rows()?;
        let mut rows = source.rows()?;
        let columns = rows.header().to_vec();
        conn.ensure_table(&table, &columns)?;

        rows.skip_rows(resume_offset)?;

        let mut tally = IngestTally::default();
        let mut chunk = 0u64;
        loop {
            let batch = rows.next_batch(batch_size as usize)?;
            if batch.is_empty() {
                break;
            }
            chunk += 1;
            let rows_in_chunk = batch.len() as u64;

            match conn.insert_rows(&table, &columns, &batch) {
                Ok(()) => {
                    tally.record_success(rows_in_chunk);
                    debug!(chunk, rows = rows_in_chunk, "chunk ingested");
                    if let Some(path) = &checkpoint_path {
                        let checkpoint = Checkpoint {
                            last_row: tally.checkpoint_row(resume_offset),
                        };
                        // Progress must not be lost to a checkpoint hiccup;
                        // a stale offset only re-ingests one chunk on resume.
                        if let Err(err) = write_checkpoint(path, &checkpoint) {
                            warn!(chunk, err = %format!("{err:#}"), "checkpoint write failed, continuing");
                        }
                    }
                }
                Err(err) => {
                    tally.record_failure(rows_in_chunk);
                    warn!(chunk, rows = rows_in_chunk, err = %err, "chunk failed, continuing");
                }
            }
        }

        let summary = IngestSummary::new(source_path, &table, total_rows, tally);
        info!(
            total_rows = summary.total_rows,
            rows_ingested = summary.rows_ingested,
            rows_failed = summary.rows_failed,
            "ingestion finished"
        );
        Ok(serde_json::to_value(summary)?)
    }
}
