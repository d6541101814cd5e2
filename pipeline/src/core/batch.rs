//! Pure arithmetic for checkpointed batch ingestion.

use serde::{Deserialize, Serialize};

use crate::core::table::TableRef;

/// Chunk size used when the task input does not set one.
pub const DEFAULT_BATCH_SIZE: u64 = 10_000;

/// Running counters for one ingestion run.
///
/// Every data row read from the source ends up in exactly one of the two
/// counters, so `rows_ingested + rows_failed` equals the number of rows
/// actually processed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestTally {
    pub rows_ingested: u64,
    pub rows_failed: u64,
}

impl IngestTally {
    pub fn record_success(&mut self, rows: u64) {
        self.rows_ingested += rows;
    }

    pub fn record_failure(&mut self, rows: u64) {
        self.rows_failed += rows;
    }

    /// Resume offset to persist after a successful chunk.
    pub fn checkpoint_row(&self, resume_offset: u64) -> u64 {
        resume_offset + self.rows_ingested
    }
}

/// Fraction of source rows ingested this run; 0.0 for an empty source.
pub fn success_rate(rows_ingested: u64, total_rows: u64) -> f64 {
    if total_rows == 0 {
        return 0.0;
    }
    rows_ingested as f64 / total_rows as f64
}

/// Final ingestion report, returned as the agent's output payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestSummary {
    pub source_file: String,
    pub target_table: String,
    pub total_rows: u64,
    pub rows_ingested: u64,
    pub rows_failed: u64,
    pub success_rate: f64,
}

impl IngestSummary {
    pub fn new(source_file: &str, table: &TableRef, total_rows: u64, tally: IngestTally) -> Self {
        Self {
            source_file: source_file.to_string(),
            target_table: table.qualified(),
            total_rows,
            rows_ingested: tally.rows_ingested,
            rows_failed: tally.rows_failed,
            success_rate: success_rate(tally.rows_ingested, total_rows),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_rate_is_zero_for_empty_source() {
        assert_eq!(success_rate(0, 0), 0.0);
    }

    #[test]
    fn success_rate_is_ingested_over_total() {
        assert_eq!(success_rate(50, 100), 0.5);
        assert_eq!(success_rate(100, 100), 1.0);
        assert_eq!(success_rate(0, 100), 0.0);
    }

    #[test]
    fn tally_accumulates_both_counters() {
        let mut tally = IngestTally::default();
        tally.record_success(30);
        tally.record_failure(30);
        tally.record_success(10);
        assert_eq!(tally.rows_ingested, 40);
        assert_eq!(tally.rows_failed, 30);
    }

    #[test]
    fn checkpoint_row_advances_from_resume_offset() {
        let mut tally = IngestTally::default();
        tally.record_success(30);
        assert_eq!(tally.checkpoint_row(50), 80);
        assert_eq!(IngestTally::default().checkpoint_row(50), 50);
    }

    #[test]
    fn summary_reports_counts_and_rate() {
        let table = TableRef::parse("raw.patients").expect("parse");
        let mut tally = IngestTally::default();
        tally.record_success(70);
        tally.record_failure(30);

        let summary = IngestSummary::new("data/patients.csv", &table, 100, tally);
        assert_eq!(summary.target_table, "raw.patients");
        assert_eq!(summary.total_rows, 100);
        assert_eq!(summary.rows_ingested, 70);
        assert_eq!(summary.rows_failed, 30);
        assert!((summary.success_rate - 0.7).abs() < f64::EPSILON);
    }
}
