//! Test-only fakes and fixtures shared across unit and integration tests.
//!
//! Available to the crate's own `#[cfg(test)]` modules and, through the
//! `test-support` feature, to integration tests under `tests/`.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fs;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use serde_json::Value;

use crate::agents::AgentCore;
use crate::agents::ingestion::Sleeper;
use crate::core::context::{CrewContext, TaskInput};
use crate::core::report::CrewReport;
use crate::core::table::TableRef;
use crate::core::types::{ExecutionResult, ValidationOutcome};
use crate::crew::CrewRunner;
use crate::io::invoker::{ToolInvoker, ToolOutcome, ToolRequest};
use crate::io::store::{Storage, StorageConnection, StoreError};

/// Write a CSV fixture with a `subject_id,age` header and `rows` data rows.
///
/// Subject ids are unique and no field is empty, so the fixture scores 1.0 on
/// every quality check.
pub fn write_csv_rows(path: &Path, rows: u64) {
    let mut contents = String::from("subject_id,age\n");
    for i in 1..=rows {
        contents.push_str(&format!("{},{}\n", i, 40 + i % 40));
    }
    fs::write(path, contents).expect("write csv fixture");
}

/// A successful execution result with the given output payload.
pub fn success_result(output: Value) -> ExecutionResult {
    ExecutionResult::success(output, BTreeMap::new(), BTreeMap::new())
}

/// A failed execution result with a single error.
pub fn failed_result(error: &str) -> ExecutionResult {
    ExecutionResult::failure(vec![error.to_string()])
}

/// Observations captured by a [`RecordingStorage`], shared across every
/// connection it hands out.
#[derive(Default)]
pub struct RecordingState {
    /// Total `connect` calls, failed attempts included.
    pub connect_attempts: Cell<u32>,
    /// Qualified table names passed to `ensure_table`, in call order.
    pub ensured: RefCell<Vec<String>>,
    /// Column names from the most recent `ensure_table`.
    pub columns: RefCell<Vec<String>>,
    /// Row count of every `insert_rows` call, successful or not.
    pub batch_sizes: RefCell<Vec<usize>>,
    /// Rows from successful inserts only; a failed chunk leaves no trace.
    pub rows: RefCell<Vec<Vec<String>>>,
}

/// In-memory [`Storage`] fake that records what reaches the destination.
#[derive(Default)]
pub struct RecordingStorage {
    state: Rc<RecordingState>,
    connect_failures: Cell<u32>,
    failing_chunk: Option<usize>,
}

impl RecordingStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the first `attempts` connects with a retryable error.
    pub fn failing_connects(attempts: u32) -> Self {
        let storage = Self::new();
        storage.connect_failures.set(attempts);
        storage
    }

    /// Fail the numbered `insert_rows` call (1-based), rolling that chunk back.
    #[must_use]
    pub fn with_failing_chunk(mut self, chunk: usize) -> Self {
        self.failing_chunk = Some(chunk);
        self
    }

    /// Shared handle to the recorded observations.
    pub fn state(&self) -> Rc<RecordingState> {
        Rc::clone(&self.state)
    }
}

impl Storage for RecordingStorage {
    fn connect(&self) -> Result<Box<dyn StorageConnection>, StoreError> {
        let state = &self.state;
        state.connect_attempts.set(state.connect_attempts.get() + 1);
        if self.connect_failures.get() > 0 {
            self.connect_failures.set(self.connect_failures.get() - 1);
            return Err(StoreError::Unavailable(
                "scripted connect failure".to_string(),
            ));
        }
        Ok(Box::new(RecordingConnection {
            state: Rc::clone(state),
            failing_chunk: self.failing_chunk,
        }))
    }
}

struct RecordingConnection {
    state: Rc<RecordingState>,
    failing_chunk: Option<usize>,
}

impl RecordingConnection {
    fn column_index(&self, column: &str) -> Result<usize, StoreError> {
        self.state
            .columns
            .borrow()
            .iter()
            .position(|name| name == column)
            .ok_or_else(|| StoreError::InvalidColumn(column.to_string()))
    }
}

impl StorageConnection for RecordingConnection {
    fn ensure_table(&mut self, table: &TableRef, columns: &[String]) -> Result<(), StoreError> {
        self.state.ensured.borrow_mut().push(table.qualified());
        *self.state.columns.borrow_mut() = columns.to_vec();
        Ok(())
    }

    fn insert_rows(
        &mut self,
        _table: &TableRef,
        _columns: &[String],
        rows: &[Vec<String>],
    ) -> Result<(), StoreError> {
        self.state.batch_sizes.borrow_mut().push(rows.len());
        let ordinal = self.state.batch_sizes.borrow().len();
        if self.failing_chunk == Some(ordinal) {
            return Err(StoreError::Sqlite(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT),
                Some("scripted chunk failure".to_string()),
            )));
        }
        self.state.rows.borrow_mut().extend(rows.iter().cloned());
        Ok(())
    }

    fn count_rows(&self, _table: &TableRef) -> Result<u64, StoreError> {
        Ok(self.state.rows.borrow().len() as u64)
    }

    fn count_non_null(&self, _table: &TableRef, column: &str) -> Result<u64, StoreError> {
        let index = self.column_index(column)?;
        let count = self
            .state
            .rows
            .borrow()
            .iter()
            .filter(|row| !row[index].is_empty())
            .count();
        Ok(count as u64)
    }

    fn count_distinct(&self, _table: &TableRef, column: &str) -> Result<u64, StoreError> {
        let index = self.column_index(column)?;
        let distinct: BTreeSet<String> = self
            .state
            .rows
            .borrow()
            .iter()
            .filter(|row| !row[index].is_empty())
            .map(|row| row[index].clone())
            .collect();
        Ok(distinct.len() as u64)
    }

    fn column_names(&self, table: &TableRef) -> Result<Vec<String>, StoreError> {
        if !self.state.ensured.borrow().contains(&table.qualified()) {
            return Err(StoreError::UnknownTable(table.qualified()));
        }
        Ok(self.state.columns.borrow().clone())
    }
}

/// [`Sleeper`] fake that records waits instead of blocking.
#[derive(Default)]
pub struct RecordingSleeper {
    waits: Rc<RefCell<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle to the recorded wait durations.
    pub fn waits(&self) -> Rc<RefCell<Vec<Duration>>> {
        Rc::clone(&self.waits)
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, wait: Duration) {
        self.waits.borrow_mut().push(wait);
    }
}

/// [`ToolInvoker`] fake returning one scripted outcome for every invocation
/// and capturing the requests it receives.
pub struct ScriptedInvoker {
    outcome: Result<ToolOutcome, String>,
    requests: Rc<RefCell<Vec<ToolRequest>>>,
}

impl ScriptedInvoker {
    pub fn returning(outcome: ToolOutcome) -> Self {
        Self {
            outcome: Ok(outcome),
            requests: Rc::default(),
        }
    }

    /// Every invocation fails as if the tool could not be run at all.
    pub fn erroring(message: &str) -> Self {
        Self {
            outcome: Err(message.to_string()),
            requests: Rc::default(),
        }
    }

    /// Shared handle to the captured requests.
    pub fn requests(&self) -> Rc<RefCell<Vec<ToolRequest>>> {
        Rc::clone(&self.requests)
    }
}

impl ToolInvoker for ScriptedInvoker {
    fn invoke(&self, request: &ToolRequest) -> Result<ToolOutcome> {
        self.requests.borrow_mut().push(request.clone());
        match &self.outcome {
            Ok(outcome) => Ok(outcome.clone()),
            Err(message) => Err(anyhow!("{message}")),
        }
    }
}

/// A successful tool outcome with the given stdout.
pub fn tool_success(stdout: &str) -> ToolOutcome {
    ToolOutcome {
        success: true,
        exit_code: Some(0),
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

/// A failed tool outcome with the given exit code and stderr.
pub fn tool_failure(exit_code: i32, stderr: &str) -> ToolOutcome {
    ToolOutcome {
        success: false,
        exit_code: Some(exit_code),
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

enum ScriptedBehavior {
    Succeed(Value),
    RejectInput(Vec<String>),
    Fail(String),
}

/// Scripted [`AgentCore`] with a call counter and an optional shared
/// invocation log, for crew ordering and fail-fast tests.
pub struct ScriptedAgentCore {
    name: String,
    behavior: ScriptedBehavior,
    calls: Rc<Cell<usize>>,
    log: Option<Rc<RefCell<Vec<String>>>>,
}

impl ScriptedAgentCore {
    pub fn succeeding(name: &str, output: Value) -> Self {
        Self::with_behavior(name, ScriptedBehavior::Succeed(output))
    }

    /// Rejects every input during validation; the core is never reached.
    pub fn rejecting(name: &str, errors: &[&str]) -> Self {
        let errors = errors.iter().map(|e| (*e).to_string()).collect();
        Self::with_behavior(name, ScriptedBehavior::RejectInput(errors))
    }

    /// Passes validation, then fails in the core with `message`.
    pub fn failing(name: &str, message: &str) -> Self {
        Self::with_behavior(name, ScriptedBehavior::Fail(message.to_string()))
    }

    fn with_behavior(name: &str, behavior: ScriptedBehavior) -> Self {
        Self {
            name: name.to_string(),
            behavior,
            calls: Rc::new(Cell::new(0)),
            log: None,
        }
    }

    /// Record each core invocation's agent name into a shared log.
    #[must_use]
    pub fn with_log(mut self, log: Rc<RefCell<Vec<String>>>) -> Self {
        self.log = Some(log);
        self
    }

    /// Shared handle to the core invocation counter.
    pub fn calls(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.calls)
    }
}

impl AgentCore for ScriptedAgentCore {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "scripted agent for crew and orchestrator tests"
    }

    fn validate_inputs(&self, _input: &TaskInput) -> ValidationOutcome {
        match &self.behavior {
            ScriptedBehavior::RejectInput(errors) => ValidationOutcome::fail(errors.clone()),
            _ => ValidationOutcome::ok(),
        }
    }

    fn run_core(&self, _input: &TaskInput) -> Result<Value> {
        self.calls.set(self.calls.get() + 1);
        if let Some(log) = &self.log {
            log.borrow_mut().push(self.name.clone());
        }
        match &self.behavior {
            ScriptedBehavior::Succeed(output) => Ok(output.clone()),
            ScriptedBehavior::Fail(message) => Err(anyhow!("{message}")),
            ScriptedBehavior::RejectInput(_) => unreachable!("validation rejects the input first"),
        }
    }
}

/// Scripted [`CrewRunner`] that pops queued reports and records kickoffs.
pub struct ScriptedCrew {
    name: String,
    reports: VecDeque<CrewReport>,
    kickoffs: Rc<Cell<usize>>,
    contexts: Rc<RefCell<Vec<CrewContext>>>,
}

impl ScriptedCrew {
    pub fn new(name: &str, reports: Vec<CrewReport>) -> Self {
        Self {
            name: name.to_string(),
            reports: reports.into(),
            kickoffs: Rc::new(Cell::new(0)),
            contexts: Rc::default(),
        }
    }

    /// Shared handle to the kickoff counter.
    pub fn kickoffs(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.kickoffs)
    }

    /// Shared handle to the contexts received, in kickoff order.
    pub fn contexts(&self) -> Rc<RefCell<Vec<CrewContext>>> {
        Rc::clone(&self.contexts)
    }
}

impl CrewRunner for ScriptedCrew {
    fn name(&self) -> &str {
        &self.name
    }

    fn kickoff(&mut self, context: &CrewContext) -> CrewReport {
        self.kickoffs.set(self.kickoffs.get() + 1);
        self.contexts.borrow_mut().push(context.clone());
        self.reports
            .pop_front()
            .expect("scripted crew has a queued report")
    }
}
