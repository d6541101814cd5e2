//! Synchronous pipeline orchestration with checkpointed batch ingestion.
//!
//! This crate implements an agent-based data pipeline: every unit of work runs
//! through one uniform validate-then-execute lifecycle, crews run named tasks
//! fail-fast in a fixed order, and an orchestrator sequences crews with
//! decision gates between stages. The architecture enforces a strict
//! separation:
//!
//! - **[`core`]**: Pure, deterministic logic (results, reports, batch
//!   arithmetic, gate policy). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (checkpoint files, CSV sources,
//!   the SQLite store, subprocess invocation). Isolated behind traits to
//!   enable fakes in tests.
//!
//! [`agents`], [`crew`], and [`orchestrator`] coordinate core logic with I/O
//! to implement the pipeline commands.

pub mod agents;
pub mod core;
pub mod crew;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod orchestrator;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
