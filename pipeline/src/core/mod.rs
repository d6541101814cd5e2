//! Deterministic, pure logic shared by the pipeline.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod batch;
pub mod context;
pub mod gate;
pub mod report;
pub mod table;
pub mod types;
