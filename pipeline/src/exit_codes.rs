//! Stable exit codes for pipeline CLI commands.

/// Command succeeded and the pipeline completed.
pub const OK: i32 = 0;
/// Invalid usage, configuration, or context document; nothing was executed.
pub const INVALID: i32 = 1;
/// The pipeline ran and failed.
pub const FAILED: i32 = 2;
/// A decision gate stopped the workflow early (partial success).
pub const PARTIAL: i32 = 3;
