//! I/O integrations for pipeline commands.

pub mod checkpoint;
pub mod config;
pub mod context;
pub mod invoker;
pub mod process;
pub mod source;
pub mod store;
