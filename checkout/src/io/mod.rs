//! I/O adapters for the checkout phases.

pub mod config;
pub mod git;
pub mod inputs;
pub mod job_log;
pub mod matcher;
pub mod source;
pub mod state_store;
pub mod workspace;
