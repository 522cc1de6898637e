//! Deterministic, pure logic shared by both phases.
//!
//! Core modules must be free of I/O side effects. They define the contracts
//! the `io` adapters and the phase orchestrators agree on.

pub mod state;
pub mod types;
