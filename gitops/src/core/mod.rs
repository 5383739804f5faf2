//! Deterministic, pure logic shared by the advisor and orchestrator.
//!
//! Core modules must be free of I/O side effects. They operate on snapshots
//! and requests already in memory and return deterministic outputs suitable
//! for tests.

pub mod advisors;
pub mod meta;
pub mod pathspec;
pub mod status;
pub mod steps;
pub mod types;
