//! I/O helpers: child processes, git queries and configuration.

pub mod config;
pub mod git;
pub mod process;
