//! Git workflow advisor and handoff orchestrator.
//!
//! Reads a repository's state, has three advisory agents recommend the next
//! git actions, wraps that advice in a meta plan with a self-tuning quality
//! assessment, and drives a guarded branch/test/commit/push/PR/deploy
//! sequence. The architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (parsers, advisors, assessor,
//!   step records). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (process execution, git queries,
//!   configuration files). Isolated behind [`io::process::ProcessRunner`]
//!   so orchestration can run against fakes in tests.
//!
//! Orchestration modules ([`snapshot`], [`advise`], [`handoff`]) coordinate
//! core logic with I/O to implement CLI commands.

pub mod advise;
pub mod core;
pub mod exit_codes;
pub mod handoff;
pub mod io;
pub mod logging;
pub mod snapshot;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
