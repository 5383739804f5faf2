//! Stable exit codes for gitops CLI commands.

/// Command succeeded, or a handoff finished as a dry run or successfully.
pub const OK: i32 = 0;
/// Invalid arguments, unreadable config, or an I/O error.
pub const INVALID: i32 = 1;
/// An executed handoff recorded at least one failed step.
pub const HANDOFF_FAILED: i32 = 2;
