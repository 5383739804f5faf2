//! Read-only git queries used by the snapshot builder.
//!
//! Mutating git commands are issued by the handoff orchestrator as
//! [`CommandSpec`] steps so they are recorded; this wrapper only reads.
//! Queries go through [`ProcessRunner::capture`] because their output is
//! parsed in full.

use std::path::PathBuf;

use anyhow::Result;
use tracing::{debug, instrument, warn};

use crate::io::process::{CommandSpec, ProcessOutput, ProcessRunner};

/// Wrapper for executing git queries in a working directory.
#[derive(Debug)]
pub struct Git<'a, R: ProcessRunner> {
    runner: &'a R,
    workdir: PathBuf,
}

impl<'a, R: ProcessRunner> Git<'a, R> {
    pub fn new(runner: &'a R, workdir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            workdir: workdir.into(),
        }
    }

    /// `Ok(())` when inside a working tree, otherwise the reason it is not.
    #[instrument(skip_all)]
    pub fn check_work_tree(&self) -> std::result::Result<(), String> {
        match self.run(&["rev-parse", "--is-inside-work-tree"]) {
            Ok(out) if out.success() && out.stdout.trim().eq_ignore_ascii_case("true") => Ok(()),
            Ok(out) => {
                let reason = out.stderr.trim();
                if reason.is_empty() {
                    Err("Not inside a git worktree.".to_string())
                } else {
                    Err(reason.to_string())
                }
            }
            Err(e) => Err(format!("{e:#}")),
        }
    }

    /// Current branch name; `HEAD` when detached, `UNKNOWN` when unreadable.
    #[instrument(skip_all)]
    pub fn current_branch(&self) -> String {
        let symbolic = self.capture_or_empty(&["symbolic-ref", "--short", "HEAD"]);
        if !symbolic.is_empty() {
            debug!(branch = %symbolic, "current branch");
            return symbolic;
        }
        let abbrev = self.capture_or_empty(&["rev-parse", "--abbrev-ref", "HEAD"]);
        if abbrev.is_empty() {
            warn!("unable to resolve current branch");
            return "UNKNOWN".to_string();
        }
        abbrev
    }

    /// `git status --porcelain --branch` including every untracked file.
    pub fn status_with_branch(&self) -> String {
        self.capture_or_empty(&["status", "--porcelain", "--branch", "--untracked-files=all"])
    }

    /// Porcelain status restricted to `pathspec`. Callers inspect the exit code.
    pub fn scoped_status(&self, pathspec: &[String]) -> Result<ProcessOutput> {
        self.runner.capture(&self.workdir, &scoped_status_spec(pathspec))
    }

    pub fn remotes(&self) -> String {
        self.capture_or_empty(&["remote", "-v"])
    }

    /// `name|unix-timestamp` per local branch.
    pub fn branch_commit_times(&self) -> String {
        self.capture_or_empty(&[
            "for-each-ref",
            "--format=%(refname:short)|%(committerdate:unix)",
            "refs/heads",
        ])
    }

    pub fn merged_branches(&self) -> String {
        self.capture_or_empty(&["branch", "--merged"])
    }

    /// Trimmed stdout on success; empty on failure or spawn error.
    fn capture_or_empty(&self, args: &[&str]) -> String {
        match self.run(args) {
            Ok(out) if out.success() => out.stdout.trim().to_string(),
            Ok(out) => {
                debug!(args = %args.join(" "), code = out.code, "git query failed");
                String::new()
            }
            Err(e) => {
                warn!(err = %e, args = %args.join(" "), "git query could not run");
                String::new()
            }
        }
    }

    fn run(&self, args: &[&str]) -> Result<ProcessOutput> {
        self.runner
            .capture(&self.workdir, &CommandSpec::git(args.iter().copied()))
    }
}

pub fn scoped_status_spec(pathspec: &[String]) -> CommandSpec {
    let mut args = vec![
        "status".to_string(),
        "--porcelain".to_string(),
        "--untracked-files=all".to_string(),
        "--".to_string(),
    ];
    args.extend(pathspec.iter().cloned());
    CommandSpec::git(args)
}
