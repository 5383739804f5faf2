//! Repository snapshot builder.
//!
//! Reads repository state through read-only git queries. Never fails: a path
//! outside a working tree yields an `UNAVAILABLE` snapshot.

use std::path::Path;

use chrono::Utc;
use tracing::{debug, instrument};

use crate::core::status::{
    parse_merged_branches, parse_porcelain_status, parse_primary_remote, parse_stale_branches,
};
use crate::core::types::{RepoSnapshot, SnapshotStatus, is_protected_branch};
use crate::io::git::Git;
use crate::io::process::ProcessRunner;

pub const PROTECTED_BRANCH_WARNING: &str =
    "Direct work on protected branch detected; create feature branch before committing.";
pub const NO_REMOTE_WARNING: &str = "No git remote configured.";

#[instrument(skip_all, fields(root = %root.display()))]
pub fn snapshot<R: ProcessRunner>(runner: &R, root: &Path) -> RepoSnapshot {
    let repo_root = root.display().to_string();
    let git = Git::new(runner, root);
    if let Err(reason) = git.check_work_tree() {
        debug!(%reason, "repository unavailable");
        return RepoSnapshot::unavailable(repo_root, reason);
    }

    let current_branch = git.current_branch();
    let status = parse_porcelain_status(&git.status_with_branch());
    let remote = parse_primary_remote(&git.remotes());
    let stale = parse_stale_branches(&git.branch_commit_times(), Utc::now().timestamp());
    let merged = parse_merged_branches(&git.merged_branches());

    let total = status.total_changed();
    let mut warnings = Vec::new();
    if is_protected_branch(&current_branch) && total > 0 {
        warnings.push(PROTECTED_BRANCH_WARNING.to_string());
    }
    if remote.is_none() {
        warnings.push(NO_REMOTE_WARNING.to_string());
    }

    let (remote_name, remote_url) = match remote {
        Some((name, url)) => (Some(name), Some(url)),
        None => (None, None),
    };
    let is_github_remote = remote_url
        .as_deref()
        .is_some_and(|url| url.to_lowercase().contains("github.com"));

    debug!(branch = %current_branch, total, "snapshot built");
    RepoSnapshot {
        status: SnapshotStatus::Ok,
        repo_root,
        is_detached_head: current_branch == "HEAD",
        current_branch,
        remote_name,
        remote_url,
        is_github_remote,
        staged_files: status.staged,
        modified_files: status.modified,
        untracked_files: status.untracked,
        total_changed_files: total,
        ahead_count: status.ahead,
        behind_count: status.behind,
        stale_local_branches: stale,
        merged_local_branches: merged,
        changed_paths: status.changed_paths,
        warnings,
    }
}
