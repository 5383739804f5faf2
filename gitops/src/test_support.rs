//! Test-only helpers: scratch git repositories and fake process runners.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Result, anyhow};
use tempfile::TempDir;

use crate::core::types::{RepoSnapshot, SnapshotStatus};
use crate::io::process::{CommandSpec, ProcessOutput, ProcessRunner, SystemRunner};

/// An `OK` snapshot with an `origin` remote and a clean tree.
pub fn clean_snapshot(branch: &str) -> RepoSnapshot {
    RepoSnapshot {
        status: SnapshotStatus::Ok,
        repo_root: "/repo".to_string(),
        current_branch: branch.to_string(),
        remote_name: Some("origin".to_string()),
        remote_url: Some("git@github.com:acme/app.git".to_string()),
        is_github_remote: true,
        is_detached_head: false,
        staged_files: 0,
        modified_files: 0,
        untracked_files: 0,
        total_changed_files: 0,
        ahead_count: 0,
        behind_count: 0,
        stale_local_branches: Vec::new(),
        merged_local_branches: Vec::new(),
        changed_paths: Vec::new(),
        warnings: Vec::new(),
    }
}

/// Scratch repository on `main` with a local identity configured.
pub struct TestRepo {
    dir: TempDir,
    remote: Option<TempDir>,
}

impl TestRepo {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = Self { dir, remote: None };
        repo.git(&["init", "--quiet"]);
        repo.git(&["symbolic-ref", "HEAD", "refs/heads/main"]);
        repo.git(&["config", "user.email", "test@example.com"]);
        repo.git(&["config", "user.name", "test"]);
        repo.git(&["config", "commit.gpgsign", "false"]);
        repo
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write_file(&self, rel: &str, contents: &str) -> PathBuf {
        let path = self.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dir");
        }
        fs::write(&path, contents).expect("write file");
        path
    }

    pub fn commit_file(&self, rel: &str, contents: &str, message: &str) {
        self.write_file(rel, contents);
        self.git(&["add", "--", rel]);
        self.git(&["commit", "--quiet", "-m", message]);
    }

    /// Attach a local bare repository as `origin` and push `main` upstream.
    pub fn add_bare_remote(&mut self) {
        let remote = tempfile::tempdir().expect("remote tempdir");
        let status = Command::new("git")
            .args(["init", "--bare", "--quiet"])
            .current_dir(remote.path())
            .status()
            .expect("git init --bare");
        assert!(status.success());
        let url = remote.path().display().to_string();
        self.git(&["remote", "add", "origin", &url]);
        self.git(&["push", "--quiet", "-u", "origin", "main"]);
        self.remote = Some(remote);
    }

    /// Run git in the repository, returning trimmed stdout. Panics on failure.
    pub fn git(&self, args: &[&str]) -> String {
        let out = Command::new("git")
            .args(args)
            .current_dir(self.path())
            .output()
            .expect("spawn git");
        assert!(
            out.status.success(),
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&out.stderr)
        );
        String::from_utf8_lossy(&out.stdout).trim().to_string()
    }
}

impl Default for TestRepo {
    fn default() -> Self {
        Self::new()
    }
}

/// Real runner that records every command and can hide tools.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    inner: SystemRunner,
    missing_tools: Vec<String>,
    calls: RefCell<Vec<CommandSpec>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without_tool(mut self, tool: &str) -> Self {
        self.missing_tools.push(tool.to_string());
        self
    }

    /// Display text of every recorded command.
    pub fn commands(&self) -> Vec<String> {
        self.calls.borrow().iter().map(ToString::to_string).collect()
    }

    /// True if any recorded command changes repository or remote state.
    pub fn ran_mutating_command(&self) -> bool {
        self.calls.borrow().iter().any(is_mutating)
    }
}

impl ProcessRunner for RecordingRunner {
    fn run(&self, cwd: &Path, spec: &CommandSpec) -> Result<ProcessOutput> {
        self.calls.borrow_mut().push(spec.clone());
        self.inner.run(cwd, spec)
    }

    fn capture(&self, cwd: &Path, spec: &CommandSpec) -> Result<ProcessOutput> {
        self.calls.borrow_mut().push(spec.clone());
        self.inner.capture(cwd, spec)
    }

    fn tool_available(&self, tool: &str) -> bool {
        !self.missing_tools.iter().any(|t| t == tool) && self.inner.tool_available(tool)
    }
}

/// Fake runner answering from a prefix-matched script. Unmatched commands
/// succeed with empty output.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    responses: Vec<(Vec<String>, Result<ProcessOutput, String>)>,
    missing_tools: Vec<String>,
    calls: RefCell<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply to commands whose argv starts with `prefix`.
    pub fn respond(mut self, prefix: &[&str], code: i32, stdout: &str, stderr: &str) -> Self {
        self.responses.push((
            prefix.iter().map(|s| (*s).to_string()).collect(),
            Ok(ProcessOutput {
                code,
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            }),
        ));
        self
    }

    /// Fail to spawn commands whose argv starts with `prefix`.
    pub fn spawn_error(mut self, prefix: &[&str], message: &str) -> Self {
        self.responses.push((
            prefix.iter().map(|s| (*s).to_string()).collect(),
            Err(message.to_string()),
        ));
        self
    }

    pub fn without_tool(mut self, tool: &str) -> Self {
        self.missing_tools.push(tool.to_string());
        self
    }

    /// Every git query reports "not a repository".
    pub fn not_a_repo() -> Self {
        Self::new().respond(
            &["git", "rev-parse", "--is-inside-work-tree"],
            128,
            "",
            "fatal: not a git repository (or any of the parent directories): .git",
        )
    }

    /// Clean `feature/x` tracking `origin/feature/x`.
    pub fn clean_feature_branch() -> Self {
        Self::new()
            .respond(&["git", "rev-parse", "--is-inside-work-tree"], 0, "true\n", "")
            .respond(&["git", "symbolic-ref"], 0, "feature/x\n", "")
            .respond(
                &["git", "status", "--porcelain", "--branch"],
                0,
                "## feature/x...origin/feature/x\n",
                "",
            )
            .respond(
                &["git", "remote", "-v"],
                0,
                "origin\tgit@github.com:acme/app.git (fetch)\norigin\tgit@github.com:acme/app.git (push)\n",
                "",
            )
    }

    pub fn ran_mutating_command(&self) -> bool {
        self.calls.borrow().iter().any(is_mutating)
    }
}

impl ProcessRunner for ScriptedRunner {
    fn run(&self, _cwd: &Path, spec: &CommandSpec) -> Result<ProcessOutput> {
        self.calls.borrow_mut().push(spec.clone());
        let argv: Vec<&str> = std::iter::once(spec.program.as_str())
            .chain(spec.args.iter().map(String::as_str))
            .collect();
        let matched = self.responses.iter().find(|(prefix, _)| {
            prefix.len() <= argv.len() && prefix.iter().zip(&argv).all(|(p, a)| p == a)
        });
        match matched {
            Some((_, Ok(out))) => Ok(out.clone()),
            Some((_, Err(message))) => Err(anyhow!("spawn {spec}: {message}")),
            None => Ok(ProcessOutput::default()),
        }
    }

    fn tool_available(&self, tool: &str) -> bool {
        !self.missing_tools.iter().any(|t| t == tool)
    }
}

fn is_mutating(spec: &CommandSpec) -> bool {
    if spec.program != "git" {
        return true;
    }
    matches!(
        spec.args.first().map(String::as_str),
        Some("checkout" | "switch" | "add" | "commit" | "push" | "branch" | "remote" | "init")
    ) && !matches!(
        spec.args.as_slice(),
        [first, second, ..] if first == "remote" && second == "-v"
    ) && !matches!(
        spec.args.as_slice(),
        [first, second] if first == "branch" && second == "--merged"
    )
}
