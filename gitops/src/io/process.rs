//! Child process execution with bounded output capture.
//!
//! Every external tool (`git`, `gh`, the bootstrap interpreter) goes through
//! [`ProcessRunner`] so orchestration can be exercised with a fake in tests.

use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};

/// Default cap on bytes kept from each of stdout and stderr.
pub const DEFAULT_OUTPUT_LIMIT_BYTES: usize = 100_000;

/// A program and its argument vector. Never interpreted by a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn git<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new("git", args)
    }

    /// Split a configured argument vector into program and args.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        if program.trim().is_empty() {
            return None;
        }
        Some(Self::new(program.clone(), args.iter().cloned()))
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for part in std::iter::once(&self.program).chain(self.args.iter()) {
            if !first {
                f.write_str(" ")?;
            }
            first = false;
            if part.is_empty() || part.chars().any(char::is_whitespace) {
                write!(f, "\"{}\"", part.replace('"', "\\\""))?;
            } else {
                f.write_str(part)?;
            }
        }
        Ok(())
    }
}

/// Captured child process result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, `-1` when terminated by a signal.
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Seam between orchestration and the operating system.
pub trait ProcessRunner {
    /// Run `spec` in `cwd` to completion. `Err` only when the process could
    /// not be spawned or its output could not be collected.
    fn run(&self, cwd: &Path, spec: &CommandSpec) -> Result<ProcessOutput>;

    /// Like [`run`](Self::run), but never truncates output. Used for queries
    /// whose stdout is parsed rather than excerpted.
    fn capture(&self, cwd: &Path, spec: &CommandSpec) -> Result<ProcessOutput> {
        self.run(cwd, spec)
    }

    /// Whether `tool` can be launched.
    fn tool_available(&self, tool: &str) -> bool;
}

/// Runs real processes on the host.
#[derive(Debug, Clone)]
pub struct SystemRunner {
    output_limit_bytes: usize,
}

impl SystemRunner {
    pub fn new(output_limit_bytes: usize) -> Self {
        Self { output_limit_bytes }
    }
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_LIMIT_BYTES)
    }
}

impl ProcessRunner for SystemRunner {
    fn run(&self, cwd: &Path, spec: &CommandSpec) -> Result<ProcessOutput> {
        run_limited(cwd, spec, self.output_limit_bytes)
    }

    fn capture(&self, cwd: &Path, spec: &CommandSpec) -> Result<ProcessOutput> {
        run_limited(cwd, spec, usize::MAX)
    }

    fn tool_available(&self, tool: &str) -> bool {
        which_in_path(tool).is_some()
    }
}

#[instrument(skip_all, fields(program = %spec.program, limit = limit))]
fn run_limited(cwd: &Path, spec: &CommandSpec, limit: usize) -> Result<ProcessOutput> {
    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!(command = %spec, "spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, command = %spec, "failed to spawn command");
            return Err(e).with_context(|| format!("spawn {spec}"));
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let stdout_handle = thread::spawn(move || read_stream_limited(stdout, limit));
    let stderr_handle = thread::spawn(move || read_stream_limited(stderr, limit));

    let status = child.wait().context("wait for command")?;

    let (stdout, stdout_truncated) = join_output(stdout_handle).context("join stdout")?;
    let (stderr, stderr_truncated) = join_output(stderr_handle).context("join stderr")?;

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    let code = status.code().unwrap_or(-1);
    debug!(exit_code = code, "command finished");
    Ok(ProcessOutput {
        code,
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
    })
}

/// Locate `bin` on `PATH`. Names containing a separator are checked directly.
pub fn which_in_path(bin: &str) -> Option<PathBuf> {
    if bin.contains('/') {
        let candidate = PathBuf::from(bin);
        return candidate.is_file().then_some(candidate);
    }
    let path = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path) {
        let candidate = dir.join(bin);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

fn join_output(handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            buf.extend_from_slice(&chunk[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok((buf, truncated))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_quotes_whitespace_elements() {
        let spec = CommandSpec::git(["commit", "-m", "feat(x): add thing"]);
        assert_eq!(spec.to_string(), "git commit -m \"feat(x): add thing\"");
    }

    #[test]
    fn from_argv_rejects_empty_program() {
        assert_eq!(CommandSpec::from_argv(&[]), None);
        assert_eq!(CommandSpec::from_argv(&[" ".to_string()]), None);
        let spec = CommandSpec::from_argv(&["cargo".to_string(), "test".to_string()]).expect("spec");
        assert_eq!(spec, CommandSpec::new("cargo", ["test"]));
    }

    #[test]
    fn read_stream_limited_counts_discarded_bytes() {
        let data = vec![b'x'; 20_000];
        let (kept, truncated) = read_stream_limited(&data[..], 100).expect("read");
        assert_eq!(kept.len(), 100);
        assert_eq!(truncated, 19_900);
    }

    #[test]
    fn system_runner_captures_exit_code_and_output() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runner = SystemRunner::new(16);
        let out = runner
            .run(
                temp.path(),
                &CommandSpec::new("sh", ["-c", "printf 'hello world and more text'; exit 3"]),
            )
            .expect("run");
        assert_eq!(out.code, 3);
        assert_eq!(out.stdout, "hello world and ");
    }

    #[test]
    fn capture_keeps_output_past_the_limit() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runner = SystemRunner::new(16);
        let spec = CommandSpec::new("sh", ["-c", "printf 'hello world and more text'"]);
        let out = runner.capture(temp.path(), &spec).expect("capture");
        assert_eq!(out.stdout, "hello world and more text");
    }

    #[test]
    fn system_runner_errors_on_missing_program() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runner = SystemRunner::default();
        let err = runner
            .run(temp.path(), &CommandSpec::new("definitely-not-a-real-tool-xyz", Vec::<String>::new()))
            .expect_err("spawn should fail");
        assert!(format!("{err:#}").contains("definitely-not-a-real-tool-xyz"));
        assert!(!runner.tool_available("definitely-not-a-real-tool-xyz"));
        assert!(runner.tool_available("sh"));
    }
}
