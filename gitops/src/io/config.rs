//! Gitops configuration stored under `.gitops/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::steps::BootstrapConfig;
use crate::io::process::DEFAULT_OUTPUT_LIMIT_BYTES;

/// Default config location relative to the repository root.
pub const CONFIG_RELATIVE_PATH: &str = ".gitops/config.toml";

/// Gitops configuration (TOML).
///
/// Edited by humans. Missing fields default; CLI flags override per call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GitopsConfig {
    /// Repository label used in bootstrap plans.
    pub repo_name: String,

    /// Pre-commit test command as an argument vector (e.g. `["cargo","test"]`).
    pub test_command: Vec<String>,

    /// Keep at most this many bytes of each child stdout/stderr stream.
    pub output_limit_bytes: usize,

    pub bootstrap: BootstrapConfig,
}

impl Default for GitopsConfig {
    fn default() -> Self {
        Self {
            repo_name: "workspace".to_string(),
            test_command: vec!["cargo".to_string(), "test".to_string()],
            output_limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
            bootstrap: BootstrapConfig::default(),
        }
    }
}

impl GitopsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        if self.test_command.is_empty() || self.test_command[0].trim().is_empty() {
            return Err(anyhow!("test_command must be a non-empty array"));
        }
        if self.repo_name.trim().is_empty() {
            return Err(anyhow!("repo_name must not be empty"));
        }
        Ok(())
    }
}

pub fn default_config_path(repo_root: &Path) -> PathBuf {
    repo_root.join(CONFIG_RELATIVE_PATH)
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `GitopsConfig::default()`.
pub fn load_config(path: &Path) -> Result<GitopsConfig> {
    if !path.exists() {
        let cfg = GitopsConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: GitopsConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &GitopsConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
