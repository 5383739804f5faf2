//! Git workflow advisor CLI.
//!
//! Every subcommand prints one pretty JSON document on stdout. Diagnostics go
//! to stderr via `tracing` (see `RUST_LOG`).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;

use gitops::advise::{advise, meta_plan};
use gitops::core::steps::{HandoffRequest, HandoffStatus};
use gitops::core::types::{
    AdviceRequest, CollaborationMode, MetaPlanRequest, MetaSquaredMode, RiskLevel,
};
use gitops::exit_codes;
use gitops::handoff::run_handoff;
use gitops::io::config::{GitopsConfig, default_config_path, load_config, write_config};
use gitops::io::process::SystemRunner;
use gitops::logging;
use gitops::snapshot::snapshot;

#[derive(Parser)]
#[command(
    name = "gitops",
    version,
    about = "Git workflow advisor and guarded handoff orchestrator"
)]
struct Cli {
    /// Repository root to inspect.
    #[arg(long, global = true, default_value = ".")]
    repo: PathBuf,

    /// Config file (default: `<repo>/.gitops/config.toml`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default config file if missing.
    Init {
        /// Overwrite an existing config file.
        #[arg(short, long)]
        force: bool,
    },
    /// Print the current repository snapshot.
    Snapshot,
    /// Ask the advisory agents for next git actions.
    Advise(AdviseArgs),
    /// Build a meta plan with the meta-squared assessment.
    MetaPlan(MetaPlanArgs),
    /// Plan (default) or execute the guarded handoff sequence.
    Handoff(HandoffArgs),
}

#[derive(Args)]
struct AdviseArgs {
    #[arg(long)]
    objective: String,
    #[arg(long)]
    changes_summary: Option<String>,
    #[arg(long, value_enum, default_value_t = RiskArg::Medium)]
    risk_level: RiskArg,
    #[arg(long, value_enum, default_value_t = CollaborationArg::Team)]
    collaboration_mode: CollaborationArg,
    #[arg(long)]
    include_bootstrap_plan: bool,
    /// Defaults to `repo_name` from config.
    #[arg(long)]
    repo_name: Option<String>,
    #[arg(long)]
    remote_url: Option<String>,
    #[arg(long)]
    session_id: Option<String>,
    #[arg(long)]
    trace_id: Option<String>,
}

#[derive(Args)]
struct MetaPlanArgs {
    #[arg(long)]
    objective: String,
    #[arg(long)]
    repo_name: Option<String>,
    #[arg(long, value_enum, default_value_t = RiskArg::Medium)]
    risk_level: RiskArg,
    #[arg(long, value_enum, default_value_t = MetaSquaredArg::Patch)]
    meta_squared_mode: MetaSquaredArg,
    #[arg(long)]
    session_id: Option<String>,
    #[arg(long)]
    trace_id: Option<String>,
}

#[derive(Args)]
struct HandoffArgs {
    #[arg(long)]
    objective: String,
    #[arg(long)]
    repo_name: Option<String>,
    #[arg(long, value_enum, default_value_t = RiskArg::High)]
    risk_level: RiskArg,
    #[arg(long, value_enum, default_value_t = MetaSquaredArg::Patch)]
    meta_squared_mode: MetaSquaredArg,
    /// Run the commands instead of planning them.
    #[arg(long)]
    execute: bool,
    #[arg(long)]
    no_run_tests: bool,
    /// Test command argument, repeatable (default: `test_command` from config).
    #[arg(long = "test-arg", value_name = "ARG")]
    test_command: Vec<String>,
    /// Repo-relative path to stage, repeatable.
    #[arg(long)]
    pathspec: Vec<String>,
    #[arg(long)]
    no_push_branch: bool,
    #[arg(long)]
    create_pr: bool,
    #[arg(long)]
    include_bootstrap: bool,
    #[arg(long)]
    trigger_workflows: bool,
    /// Deployment target as `owner/name`.
    #[arg(long)]
    bootstrap_repo: Option<String>,
    #[arg(long)]
    resource_group: Option<String>,
    #[arg(long)]
    location: Option<String>,
    #[arg(long)]
    acr_name: Option<String>,
    #[arg(long)]
    session_id: Option<String>,
    #[arg(long)]
    trace_id: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
#[value(rename_all = "SCREAMING_SNAKE_CASE")]
enum RiskArg {
    Low,
    Medium,
    High,
}

impl From<RiskArg> for RiskLevel {
    fn from(arg: RiskArg) -> Self {
        match arg {
            RiskArg::Low => Self::Low,
            RiskArg::Medium => Self::Medium,
            RiskArg::High => Self::High,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
#[value(rename_all = "SCREAMING_SNAKE_CASE")]
enum CollaborationArg {
    Solo,
    Team,
}

impl From<CollaborationArg> for CollaborationMode {
    fn from(arg: CollaborationArg) -> Self {
        match arg {
            CollaborationArg::Solo => Self::Solo,
            CollaborationArg::Team => Self::Team,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
#[value(rename_all = "SCREAMING_SNAKE_CASE")]
enum MetaSquaredArg {
    Off,
    Patch,
}

impl From<MetaSquaredArg> for MetaSquaredMode {
    fn from(arg: MetaSquaredArg) -> Self {
        match arg {
            MetaSquaredArg::Off => Self::Off,
            MetaSquaredArg::Patch => Self::Patch,
        }
    }
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let root = cli.repo;
    let config_path = cli.config.unwrap_or_else(|| default_config_path(&root));

    match cli.command {
        Command::Init { force } => cmd_init(&config_path, force),
        Command::Snapshot => {
            let config = load_config(&config_path)?;
            let runner = SystemRunner::new(config.output_limit_bytes);
            print_json(&snapshot(&runner, &root))?;
            Ok(exit_codes::OK)
        }
        Command::Advise(args) => cmd_advise(&root, &load_config(&config_path)?, args),
        Command::MetaPlan(args) => cmd_meta_plan(&root, &load_config(&config_path)?, args),
        Command::Handoff(args) => cmd_handoff(&root, &load_config(&config_path)?, args),
    }
}

/// Write the default config unless one exists and `force` is off.
fn cmd_init(config_path: &Path, force: bool) -> Result<i32> {
    let exists = config_path.exists();
    let written = force || !exists;
    if written {
        write_config(config_path, &GitopsConfig::default())?;
        info!(path = %config_path.display(), "config_written");
    }
    print_json(&serde_json::json!({
        "config_path": config_path.display().to_string(),
        "written": written,
    }))?;
    Ok(exit_codes::OK)
}

fn cmd_advise(root: &Path, config: &GitopsConfig, args: AdviseArgs) -> Result<i32> {
    let request = AdviceRequest {
        objective: require_objective(args.objective)?,
        changes_summary: args.changes_summary,
        risk_level: args.risk_level.into(),
        collaboration_mode: args.collaboration_mode.into(),
        include_bootstrap_plan: args.include_bootstrap_plan,
        repo_name: args.repo_name.unwrap_or_else(|| config.repo_name.clone()),
        remote_url: args.remote_url,
        session_id: args.session_id,
        trace_id: args.trace_id,
    };
    let runner = SystemRunner::new(config.output_limit_bytes);
    let response = advise(&runner, root, &request);
    info!(
        advice_id = %response.advice_id,
        session_id = %response.session_id,
        trace_id = %response.trace_id,
        "advice_created"
    );
    print_json(&response)?;
    Ok(exit_codes::OK)
}

fn cmd_meta_plan(root: &Path, config: &GitopsConfig, args: MetaPlanArgs) -> Result<i32> {
    let request = MetaPlanRequest {
        objective: require_objective(args.objective)?,
        repo_name: args.repo_name.unwrap_or_else(|| config.repo_name.clone()),
        risk_level: args.risk_level.into(),
        meta_squared_mode: args.meta_squared_mode.into(),
        session_id: args.session_id,
        trace_id: args.trace_id,
    };
    let runner = SystemRunner::new(config.output_limit_bytes);
    let response = meta_plan(&runner, root, &request);
    info!(
        plan_id = %response.plan_id,
        triggered = response.meta_squared.triggered,
        session_id = %response.session_id,
        trace_id = %response.trace_id,
        "meta_plan_created"
    );
    print_json(&response)?;
    Ok(exit_codes::OK)
}

fn cmd_handoff(root: &Path, config: &GitopsConfig, args: HandoffArgs) -> Result<i32> {
    let mut bootstrap = config.bootstrap.clone();
    if let Some(repo) = args.bootstrap_repo {
        bootstrap.repo = Some(repo);
    }
    if let Some(group) = args.resource_group {
        bootstrap.resource_group = Some(group);
    }
    if let Some(location) = args.location {
        bootstrap.location = location;
    }
    if let Some(acr) = args.acr_name {
        bootstrap.acr_name = Some(acr);
    }

    let test_command = if args.test_command.is_empty() {
        config.test_command.clone()
    } else {
        args.test_command
    };

    let request = HandoffRequest {
        objective: require_objective(args.objective)?,
        repo_name: args.repo_name.unwrap_or_else(|| config.repo_name.clone()),
        risk_level: args.risk_level.into(),
        meta_squared_mode: args.meta_squared_mode.into(),
        dry_run: !args.execute,
        run_tests: !args.no_run_tests,
        test_command,
        pathspec: args.pathspec,
        push_branch: !args.no_push_branch,
        create_pr: args.create_pr,
        include_bootstrap: args.include_bootstrap,
        trigger_workflows: args.trigger_workflows,
        bootstrap: Some(bootstrap),
        session_id: args.session_id,
        trace_id: args.trace_id,
    };
    let runner = SystemRunner::new(config.output_limit_bytes);
    let result = run_handoff(&runner, root, &request);
    info!(
        handoff_id = %result.handoff_id,
        status = ?result.status,
        steps_failed = result.summary.steps_failed,
        session_id = %result.session_id,
        trace_id = %result.trace_id,
        "handoff_completed"
    );
    print_json(&result)?;
    if result.status == HandoffStatus::Failed {
        return Ok(exit_codes::HANDOFF_FAILED);
    }
    Ok(exit_codes::OK)
}

fn require_objective(objective: String) -> Result<String> {
    if objective.trim().is_empty() {
        bail!("--objective must not be empty");
    }
    Ok(objective)
}

/// Print `value` as pretty JSON with a trailing newline.
fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value).context("serialize json")?;
    println!("{payload}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_init() {
        let cli = Cli::parse_from(["gitops", "init"]);
        assert!(matches!(cli.command, Command::Init { force: false }));
    }

    #[test]
    fn parse_init_force() {
        let cli = Cli::parse_from(["gitops", "init", "--force"]);
        assert!(matches!(cli.command, Command::Init { force: true }));
    }

    #[test]
    fn enum_flags_use_wire_spellings() {
        let cli = Cli::parse_from([
            "gitops",
            "meta-plan",
            "--objective",
            "x",
            "--risk-level",
            "HIGH",
            "--meta-squared-mode",
            "OFF",
        ]);
        let Command::MetaPlan(args) = cli.command else {
            panic!("expected meta-plan");
        };
        assert_eq!(RiskLevel::from(args.risk_level), RiskLevel::High);
        assert_eq!(MetaSquaredMode::from(args.meta_squared_mode), MetaSquaredMode::Off);
    }

    #[test]
    fn handoff_defaults_to_high_risk() {
        let cli = Cli::parse_from(["gitops", "handoff", "--objective", "x"]);
        let Command::Handoff(args) = cli.command else {
            panic!("expected handoff");
        };
        assert_eq!(RiskLevel::from(args.risk_level), RiskLevel::High);
        assert!(!args.execute);
    }
}
