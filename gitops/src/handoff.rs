//! Handoff orchestrator.
//!
//! A handoff walks a fixed table of stages: validate, branch, test, stage,
//! commit, push, open a PR, bootstrap infrastructure, trigger workflows.
//! Each stage either passes silently, appends a step record, or appends a
//! record and halts the walk. In execute mode the walk also halts on the
//! first failed step. Dry-run records every command as `PLANNED` and never
//! invokes the process runner for mutating commands.

use std::path::Path;

use tracing::{debug, info, instrument, warn};

use crate::advise::{meta_plan_snapshot, short_id};
use crate::core::advisors::{feature_branch_name, suggest_commit_message};
use crate::core::pathspec::normalize_pathspec;
use crate::core::status::parse_porcelain_status;
use crate::core::steps::{
    BootstrapConfig, ExecutionStep, HandoffRequest, HandoffResult, HandoffSummary, StepId,
    StepStatus, TOOL_MISSING_CODE, clip_excerpt, resolve_status,
};
use crate::core::types::{MetaPlanRequest, RepoSnapshot};
use crate::io::git::{Git, scoped_status_spec};
use crate::io::process::{CommandSpec, ProcessRunner};
use crate::snapshot::snapshot;

/// Test command used when a request leaves it empty.
pub const DEFAULT_TEST_COMMAND: [&str; 2] = ["cargo", "test"];

/// Outcome of evaluating one stage.
#[derive(Debug)]
enum Transition {
    /// Precondition satisfied; nothing recorded.
    Pass,
    /// Record the step. Execute mode halts if it failed.
    Append(ExecutionStep),
    /// Record the step and stop regardless of mode.
    Halt(ExecutionStep),
}

/// Request flag that enables an optional stage, and the reason recorded when off.
struct Gate {
    enabled: fn(&HandoffRequest) -> bool,
    skip_reason: &'static str,
}

struct Stage<R: ProcessRunner> {
    id: StepId,
    gate: Option<Gate>,
    eval: fn(&mut Handoff<'_, R>) -> Transition,
}

/// Mutable state shared by the stages of one handoff.
struct Handoff<'a, R: ProcessRunner> {
    runner: &'a R,
    root: &'a Path,
    request: &'a HandoffRequest,
    execute: bool,
    before: &'a RepoSnapshot,
    feature_branch: String,
    should_branch: bool,
    pathspec: Vec<String>,
    invalid_pathspec: Vec<String>,
    bootstrap: BootstrapConfig,
    has_changes: bool,
    backend_triggered: bool,
}

fn stages<R: ProcessRunner>() -> Vec<Stage<R>> {
    vec![
        Stage {
            id: StepId::ValidateRepo,
            gate: None,
            eval: validate_repo,
        },
        Stage {
            id: StepId::ValidatePathspec,
            gate: None,
            eval: validate_pathspec,
        },
        Stage {
            id: StepId::SafetyGuard,
            gate: None,
            eval: safety_guard,
        },
        Stage {
            id: StepId::CreateFeatureBranch,
            gate: None,
            eval: create_feature_branch,
        },
        Stage {
            id: StepId::RunTests,
            gate: Some(Gate {
                enabled: |r| r.run_tests,
                skip_reason: "Pre-commit test run disabled by request.",
            }),
            eval: run_tests,
        },
        Stage {
            id: StepId::ResolvePathspec,
            gate: None,
            eval: resolve_pathspec,
        },
        Stage {
            id: StepId::StageChanges,
            gate: None,
            eval: stage_changes,
        },
        Stage {
            id: StepId::CommitChanges,
            gate: None,
            eval: commit_changes,
        },
        Stage {
            id: StepId::PushBranch,
            gate: Some(Gate {
                enabled: |r| r.push_branch,
                skip_reason: "Push disabled by request.",
            }),
            eval: push_branch,
        },
        Stage {
            id: StepId::CreatePr,
            gate: Some(Gate {
                enabled: |r| r.create_pr,
                skip_reason: "PR creation disabled by request.",
            }),
            eval: create_pr,
        },
        Stage {
            id: StepId::BootstrapInfra,
            gate: Some(Gate {
                enabled: |r| r.include_bootstrap,
                skip_reason: "Infrastructure bootstrap disabled by request.",
            }),
            eval: bootstrap_infra,
        },
        Stage {
            id: StepId::TriggerWorkflows,
            gate: Some(Gate {
                enabled: |r| r.trigger_workflows,
                skip_reason: "Workflow triggering disabled by request.",
            }),
            eval: trigger_backend_workflow,
        },
        Stage {
            id: StepId::TriggerFrontendWorkflow,
            gate: None,
            eval: trigger_frontend_workflow,
        },
    ]
}

/// Run (or plan) a handoff against the repository at `root`.
#[instrument(skip_all, fields(root = %root.display(), dry_run = request.dry_run))]
pub fn run_handoff<R: ProcessRunner>(
    runner: &R,
    root: &Path,
    request: &HandoffRequest,
) -> HandoffResult {
    let session_id = request
        .session_id
        .clone()
        .unwrap_or_else(|| short_id("sess_git_handoff_", 10));
    let trace_id = request
        .trace_id
        .clone()
        .unwrap_or_else(|| short_id("trace_git_handoff_", 10));

    let before = snapshot(runner, root);
    let meta_plan = meta_plan_snapshot(
        before.clone(),
        &MetaPlanRequest {
            objective: request.objective.clone(),
            repo_name: request.repo_name.clone(),
            risk_level: request.risk_level,
            meta_squared_mode: request.meta_squared_mode,
            session_id: Some(session_id.clone()),
            trace_id: Some(trace_id.clone()),
        },
    );

    let normalized = normalize_pathspec(&request.pathspec);
    let should_branch = before.dirty_on_protected_branch();
    let feature_branch = feature_branch_name(&request.objective);
    let branch_name = if !before.is_available() || should_branch {
        feature_branch.clone()
    } else {
        before.current_branch.clone()
    };

    let mut ctx = Handoff {
        runner,
        root,
        request,
        execute: !request.dry_run,
        before: &before,
        feature_branch,
        should_branch,
        pathspec: normalized.accepted,
        invalid_pathspec: normalized.invalid,
        bootstrap: request.bootstrap.clone().unwrap_or_default(),
        has_changes: false,
        backend_triggered: false,
    };
    let steps = walk(&mut ctx, &stages());
    let pathspec = ctx.pathspec;

    let after = snapshot(runner, root);
    let status = resolve_status(request.dry_run, &steps);
    let summary = HandoffSummary::from_steps(&steps);
    info!(?status, steps = summary.steps_total, failed = summary.steps_failed, "handoff finished");

    HandoffResult {
        handoff_id: short_id("handoff_", 12),
        objective: request.objective.clone(),
        status,
        dry_run: request.dry_run,
        branch_name,
        pathspec,
        repo_snapshot_before: before,
        repo_snapshot_after: after,
        meta_plan,
        steps,
        summary,
        session_id,
        trace_id,
    }
}

fn walk<R: ProcessRunner>(ctx: &mut Handoff<'_, R>, stages: &[Stage<R>]) -> Vec<ExecutionStep> {
    let mut steps = Vec::new();
    for stage in stages {
        if let Some(gate) = &stage.gate
            && !(gate.enabled)(ctx.request)
        {
            steps.push(ExecutionStep::skipped(stage.id, gate.skip_reason));
            continue;
        }
        match (stage.eval)(ctx) {
            Transition::Pass => {}
            Transition::Append(step) => {
                let halt = ctx.execute && step.is_failed();
                steps.push(step);
                if halt {
                    debug!(stage = stage.id.as_str(), "halting after failed step");
                    break;
                }
            }
            Transition::Halt(step) => {
                steps.push(step);
                break;
            }
        }
    }
    steps
}

fn validate_repo<R: ProcessRunner>(ctx: &mut Handoff<'_, R>) -> Transition {
    if ctx.before.is_available() {
        return Transition::Pass;
    }
    let mut step = ExecutionStep::blocked(
        StepId::ValidateRepo,
        "Validate repository accessibility.",
        "Repository unavailable or not a git worktree.",
        ctx.execute,
    )
    .with_command("git rev-parse --is-inside-work-tree");
    if ctx.execute {
        step = step.with_return_code(1);
    }
    Transition::Halt(step)
}

fn validate_pathspec<R: ProcessRunner>(ctx: &mut Handoff<'_, R>) -> Transition {
    if ctx.invalid_pathspec.is_empty() {
        return Transition::Pass;
    }
    Transition::Append(ExecutionStep::blocked(
        StepId::ValidatePathspec,
        format!("Invalid pathspec entries: {}", ctx.invalid_pathspec.join(", ")),
        "Pathspec entries must be repo-relative and cannot include '..' segments.",
        ctx.execute,
    ))
}

fn safety_guard<R: ProcessRunner>(ctx: &mut Handoff<'_, R>) -> Transition {
    if !ctx.before.dirty_on_protected_branch() || !ctx.pathspec.is_empty() {
        return Transition::Pass;
    }
    Transition::Append(ExecutionStep::blocked(
        StepId::SafetyGuard,
        "Protected branch has local changes; provide --pathspec for scoped execute.",
        "Execute mode blocked without pathspec on protected dirty branch.",
        ctx.execute,
    ))
}

fn create_feature_branch<R: ProcessRunner>(ctx: &mut Handoff<'_, R>) -> Transition {
    if !ctx.should_branch {
        return Transition::Append(ExecutionStep::skipped(
            StepId::CreateFeatureBranch,
            "Feature branch creation not required by policy.",
        ));
    }
    let spec = CommandSpec::git(["checkout", "-b", ctx.feature_branch.as_str()]);
    Transition::Append(ctx.command_step(
        StepId::CreateFeatureBranch,
        "Create feature branch from protected branch before modifications.",
        &spec,
        None,
    ))
}

fn run_tests<R: ProcessRunner>(ctx: &mut Handoff<'_, R>) -> Transition {
    let spec = CommandSpec::from_argv(&ctx.request.test_command)
        .unwrap_or_else(|| CommandSpec::new(DEFAULT_TEST_COMMAND[0], [DEFAULT_TEST_COMMAND[1]]));
    Transition::Append(ctx.command_step(
        StepId::RunTests,
        "Run regression test pack before commit/push.",
        &spec,
        None,
    ))
}

/// Decide whether there is anything to commit. The scoped status query is
/// read-only, so it runs in dry-run too.
fn resolve_pathspec<R: ProcessRunner>(ctx: &mut Handoff<'_, R>) -> Transition {
    if ctx.pathspec.is_empty() {
        ctx.has_changes = snapshot(ctx.runner, ctx.root).has_changes();
        return Transition::Pass;
    }
    let git = Git::new(ctx.runner, ctx.root);
    let description = "Resolve changed files for provided pathspec.";
    let command = scoped_status_spec(&ctx.pathspec).to_string();
    match git.scoped_status(&ctx.pathspec) {
        Ok(out) if out.success() => {
            let scoped = parse_porcelain_status(&out.stdout);
            debug!(paths = scoped.changed_paths.len(), "resolved pathspec changes");
            ctx.has_changes = !scoped.changed_paths.is_empty();
            Transition::Pass
        }
        Ok(out) => {
            let mut step =
                ExecutionStep::blocked(StepId::ResolvePathspec, description, "", ctx.execute)
                    .with_command(command);
            step.stdout_excerpt = clip_excerpt(&out.stdout);
            step.stderr_excerpt = clip_excerpt(&out.stderr);
            if ctx.execute {
                step = step.with_return_code(out.code);
            }
            Transition::Append(step)
        }
        Err(e) => {
            warn!(err = %e, "scoped status could not run");
            let mut step = ExecutionStep::blocked(
                StepId::ResolvePathspec,
                description,
                format!("{e:#}"),
                ctx.execute,
            )
            .with_command(command);
            if ctx.execute {
                step = step.with_return_code(TOOL_MISSING_CODE);
            }
            Transition::Append(step)
        }
    }
}

fn no_changes_reason(scoped: bool, what: &str) -> String {
    if scoped {
        format!("No changed files detected for provided pathspec; {what} skipped.")
    } else {
        format!("No changed files detected; {what} skipped.")
    }
}

fn stage_changes<R: ProcessRunner>(ctx: &mut Handoff<'_, R>) -> Transition {
    let scoped = !ctx.pathspec.is_empty();
    if !ctx.has_changes {
        return Transition::Append(ExecutionStep::skipped(
            StepId::StageChanges,
            no_changes_reason(scoped, "staging"),
        ));
    }
    let (spec, description) = if scoped {
        let mut args = vec!["add".to_string(), "--".to_string()];
        args.extend(ctx.pathspec.iter().cloned());
        (CommandSpec::git(args), "Stage pathspec-scoped modified files.")
    } else {
        (CommandSpec::git(["add", "-A"]), "Stage all modified files.")
    };
    Transition::Append(ctx.command_step(StepId::StageChanges, description, &spec, None))
}

fn commit_changes<R: ProcessRunner>(ctx: &mut Handoff<'_, R>) -> Transition {
    if !ctx.has_changes {
        return Transition::Append(ExecutionStep::skipped(
            StepId::CommitChanges,
            no_changes_reason(!ctx.pathspec.is_empty(), "commit"),
        ));
    }
    let message = suggest_commit_message(&ctx.request.objective);
    let mut args = vec!["commit".to_string(), "-m".to_string(), message];
    // Limit the commit to the pathspec even if other paths were already staged.
    if !ctx.pathspec.is_empty() {
        args.push("--".to_string());
        args.extend(ctx.pathspec.iter().cloned());
    }
    Transition::Append(ctx.command_step(
        StepId::CommitChanges,
        "Create commit for handoff automation batch.",
        &CommandSpec::git(args),
        None,
    ))
}

fn push_branch<R: ProcessRunner>(ctx: &mut Handoff<'_, R>) -> Transition {
    let Some(remote) = ctx.before.remote_name.clone() else {
        return Transition::Append(ExecutionStep::skipped(
            StepId::PushBranch,
            "No remote configured; push skipped.",
        ));
    };
    let branch = if ctx.should_branch {
        ctx.feature_branch.clone()
    } else {
        ctx.before.current_branch.clone()
    };
    let spec = CommandSpec::git(["push".to_string(), "-u".to_string(), remote, branch]);
    Transition::Append(ctx.command_step(StepId::PushBranch, "Push branch to remote.", &spec, None))
}

fn create_pr<R: ProcessRunner>(ctx: &mut Handoff<'_, R>) -> Transition {
    let spec = CommandSpec::new("gh", ["pr", "create", "--fill"]);
    Transition::Append(ctx.command_step(
        StepId::CreatePr,
        "Open pull request with generated summary.",
        &spec,
        Some("gh"),
    ))
}

fn bootstrap_infra<R: ProcessRunner>(ctx: &mut Handoff<'_, R>) -> Transition {
    let missing = ctx.bootstrap.missing_fields();
    if !missing.is_empty() {
        return Transition::Append(ExecutionStep::blocked(
            StepId::BootstrapInfra,
            format!("Bootstrap config missing required fields: {}", missing.join(", ")),
            "Provide bootstrap.repo and bootstrap.resource_group.",
            ctx.execute,
        ));
    }
    let spec = bootstrap_command(ctx.root, &ctx.bootstrap);
    let interpreter = ctx.bootstrap.interpreter.clone();
    Transition::Append(ctx.command_step(
        StepId::BootstrapInfra,
        "Bootstrap cloud infrastructure and wire repository secrets.",
        &spec,
        Some(interpreter.as_str()),
    ))
}

fn trigger_backend_workflow<R: ProcessRunner>(ctx: &mut Handoff<'_, R>) -> Transition {
    let Some(repo) = ctx.bootstrap.workflow_repo().map(str::to_string) else {
        return Transition::Append(ExecutionStep::blocked(
            StepId::TriggerWorkflows,
            "Workflow trigger skipped: bootstrap.repo is required.",
            "Set bootstrap.repo to owner/name.",
            ctx.execute,
        ));
    };
    ctx.backend_triggered = true;
    let spec = workflow_command(&ctx.bootstrap.backend_workflow, &repo);
    Transition::Append(ctx.command_step(
        StepId::TriggerBackendWorkflow,
        "Trigger backend deployment workflow.",
        &spec,
        Some("gh"),
    ))
}

fn trigger_frontend_workflow<R: ProcessRunner>(ctx: &mut Handoff<'_, R>) -> Transition {
    if !ctx.backend_triggered {
        return Transition::Pass;
    }
    let Some(repo) = ctx.bootstrap.workflow_repo().map(str::to_string) else {
        return Transition::Pass;
    };
    let spec = workflow_command(&ctx.bootstrap.frontend_workflow, &repo);
    Transition::Append(ctx.command_step(
        StepId::TriggerFrontendWorkflow,
        "Trigger frontend deployment workflow.",
        &spec,
        Some("gh"),
    ))
}

fn workflow_command(workflow: &str, repo: &str) -> CommandSpec {
    CommandSpec::new("gh", ["workflow", "run", workflow, "--repo", repo])
}

/// Provisioning script invocation. Optional `acr_name` is appended last.
pub fn bootstrap_command(root: &Path, cfg: &BootstrapConfig) -> CommandSpec {
    let script = root.join(&cfg.script).display().to_string();
    let mut args = vec![
        "-ExecutionPolicy".to_string(),
        "Bypass".to_string(),
        "-File".to_string(),
        script,
    ];
    let required = [
        ("-Repo", cfg.repo.clone().unwrap_or_default()),
        ("-ResourceGroup", cfg.resource_group.clone().unwrap_or_default()),
        ("-Location", cfg.location.clone()),
        ("-ContainerAppEnvironment", cfg.container_app_environment.clone()),
        ("-ContainerAppName", cfg.container_app_name.clone()),
        ("-StaticWebAppName", cfg.static_web_app_name.clone()),
        ("-DatabaseUrl", cfg.database_url.clone()),
    ];
    for (flag, value) in required {
        args.push(flag.to_string());
        args.push(value);
    }
    if let Some(acr) = cfg.acr_name.as_deref().filter(|s| !s.trim().is_empty()) {
        args.push("-AcrName".to_string());
        args.push(acr.to_string());
    }
    CommandSpec::new(cfg.interpreter.clone(), args)
}

impl<R: ProcessRunner> Handoff<'_, R> {
    /// Record a command as planned (dry-run) or run it and record the outcome.
    fn command_step(
        &self,
        id: StepId,
        description: &str,
        spec: &CommandSpec,
        requires_tool: Option<&str>,
    ) -> ExecutionStep {
        let mut step = ExecutionStep::skipped(id, description).with_command(spec.to_string());
        step.requires_tool = requires_tool.map(str::to_string);

        if !self.execute {
            step.status = StepStatus::Planned;
            return step;
        }

        if let Some(tool) = requires_tool
            && !self.runner.tool_available(tool)
        {
            warn!(step = id.as_str(), tool, "required tool missing");
            step.status = StepStatus::Failed;
            step.return_code = Some(TOOL_MISSING_CODE);
            step.stderr_excerpt = Some(format!("Required tool '{tool}' is not installed."));
            return step;
        }

        match self.runner.run(self.root, spec) {
            Ok(out) => {
                debug!(step = id.as_str(), code = out.code, "step finished");
                step.status = if out.success() {
                    StepStatus::Succeeded
                } else {
                    StepStatus::Failed
                };
                step.return_code = Some(out.code);
                step.stdout_excerpt = clip_excerpt(&out.stdout);
                step.stderr_excerpt = clip_excerpt(&out.stderr);
            }
            Err(e) => {
                warn!(step = id.as_str(), err = %e, "step could not start");
                step.status = StepStatus::Failed;
                step.return_code = Some(TOOL_MISSING_CODE);
                step.stderr_excerpt = clip_excerpt(&format!("{e:#}"));
            }
        }
        step
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::steps::HandoffStatus;
    use crate::test_support::ScriptedRunner;

    #[test]
    fn stage_table_follows_step_order() {
        let ids: Vec<StepId> = stages::<ScriptedRunner>().iter().map(|s| s.id).collect();
        assert_eq!(
            ids,
            vec![
                StepId::ValidateRepo,
                StepId::ValidatePathspec,
                StepId::SafetyGuard,
                StepId::CreateFeatureBranch,
                StepId::RunTests,
                StepId::ResolvePathspec,
                StepId::StageChanges,
                StepId::CommitChanges,
                StepId::PushBranch,
                StepId::CreatePr,
                StepId::BootstrapInfra,
                StepId::TriggerWorkflows,
                StepId::TriggerFrontendWorkflow,
            ]
        );
    }

    #[test]
    fn bootstrap_command_appends_optional_registry() {
        let mut cfg = BootstrapConfig {
            repo: Some("acme/app".to_string()),
            resource_group: Some("rg-dev".to_string()),
            ..BootstrapConfig::default()
        };
        let spec = bootstrap_command(Path::new("/repo"), &cfg);
        assert_eq!(spec.program, "pwsh");
        assert_eq!(
            &spec.args[..4],
            ["-ExecutionPolicy", "Bypass", "-File", "/repo/ops/azure/bootstrap-and-wire-github.ps1"]
        );
        assert!(!spec.args.contains(&"-AcrName".to_string()));
        cfg.acr_name = Some("acracme".to_string());
        let spec = bootstrap_command(Path::new("/repo"), &cfg);
        assert_eq!(&spec.args[spec.args.len() - 2..], ["-AcrName", "acracme"]);
    }

    #[test]
    fn unavailable_repo_halts_with_planned_validation_in_dry_run() {
        let runner = ScriptedRunner::not_a_repo();
        let request = HandoffRequest::new("ship it");
        let result = run_handoff(&runner, Path::new("/nowhere"), &request);
        assert_eq!(result.step_ids(), vec![StepId::ValidateRepo]);
        let step = &result.steps[0];
        assert_eq!(step.status, StepStatus::Planned);
        assert_eq!(step.return_code, None);
        assert_eq!(result.branch_name, "feature/ship-it");
        assert!(!runner.ran_mutating_command());
    }

    #[test]
    fn unavailable_repo_fails_with_rc_one_when_executing() {
        let runner = ScriptedRunner::not_a_repo();
        let mut request = HandoffRequest::new("ship it");
        request.dry_run = false;
        let result = run_handoff(&runner, Path::new("/nowhere"), &request);
        let step = result.step(StepId::ValidateRepo).expect("validate step");
        assert_eq!(step.status, StepStatus::Failed);
        assert_eq!(step.return_code, Some(1));
        assert_eq!(result.summary.steps_failed, 1);
    }

    #[test]
    fn missing_tool_fails_with_127() {
        let runner = ScriptedRunner::clean_feature_branch().without_tool("gh");
        let mut request = HandoffRequest::new("ship it");
        request.dry_run = false;
        request.run_tests = false;
        request.push_branch = false;
        request.create_pr = true;
        let result = run_handoff(&runner, Path::new("/repo"), &request);
        let pr = result.step(StepId::CreatePr).expect("pr step");
        assert_eq!(pr.status, StepStatus::Failed);
        assert_eq!(pr.return_code, Some(TOOL_MISSING_CODE));
        assert_eq!(
            pr.stderr_excerpt.as_deref(),
            Some("Required tool 'gh' is not installed.")
        );
        assert_eq!(result.steps.last().map(|s| s.step_id), Some(StepId::CreatePr));
    }

    #[test]
    fn spawn_failure_fails_step_with_127_and_error_text() {
        let runner = ScriptedRunner::clean_feature_branch()
            .spawn_error(&["gh"], "No such file or directory (os error 2)");
        let mut request = HandoffRequest::new("ship it");
        request.dry_run = false;
        request.run_tests = false;
        request.push_branch = false;
        request.create_pr = true;
        request.trigger_workflows = true;
        let result = run_handoff(&runner, Path::new("/repo"), &request);
        let pr = result.step(StepId::CreatePr).expect("pr step");
        assert_eq!(pr.status, StepStatus::Failed);
        assert_eq!(pr.return_code, Some(TOOL_MISSING_CODE));
        assert!(
            pr.stderr_excerpt
                .as_deref()
                .is_some_and(|e| e.contains("No such file or directory")),
            "{:?}",
            pr.stderr_excerpt
        );
        assert_eq!(result.steps.last().map(|s| s.step_id), Some(StepId::CreatePr));
        assert_eq!(result.status, HandoffStatus::Failed);
    }

    fn broken_scoped_status() -> ScriptedRunner {
        ScriptedRunner::clean_feature_branch().respond(
            &["git", "status", "--porcelain", "--untracked-files=all", "--"],
            128,
            "",
            "fatal: unable to read index",
        )
    }

    fn scoped_request(dry_run: bool) -> HandoffRequest {
        let mut request = HandoffRequest::new("ship it");
        request.dry_run = dry_run;
        request.run_tests = false;
        request.pathspec = vec!["a.txt".to_string()];
        request
    }

    #[test]
    fn failed_scoped_status_halts_execute_mode() {
        let runner = broken_scoped_status();
        let result = run_handoff(&runner, Path::new("/repo"), &scoped_request(false));
        assert_eq!(
            result.step_ids(),
            vec![StepId::CreateFeatureBranch, StepId::RunTests, StepId::ResolvePathspec]
        );
        let step = &result.steps[2];
        assert_eq!(step.status, StepStatus::Failed);
        assert_eq!(step.return_code, Some(128));
        assert_eq!(step.stderr_excerpt.as_deref(), Some("fatal: unable to read index"));
        assert_eq!(
            step.command.as_deref(),
            Some("git status --porcelain --untracked-files=all -- a.txt")
        );
        assert_eq!(result.status, HandoffStatus::Failed);
        assert!(!runner.ran_mutating_command());
    }

    #[test]
    fn failed_scoped_status_is_planned_in_dry_run() {
        let runner = broken_scoped_status();
        let result = run_handoff(&runner, Path::new("/repo"), &scoped_request(true));
        let step = result.step(StepId::ResolvePathspec).expect("resolve step");
        assert_eq!(step.status, StepStatus::Planned);
        assert_eq!(step.return_code, None);
        assert_eq!(step.stderr_excerpt.as_deref(), Some("fatal: unable to read index"));
        for id in [StepId::StageChanges, StepId::CommitChanges] {
            assert_eq!(result.step(id).map(|s| s.status), Some(StepStatus::Skipped));
        }
        assert_eq!(result.status, HandoffStatus::DryRun);
    }

    #[test]
    fn unspawnable_scoped_status_fails_with_127() {
        let runner = ScriptedRunner::clean_feature_branch()
            .spawn_error(&["git", "status", "--porcelain", "--untracked-files=all"], "git vanished");
        let result = run_handoff(&runner, Path::new("/repo"), &scoped_request(false));
        let step = result.step(StepId::ResolvePathspec).expect("resolve step");
        assert_eq!(step.status, StepStatus::Failed);
        assert_eq!(step.return_code, Some(TOOL_MISSING_CODE));
        assert!(
            step.stderr_excerpt
                .as_deref()
                .is_some_and(|e| e.contains("git vanished"))
        );
    }

    #[test]
    fn disabled_optional_stages_are_recorded_as_skipped() {
        let runner = ScriptedRunner::clean_feature_branch();
        let mut request = HandoffRequest::new("ship it");
        request.run_tests = false;
        request.push_branch = false;
        let result = run_handoff(&runner, Path::new("/repo"), &request);
        for (id, reason) in [
            (StepId::RunTests, "Pre-commit test run disabled by request."),
            (StepId::PushBranch, "Push disabled by request."),
            (StepId::CreatePr, "PR creation disabled by request."),
            (StepId::BootstrapInfra, "Infrastructure bootstrap disabled by request."),
            (StepId::TriggerWorkflows, "Workflow triggering disabled by request."),
        ] {
            let step = result.step(id).expect("step present");
            assert_eq!(step.status, StepStatus::Skipped);
            assert_eq!(step.description, reason);
        }
        assert!(result.step(StepId::TriggerFrontendWorkflow).is_none());
    }

    #[test]
    fn workflow_triggers_without_repo_record_one_step() {
        let runner = ScriptedRunner::clean_feature_branch();
        let mut request = HandoffRequest::new("ship it");
        request.trigger_workflows = true;
        let result = run_handoff(&runner, Path::new("/repo"), &request);
        let step = result.step(StepId::TriggerWorkflows).expect("trigger step");
        assert_eq!(step.status, StepStatus::Planned);
        assert_eq!(step.stderr_excerpt.as_deref(), Some("Set bootstrap.repo to owner/name."));
        assert!(result.step(StepId::TriggerBackendWorkflow).is_none());
        assert!(result.step(StepId::TriggerFrontendWorkflow).is_none());
    }

    #[test]
    fn workflow_triggers_plan_backend_then_frontend() {
        let runner = ScriptedRunner::clean_feature_branch();
        let mut request = HandoffRequest::new("ship it");
        request.trigger_workflows = true;
        request.bootstrap = Some(BootstrapConfig {
            repo: Some("acme/app".to_string()),
            ..BootstrapConfig::default()
        });
        let result = run_handoff(&runner, Path::new("/repo"), &request);
        let ids = result.step_ids();
        let tail = &ids[ids.len() - 2..];
        assert_eq!(
            tail,
            [StepId::TriggerBackendWorkflow, StepId::TriggerFrontendWorkflow]
        );
        let backend = result.step(StepId::TriggerBackendWorkflow).expect("backend");
        assert_eq!(
            backend.command.as_deref(),
            Some("gh workflow run deploy-backend-azure.yml --repo acme/app")
        );
        assert_eq!(backend.requires_tool.as_deref(), Some("gh"));
    }
}
