//! Handoff step records and request/result contracts.
//!
//! Steps are appended in strict execution order and never mutated after
//! they are pushed onto a result.

use serde::{Deserialize, Serialize};

use crate::core::types::{MetaPlanResponse, MetaSquaredMode, RepoSnapshot, RiskLevel};

/// Maximum characters kept from a stdout/stderr excerpt.
pub const EXCERPT_LIMIT: usize = 500;

/// Exit code recorded when a required external tool cannot be launched.
pub const TOOL_MISSING_CODE: i32 = 127;

/// Stable step vocabulary of the handoff state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepId {
    ValidateRepo,
    ValidatePathspec,
    SafetyGuard,
    CreateFeatureBranch,
    RunTests,
    ResolvePathspec,
    StageChanges,
    CommitChanges,
    PushBranch,
    CreatePr,
    BootstrapInfra,
    TriggerWorkflows,
    TriggerBackendWorkflow,
    TriggerFrontendWorkflow,
}

impl StepId {
    pub fn as_str(self) -> &'static str {
        match self {
            StepId::ValidateRepo => "validate_repo",
            StepId::ValidatePathspec => "validate_pathspec",
            StepId::SafetyGuard => "safety_guard",
            StepId::CreateFeatureBranch => "create_feature_branch",
            StepId::RunTests => "run_tests",
            StepId::ResolvePathspec => "resolve_pathspec",
            StepId::StageChanges => "stage_changes",
            StepId::CommitChanges => "commit_changes",
            StepId::PushBranch => "push_branch",
            StepId::CreatePr => "create_pr",
            StepId::BootstrapInfra => "bootstrap_infra",
            StepId::TriggerWorkflows => "trigger_workflows",
            StepId::TriggerBackendWorkflow => "trigger_backend_workflow",
            StepId::TriggerFrontendWorkflow => "trigger_frontend_workflow",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Planned,
    Skipped,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionStep {
    pub step_id: StepId,
    pub description: String,
    pub command: Option<String>,
    pub status: StepStatus,
    pub return_code: Option<i32>,
    pub stdout_excerpt: Option<String>,
    pub stderr_excerpt: Option<String>,
    pub requires_tool: Option<String>,
}

impl ExecutionStep {
    fn bare(step_id: StepId, description: impl Into<String>, status: StepStatus) -> Self {
        Self {
            step_id,
            description: description.into(),
            command: None,
            status,
            return_code: None,
            stdout_excerpt: None,
            stderr_excerpt: None,
            requires_tool: None,
        }
    }

    /// Stage deliberately not attempted; the description carries the reason.
    pub fn skipped(step_id: StepId, reason: impl Into<String>) -> Self {
        Self::bare(step_id, reason, StepStatus::Skipped)
    }

    /// Validation or policy failure. In dry-run the same condition is only planned.
    pub fn blocked(
        step_id: StepId,
        description: impl Into<String>,
        detail: impl Into<String>,
        execute: bool,
    ) -> Self {
        let status = if execute {
            StepStatus::Failed
        } else {
            StepStatus::Planned
        };
        let mut step = Self::bare(step_id, description, status);
        step.stderr_excerpt = clip_excerpt(&detail.into());
        step
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_return_code(mut self, code: i32) -> Self {
        self.return_code = Some(code);
        self
    }

    pub fn is_failed(&self) -> bool {
        self.status == StepStatus::Failed
    }
}

/// Trim and bound a process output excerpt. Blank output becomes `None`.
pub fn clip_excerpt(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.chars().count() <= EXCERPT_LIMIT {
        return Some(trimmed.to_string());
    }
    let head: String = trimmed.chars().take(EXCERPT_LIMIT).collect();
    Some(format!("{head}...<truncated>"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HandoffStatus {
    DryRun,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HandoffSummary {
    pub steps_total: u32,
    pub steps_succeeded: u32,
    pub steps_failed: u32,
    pub steps_planned: u32,
    pub steps_skipped: u32,
}

impl HandoffSummary {
    pub fn from_steps(steps: &[ExecutionStep]) -> Self {
        let mut summary = Self {
            steps_total: steps.len() as u32,
            ..Self::default()
        };
        for step in steps {
            match step.status {
                StepStatus::Succeeded => summary.steps_succeeded += 1,
                StepStatus::Failed => summary.steps_failed += 1,
                StepStatus::Planned => summary.steps_planned += 1,
                StepStatus::Skipped => summary.steps_skipped += 1,
            }
        }
        summary
    }
}

/// Infrastructure bootstrap and workflow trigger parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Target repository as `owner/name`.
    pub repo: Option<String>,
    pub resource_group: Option<String>,
    pub location: String,
    pub acr_name: Option<String>,
    pub container_app_environment: String,
    pub container_app_name: String,
    pub static_web_app_name: String,
    pub database_url: String,
    /// Provisioning script, relative to the repository root.
    pub script: String,
    /// Program used to run `script`.
    pub interpreter: String,
    pub backend_workflow: String,
    pub frontend_workflow: String,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            repo: None,
            resource_group: None,
            location: "eastus".to_string(),
            acr_name: None,
            container_app_environment: "cae-workspace-dev".to_string(),
            container_app_name: "ca-workspace-backend".to_string(),
            static_web_app_name: "swa-workspace-frontend".to_string(),
            database_url: "sqlite:////tmp/workspace.db".to_string(),
            script: "ops/azure/bootstrap-and-wire-github.ps1".to_string(),
            interpreter: "pwsh".to_string(),
            backend_workflow: "deploy-backend-azure.yml".to_string(),
            frontend_workflow: "deploy-frontend-azure.yml".to_string(),
        }
    }
}

impl BootstrapConfig {
    /// Names of required fields that are unset or blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if is_blank(self.repo.as_deref()) {
            missing.push("bootstrap.repo");
        }
        if is_blank(self.resource_group.as_deref()) {
            missing.push("bootstrap.resource_group");
        }
        missing
    }

    /// Workflow target repository, if configured.
    pub fn workflow_repo(&self) -> Option<&str> {
        self.repo.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map(str::trim).is_none_or(str::is_empty)
}

fn default_handoff_risk() -> RiskLevel {
    RiskLevel::High
}

fn default_true() -> bool {
    true
}

fn default_repo_name() -> String {
    "workspace".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffRequest {
    pub objective: String,
    #[serde(default = "default_repo_name")]
    pub repo_name: String,
    #[serde(default = "default_handoff_risk")]
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub meta_squared_mode: MetaSquaredMode,
    #[serde(default = "default_true")]
    pub dry_run: bool,
    #[serde(default = "default_true")]
    pub run_tests: bool,
    /// Test command as an argument vector. Empty falls back to `cargo test`.
    #[serde(default)]
    pub test_command: Vec<String>,
    #[serde(default)]
    pub pathspec: Vec<String>,
    #[serde(default = "default_true")]
    pub push_branch: bool,
    #[serde(default)]
    pub create_pr: bool,
    #[serde(default)]
    pub include_bootstrap: bool,
    #[serde(default)]
    pub trigger_workflows: bool,
    #[serde(default)]
    pub bootstrap: Option<BootstrapConfig>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub trace_id: Option<String>,
}

impl HandoffRequest {
    pub fn new(objective: impl Into<String>) -> Self {
        Self {
            objective: objective.into(),
            repo_name: default_repo_name(),
            risk_level: default_handoff_risk(),
            meta_squared_mode: MetaSquaredMode::default(),
            dry_run: true,
            run_tests: true,
            test_command: Vec::new(),
            pathspec: Vec::new(),
            push_branch: true,
            create_pr: false,
            include_bootstrap: false,
            trigger_workflows: false,
            bootstrap: None,
            session_id: None,
            trace_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoffResult {
    pub handoff_id: String,
    pub objective: String,
    pub status: HandoffStatus,
    pub dry_run: bool,
    pub branch_name: String,
    pub pathspec: Vec<String>,
    pub repo_snapshot_before: RepoSnapshot,
    pub repo_snapshot_after: RepoSnapshot,
    pub meta_plan: MetaPlanResponse,
    pub steps: Vec<ExecutionStep>,
    pub summary: HandoffSummary,
    pub session_id: String,
    pub trace_id: String,
}

impl HandoffResult {
    pub fn step(&self, id: StepId) -> Option<&ExecutionStep> {
        self.steps.iter().find(|step| step.step_id == id)
    }

    pub fn step_ids(&self) -> Vec<StepId> {
        self.steps.iter().map(|step| step.step_id).collect()
    }
}

/// Terminal status: dry-run wins, then any failed step.
pub fn resolve_status(dry_run: bool, steps: &[ExecutionStep]) -> HandoffStatus {
    if dry_run {
        return HandoffStatus::DryRun;
    }
    if steps.iter().any(ExecutionStep::is_failed) {
        HandoffStatus::Failed
    } else {
        HandoffStatus::Succeeded
    }
}
