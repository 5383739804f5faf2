//! Shared deterministic types for the advisory core.
//!
//! These records are the JSON contract returned to callers. Nullable fields
//! serialize as explicit `null` so responses round-trip without loss.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Branch names treated as off-limits for direct commits.
pub const PROTECTED_BRANCHES: [&str; 2] = ["main", "master"];

/// Local branches with no commits for this many days are reported as stale.
pub const STALE_DAYS: i64 = 30;

pub fn is_protected_branch(name: &str) -> bool {
    PROTECTED_BRANCHES.contains(&name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SnapshotStatus {
    Ok,
    Unavailable,
}

/// Point-in-time read of repository state. Built fresh on every call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoSnapshot {
    pub status: SnapshotStatus,
    pub repo_root: String,
    pub current_branch: String,
    pub remote_name: Option<String>,
    pub remote_url: Option<String>,
    pub is_github_remote: bool,
    pub is_detached_head: bool,
    pub staged_files: u32,
    pub modified_files: u32,
    pub untracked_files: u32,
    pub total_changed_files: u32,
    pub ahead_count: u32,
    pub behind_count: u32,
    pub stale_local_branches: Vec<String>,
    pub merged_local_branches: Vec<String>,
    pub changed_paths: Vec<String>,
    pub warnings: Vec<String>,
}

impl RepoSnapshot {
    /// Snapshot for a path that is not inside a git working tree.
    pub fn unavailable(repo_root: impl Into<String>, warning: impl Into<String>) -> Self {
        Self {
            status: SnapshotStatus::Unavailable,
            repo_root: repo_root.into(),
            current_branch: "UNKNOWN".to_string(),
            remote_name: None,
            remote_url: None,
            is_github_remote: false,
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
            warnings: vec![warning.into()],
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == SnapshotStatus::Ok
    }

    pub fn has_changes(&self) -> bool {
        self.total_changed_files > 0
    }

    /// True when local changes sit directly on `main`/`master`.
    pub fn dirty_on_protected_branch(&self) -> bool {
        is_protected_branch(&self.current_branch) && self.has_changes()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrimaryAction {
    ForkOrBranch,
    Commit,
    Prune,
    Sync,
    Noop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CollaborationMode {
    Solo,
    #[default]
    Team,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetaSquaredMode {
    Off,
    #[default]
    Patch,
}

/// One advisory agent's output. Commands are advisory text, never executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecommendation {
    pub agent_id: String,
    pub focus: String,
    pub confidence: f64,
    pub primary_action: PrimaryAction,
    pub rationale: String,
    pub commands: Vec<String>,
}

fn default_repo_name() -> String {
    "workspace".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdviceRequest {
    pub objective: String,
    #[serde(default)]
    pub changes_summary: Option<String>,
    #[serde(default)]
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub collaboration_mode: CollaborationMode,
    #[serde(default)]
    pub include_bootstrap_plan: bool,
    #[serde(default = "default_repo_name")]
    pub repo_name: String,
    #[serde(default)]
    pub remote_url: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub trace_id: Option<String>,
}

impl AdviceRequest {
    pub fn new(objective: impl Into<String>) -> Self {
        Self {
            objective: objective.into(),
            changes_summary: None,
            risk_level: RiskLevel::default(),
            collaboration_mode: CollaborationMode::default(),
            include_bootstrap_plan: false,
            repo_name: default_repo_name(),
            remote_url: None,
            session_id: None,
            trace_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdviceResponse {
    pub advice_id: String,
    pub objective: String,
    pub repo_snapshot: RepoSnapshot,
    pub agent_recommendations: Vec<AgentRecommendation>,
    pub consolidated_actions: Vec<String>,
    pub suggested_commit_message: String,
    pub suggested_pr_comment: String,
    pub should_fork: bool,
    pub should_prune: bool,
    pub bootstrap_commands: Vec<String>,
    pub session_id: String,
    pub trace_id: String,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricLayer {
    Plan,
    Implementation,
    PostImplementation,
    Team,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricDirection {
    HigherIsBetter,
    LowerIsBetter,
    TargetRange,
}

/// Static catalog entry read by the meta-squared assessor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaPlanMetric {
    pub metric_id: String,
    pub layer: MetricLayer,
    pub definition: String,
    pub signal_source: String,
    pub cadence: String,
    pub direction: MetricDirection,
    pub warn_threshold: f64,
    pub critical_threshold: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerReason {
    #[serde(rename = "changed_files_gte_12")]
    ChangedFilesGte12,
    RiskLevelHigh,
    TouchesSensitivePaths,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdUpdate {
    pub metric_id: String,
    pub previous_warn_threshold: f64,
    pub previous_critical_threshold: f64,
    pub proposed_warn_threshold: f64,
    pub proposed_critical_threshold: f64,
    pub bounded: bool,
    pub rationale: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaSquaredAssessment {
    pub mode: MetaSquaredMode,
    pub enabled: bool,
    pub triggered: bool,
    pub trigger_reasons: Vec<TriggerReason>,
    pub metric_quality_score: f64,
    pub threshold_fitness_score: f64,
    pub decision_alignment_score: f64,
    pub bounded_threshold_updates: Vec<ThresholdUpdate>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaPlanRequest {
    pub objective: String,
    #[serde(default = "default_repo_name")]
    pub repo_name: String,
    #[serde(default)]
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub meta_squared_mode: MetaSquaredMode,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub trace_id: Option<String>,
}

impl MetaPlanRequest {
    pub fn new(objective: impl Into<String>) -> Self {
        Self {
            objective: objective.into(),
            repo_name: default_repo_name(),
            risk_level: RiskLevel::default(),
            meta_squared_mode: MetaSquaredMode::default(),
            session_id: None,
            trace_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaPlanResponse {
    pub plan_id: String,
    pub objective: String,
    pub repo_snapshot: RepoSnapshot,
    pub specialist_team: Vec<AgentRecommendation>,
    pub meta_metrics: Vec<MetaPlanMetric>,
    pub update_loop: Vec<String>,
    pub fork_policy: Vec<String>,
    pub prune_policy: Vec<String>,
    pub merge_policy: Vec<String>,
    pub baseline_targets: BTreeMap<String, f64>,
    pub meta_squared: MetaSquaredAssessment,
    pub session_id: String,
    pub trace_id: String,
}
