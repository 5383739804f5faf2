//! Advisory engine and meta-planner entry points.

use std::path::Path;

use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

use crate::core::advisors::{
    bootstrap_commands, branch_strategist, commit_auditor, consolidate, hygiene_keeper,
    suggest_commit_message, suggest_pr_comment,
};
use crate::core::meta;
use crate::core::types::{
    AdviceRequest, AdviceResponse, CollaborationMode, MetaPlanRequest, MetaPlanResponse,
    PrimaryAction, RepoSnapshot,
};
use crate::io::process::ProcessRunner;
use crate::snapshot::snapshot;

/// `prefix` followed by the first `len` hex digits of a fresh v4 UUID.
pub(crate) fn short_id(prefix: &str, len: usize) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{prefix}{}", &hex[..len.min(hex.len())])
}

/// Snapshot the repository and advise on it.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn advise<R: ProcessRunner>(runner: &R, root: &Path, request: &AdviceRequest) -> AdviceResponse {
    let snap = snapshot(runner, root);
    advise_snapshot(snap, request)
}

/// Advice for an existing snapshot. Deterministic apart from ids and timestamp.
pub fn advise_snapshot(snapshot: RepoSnapshot, request: &AdviceRequest) -> AdviceResponse {
    let recommendations = vec![
        branch_strategist(&snapshot, request),
        commit_auditor(&snapshot, request),
        hygiene_keeper(&snapshot),
    ];
    let should_fork = recommendations[0].primary_action == PrimaryAction::ForkOrBranch;
    let should_prune = recommendations[2].primary_action == PrimaryAction::Prune;

    AdviceResponse {
        advice_id: short_id("gitadv_", 12),
        objective: request.objective.clone(),
        consolidated_actions: consolidate(&recommendations, &snapshot),
        suggested_commit_message: suggest_commit_message(&request.objective),
        suggested_pr_comment: suggest_pr_comment(request, &snapshot),
        should_fork,
        should_prune,
        bootstrap_commands: bootstrap_commands(request, &snapshot),
        agent_recommendations: recommendations,
        session_id: request
            .session_id
            .clone()
            .unwrap_or_else(|| short_id("sess_git_", 10)),
        trace_id: request
            .trace_id
            .clone()
            .unwrap_or_else(|| short_id("trace_git_", 10)),
        generated_at: Utc::now(),
        repo_snapshot: snapshot,
    }
}

#[instrument(skip_all, fields(root = %root.display()))]
pub fn meta_plan<R: ProcessRunner>(
    runner: &R,
    root: &Path,
    request: &MetaPlanRequest,
) -> MetaPlanResponse {
    let snap = snapshot(runner, root);
    meta_plan_snapshot(snap, request)
}

/// Meta plan over an existing snapshot; the advice inside it reuses the
/// same snapshot rather than reading the repository again.
pub fn meta_plan_snapshot(snapshot: RepoSnapshot, request: &MetaPlanRequest) -> MetaPlanResponse {
    let session_id = request
        .session_id
        .clone()
        .unwrap_or_else(|| short_id("sess_git_meta_", 10));
    let trace_id = request
        .trace_id
        .clone()
        .unwrap_or_else(|| short_id("trace_git_meta_", 10));

    let advice_request = AdviceRequest {
        objective: request.objective.clone(),
        changes_summary: Some(
            "Meta planning for git automation and perpetual quality loop.".to_string(),
        ),
        risk_level: request.risk_level,
        collaboration_mode: CollaborationMode::Team,
        include_bootstrap_plan: true,
        repo_name: request.repo_name.clone(),
        remote_url: None,
        session_id: Some(session_id.clone()),
        trace_id: Some(trace_id.clone()),
    };
    let advice = advise_snapshot(snapshot, &advice_request);

    let mut specialist_team = advice.agent_recommendations;
    specialist_team.push(meta::meta_agent());

    let metrics = meta::meta_metrics();
    let assessment = meta::assess(&advice.repo_snapshot, request, &metrics);

    MetaPlanResponse {
        plan_id: short_id("gitmeta_", 12),
        objective: request.objective.clone(),
        repo_snapshot: advice.repo_snapshot,
        specialist_team,
        baseline_targets: meta::baseline_targets(&metrics),
        meta_metrics: metrics,
        update_loop: meta::update_loop(),
        fork_policy: meta::fork_policy(),
        prune_policy: meta::prune_policy(),
        merge_policy: meta::merge_policy(),
        meta_squared: assessment,
        session_id,
        trace_id,
    }
}
