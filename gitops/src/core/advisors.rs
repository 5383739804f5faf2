//! The three advisory agents and their consolidation.
//!
//! Each agent is a pure function of a snapshot and a request. Only the first
//! matching condition in an agent's priority list applies.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::types::{
    AdviceRequest, AgentRecommendation, PrimaryAction, RepoSnapshot, is_protected_branch,
};

/// Ahead-of-upstream count at which the strategist asks for an early review.
pub const AHEAD_REVIEW_THRESHOLD: u32 = 8;
/// Change-sets larger than this are split into several commits.
pub const LARGE_CHANGESET_FILES: u32 = 10;
/// Maximum branch deletions suggested by the hygiene keeper.
pub const PRUNE_BATCH: usize = 8;

static NON_SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("slug regex"));

fn recommendation(
    agent_id: &str,
    focus: &str,
    confidence: f64,
    primary_action: PrimaryAction,
    rationale: &str,
    commands: Vec<String>,
) -> AgentRecommendation {
    AgentRecommendation {
        agent_id: agent_id.to_string(),
        focus: focus.to_string(),
        confidence,
        primary_action,
        rationale: rationale.to_string(),
        commands,
    }
}

pub fn branch_strategist(snapshot: &RepoSnapshot, request: &AdviceRequest) -> AgentRecommendation {
    let agent = |confidence, action, rationale: &str, commands| {
        recommendation(
            "git_agent_topology",
            "branch_topology",
            confidence,
            action,
            rationale,
            commands,
        )
    };

    if !snapshot.is_available() {
        return agent(
            0.55,
            PrimaryAction::ForkOrBranch,
            "Repository snapshot unavailable; bootstrap or attach repository first.",
            bootstrap_commands(request, snapshot),
        );
    }

    let feature_branch = feature_branch_name(&request.objective);
    if snapshot.dirty_on_protected_branch() {
        return agent(
            0.93,
            PrimaryAction::ForkOrBranch,
            "Work is happening directly on protected branch; isolate changes in a feature branch.",
            vec![
                format!("git checkout -b {feature_branch}"),
                format!("git switch {feature_branch}"),
            ],
        );
    }
    let Some(remote) = snapshot.remote_name.as_deref() else {
        return agent(
            0.88,
            PrimaryAction::ForkOrBranch,
            "No remote configured; connect to a hosted remote before collaboration.",
            bootstrap_commands(request, snapshot),
        );
    };
    if snapshot.behind_count > 0 {
        return agent(
            0.81,
            PrimaryAction::Sync,
            "Local branch is behind upstream; rebase before adding new commits.",
            vec![format!(
                "git pull --rebase {remote} {}",
                snapshot.current_branch
            )],
        );
    }
    if snapshot.ahead_count >= AHEAD_REVIEW_THRESHOLD {
        return agent(
            0.79,
            PrimaryAction::ForkOrBranch,
            "Large ahead delta suggests opening a PR now to reduce review risk.",
            vec!["git push".to_string(), "gh pr create --fill".to_string()],
        );
    }
    agent(
        0.74,
        PrimaryAction::Noop,
        "Current branch topology is acceptable.",
        Vec::new(),
    )
}

pub fn commit_auditor(snapshot: &RepoSnapshot, request: &AdviceRequest) -> AgentRecommendation {
    if !snapshot.has_changes() {
        return recommendation(
            "git_agent_commit",
            "commit_strategy",
            0.9,
            PrimaryAction::Noop,
            "No changes detected; commit is not required.",
            Vec::new(),
        );
    }

    let message = suggest_commit_message(&request.objective);
    if snapshot.total_changed_files > LARGE_CHANGESET_FILES {
        return recommendation(
            "git_agent_commit",
            "commit_strategy",
            0.87,
            PrimaryAction::Commit,
            "Change-set is large; split into 2-3 scoped commits for safer rollback.",
            vec![
                "git add <scope1_paths>".to_string(),
                format!("git commit -m \"{message}\""),
                "git add <scope2_paths>".to_string(),
                "git commit -m \"test: add regression checks for the change-set\"".to_string(),
            ],
        );
    }
    recommendation(
        "git_agent_commit",
        "commit_strategy",
        0.8,
        PrimaryAction::Commit,
        "Bundle related files into one coherent commit with explicit scope.",
        vec!["git add -A".to_string(), format!("git commit -m \"{message}\"")],
    )
}

pub fn hygiene_keeper(snapshot: &RepoSnapshot) -> AgentRecommendation {
    let stale = &snapshot.stale_local_branches;
    let merged = &snapshot.merged_local_branches;

    if !stale.is_empty() || !merged.is_empty() {
        let mut commands: Vec<String> = stale
            .iter()
            .chain(merged.iter())
            .take(PRUNE_BATCH)
            .filter(|branch| !is_protected_branch(branch))
            .map(|branch| format!("git branch -d {branch}"))
            .collect();
        commands.push("git remote prune origin".to_string());
        let rationale = format!(
            "Detected {} stale and {} merged branches; prune to reduce branch noise.",
            stale.len(),
            merged.len()
        );
        return recommendation(
            "git_agent_hygiene",
            "branch_hygiene",
            0.82,
            PrimaryAction::Prune,
            &rationale,
            commands,
        );
    }

    if snapshot.behind_count > 0 {
        let remote = snapshot.remote_name.as_deref().unwrap_or("origin");
        return recommendation(
            "git_agent_hygiene",
            "branch_hygiene",
            0.76,
            PrimaryAction::Sync,
            "Sync upstream before additional development to avoid merge friction.",
            vec![format!(
                "git pull --rebase {remote} {}",
                snapshot.current_branch
            )],
        );
    }

    recommendation(
        "git_agent_hygiene",
        "branch_hygiene",
        0.7,
        PrimaryAction::Noop,
        "No prune or sync actions required right now.",
        Vec::new(),
    )
}

/// Distinct rationales in agent order, with snapshot-level notes.
pub fn consolidate(recommendations: &[AgentRecommendation], snapshot: &RepoSnapshot) -> Vec<String> {
    if !snapshot.is_available() {
        return vec!["Repository unavailable. Run bootstrap steps before development.".to_string()];
    }
    let mut actions: Vec<String> = Vec::new();
    for row in recommendations {
        if !actions.contains(&row.rationale) {
            actions.push(row.rationale.clone());
        }
    }
    if !snapshot.has_changes() {
        actions.push("No local file changes detected. Skip commit and continue planning.".to_string());
    }
    actions
}

/// Repository bootstrap plan. Empty when not requested and a remote exists.
pub fn bootstrap_commands(request: &AdviceRequest, snapshot: &RepoSnapshot) -> Vec<String> {
    if !request.include_bootstrap_plan && snapshot.remote_name.is_some() {
        return Vec::new();
    }
    let remote_url = request.remote_url.as_deref().unwrap_or("<github_repo_url>");
    let repo_name = match request.repo_name.trim() {
        "" => "workspace",
        name => name,
    };
    vec![
        format!("# bootstrap target: {repo_name}"),
        "git init".to_string(),
        "git branch -M main".to_string(),
        format!("git remote add origin {remote_url}"),
        "git add .".to_string(),
        format!("git commit -m \"chore: initialize {repo_name} workspace\""),
        "git push -u origin main".to_string(),
    ]
}

/// Conventional-commit style message derived from the objective.
pub fn suggest_commit_message(objective: &str) -> String {
    let objective = objective.trim();
    let lower = objective.to_lowercase();
    let has_any = |tokens: &[&str]| tokens.iter().any(|token| lower.contains(token));
    let prefix = if has_any(&["fix", "bug", "error", "failure"]) {
        "fix"
    } else if has_any(&["refactor", "cleanup"]) {
        "refactor"
    } else if has_any(&["test", "qa", "coverage"]) {
        "test"
    } else {
        "feat"
    };
    let words: Vec<&str> = objective.split_whitespace().collect();
    let scope = slugify(words.first().copied().unwrap_or("core"));
    let summary = words.iter().take(10).copied().collect::<Vec<_>>().join(" ");
    format!("{prefix}({scope}): {summary}")
}

pub fn suggest_pr_comment(request: &AdviceRequest, snapshot: &RepoSnapshot) -> String {
    let summary = request
        .changes_summary
        .as_deref()
        .unwrap_or("No extra summary supplied.");
    format!(
        "Objective: {}\nRisk level: {}\nBranch: {}\nChanged files: {}\nSummary: {}\n\
         Review ask: verify rollback path, test evidence, and scoped file list.",
        request.objective,
        request.risk_level.as_str(),
        snapshot.current_branch,
        snapshot.total_changed_files,
        summary
    )
}

pub fn slugify(text: &str) -> String {
    let lowered = text.trim().to_lowercase();
    let slug = NON_SLUG_RE.replace_all(&lowered, "-");
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "work".to_string()
    } else {
        slug.to_string()
    }
}

pub fn feature_branch_name(objective: &str) -> String {
    format!("feature/{}", slugify(objective))
}
