//! Meta-plan catalog, policies and the meta-squared assessor.

use std::collections::BTreeMap;

use crate::core::types::{
    AgentRecommendation, MetaPlanMetric, MetaPlanRequest, MetaSquaredAssessment, MetaSquaredMode,
    MetricDirection, MetricLayer, PrimaryAction, RepoSnapshot, RiskLevel, ThresholdUpdate,
    TriggerReason,
};

/// Changed-file count that triggers a patch-level assessment on its own.
pub const CHANGED_FILES_TRIGGER: u32 = 12;
/// Changed-file count at which churn saturates.
pub const CHURN_SATURATION_FILES: f64 = 80.0;
/// Largest threshold movement allowed in one assessment.
pub const MAX_THRESHOLD_DELTA: f64 = 0.05;
const THRESHOLD_CEILING: f64 = 1_000_000.0;
const THRESHOLD_UPDATE_METRICS: usize = 3;

/// Lowercase substrings marking a changed path as sensitive. Covers the
/// advisor, orchestrator and CLI sources of this crate.
pub const SENSITIVE_PATH_TOKENS: [&str; 8] = [
    "auth",
    "secret",
    "deploy",
    ".github/workflows",
    "ops/azure",
    "src/advise.rs",
    "src/handoff.rs",
    "src/main.rs",
];

#[allow(clippy::too_many_arguments)]
fn metric(
    metric_id: &str,
    layer: MetricLayer,
    definition: &str,
    signal_source: &str,
    cadence: &str,
    direction: MetricDirection,
    warn_threshold: f64,
    critical_threshold: f64,
) -> MetaPlanMetric {
    MetaPlanMetric {
        metric_id: metric_id.to_string(),
        layer,
        definition: definition.to_string(),
        signal_source: signal_source.to_string(),
        cadence: cadence.to_string(),
        direction,
        warn_threshold,
        critical_threshold,
    }
}

/// The fixed metric catalog, in assessment order.
pub fn meta_metrics() -> Vec<MetaPlanMetric> {
    vec![
        metric(
            "planning_drift_rate",
            MetricLayer::Plan,
            "Fraction of cards changed after scope freeze. Captures instability in planning intent.",
            "kanban_plan_deltas",
            "per_pr",
            MetricDirection::LowerIsBetter,
            0.25,
            0.4,
        ),
        metric(
            "automation_coverage",
            MetricLayer::Implementation,
            "Share of git workflow steps executed through scripted or CLI automation.",
            "cli_command_audit",
            "daily",
            MetricDirection::HigherIsBetter,
            0.7,
            0.5,
        ),
        metric(
            "merge_rework_rate",
            MetricLayer::PostImplementation,
            "Commits requiring follow-up fix within 48h after merge.",
            "post_merge_fix_commits",
            "daily",
            MetricDirection::LowerIsBetter,
            0.2,
            0.35,
        ),
        metric(
            "team_decision_latency_minutes",
            MetricLayer::Team,
            "Median minutes from conflict detection to supervisor/lead decision.",
            "debate_and_decision_events",
            "per_pr",
            MetricDirection::LowerIsBetter,
            90.0,
            180.0,
        ),
        metric(
            "code_style_entropy",
            MetricLayer::PostImplementation,
            "Approximate style divergence score to catch inconsistent code patterns.",
            "lint_and_diff_style_scan",
            "per_pr",
            MetricDirection::LowerIsBetter,
            0.35,
            0.55,
        ),
    ]
}

pub fn baseline_targets(metrics: &[MetaPlanMetric]) -> BTreeMap<String, f64> {
    metrics
        .iter()
        .map(|m| (m.metric_id.clone(), m.warn_threshold))
        .collect()
}

pub fn meta_agent() -> AgentRecommendation {
    AgentRecommendation {
        agent_id: "git_agent_meta".to_string(),
        focus: "meta_planning".to_string(),
        confidence: 0.86,
        primary_action: PrimaryAction::Noop,
        rationale: "Maintain meta metrics, detect planning drift, and flag threshold regressions."
            .to_string(),
        commands: vec!["gitops meta-plan --objective \"...\"".to_string()],
    }
}

fn lines(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

pub fn update_loop() -> Vec<String> {
    lines(&[
        "Every PR: recompute meta metrics and append result to planning log.",
        "If any metric crosses critical threshold: open hard-stop card and require lead approval.",
        "If three consecutive windows are stable: tighten thresholds by 5% for continuous improvement.",
    ])
}

pub fn fork_policy() -> Vec<String> {
    lines(&[
        "Fork/branch when working directly on protected branch with local changes.",
        "Fork/branch when ahead_count >= 8 to reduce review risk.",
        "Fork/branch when conflict density exceeds threshold in two consecutive windows.",
    ])
}

pub fn prune_policy() -> Vec<String> {
    lines(&[
        "Prune merged branches weekly.",
        "Prune stale branches older than 30 days unless tagged as long_horizon.",
        "Run remote prune after branch cleanup to keep topology accurate.",
    ])
}

pub fn merge_policy() -> Vec<String> {
    lines(&[
        "Merge only when replayable checks and contract checks are green.",
        "Require PR notes to include risk, rollback path, and metric deltas.",
        "Block merge on meta drift critical threshold breaches.",
    ])
}

pub fn touches_sensitive_paths(paths: &[String]) -> bool {
    paths.iter().any(|path| {
        let lowered = path.to_lowercase();
        SENSITIVE_PATH_TOKENS
            .iter()
            .any(|token| lowered.contains(token))
    })
}

/// Trigger reasons in fixed order; empty means no patch-level review.
pub fn trigger_reasons(snapshot: &RepoSnapshot, risk_level: RiskLevel) -> Vec<TriggerReason> {
    let mut reasons = Vec::new();
    if snapshot.total_changed_files >= CHANGED_FILES_TRIGGER {
        reasons.push(TriggerReason::ChangedFilesGte12);
    }
    if risk_level == RiskLevel::High {
        reasons.push(TriggerReason::RiskLevelHigh);
    }
    if touches_sensitive_paths(&snapshot.changed_paths) {
        reasons.push(TriggerReason::TouchesSensitivePaths);
    }
    reasons
}

pub fn churn(total_changed_files: u32) -> f64 {
    (f64::from(total_changed_files) / CHURN_SATURATION_FILES).min(1.0)
}

fn risk_penalty(risk_level: RiskLevel) -> f64 {
    match risk_level {
        RiskLevel::Low => 0.04,
        RiskLevel::Medium => 0.08,
        RiskLevel::High => 0.16,
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

fn unit_score(value: f64) -> f64 {
    round_to(value.clamp(0.0, 1.0), 4)
}

pub fn assess(
    snapshot: &RepoSnapshot,
    request: &MetaPlanRequest,
    metrics: &[MetaPlanMetric],
) -> MetaSquaredAssessment {
    if request.meta_squared_mode == MetaSquaredMode::Off {
        return MetaSquaredAssessment {
            mode: MetaSquaredMode::Off,
            enabled: false,
            triggered: false,
            trigger_reasons: Vec::new(),
            metric_quality_score: 0.0,
            threshold_fitness_score: 0.0,
            decision_alignment_score: 0.0,
            bounded_threshold_updates: Vec::new(),
            recommendations: lines(&[
                "Meta-squared disabled. Use PATCH mode for due-diligence checks on risky changes.",
            ]),
        };
    }

    let reasons = trigger_reasons(snapshot, request.risk_level);
    if reasons.is_empty() {
        return MetaSquaredAssessment {
            mode: MetaSquaredMode::Patch,
            enabled: true,
            triggered: false,
            trigger_reasons: reasons,
            metric_quality_score: 0.72,
            threshold_fitness_score: 0.74,
            decision_alignment_score: 0.7,
            bounded_threshold_updates: Vec::new(),
            recommendations: lines(&[
                "No patch-level trigger active. Continue standard meta metrics and review at PR boundary.",
            ]),
        };
    }

    let churn = churn(snapshot.total_changed_files);
    let protected_penalty = if snapshot.dirty_on_protected_branch() {
        0.08
    } else {
        0.0
    };
    let behind_penalty = if snapshot.behind_count > 0 { 0.1 } else { 0.0 };
    let high_risk = request.risk_level == RiskLevel::High;

    MetaSquaredAssessment {
        mode: MetaSquaredMode::Patch,
        enabled: true,
        triggered: true,
        trigger_reasons: reasons,
        metric_quality_score: unit_score(0.88 - churn * 0.22 - risk_penalty(request.risk_level)),
        threshold_fitness_score: unit_score(0.84 - churn * 0.18 - protected_penalty),
        decision_alignment_score: unit_score(0.82 - churn * 0.14 - behind_penalty),
        bounded_threshold_updates: threshold_updates(metrics, churn, high_risk),
        recommendations: lines(&[
            "Require lead/supervisor review before accepting threshold updates.",
            "Do not auto-merge based on meta-squared score only.",
            "Apply at most one threshold update per metric every seven days.",
        ]),
    }
}

/// Proposed deltas for the leading catalog metrics. Gated separately from
/// the trigger set: only high risk or churn of at least 0.2 qualifies.
pub fn threshold_updates(
    metrics: &[MetaPlanMetric],
    churn: f64,
    high_risk: bool,
) -> Vec<ThresholdUpdate> {
    if !high_risk && churn < 0.2 {
        return Vec::new();
    }
    let adjust = (0.02 + churn * 0.05).min(MAX_THRESHOLD_DELTA);
    metrics
        .iter()
        .take(THRESHOLD_UPDATE_METRICS)
        .map(|m| {
            let (warn, critical) = match m.direction {
                MetricDirection::HigherIsBetter => (
                    (m.warn_threshold - adjust).max(0.0),
                    (m.critical_threshold - adjust).max(0.0),
                ),
                MetricDirection::LowerIsBetter | MetricDirection::TargetRange => (
                    (m.warn_threshold + adjust).min(THRESHOLD_CEILING),
                    (m.critical_threshold + adjust).min(THRESHOLD_CEILING),
                ),
            };
            ThresholdUpdate {
                metric_id: m.metric_id.clone(),
                previous_warn_threshold: m.warn_threshold,
                previous_critical_threshold: m.critical_threshold,
                proposed_warn_threshold: round_to(warn, 6),
                proposed_critical_threshold: round_to(critical, 6),
                bounded: true,
                rationale: "Patch-level meta-squared trigger requested threshold hardening/relaxation."
                    .to_string(),
            }
        })
        .collect()
}
