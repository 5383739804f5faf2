//! End-to-end handoff scenarios against scratch git repositories.
//!
//! Each test builds a real repository with `TestRepo`, drives `run_handoff`
//! through a `RecordingRunner`, and checks both the returned step records and
//! the resulting repository state.

use gitops::core::steps::{
    BootstrapConfig, HandoffRequest, HandoffStatus, StepId, StepStatus, TOOL_MISSING_CODE,
};
use gitops::core::types::SnapshotStatus;
use gitops::handoff::run_handoff;
use gitops::test_support::{RecordingRunner, TestRepo};

fn execute_request(objective: &str) -> HandoffRequest {
    let mut request = HandoffRequest::new(objective);
    request.dry_run = false;
    request.run_tests = false;
    request
}

fn repo_on_main() -> TestRepo {
    let repo = TestRepo::new();
    repo.commit_file("README.md", "hello\n", "chore: init");
    repo
}

#[test]
fn protected_dirty_branch_without_pathspec_stops_at_safety_guard() {
    let repo = repo_on_main();
    repo.write_file("a.txt", "a\n");
    let runner = RecordingRunner::new();

    let result = run_handoff(&runner, repo.path(), &execute_request("add a file"));

    assert_eq!(result.status, HandoffStatus::Failed);
    assert_eq!(result.step_ids(), vec![StepId::SafetyGuard]);
    let guard = &result.steps[0];
    assert_eq!(guard.status, StepStatus::Failed);
    assert_eq!(
        guard.stderr_excerpt.as_deref(),
        Some("Execute mode blocked without pathspec on protected dirty branch.")
    );
    assert!(result.step(StepId::CreateFeatureBranch).is_none());
    assert!(!runner.ran_mutating_command());
    assert_eq!(repo.git(&["symbolic-ref", "--short", "HEAD"]), "main");
    assert_eq!(result.branch_name, "feature/add-a-file");
}

#[test]
fn scoped_pathspec_commits_only_selected_files() {
    let repo = repo_on_main();
    repo.write_file("a.txt", "a\n");
    repo.write_file("b.txt", "b\n");
    let runner = RecordingRunner::new();
    let mut request = execute_request("add a file");
    request.pathspec = vec!["a.txt".to_string()];

    let result = run_handoff(&runner, repo.path(), &request);

    assert_eq!(result.status, HandoffStatus::Succeeded, "{:#?}", result.steps);
    assert_eq!(result.pathspec, vec!["a.txt".to_string()]);
    assert_eq!(
        result.step(StepId::CreateFeatureBranch).map(|s| s.status),
        Some(StepStatus::Succeeded)
    );
    assert_eq!(
        result.step(StepId::StageChanges).and_then(|s| s.command.as_deref()),
        Some("git add -- a.txt")
    );
    assert_eq!(
        result.step(StepId::PushBranch).map(|s| s.description.as_str()),
        Some("No remote configured; push skipped.")
    );

    assert_eq!(
        repo.git(&["symbolic-ref", "--short", "HEAD"]),
        "feature/add-a-file"
    );
    assert_eq!(repo.git(&["show", "--name-only", "--format=", "HEAD"]), "a.txt");
    assert_eq!(repo.git(&["log", "-1", "--format=%s"]), "feat(add): add a file");
    assert!(repo.git(&["status", "--porcelain"]).contains("?? b.txt"));

    let after = &result.repo_snapshot_after;
    assert_eq!(after.current_branch, "feature/add-a-file");
    assert_eq!(after.untracked_files, 1);
}

#[test]
fn pathspec_without_matching_changes_skips_stage_and_commit() {
    let repo = repo_on_main();
    repo.git(&["checkout", "--quiet", "-b", "feature/docs"]);
    repo.write_file("b.txt", "b\n");
    let runner = RecordingRunner::new();
    let mut request = execute_request("docs");
    request.pathspec = vec!["a.txt".to_string()];

    let result = run_handoff(&runner, repo.path(), &request);

    assert_eq!(result.status, HandoffStatus::Succeeded);
    for id in [StepId::StageChanges, StepId::CommitChanges] {
        let step = result.step(id).expect("step");
        assert_eq!(step.status, StepStatus::Skipped);
        assert!(step.description.contains("for provided pathspec"));
    }
    assert_eq!(result.branch_name, "feature/docs");
}

#[test]
fn invalid_pathspec_fails_before_any_git_mutation() {
    let repo = repo_on_main();
    repo.write_file("a.txt", "a\n");
    let runner = RecordingRunner::new();
    let mut request = execute_request("add a file");
    request.pathspec = vec!["../escape.txt".to_string(), "a.txt".to_string()];

    let result = run_handoff(&runner, repo.path(), &request);

    assert_eq!(result.step_ids(), vec![StepId::ValidatePathspec]);
    assert_eq!(
        result.steps[0].description,
        "Invalid pathspec entries: ../escape.txt"
    );
    assert_eq!(result.pathspec, vec!["a.txt".to_string()]);
    assert!(!runner.ran_mutating_command());
}

#[test]
fn dry_run_plans_everything_and_leaves_repo_untouched() {
    let repo = repo_on_main();
    repo.write_file("a.txt", "a\n");
    let runner = RecordingRunner::new();
    let mut request = HandoffRequest::new("add a file");
    request.pathspec = vec!["a.txt".to_string(), "/etc/passwd".to_string()];
    request.create_pr = true;
    request.include_bootstrap = true;
    request.trigger_workflows = true;
    request.bootstrap = Some(BootstrapConfig {
        repo: Some("acme/app".to_string()),
        ..BootstrapConfig::default()
    });

    let result = run_handoff(&runner, repo.path(), &request);

    assert_eq!(result.status, HandoffStatus::DryRun);
    assert!(!runner.ran_mutating_command(), "{:?}", runner.commands());
    assert_eq!(
        result.step_ids(),
        vec![
            StepId::ValidatePathspec,
            StepId::CreateFeatureBranch,
            StepId::RunTests,
            StepId::StageChanges,
            StepId::CommitChanges,
            StepId::PushBranch,
            StepId::CreatePr,
            StepId::BootstrapInfra,
            StepId::TriggerBackendWorkflow,
            StepId::TriggerFrontendWorkflow,
        ]
    );
    for step in &result.steps {
        match step.step_id {
            StepId::PushBranch => assert_eq!(step.status, StepStatus::Skipped),
            _ => assert_eq!(step.status, StepStatus::Planned, "{:?}", step.step_id),
        }
        assert_eq!(step.return_code, None);
    }
    assert_eq!(
        result.step(StepId::RunTests).and_then(|s| s.command.as_deref()),
        Some("cargo test")
    );
    assert_eq!(result.summary.steps_failed, 0);
    assert_eq!(repo.git(&["symbolic-ref", "--short", "HEAD"]), "main");
    assert_eq!(repo.git(&["rev-list", "--count", "HEAD"]), "1");
}

#[test]
fn missing_gh_fails_pr_step_with_127() {
    let repo = repo_on_main();
    repo.git(&["checkout", "--quiet", "-b", "feature/pr"]);
    let runner = RecordingRunner::new().without_tool("gh");
    let mut request = execute_request("open pr");
    request.push_branch = false;
    request.create_pr = true;
    request.trigger_workflows = true;

    let result = run_handoff(&runner, repo.path(), &request);

    assert_eq!(result.status, HandoffStatus::Failed);
    let pr = result.step(StepId::CreatePr).expect("pr step");
    assert_eq!(pr.status, StepStatus::Failed);
    assert_eq!(pr.return_code, Some(TOOL_MISSING_CODE));
    assert_eq!(pr.requires_tool.as_deref(), Some("gh"));
    assert_eq!(result.steps.last().map(|s| s.step_id), Some(StepId::CreatePr));
    assert!(
        !runner
            .commands()
            .iter()
            .any(|c| c.starts_with("gh "))
    );
}

#[test]
fn bootstrap_missing_fields_fail_in_execute_mode() {
    let repo = repo_on_main();
    repo.git(&["checkout", "--quiet", "-b", "feature/infra"]);
    let runner = RecordingRunner::new();
    let mut request = execute_request("provision infra");
    request.push_branch = false;
    request.include_bootstrap = true;
    request.trigger_workflows = true;

    let result = run_handoff(&runner, repo.path(), &request);

    assert_eq!(result.status, HandoffStatus::Failed);
    let step = result.step(StepId::BootstrapInfra).expect("bootstrap step");
    assert_eq!(step.status, StepStatus::Failed);
    assert_eq!(
        step.description,
        "Bootstrap config missing required fields: bootstrap.repo, bootstrap.resource_group"
    );
    assert_eq!(
        result.steps.last().map(|s| s.step_id),
        Some(StepId::BootstrapInfra)
    );
}

#[test]
fn failing_test_command_halts_before_staging() {
    let repo = repo_on_main();
    repo.git(&["checkout", "--quiet", "-b", "feature/tests"]);
    repo.write_file("a.txt", "a\n");
    let runner = RecordingRunner::new();
    let mut request = execute_request("add tests");
    request.run_tests = true;
    request.test_command = vec![
        "sh".to_string(),
        "-c".to_string(),
        "echo boom >&2; exit 3".to_string(),
    ];

    let result = run_handoff(&runner, repo.path(), &request);

    assert_eq!(
        result.step_ids(),
        vec![StepId::CreateFeatureBranch, StepId::RunTests]
    );
    let tests = &result.steps[1];
    assert_eq!(tests.status, StepStatus::Failed);
    assert_eq!(tests.return_code, Some(3));
    assert_eq!(tests.stderr_excerpt.as_deref(), Some("boom"));
    assert_eq!(repo.git(&["rev-list", "--count", "HEAD"]), "1");
}

#[test]
fn feature_branch_changes_are_committed_and_pushed() {
    let mut repo = repo_on_main();
    repo.add_bare_remote();
    repo.git(&["checkout", "--quiet", "-b", "feature/push"]);
    repo.write_file("src/lib.rs", "pub fn x() {}\n");
    let runner = RecordingRunner::new();
    let mut request = execute_request("push change");
    request.run_tests = true;
    request.test_command = vec!["sh".to_string(), "-c".to_string(), "echo ok".to_string()];

    let result = run_handoff(&runner, repo.path(), &request);

    assert_eq!(result.status, HandoffStatus::Succeeded, "{:#?}", result.steps);
    assert_eq!(
        result.step(StepId::RunTests).and_then(|s| s.stdout_excerpt.as_deref()),
        Some("ok")
    );
    assert_eq!(
        result.step(StepId::StageChanges).and_then(|s| s.command.as_deref()),
        Some("git add -A")
    );
    let push = result.step(StepId::PushBranch).expect("push step");
    assert_eq!(push.status, StepStatus::Succeeded);
    assert_eq!(push.command.as_deref(), Some("git push -u origin feature/push"));
    assert_eq!(result.repo_snapshot_after.total_changed_files, 0);
    assert_eq!(result.summary.steps_succeeded, 4);
}

#[test]
fn unavailable_repository_halts_after_validation() {
    let temp = tempfile::tempdir().expect("tempdir");
    let runner = RecordingRunner::new();
    let result = run_handoff(&runner, temp.path(), &execute_request("anything"));

    assert_eq!(result.repo_snapshot_before.status, SnapshotStatus::Unavailable);
    assert_eq!(result.step_ids(), vec![StepId::ValidateRepo]);
    assert_eq!(result.steps[0].return_code, Some(1));
    assert_eq!(result.status, HandoffStatus::Failed);
    assert_eq!(result.branch_name, "feature/anything");
}

#[test]
fn scoped_commit_leaves_previously_staged_files_out() {
    let repo = repo_on_main();
    repo.git(&["checkout", "--quiet", "-b", "feature/x"]);
    repo.write_file("a.txt", "a\n");
    repo.write_file("b.txt", "b\n");
    repo.git(&["add", "b.txt"]);
    let runner = RecordingRunner::new();
    let mut request = execute_request("add a file");
    request.pathspec = vec!["a.txt".to_string()];

    let result = run_handoff(&runner, repo.path(), &request);

    assert_eq!(result.status, HandoffStatus::Succeeded, "{:#?}", result.steps);
    assert_eq!(
        result.step(StepId::CommitChanges).and_then(|s| s.command.as_deref()),
        Some("git commit -m \"feat(add): add a file\" -- a.txt")
    );
    assert_eq!(repo.git(&["show", "--name-only", "--format=", "HEAD"]), "a.txt");
    assert_eq!(repo.git(&["diff", "--cached", "--name-only"]), "b.txt");
}

#[test]
fn existing_feature_branch_aborts_the_whole_handoff() {
    let repo = repo_on_main();
    repo.git(&["branch", "feature/add-a-file"]);
    repo.write_file("a.txt", "a\n");
    let runner = RecordingRunner::new();
    let mut request = execute_request("add a file");
    request.pathspec = vec!["a.txt".to_string()];
    request.create_pr = true;
    request.trigger_workflows = true;

    let result = run_handoff(&runner, repo.path(), &request);

    assert_eq!(result.status, HandoffStatus::Failed);
    assert_eq!(result.step_ids(), vec![StepId::CreateFeatureBranch]);
    let branch = &result.steps[0];
    assert_eq!(branch.status, StepStatus::Failed);
    assert_eq!(branch.return_code, Some(128));
    assert!(
        branch
            .stderr_excerpt
            .as_deref()
            .is_some_and(|e| e.contains("already exists")),
        "{:?}",
        branch.stderr_excerpt
    );
    assert!(!runner.commands().iter().any(|c| c.starts_with("git add")));
    assert_eq!(repo.git(&["symbolic-ref", "--short", "HEAD"]), "main");
    assert_eq!(repo.git(&["rev-list", "--count", "HEAD"]), "1");
}

fn main_with_tracked_files() -> TestRepo {
    let repo = repo_on_main();
    repo.commit_file("a.txt", "a\n", "chore: add a");
    repo.commit_file("b.txt", "b\n", "chore: add b");
    repo
}

#[test]
fn scoped_pathspec_commits_only_selected_tracked_file() {
    let repo = main_with_tracked_files();
    repo.write_file("a.txt", "a v2\n");
    repo.write_file("b.txt", "b v2\n");
    let runner = RecordingRunner::new();
    let mut request = execute_request("update a");
    request.pathspec = vec!["a.txt".to_string()];

    let result = run_handoff(&runner, repo.path(), &request);

    assert_eq!(result.status, HandoffStatus::Succeeded, "{:#?}", result.steps);
    assert_eq!(result.repo_snapshot_before.modified_files, 2);
    assert_eq!(
        repo.git(&["symbolic-ref", "--short", "HEAD"]),
        "feature/update-a"
    );
    assert_eq!(repo.git(&["show", "--name-only", "--format=", "HEAD"]), "a.txt");
    assert_eq!(repo.git(&["diff", "--name-only"]), "b.txt");
    assert_eq!(result.repo_snapshot_after.modified_files, 1);
}

#[test]
fn protected_branch_with_modified_tracked_file_stops_at_safety_guard() {
    let repo = main_with_tracked_files();
    repo.write_file("a.txt", "a v2\n");
    let runner = RecordingRunner::new();

    let result = run_handoff(&runner, repo.path(), &execute_request("update a"));

    assert_eq!(result.step_ids(), vec![StepId::SafetyGuard]);
    assert_eq!(result.status, HandoffStatus::Failed);
    assert_eq!(result.repo_snapshot_before.modified_files, 1);
    assert_eq!(result.repo_snapshot_before.untracked_files, 0);
    assert!(!runner.ran_mutating_command());
    assert_eq!(repo.git(&["diff", "--name-only"]), "a.txt");
}
