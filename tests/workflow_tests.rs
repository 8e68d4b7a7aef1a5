//! End-to-end runs of the promotion workflows against recording collaborators.

mod common;

use common::*;
use release_promoter::error::{GitError, ReleaseError, StateError, WorkflowError};
use release_promoter::state::{Branch, Release, StateManager};
use release_promoter::steps::StepRunner;
use release_promoter::workflow::{
    BranchWorkflow, CycleServices, DocWorkflow, NewRelease, branch_step_ids, ignore_branch, start_release,
};
use std::fs;
use tempfile::TempDir;

struct Fixture {
    dir: TempDir,
    harness: Harness,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let repo = dir.path().join("repo");
        fs::create_dir_all(&repo).unwrap();
        let harness = Harness::new(&repo);
        Self { dir, harness }
    }

    fn repo(&self) -> std::path::PathBuf {
        self.dir.path().join("repo")
    }

    fn store(&self) -> StateManager {
        StateManager::new(self.dir.path().join("state.json"))
    }
}

async fn run_branch(fixture: &Fixture, release: &mut Release) -> release_promoter::Result<release_promoter::steps::RunSummary> {
    let config = test_config(fixture.dir.path());
    let store = fixture.store();
    let mut workflow = BranchWorkflow::new(release, VERSION, &store, &config, fixture.harness.services())?;
    StepRunner::new(&fixture.harness.reporter).run(&mut workflow).await
}

#[tokio::test]
async fn promotes_a_branch_end_to_end() {
    let fixture = Fixture::new();
    let fragments = fixture.repo().join("changelog.d");
    fs::create_dir_all(&fragments).unwrap();
    fs::write(fragments.join("nginx.md"), "# Impact\n\n- Restarts nginx.\n").unwrap();
    fs::write(fragments.join("CHANGELOG.md"), "# Release 2025_003\n\n- Older entry\n").unwrap();

    let mut release = seeded_release();
    let summary = run_branch(&fixture, &mut release).await.unwrap();
    assert_eq!(summary.executed, branch_step_ids());
    assert!(summary.skipped.is_empty());

    let branch = release.branch(VERSION).unwrap();
    assert!(branch.tested);
    assert_eq!(branch.orig_staging_commit.as_deref(), Some(STAGING_COMMIT));
    assert_eq!(branch.new_production_commit.as_deref(), Some(PRODUCTION_COMMIT));
    assert_eq!(branch.hydra_eval_id.as_deref(), Some(EVAL_ID));
    assert_eq!(branch.steps.len(), 14);
    assert!(branch.changelog.contains("- Restarts nginx."));
    assert!(branch.changelog.contains("- [metadata](https://my.flyingcircus.io/releases/metadata/fc-24.11-production/2025_004)"));
    assert!(branch.changelog.contains(&format!("- [channel url]({CHANNEL_URL})")));
    assert!(branch.changelog.contains(&format!("...{PRODUCTION_COMMIT})")));

    // persisted state matches memory
    assert_eq!(fixture.store().load().unwrap(), release);

    // builds were looked up for the captured commits
    let lookups = fixture.harness.builds.lookups.lock().unwrap().clone();
    assert_eq!(
        lookups,
        vec![
            ("fc-24.11-staging".to_string(), STAGING_COMMIT.to_string()),
            ("fc-24.11-production".to_string(), PRODUCTION_COMMIT.to_string()),
        ]
    );
    assert_eq!(
        *fixture.harness.fleet.namespaces.lock().unwrap(),
        vec!["release2411stag".to_string(), "release2411prod".to_string()]
    );

    // fragments were folded into the accumulated changelog and committed
    assert!(!fragments.join("nginx.md").exists());
    let accumulated = fs::read_to_string(fragments.join("CHANGELOG.md")).unwrap();
    assert!(accumulated.starts_with("# Release 2025_004"));
    assert!(accumulated.contains("Restarts nginx."));
    assert!(accumulated.contains("# Release 2025_003"));
    assert_eq!(fixture.harness.vcs.count("commit 2 path(s)"), 1);

    let calls = fixture.harness.vcs.calls();
    assert!(calls.contains(
        &"merge fc-24.11-staging into fc-24.11-production: Merge branch 'fc-24.11-staging' into 'fc-24.11-production' for release 2025_004"
            .to_string()
    ));
    let pushes: Vec<&String> = calls.iter().filter(|c| c.starts_with("push origin")).collect();
    assert_eq!(
        pushes,
        vec![
            "push origin fc-24.11-dev --dry-run",
            "push origin fc-24.11-dev",
            "push origin fc-24.11-staging --dry-run",
            "push origin fc-24.11-staging",
            "push origin fc-24.11-production --dry-run",
            "push origin fc-24.11-production",
        ]
    );
    assert!(fixture.harness.reporter.mentions("Valid from: 10.03.2025 20:00 UTC"));
}

#[tokio::test]
async fn second_run_skips_every_step() {
    let fixture = Fixture::new();
    let mut release = seeded_release();
    run_branch(&fixture, &mut release).await.unwrap();
    let calls_after_first = fixture.harness.vcs.calls().len();
    let prompts_after_first = fixture.harness.approval.prompts().len();

    let mut reloaded = fixture.store().load().unwrap();
    let summary = run_branch(&fixture, &mut reloaded).await.unwrap();

    assert!(summary.executed.is_empty());
    assert_eq!(summary.skipped.len(), 14);
    assert_eq!(fixture.harness.vcs.calls().len(), calls_after_first);
    assert_eq!(fixture.harness.approval.prompts().len(), prompts_after_first);
    assert_eq!(reloaded, release);
}

#[tokio::test]
async fn failed_changelog_commit_is_committed_on_rerun() {
    let fixture = Fixture::new();
    let fragments = fixture.repo().join("changelog.d");
    fs::create_dir_all(&fragments).unwrap();
    fs::write(fragments.join("nginx.md"), "# Impact\n\n- Restarts nginx.\n").unwrap();
    fixture.harness.vcs.fail_once("stage_and_commit");

    let mut release = seeded_release();
    run_branch(&fixture, &mut release).await.unwrap_err();
    assert!(!release.branch(VERSION).unwrap().steps.contains("collect_changelog"));
    assert!(fixture.harness.reporter.warned("not committed"));
    assert!(!fragments.join("nginx.md").exists());

    let mut reloaded = fixture.store().load().unwrap();
    let summary = run_branch(&fixture, &mut reloaded).await.unwrap();
    assert_eq!(summary.executed[0], "collect_changelog");

    // the failed commit plus the one picking up the leftover changes
    assert_eq!(fixture.harness.vcs.count("commit"), 2);
    assert_eq!(fixture.harness.vcs.count("commit 1 path(s)"), 1);
    assert!(reloaded.branch(VERSION).unwrap().changelog.contains("- Restarts nginx."));
    assert!(!fixture.harness.reporter.warned("Nothing to collect"));
    assert!(fixture.harness.reporter.mentions("earlier run"));
}

#[tokio::test]
async fn failed_step_resumes_where_it_stopped() {
    let fixture = Fixture::new();
    fixture.harness.vcs.fail_once("merge");

    let mut release = seeded_release();
    let err = run_branch(&fixture, &mut release).await.unwrap_err();
    assert!(matches!(err, ReleaseError::Git(GitError::CommandFailed { .. })));
    assert_eq!(*fixture.harness.reporter.failed.lock().unwrap(), vec!["merge".to_string()]);

    let stored = fixture.store().load().unwrap();
    let branch = stored.branch(VERSION).unwrap();
    let expected: Vec<&str> = branch_step_ids().into_iter().take(5).collect();
    assert_eq!(branch.steps.len(), expected.len());
    assert!(expected.iter().all(|id| branch.has_completed(id)));
    assert!(branch.new_production_commit.is_none());

    let mut resumed = stored;
    let summary = run_branch(&fixture, &mut resumed).await.unwrap();
    assert_eq!(summary.skipped, expected);
    assert_eq!(summary.executed.first(), Some(&"merge"));
    assert!(resumed.branch(VERSION).unwrap().tested);
    assert_eq!(fixture.harness.vcs.count("ensure_mirror"), 1);
}

#[tokio::test]
async fn diverged_staging_is_rebased_once() {
    let fixture = Fixture::new();
    fixture.harness.vcs.reject_dry_run(
        "fc-24.11-staging",
        " ! [rejected]        fc-24.11-staging -> fc-24.11-staging (fetch first)\nerror: failed to push some refs",
    );

    let mut release = seeded_release();
    run_branch(&fixture, &mut release).await.unwrap();

    let vcs = &fixture.harness.vcs;
    assert_eq!(vcs.count("fetch origin fc-24.11-staging"), 1);
    assert_eq!(vcs.count("rebase origin/fc-24.11-staging"), 1);
    assert_eq!(vcs.count("rebase"), 1);
    assert_eq!(vcs.count("push origin fc-24.11-staging --dry-run"), 1);
    assert_eq!(vcs.calls().iter().filter(|c| *c == "push origin fc-24.11-staging").count(), 1);
    assert!(release.branch(VERSION).unwrap().has_completed("push"));
}

#[tokio::test]
async fn diverged_production_stops_before_push_completes() {
    let fixture = Fixture::new();
    fixture.harness.vcs.reject_dry_run(
        "fc-24.11-production",
        " ! [rejected]        fc-24.11-production -> fc-24.11-production (fetch first)",
    );

    let mut release = seeded_release();
    let err = run_branch(&fixture, &mut release).await.unwrap_err();
    assert!(matches!(
        err,
        ReleaseError::Git(GitError::ProductionDivergence { ref branch, .. }) if branch == "fc-24.11-production"
    ));

    let vcs = &fixture.harness.vcs;
    assert_eq!(vcs.count("rebase"), 0);
    assert_eq!(vcs.count("fetch"), 0);
    assert_eq!(vcs.calls().iter().filter(|c| *c == "push origin fc-24.11-production").count(), 0);

    let stored = fixture.store().load().unwrap();
    let branch = stored.branch(VERSION).unwrap();
    assert!(branch.has_completed("add_detailed_changelog"));
    assert!(!branch.has_completed("push"));
    assert!(!branch.has_completed("check_hydra_production"));
}

#[tokio::test]
async fn unexpected_dry_run_failure_is_not_retried() {
    let fixture = Fixture::new();
    fixture
        .harness
        .vcs
        .reject_dry_run("fc-24.11-dev", "fatal: Could not read from remote repository.");

    let mut release = seeded_release();
    let err = run_branch(&fixture, &mut release).await.unwrap_err();
    assert!(matches!(err, ReleaseError::Git(GitError::UnexpectedPushFailure { .. })));
    assert_eq!(fixture.harness.vcs.count("rebase"), 0);
}

#[tokio::test]
async fn mark_as_tested_requires_production_evaluation() {
    let fixture = Fixture::new();
    let mut release = seeded_release();
    {
        let branch = release.branch_mut(VERSION).unwrap();
        let ids = branch_step_ids();
        branch.steps = ids[..ids.len() - 1].iter().map(|s| s.to_string()).collect();
        branch.hydra_eval_id = None;
    }

    let err = run_branch(&fixture, &mut release).await.unwrap_err();
    assert!(matches!(
        err,
        ReleaseError::Workflow(WorkflowError::Precondition { ref step, .. }) if step == "mark_as_tested"
    ));
    let branch = release.branch(VERSION).unwrap();
    assert!(!branch.tested);
    assert!(!branch.has_completed("mark_as_tested"));
}

#[tokio::test]
async fn failing_build_stops_the_staging_check() {
    let mut fixture = Fixture::new();
    fixture.harness.builds = MockBuilds::failing();

    let mut release = seeded_release();
    let err = run_branch(&fixture, &mut release).await.unwrap_err();
    assert!(err.to_string().contains(EVAL_ID));
    let branch = release.branch(VERSION).unwrap();
    assert!(branch.staging_build.is_none());
    assert!(!branch.has_completed("check_hydra_staging"));
    assert!(branch.has_completed("review_pending_commits"));
}

#[tokio::test]
async fn reset_from_reruns_later_steps_only() {
    let fixture = Fixture::new();
    let mut release = seeded_release();
    run_branch(&fixture, &mut release).await.unwrap();

    let cleared = release
        .branch_mut(VERSION)
        .unwrap()
        .reset_from("push", &branch_step_ids())
        .unwrap();
    assert_eq!(cleared.first().map(String::as_str), Some("push"));
    assert_eq!(cleared.len(), 6);
    let branch = release.branch(VERSION).unwrap();
    assert!(!branch.tested);
    assert!(branch.hydra_eval_id.is_none());
    assert_eq!(branch.new_production_commit.as_deref(), Some(PRODUCTION_COMMIT));

    let merges_before = fixture.harness.vcs.count("merge");
    let summary = run_branch(&fixture, &mut release).await.unwrap();
    assert_eq!(summary.executed.first(), Some(&"push"));
    assert_eq!(summary.skipped.len(), 8);
    assert_eq!(fixture.harness.vcs.count("merge"), merges_before);
    assert!(release.branch(VERSION).unwrap().tested);
}

#[tokio::test]
async fn merging_again_needs_confirmation() {
    let fixture = Fixture::new();
    let mut release = seeded_release();
    {
        let branch = release.branch_mut(VERSION).unwrap();
        branch.steps = branch_step_ids()[..5].iter().map(|s| s.to_string()).collect();
        branch.orig_staging_commit = Some(STAGING_COMMIT.to_string());
        branch.new_production_commit = Some("old999".to_string());
    }
    let harness = Harness {
        approval: ScriptedApproval::answering(&[false]),
        ..Harness::new(&fixture.repo())
    };
    let fixture = Fixture { dir: fixture.dir, harness };

    let err = run_branch(&fixture, &mut release).await.unwrap_err();
    assert!(matches!(err, ReleaseError::Workflow(WorkflowError::Aborted { .. })));
    assert_eq!(fixture.harness.vcs.count("merge"), 0);
    assert_eq!(
        release.branch(VERSION).unwrap().new_production_commit.as_deref(),
        Some("old999")
    );
}

#[tokio::test]
async fn missing_channel_url_is_a_warning() {
    let mut fixture = Fixture::new();
    fixture.harness.metadata = MockMetadata(None);

    let mut release = seeded_release();
    run_branch(&fixture, &mut release).await.unwrap();
    assert!(fixture.harness.reporter.warned("channel url"));
    let changelog = &release.branch(VERSION).unwrap().changelog;
    assert!(changelog.contains("[metadata]"));
    assert!(!changelog.contains("[channel url]"));
}

#[tokio::test]
async fn unknown_branch_is_rejected() {
    let fixture = Fixture::new();
    let config = test_config(fixture.dir.path());
    let store = fixture.store();
    let mut release = seeded_release();
    let err = BranchWorkflow::new(&mut release, "21.05", &store, &config, fixture.harness.services())
        .err()
        .unwrap();
    assert!(matches!(err, ReleaseError::Workflow(WorkflowError::UnknownBranch { .. })));
    assert!(ignore_branch(&mut release, &store, "21.05").is_err());
}

#[tokio::test]
async fn start_registers_branches_with_pending_changes() {
    let dir = TempDir::new().unwrap();
    let vcs = MockVcs::new(dir.path())
        .with_remote_branches(&[
            "fc-23.11-production",
            "fc-24.05-production",
            "fc-24.05-staging",
            "fc-24.11-production",
            "fc-24.11-staging",
            "master",
        ])
        .with_ancestor("fc-24.05-staging", "fc-24.05-production");
    let approval = ScriptedApproval::default();
    let reporter = RecordingReporter::default();
    let config = test_config(dir.path());
    let store = StateManager::new(&config.state_file);

    let mut release = store.load().unwrap();
    let today = chrono::NaiveDate::from_ymd_opt(2025, 3, 5).unwrap();
    start_release(
        &mut release,
        &store,
        &config,
        CycleServices {
            vcs: &vcs,
            approval: &approval,
            reporter: &reporter,
        },
        NewRelease::default(),
        today,
    )
    .await
    .unwrap();

    assert_eq!(release.id, "2025_001");
    assert_eq!(release.date, Some(release_date()));
    assert!(release.is_in_progress());
    assert_eq!(release.branches.keys().collect::<Vec<_>>(), vec!["23.11", "24.11"]);
    assert_eq!(
        release.branch("24.11").unwrap().orig_staging_commit.as_deref(),
        Some(STAGING_COMMIT)
    );
    assert_eq!(store.load().unwrap(), release);
    assert!(reporter.mentions("## NixOS 24.11"));
    assert_eq!(
        approval.prompts().last().map(String::as_str),
        Some("Have you copied the checklist to the release issue?")
    );

    let err = start_release(
        &mut release,
        &store,
        &config,
        CycleServices {
            vcs: &vcs,
            approval: &approval,
            reporter: &reporter,
        },
        NewRelease {
            id: Some("2025_002".to_string()),
            date: Some("2025-03-17".to_string()),
        },
        today,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ReleaseError::Workflow(WorkflowError::ReleaseInProgress { .. })));
}

#[tokio::test]
async fn start_rejects_malformed_id() {
    let dir = TempDir::new().unwrap();
    let vcs = MockVcs::new(dir.path());
    let config = test_config(dir.path());
    let store = StateManager::new(&config.state_file);
    let mut release = Release::default();

    let err = start_release(
        &mut release,
        &store,
        &config,
        CycleServices {
            vcs: &vcs,
            approval: &ScriptedApproval::default(),
            reporter: &RecordingReporter::default(),
        },
        NewRelease {
            id: Some("25_4".to_string()),
            date: Some("2025-03-10".to_string()),
        },
        release_date(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ReleaseError::Cli(_)));
    assert!(!store.state_exists());
    assert!(vcs.calls().is_empty());
}

fn tested_branch(version: &str, changelog: &str) -> Branch {
    let mut branch = Branch::new(version, "fc");
    branch.changelog = changelog.to_string();
    branch.hydra_eval_id = Some(EVAL_ID.to_string());
    branch.tested = true;
    branch
}

#[tokio::test]
async fn doc_workflow_writes_release_changelog() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let store = StateManager::new(&config.state_file);
    let approval = ScriptedApproval::default();
    let reporter = RecordingReporter::default();

    let mut release = Release::new(RELEASE_ID, release_date());
    release.branches.insert(
        "24.05".into(),
        tested_branch("24.05", "# NixOS XX.XX platform\n\n- Fix a\n\n# Detailed Changes\n\n- [platform code](x)\n"),
    );
    release.branches.insert(
        "24.11".into(),
        tested_branch("24.11", "# Impact\n\n- Restarts nginx.\n\n# Detailed Changes\n\n- [platform code](y)\n"),
    );
    let mut ignored = Branch::new("23.11", "fc");
    ignored.ignored = true;
    release.branches.insert("23.11".into(), ignored);

    let mut workflow = DocWorkflow::new(&mut release, &store, &config, &approval, &reporter);
    let path = workflow.changelog_path();
    let summary = StepRunner::new(&reporter).run(&mut workflow).await.unwrap();
    assert_eq!(summary.executed, vec!["verify_tested", "collect_changelogs", "finish"]);

    assert_eq!(path, dir.path().join("work/changelog/r004.md"));
    let written = fs::read_to_string(&path).unwrap();
    assert!(written.starts_with("---\nPublish Date: '2025-03-10'\n---"));
    assert!(written.contains("# Release 2025_004 (2025-03-10)"));
    assert!(written.contains("## NixOS 24.05 platform"));
    assert!(written.contains("### 24.11"));
    assert!(written.contains("- NixOS 24.05: [platform code](x)"));
    assert!(!written.contains("23.11"));

    assert!(!release.is_in_progress());
    let stored = store.load().unwrap();
    assert!(!stored.is_in_progress());
    assert!(stored.steps.contains("finish"));
}

#[tokio::test]
async fn doc_workflow_requires_tested_branches() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let store = StateManager::new(&config.state_file);
    let approval = ScriptedApproval::default();
    let reporter = RecordingReporter::default();

    let mut release = seeded_release();
    let mut workflow = DocWorkflow::new(&mut release, &store, &config, &approval, &reporter);
    let err = StepRunner::new(&reporter).run(&mut workflow).await.unwrap_err();
    assert!(matches!(
        err,
        ReleaseError::Workflow(WorkflowError::Precondition { ref reason, .. }) if reason.contains(VERSION)
    ));
    assert!(release.is_in_progress());
}

#[test]
fn corrupt_state_is_reported_not_reset() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.json");
    fs::write(&path, "{ not json").unwrap();

    let err = StateManager::new(&path).load().unwrap_err();
    assert!(matches!(err, ReleaseError::State(StateError::Corrupted { .. })));
    assert_eq!(fs::read_to_string(&path).unwrap(), "{ not json");
}
