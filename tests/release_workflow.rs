//! Integration tests for the release workflow against in-memory collaborators.

use std::sync::Arc;

use release_warden::checks::presets::AreaPlan;
use release_warden::fakes::{FakeChecker, FakeCi, FakeVcs, ManualClock};
use release_warden::report::area::{self, AreaSpec};
use release_warden::{
    release_workflow, Check, CiCheck, CiState, CiStatus, Context, ErrorKind, ReleaseConfig,
    ReleaseEnv, RunFlags, Runner, WorkflowResult,
};

fn plans(pm: Vec<Check>, qa: Vec<Check>) -> Vec<AreaPlan> {
    vec![
        AreaPlan {
            area: AreaSpec::new(area::PM, "pm"),
            checkers: vec![Arc::new(FakeChecker::new("pm").returning(pm))],
        },
        AreaPlan {
            area: AreaSpec::new(area::QA, "qa").with_depends_on(&[area::PM]),
            checkers: vec![Arc::new(FakeChecker::new("qa").returning(qa))],
        },
    ]
}

fn ci(states: &[CiState]) -> Arc<FakeCi> {
    Arc::new(FakeCi::new(
        states
            .iter()
            .map(|s| CiStatus::new(vec![CiCheck::new("build", *s)]))
            .collect::<Vec<_>>(),
    ))
}

struct Harness {
    vcs: Arc<FakeVcs>,
    ci: Arc<FakeCi>,
    checks: Vec<Check>,
    pm_checks: Vec<Check>,
    config: ReleaseConfig,
}

impl Harness {
    fn new(vcs: FakeVcs) -> Self {
        Self {
            vcs: Arc::new(vcs),
            ci: ci(&[CiState::Pending, CiState::Success]),
            checks: vec![Check::go("cargo-test")],
            pm_checks: vec![Check::go("version-format")],
            config: ReleaseConfig::default(),
        }
    }

    async fn run(&self, version: &str, flags: RunFlags) -> WorkflowResult {
        let env = ReleaseEnv::new(self.config.clone(), self.vcs.clone())
            .with_ci(self.ci.clone())
            .with_clock(Arc::new(ManualClock::new()))
            .with_checks(plans(self.pm_checks.clone(), self.checks.clone()));
        let workflow = release_workflow(version, env);
        let mut ctx = Context::new(".", version);
        Runner::new(flags).run(&workflow, &mut ctx).await
    }
}

fn step<'a>(result: &'a WorkflowResult, name: &str) -> &'a release_warden::StepResult {
    result
        .steps
        .iter()
        .find(|s| s.name == name)
        .unwrap_or_else(|| panic!("no step {}", name))
}

#[tokio::test]
async fn full_release_commits_pushes_and_tags() {
    let harness = Harness::new(
        FakeVcs::new()
            .with_tags(["v0.9.0"])
            .with_head("abc123")
            .ahead(1),
    );

    let result = harness.run("1.0.0", RunFlags::default()).await;

    assert!(result.success, "{}", result.summary());
    assert_eq!(result.steps.len(), 9);
    assert!(result.steps.iter().all(|s| !s.failed()));
    assert!(harness.vcs.commits().is_empty());
    assert!(step(&result, "Generate changelog").skipped);
    assert!(step(&result, "Update roadmap").skipped);
    assert_eq!(harness.ci.polls(), 2);
    assert_eq!(harness.ci.references(), vec!["abc123", "abc123"]);
    assert_eq!(harness.vcs.pushed_tags(), vec!["v1.0.0"]);
    assert!(harness.vcs.calls().contains(&"push".to_string()));
    assert_eq!(step(&result, "Create tag").sub_results.len(), 2);
}

#[tokio::test]
async fn dirty_tree_halts_before_checks() {
    let harness = Harness::new(FakeVcs::new().dirty(true));

    let result = harness.run("v1.0.0", RunFlags::default()).await;

    assert!(!result.success);
    assert_eq!(result.steps.len(), 2);
    assert_eq!(result.failed_step().unwrap().name, "Check working directory");
    assert!(harness.vcs.commits().is_empty());
    assert!(harness.vcs.pushed_tags().is_empty());
}

#[tokio::test]
async fn no_go_check_blocks_release() {
    let mut harness = Harness::new(FakeVcs::new());
    harness.checks = vec![
        Check::go("cargo-build"),
        Check::no_go("cargo-test", "2 tests failed"),
    ];

    let result = harness.run("v1.0.0", RunFlags::default()).await;

    assert!(!result.success);
    let checks = step(&result, "Run validation checks");
    assert_eq!(checks.error.as_deref(), Some("1 checks failed: cargo-test"));
    assert_eq!(result.steps.len(), 3);
    assert!(result
        .output
        .iter()
        .any(|l| l.contains("qa/cargo-test: 2 tests failed")));
    assert!(harness.vcs.calls().iter().all(|c| c != "push"));
}

#[tokio::test]
async fn release_with_no_evaluated_checks_is_blocked() {
    let mut harness = Harness::new(FakeVcs::new().ahead(1));
    harness.checks = Vec::new();
    harness.pm_checks = Vec::new();

    let result = harness.run("v1.0.0", RunFlags::default()).await;

    assert!(!result.success);
    assert_eq!(result.steps.len(), 3);
    let checks = step(&result, "Run validation checks");
    assert_eq!(
        checks.error.as_deref(),
        Some("no validation checks ran; nothing was evaluated")
    );
    assert!(harness.vcs.calls().iter().all(|c| c != "push"));
}

#[tokio::test]
async fn warnings_do_not_block_release() {
    let mut harness = Harness::new(FakeVcs::new());
    harness.checks = vec![Check::warn("cargo-clippy", "3 warnings")];

    let result = harness.run("v1.0.0", RunFlags::default()).await;

    assert!(result.success);
    assert!(step(&result, "Run validation checks").success);
}

#[tokio::test]
async fn ci_failure_is_optional_and_tag_still_created() {
    let mut harness = Harness::new(FakeVcs::new());
    harness.ci = ci(&[CiState::Failure]);

    let result = harness.run("v1.0.0", RunFlags::default()).await;

    assert!(result.success);
    let wait = step(&result, "Wait for CI");
    assert!(wait.failed());
    assert_eq!(wait.error_kind, Some(ErrorKind::CiFailure));
    assert_eq!(harness.vcs.pushed_tags(), vec!["v1.0.0"]);
}

#[tokio::test]
async fn ci_timeout_is_reported_as_timeout() {
    let mut harness = Harness::new(FakeVcs::new());
    harness.ci = ci(&[CiState::Pending]);
    harness.config.ci.poll_interval_secs = 10;
    harness.config.ci.timeout_secs = 30;

    let result = harness.run("v1.0.0", RunFlags::default()).await;

    let wait = step(&result, "Wait for CI");
    assert_eq!(wait.error_kind, Some(ErrorKind::Timeout));
    assert!(wait.error.as_deref().unwrap().starts_with("timed out after 30s"));
    assert_eq!(harness.ci.polls(), 4);
    assert!(result.success);
}

#[tokio::test]
async fn skip_ci_issues_no_poll() {
    let harness = Harness::new(FakeVcs::new());
    let flags = RunFlags {
        skip_ci: true,
        ..Default::default()
    };

    let result = harness.run("v1.0.0", flags).await;

    assert!(result.success);
    let wait = step(&result, "Wait for CI");
    assert!(wait.skipped);
    assert_eq!(wait.skip_reason.as_deref(), Some("--skip-ci"));
    assert_eq!(harness.ci.polls(), 0);
}

#[tokio::test]
async fn skip_checks_skips_validation() {
    let mut harness = Harness::new(FakeVcs::new());
    harness.checks = vec![Check::no_go("cargo-test", "broken")];
    let flags = RunFlags {
        skip_checks: true,
        skip_ci: true,
        ..Default::default()
    };

    let result = harness.run("v1.0.0", flags).await;

    assert!(result.success);
    assert!(step(&result, "Run validation checks").skipped);
}

#[tokio::test]
async fn dry_run_changes_nothing() {
    let harness = Harness::new(FakeVcs::new().dirty(true).ahead(2));
    let flags = RunFlags {
        dry_run: true,
        ..Default::default()
    };

    let result = harness.run("v2.0.0", flags).await;

    assert!(result.success, "{}", result.summary());
    assert!(harness.vcs.commits().is_empty());
    assert!(harness.vcs.tags().is_empty());
    assert_eq!(harness.ci.polls(), 0);
    let mutating = ["push", "commit_all", "create_tag", "push_tag"];
    assert!(harness
        .vcs
        .calls()
        .iter()
        .all(|c| !mutating.iter().any(|m| c.starts_with(m))));
    assert!(result
        .output
        .iter()
        .any(|l| l.contains("[Dry run] Would create tag: v2.0.0")));
}

#[tokio::test]
async fn failed_tag_push_removes_local_tag_and_fails() {
    let harness = Harness::new(FakeVcs::new().fail_on("push_tag"));

    let result = harness.run("v1.0.0", RunFlags::default()).await;

    assert!(!result.success);
    let tag = step(&result, "Create tag");
    assert!(tag.failed());
    assert!(tag.sub_results[0].success);
    assert!(tag.sub_results[1].failed());
    assert!(harness.vcs.tags().is_empty());
    assert_eq!(result.failed_step().unwrap().name, "Create tag");
}

#[tokio::test]
async fn existing_tag_fails_first_step() {
    let harness = Harness::new(FakeVcs::new().with_tags(["v1.0.0"]));

    let result = harness.run("v1.0.0", RunFlags::default()).await;

    assert!(!result.success);
    assert_eq!(result.steps.len(), 1);
    assert_eq!(
        result.steps[0].error.as_deref(),
        Some("tag v1.0.0 already exists")
    );
}

#[tokio::test]
async fn result_serializes_to_json() {
    let harness = Harness::new(FakeVcs::new());
    let result = harness.run("v1.0.0", RunFlags::default()).await;

    let json: serde_json::Value = serde_json::from_str(&result.to_json().unwrap()).unwrap();
    assert_eq!(json["name"], "Release v1.0.0");
    assert_eq!(json["success"], true);
    assert_eq!(json["steps"].as_array().unwrap().len(), 9);
    assert_eq!(json["run_id"].as_str().unwrap().len(), 36);
}
