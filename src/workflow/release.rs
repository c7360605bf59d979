//! The release workflow: validate, commit, push, wait for CI, tag.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

use crate::checks::presets::{self, AreaPlan};
use crate::checks::{normalize_version, CheckOptions, Version};
use crate::ci::{CiStatusSource, CiWaiter, Clock, TokioClock};
use crate::config::{CommandLine, ReleaseConfig};
use crate::error::{Error, Result};
use crate::git::VersionControl;
use crate::report::{Aggregator, ReportMeta};

use super::{Context, Step, StepAction, StepOutcome, Workflow};

/// Context key set once the local tag exists.
const TAG_CREATED: &str = "tag_created";

/// Collaborators shared by the release steps.
#[derive(Clone)]
pub struct ReleaseEnv {
    pub config: ReleaseConfig,
    pub vcs: Arc<dyn VersionControl>,
    /// CI source; without one the CI wait is skipped.
    pub ci: Option<Arc<dyn CiStatusSource>>,
    pub clock: Arc<dyn Clock>,
    /// Fixed check plan; built from the project directory when unset.
    pub checks: Option<Vec<AreaPlan>>,
}

impl ReleaseEnv {
    pub fn new(config: ReleaseConfig, vcs: Arc<dyn VersionControl>) -> Self {
        Self {
            config,
            vcs,
            ci: None,
            clock: Arc::new(TokioClock),
            checks: None,
        }
    }

    pub fn with_ci(mut self, ci: Arc<dyn CiStatusSource>) -> Self {
        self.ci = Some(ci);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_checks(mut self, plans: Vec<AreaPlan>) -> Self {
        self.checks = Some(plans);
        self
    }
}

/// Builds the nine-step release workflow for `version`.
pub fn release_workflow(version: &str, env: ReleaseEnv) -> Workflow {
    let env = Arc::new(env);
    let command_step = |name: &str, command: &Option<CommandLine>| match command {
        Some(command) => Step::action(name, RunCommand::new(command.clone())),
        None => Step::leaf(name, None),
    };

    Workflow::new(
        format!("Release {}", normalize_version(version)),
        vec![
            Step::action("Validate version", ValidateVersion(env.clone()))
                .with_description("Check version format and ensure the tag does not exist"),
            Step::action("Check working directory", CheckWorkingDirectory(env.clone()))
                .with_description("Ensure no uncommitted changes"),
            Step::action("Run validation checks", RunChecks(env.clone()))
                .with_description("Run every validation area and require a GO"),
            command_step("Generate changelog", &env.config.actions.changelog)
                .with_description("Update the changelog")
                .optional(),
            command_step("Update roadmap", &env.config.actions.roadmap)
                .with_description("Regenerate the roadmap")
                .optional(),
            Step::action("Create release commit", CreateReleaseCommit(env.clone()))
                .with_description("Commit all changes with a release message"),
            Step::action("Push to remote", PushToRemote(env.clone()))
                .with_description("Push commits to the remote"),
            Step::action("Wait for CI", WaitForCi(env.clone()))
                .with_description("Wait for CI checks to pass")
                .optional(),
            Step::composite(
                "Create tag",
                vec![
                    Step::action("Create local tag", CreateLocalTag(env.clone())),
                    Step::action("Push tag", PushTag(env)),
                ],
            )
            .with_description("Create and push the release tag"),
        ],
    )
    .with_description(format!(
        "Prepare and create release {}",
        normalize_version(version)
    ))
}

struct ValidateVersion(Arc<ReleaseEnv>);

#[async_trait]
impl StepAction for ValidateVersion {
    async fn run(&self, ctx: &mut Context) -> Result<StepOutcome> {
        if ctx.version.trim().is_empty() {
            return Err(Error::Step("version is required".to_string()));
        }
        ctx.version = normalize_version(&ctx.version);
        Version::parse(&ctx.version)?;

        if self.0.vcs.tag_exists(&ctx.version)? {
            return Err(Error::Step(format!("tag {} already exists", ctx.version)));
        }

        ctx.log(format!("  Version: {}", ctx.version));
        Ok(StepOutcome::Done)
    }
}

struct CheckWorkingDirectory(Arc<ReleaseEnv>);

#[async_trait]
impl StepAction for CheckWorkingDirectory {
    async fn run(&self, ctx: &mut Context) -> Result<StepOutcome> {
        if !self.0.vcs.is_dirty()? {
            ctx.log("  Working directory is clean");
            return Ok(StepOutcome::Done);
        }
        if ctx.dry_run() {
            ctx.log("  Warning: working directory has uncommitted changes");
            return Ok(StepOutcome::Done);
        }
        Err(Error::Step(
            "working directory has uncommitted changes; commit or stash them first".to_string(),
        ))
    }
}

struct RunChecks(Arc<ReleaseEnv>);

#[async_trait]
impl StepAction for RunChecks {
    async fn run(&self, ctx: &mut Context) -> Result<StepOutcome> {
        if ctx.flags().skip_checks {
            ctx.log("  Skipping validation checks (--skip-checks)");
            return Ok(StepOutcome::Skipped("--skip-checks".to_string()));
        }

        let env = &self.0;
        let plans = match &env.checks {
            Some(plans) => plans.clone(),
            None => presets::plan(&ctx.dir, &env.config, env.vcs.clone())?,
        };
        let meta = ReportMeta {
            project: env.config.project_name(&ctx.dir),
            version: ctx.version.clone(),
            phase: env.config.project.phase.clone(),
        };
        let aggregator = Aggregator::new(CheckOptions {
            version: Some(ctx.version.clone()),
            verbose: ctx.verbose(),
        });

        let report = aggregator.run(&plans, &ctx.dir, meta).await?;
        for team in report.teams() {
            ctx.log(format!("    {} {:<6} {}", team.status().icon(), team.status(), team.name));
        }
        ctx.set("report_status", report.status().as_str());

        if report.is_go() {
            ctx.log("  All checks passed");
            return Ok(StepOutcome::Done);
        }

        let blocking = report.blocking_checks();
        if blocking.is_empty() {
            return Err(Error::Step(
                "no validation checks ran; nothing was evaluated".to_string(),
            ));
        }

        for (team, check) in &blocking {
            ctx.log(format!(
                "    \u{2717} {}/{}: {}",
                team.name,
                check.id,
                check.detail.as_deref().unwrap_or("failed")
            ));
        }
        let ids: Vec<&str> = blocking.iter().map(|(_, c)| c.id.as_str()).collect();
        Err(Error::Step(format!(
            "{} checks failed: {}",
            blocking.len(),
            ids.join(", ")
        )))
    }
}

/// Runs a configured command in the project directory.
struct RunCommand {
    command: CommandLine,
}

impl RunCommand {
    fn new(command: impl Into<CommandLine>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl StepAction for RunCommand {
    async fn run(&self, ctx: &mut Context) -> Result<StepOutcome> {
        let argv: Vec<String> = self
            .command
            .argv()
            .iter()
            .map(|arg| arg.replace("{version}", &ctx.version))
            .collect();
        let command = argv.join(" ");
        if ctx.dry_run() {
            ctx.log(format!("  [Dry run] Would run: {}", command));
            return Ok(StepOutcome::Done);
        }

        let (program, args) = argv
            .split_first()
            .ok_or_else(|| Error::Config("command line is empty".to_string()))?;
        let output = Command::new(program)
            .args(args)
            .current_dir(&ctx.dir)
            .output()
            .await
            .map_err(|e| Error::Step(format!("failed to run {}: {}", program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Step(format!("{} failed: {}", program, stderr.trim())));
        }

        ctx.log(format!("  Ran: {}", command));
        Ok(StepOutcome::Done)
    }
}

struct CreateReleaseCommit(Arc<ReleaseEnv>);

#[async_trait]
impl StepAction for CreateReleaseCommit {
    async fn run(&self, ctx: &mut Context) -> Result<StepOutcome> {
        if !self.0.vcs.is_dirty()? {
            ctx.log("  No changes to commit");
            return Ok(StepOutcome::Done);
        }

        let message = format!("chore(release): {}", ctx.version);
        if ctx.dry_run() {
            ctx.log(format!("  [Dry run] Would create commit: {}", message));
            return Ok(StepOutcome::Done);
        }

        self.0.vcs.commit_all(&message)?;
        info!(%message, "created release commit");
        ctx.log(format!("  Created commit: {}", message));
        Ok(StepOutcome::Done)
    }
}

struct PushToRemote(Arc<ReleaseEnv>);

#[async_trait]
impl StepAction for PushToRemote {
    async fn run(&self, ctx: &mut Context) -> Result<StepOutcome> {
        let remote = &self.0.config.git.remote;
        if ctx.dry_run() {
            ctx.log(format!("  [Dry run] Would push to {}", remote));
            return Ok(StepOutcome::Done);
        }

        if self.0.vcs.ahead_count()? == 0 {
            ctx.log("  Already up to date with remote");
            return Ok(StepOutcome::Done);
        }

        self.0.vcs.push()?;
        ctx.log(format!("  Pushed to {}", remote));
        Ok(StepOutcome::Done)
    }
}

struct WaitForCi(Arc<ReleaseEnv>);

#[async_trait]
impl StepAction for WaitForCi {
    async fn run(&self, ctx: &mut Context) -> Result<StepOutcome> {
        if ctx.flags().skip_ci {
            ctx.log("  Skipping CI wait (--skip-ci)");
            return Ok(StepOutcome::Skipped("--skip-ci".to_string()));
        }
        let Some(source) = self.0.ci.clone() else {
            ctx.log("  No CI status source available, skipping CI wait");
            return Ok(StepOutcome::Skipped("no CI status source".to_string()));
        };
        if ctx.dry_run() {
            ctx.log("  [Dry run] Would wait for CI");
            return Ok(StepOutcome::Done);
        }

        let ci = &self.0.config.ci;
        let reference = self.0.vcs.current_commit()?;
        ctx.log(format!("  Waiting for CI on {} (timeout: {}s)...", reference, ci.timeout_secs));

        let waiter = CiWaiter::with_clock(source, self.0.clock.clone());
        let status = waiter
            .wait_for_completion(&reference, ci.poll_interval(), ci.timeout())
            .await?;

        ctx.log(format!("  CI passed ({} checks)", status.total_count));
        Ok(StepOutcome::Done)
    }
}

struct CreateLocalTag(Arc<ReleaseEnv>);

#[async_trait]
impl StepAction for CreateLocalTag {
    async fn run(&self, ctx: &mut Context) -> Result<StepOutcome> {
        if ctx.dry_run() {
            ctx.log(format!("  [Dry run] Would create tag: {}", ctx.version));
            return Ok(StepOutcome::Done);
        }

        self.0
            .vcs
            .create_tag(&ctx.version, &format!("Release {}", ctx.version))?;
        ctx.set(TAG_CREATED, true);
        ctx.log(format!("  Created tag: {}", ctx.version));
        Ok(StepOutcome::Done)
    }
}

struct PushTag(Arc<ReleaseEnv>);

#[async_trait]
impl StepAction for PushTag {
    async fn run(&self, ctx: &mut Context) -> Result<StepOutcome> {
        if ctx.dry_run() {
            ctx.log(format!("  [Dry run] Would push tag: {}", ctx.version));
            return Ok(StepOutcome::Done);
        }

        if let Err(e) = self.0.vcs.push_tag(&ctx.version) {
            let created = ctx.get(TAG_CREATED).and_then(|v| v.as_bool()).unwrap_or(false);
            if created {
                match self.0.vcs.delete_tag(&ctx.version) {
                    Ok(()) => ctx.log(format!("  Deleted local tag {}", ctx.version)),
                    Err(del) => {
                        warn!(tag = %ctx.version, error = %del, "could not delete local tag")
                    }
                }
            }
            return Err(e);
        }

        ctx.log(format!("  Pushed tag: {}", ctx.version));
        Ok(StepOutcome::Done)
    }
}
