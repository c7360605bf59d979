//! Sequential step execution with required/optional semantics.
//!
//! A [`Workflow`] is a static tree of [`Step`]s. The [`Runner`] walks it in
//! declaration order against one [`Context`] and produces a mirrored tree of
//! [`StepResult`]s. A failing required step stops its siblings; a failing
//! optional step is logged and execution continues.

pub mod release;

use std::collections::HashMap;
use std::fmt::Write as _;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ErrorKind, Result};

/// What a step action did when it returned without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The action ran.
    Done,
    /// The action decided there was nothing to do.
    Skipped(String),
}

/// Work performed by a leaf step.
#[async_trait]
pub trait StepAction: Send + Sync {
    /// Runs the action. An `Err` marks the step failed.
    async fn run(&self, ctx: &mut Context) -> Result<StepOutcome>;
}

/// [`StepAction`] wrapping a synchronous closure.
pub struct FnAction<F>(F);

impl<F> FnAction<F>
where
    F: Fn(&mut Context) -> Result<StepOutcome> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> StepAction for FnAction<F>
where
    F: Fn(&mut Context) -> Result<StepOutcome> + Send + Sync,
{
    async fn run(&self, ctx: &mut Context) -> Result<StepOutcome> {
        (self.0)(ctx)
    }
}

/// Body of a step.
#[derive(Clone)]
pub enum StepKind {
    /// A leaf; `None` means no action is bound and the step is skipped.
    Action(Option<Arc<dyn StepAction>>),
    /// Children run in order.
    Composite(Vec<Step>),
}

/// A named unit of work. Steps hold no per-run state.
#[derive(Clone)]
pub struct Step {
    pub name: String,
    pub description: String,
    pub required: bool,
    pub kind: StepKind,
}

impl Step {
    /// A required leaf step running `action`.
    pub fn action(name: impl Into<String>, action: impl StepAction + 'static) -> Self {
        Self::leaf(name, Some(Arc::new(action)))
    }

    /// A required leaf step with an optional action.
    pub fn leaf(name: impl Into<String>, action: Option<Arc<dyn StepAction>>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            required: true,
            kind: StepKind::Action(action),
        }
    }

    /// A required composite step.
    pub fn composite(name: impl Into<String>, children: Vec<Step>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            required: true,
            kind: StepKind::Composite(children),
        }
    }

    /// Sets the description shown in verbose output.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Marks the step optional.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

impl std::fmt::Debug for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("Step");
        s.field("name", &self.name).field("required", &self.required);
        match &self.kind {
            StepKind::Action(action) => s.field("bound", &action.is_some()),
            StepKind::Composite(children) => s.field("children", children),
        };
        s.finish()
    }
}

/// An ordered list of steps.
#[derive(Debug, Clone)]
pub struct Workflow {
    pub name: String,
    pub description: String,
    pub steps: Vec<Step>,
}

impl Workflow {
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            steps,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Behavioural flags for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFlags {
    /// Report what would change without changing anything.
    pub dry_run: bool,
    pub verbose: bool,
    pub interactive: bool,
    /// Skip the validation checks step.
    pub skip_checks: bool,
    /// Skip waiting for CI.
    pub skip_ci: bool,
}

/// Per-run state threaded through every step.
#[derive(Debug)]
pub struct Context {
    /// Project directory.
    pub dir: PathBuf,
    /// Target version; steps may normalise it.
    pub version: String,
    flags: RunFlags,
    data: HashMap<String, serde_json::Value>,
    output: Vec<String>,
}

impl Context {
    pub fn new(dir: impl Into<PathBuf>, version: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            version: version.into(),
            flags: RunFlags::default(),
            data: HashMap::new(),
            output: Vec::new(),
        }
    }

    /// Flags set by the runner for this run.
    pub fn flags(&self) -> RunFlags {
        self.flags
    }

    pub fn dry_run(&self) -> bool {
        self.flags.dry_run
    }

    pub fn verbose(&self) -> bool {
        self.flags.verbose
    }

    /// Stores a value for later steps.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.data.insert(key.into(), value.into());
    }

    /// Reads a value stored by an earlier step.
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// Appends a line to the run transcript.
    pub fn log(&mut self, line: impl Into<String>) {
        self.output.push(line.into());
    }

    /// Transcript so far.
    pub fn output(&self) -> &[String] {
        &self.output
    }
}

/// Outcome of one step, mirroring the step tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub name: String,
    pub required: bool,
    pub success: bool,
    pub skipped: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    pub duration: Duration,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_results: Vec<StepResult>,
}

impl StepResult {
    fn new(step: &Step) -> Self {
        Self {
            name: step.name.clone(),
            required: step.required,
            success: false,
            skipped: false,
            skip_reason: None,
            error: None,
            error_kind: None,
            duration: Duration::ZERO,
            sub_results: Vec::new(),
        }
    }

    /// Ran and did not succeed. Skipped steps never count as failed.
    pub fn failed(&self) -> bool {
        !self.success && !self.skipped
    }

    fn icon(&self) -> &'static str {
        if self.skipped {
            "\u{2298}"
        } else if self.success {
            "\u{2713}"
        } else {
            "\u{2717}"
        }
    }
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub run_id: Uuid,
    pub name: String,
    pub success: bool,
    pub steps: Vec<StepResult>,
    pub duration: Duration,
    pub output: Vec<String>,
}

impl WorkflowResult {
    /// The required top-level step that stopped the run, if any.
    pub fn failed_step(&self) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.required && s.failed())
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Short multi-line summary for terminals.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Workflow: {}", self.name);
        let _ = writeln!(
            out,
            "Status: {}",
            if self.success { "\u{2705} Success" } else { "\u{274C} Failed" }
        );
        let _ = writeln!(out, "Duration: {}ms", self.duration.as_millis());
        let _ = writeln!(out);
        let _ = writeln!(out, "Steps:");
        for step in &self.steps {
            write_step(&mut out, step, 1);
        }
        out
    }
}

fn write_step(out: &mut String, step: &StepResult, depth: usize) {
    let indent = "  ".repeat(depth);
    let _ = write!(out, "{}{} {} ({}ms)", indent, step.icon(), step.name, step.duration.as_millis());
    if let Some(error) = &step.error {
        let _ = write!(out, ": {}", error);
    } else if let Some(reason) = &step.skip_reason {
        let _ = write!(out, " [{}]", reason);
    }
    let _ = writeln!(out);
    for sub in &step.sub_results {
        write_step(out, sub, depth + 1);
    }
}

type StepFuture<'a> = Pin<Box<dyn Future<Output = StepResult> + Send + 'a>>;

/// Executes workflows one step at a time.
#[derive(Debug, Clone, Copy, Default)]
pub struct Runner {
    flags: RunFlags,
}

impl Runner {
    pub fn new(flags: RunFlags) -> Self {
        Self { flags }
    }

    /// Runs `workflow` against `ctx`.
    ///
    /// Flags are copied onto the context before the first step.
    pub async fn run(&self, workflow: &Workflow, ctx: &mut Context) -> WorkflowResult {
        let start = Instant::now();
        let run_id = Uuid::new_v4();
        ctx.flags = self.flags;

        info!(%run_id, workflow = %workflow.name, steps = workflow.steps.len(), dry_run = self.flags.dry_run, "workflow started");
        ctx.log(format!("=== {} ===", workflow.name));
        if !workflow.description.is_empty() {
            ctx.log(workflow.description.clone());
        }

        let (steps, success) = self.run_children(&workflow.steps, ctx, 0).await;

        if success {
            ctx.log(format!("\u{2705} {} completed successfully", workflow.name));
            info!(%run_id, workflow = %workflow.name, "workflow succeeded");
        } else if let Some(failed) = steps.iter().find(|s| s.required && s.failed()) {
            ctx.log(format!("\u{274C} Workflow failed at step: {}", failed.name));
            warn!(%run_id, workflow = %workflow.name, step = %failed.name, "workflow failed");
        }

        WorkflowResult {
            run_id,
            name: workflow.name.clone(),
            success,
            steps,
            duration: start.elapsed(),
            output: ctx.output.clone(),
        }
    }

    /// Runs siblings in order, stopping after the first failed required one.
    /// Returns the results and whether no required sibling failed.
    async fn run_children(
        &self,
        steps: &[Step],
        ctx: &mut Context,
        depth: usize,
    ) -> (Vec<StepResult>, bool) {
        let mut results = Vec::with_capacity(steps.len());
        for step in steps {
            let result = self.run_step(step, ctx, depth).await;
            let failed = result.failed();
            results.push(result);

            if failed {
                if step.required {
                    return (results, false);
                }
                warn!(step = %step.name, "optional step failed, continuing");
                ctx.log(format!("\u{26A0} Step {} failed but is not required, continuing", step.name));
            }
        }
        (results, true)
    }

    fn run_step<'a>(&'a self, step: &'a Step, ctx: &'a mut Context, depth: usize) -> StepFuture<'a> {
        Box::pin(async move {
            let start = Instant::now();
            let mut result = StepResult::new(step);
            let indent = "  ".repeat(depth);

            info!(step = %step.name, required = step.required, "step started");
            ctx.log(format!("{}\u{2192} {}", indent, step.name));
            if ctx.verbose() && !step.description.is_empty() {
                ctx.log(format!("{}  {}", indent, step.description));
            }

            match &step.kind {
                StepKind::Action(None) => {
                    result.skipped = true;
                    result.skip_reason = Some("no action bound".to_string());
                    ctx.log(format!("{}  [skipped]", indent));
                }
                StepKind::Action(Some(action)) => match action.run(ctx).await {
                    Ok(StepOutcome::Done) => {
                        result.success = true;
                        ctx.log(format!("{}  [done]", indent));
                    }
                    Ok(StepOutcome::Skipped(reason)) => {
                        result.skipped = true;
                        ctx.log(format!("{}  [skipped: {}]", indent, reason));
                        result.skip_reason = Some(reason);
                    }
                    Err(e) => {
                        ctx.log(format!("{}  [failed: {}]", indent, e));
                        result.error_kind = Some(e.kind());
                        result.error = Some(e.to_string());
                    }
                },
                StepKind::Composite(children) => {
                    let (sub_results, success) = self.run_children(children, ctx, depth + 1).await;
                    result.success = success;
                    if !success {
                        result.error = sub_results
                            .iter()
                            .find(|s| s.required && s.failed())
                            .map(|s| format!("step '{}' failed", s.name));
                        result.error_kind = Some(ErrorKind::Step);
                    }
                    result.sub_results = sub_results;
                }
            }

            result.duration = start.elapsed();
            info!(
                step = %step.name,
                success = result.success,
                skipped = result.skipped,
                duration_ms = result.duration.as_millis() as u64,
                "step finished"
            );
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts invocations and fails when told to.
    struct CountingAction {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl StepAction for CountingAction {
        async fn run(&self, ctx: &mut Context) -> Result<StepOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            ctx.log("action ran");
            if self.fail {
                Err(Error::Step("action failed".to_string()))
            } else {
                Ok(StepOutcome::Done)
            }
        }
    }

    fn counted(name: &str, fail: bool) -> (Step, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let step = Step::action(
            name,
            CountingAction {
                calls: calls.clone(),
                fail,
            },
        );
        (step, calls)
    }

    async fn run(steps: Vec<Step>) -> WorkflowResult {
        let mut ctx = Context::new(".", "v1.0.0");
        Runner::default().run(&Workflow::new("test", steps), &mut ctx).await
    }

    #[tokio::test]
    async fn first_required_failure_halts_run() {
        let (first, first_calls) = counted("first", true);
        let (second, second_calls) = counted("second", false);

        let result = run(vec![first, second]).await;

        assert!(!result.success);
        assert_eq!(result.steps.len(), 1);
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
        assert_eq!(result.failed_step().unwrap().name, "first");
        assert_eq!(result.steps[0].error.as_deref(), Some("action failed"));
        assert_eq!(result.steps[0].error_kind, Some(ErrorKind::Step));
    }

    #[tokio::test]
    async fn optional_failure_continues() {
        let (a, _) = counted("a", false);
        let (b, _) = counted("b", true);
        let (c, c_calls) = counted("c", false);

        let result = run(vec![a, b.optional(), c]).await;

        assert!(result.success);
        assert_eq!(result.steps.len(), 3);
        assert!(result.steps[1].failed());
        assert_eq!(c_calls.load(Ordering::SeqCst), 1);
        assert!(result.failed_step().is_none());
        assert!(result.output.iter().any(|l| l.contains("not required, continuing")));
    }

    #[tokio::test]
    async fn unbound_step_is_skipped_not_failed() {
        let (after, after_calls) = counted("after", false);
        let result = run(vec![Step::leaf("nothing", None), after]).await;

        assert!(result.success);
        assert!(result.steps[0].skipped);
        assert!(!result.steps[0].success);
        assert!(!result.steps[0].failed());
        assert_eq!(result.steps[0].skip_reason.as_deref(), Some("no action bound"));
        assert_eq!(after_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn action_can_skip_itself() {
        let step = Step::action(
            "maybe",
            FnAction::new(|_: &mut Context| Ok(StepOutcome::Skipped("nothing to do".to_string()))),
        );
        let result = run(vec![step]).await;

        assert!(result.success);
        assert!(result.steps[0].skipped);
        assert_eq!(result.steps[0].skip_reason.as_deref(), Some("nothing to do"));
    }

    #[tokio::test]
    async fn required_composite_with_failing_required_child_halts() {
        let (a, _) = counted("a", false);
        let (b, _) = counted("b", true);
        let (c, c_calls) = counted("c", false);
        let (after, after_calls) = counted("after", false);

        let result = run(vec![Step::composite("group", vec![a, b, c]), after]).await;

        assert!(!result.success);
        assert_eq!(result.steps.len(), 1);
        assert_eq!(result.steps[0].sub_results.len(), 2);
        assert_eq!(result.steps[0].error.as_deref(), Some("step 'b' failed"));
        assert_eq!(c_calls.load(Ordering::SeqCst), 0);
        assert_eq!(after_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn optional_composite_with_failing_required_child_continues() {
        let (a, _) = counted("a", true);
        let (b, b_calls) = counted("b", false);
        let (after, after_calls) = counted("after", false);

        let result = run(vec![Step::composite("group", vec![a, b]).optional(), after]).await;

        assert!(result.success);
        assert!(result.steps[0].failed());
        assert_eq!(b_calls.load(Ordering::SeqCst), 0);
        assert_eq!(after_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn required_composite_with_failing_optional_child_succeeds() {
        let (a, _) = counted("a", true);
        let (b, b_calls) = counted("b", false);

        let result = run(vec![Step::composite("group", vec![a.optional(), b])]).await;

        assert!(result.success);
        assert!(result.steps[0].success);
        assert!(result.steps[0].sub_results[0].failed());
        assert_eq!(b_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn optional_composite_with_failing_optional_child_succeeds() {
        let (a, _) = counted("a", true);
        let result = run(vec![Step::composite("group", vec![a.optional()]).optional()]).await;

        assert!(result.success);
        assert!(result.steps[0].success);
    }

    #[tokio::test]
    async fn runner_flags_reach_context() {
        let flags = RunFlags {
            dry_run: true,
            skip_ci: true,
            ..Default::default()
        };
        let seen = Arc::new(std::sync::Mutex::new(None));
        let seen_in_step = seen.clone();
        let step = Step::action(
            "look",
            FnAction::new(move |ctx: &mut Context| {
                *seen_in_step.lock().unwrap() = Some(ctx.flags());
                Ok(StepOutcome::Done)
            }),
        );

        let mut ctx = Context::new(".", "v1.0.0");
        Runner::new(flags).run(&Workflow::new("flags", vec![step]), &mut ctx).await;

        assert_eq!(*seen.lock().unwrap(), Some(flags));
    }

    #[tokio::test]
    async fn context_data_passes_between_steps() {
        let write = Step::action(
            "write",
            FnAction::new(|ctx: &mut Context| {
                ctx.set("commit", "abc123");
                Ok(StepOutcome::Done)
            }),
        );
        let read = Step::action(
            "read",
            FnAction::new(|ctx: &mut Context| match ctx.get("commit").and_then(|v| v.as_str()) {
                Some("abc123") => Ok(StepOutcome::Done),
                other => Err(Error::Step(format!("unexpected {:?}", other))),
            }),
        );

        let result = run(vec![write, read]).await;
        assert!(result.success);
    }

    #[tokio::test]
    async fn every_step_is_timed_and_logged() {
        let (a, _) = counted("a", false);
        let (b, _) = counted("b", true);
        let result = run(vec![a, b.optional()]).await;

        assert_eq!(result.steps.len(), 2);
        assert!(result.output[0].starts_with("=== test ==="));
        assert!(result.output.iter().any(|l| l.contains("[failed: action failed]")));
        assert!(result.duration >= result.steps[0].duration);
    }

    #[tokio::test]
    async fn summary_and_json() {
        let (a, _) = counted("a", false);
        let result = run(vec![a, Step::leaf("b", None).optional()]).await;

        let summary = result.summary();
        assert!(summary.contains("Workflow: test"));
        assert!(summary.contains("\u{2713} a"));
        assert!(summary.contains("\u{2298} b"));

        let json: serde_json::Value = serde_json::from_str(&result.to_json().unwrap()).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["steps"][1]["skipped"], true);
        assert!(json["steps"][0].get("error").is_none());
    }
}
