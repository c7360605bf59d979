//! Maps a project directory and config to the checkers run for each area.

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::config::ReleaseConfig;
use crate::error::Result;
use crate::git::VersionControl;
use crate::report::area::{self, default_areas, AreaSpec};

use super::{Checker, CommandChecker, FileChecker, GitStateChecker, PmChecker, VersionChecker};

/// Build ecosystems with built-in checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ecosystem {
    /// `Cargo.toml` at the project root.
    Rust,
    /// `go.mod` at the project root.
    Go,
}

impl Ecosystem {
    fn marker(self) -> &'static str {
        match self {
            Ecosystem::Rust => "Cargo.toml",
            Ecosystem::Go => "go.mod",
        }
    }
}

/// Ecosystems whose marker file exists in `dir`.
pub fn detect(dir: &Path) -> Vec<Ecosystem> {
    [Ecosystem::Rust, Ecosystem::Go]
        .into_iter()
        .filter(|e| dir.join(e.marker()).is_file())
        .collect()
}

#[derive(Debug, Clone, Copy)]
enum Category {
    Build,
    Test,
    Lint,
    Format,
}

fn ecosystem_commands(ecosystem: Ecosystem) -> Vec<(Category, CommandChecker)> {
    match ecosystem {
        Ecosystem::Rust => vec![
            (
                Category::Build,
                CommandChecker::new("cargo-build", "cargo", ["build", "--all-targets"]),
            ),
            (Category::Test, CommandChecker::new("cargo-test", "cargo", ["test"])),
            (
                Category::Lint,
                CommandChecker::new(
                    "cargo-clippy",
                    "cargo",
                    ["clippy", "--all-targets", "--", "-D", "warnings"],
                ),
            ),
            (
                Category::Format,
                CommandChecker::new("cargo-fmt", "cargo", ["fmt", "--all", "--", "--check"]),
            ),
        ],
        Ecosystem::Go => vec![
            (Category::Build, CommandChecker::new("go-build", "go", ["build", "./..."])),
            (Category::Test, CommandChecker::new("go-test", "go", ["test", "./..."])),
            (Category::Lint, CommandChecker::new("go-vet", "go", ["vet", "./..."])),
            (
                Category::Format,
                CommandChecker::new("gofmt", "gofmt", ["-l", "."]).fail_on_output(true),
            ),
        ],
    }
}

/// One area together with the checkers that populate it.
#[derive(Clone)]
pub struct AreaPlan {
    pub area: AreaSpec,
    pub checkers: Vec<Arc<dyn Checker>>,
}

impl AreaPlan {
    fn new(area: AreaSpec) -> Self {
        Self {
            area,
            checkers: Vec::new(),
        }
    }
}

/// Builds the checker plan for the default areas.
///
/// Quality checks come from the detected ecosystems filtered by the
/// `[checks]` toggles; custom commands are appended to their area.
pub fn plan(
    dir: &Path,
    config: &ReleaseConfig,
    vcs: Arc<dyn VersionControl>,
) -> Result<Vec<AreaPlan>> {
    let mut plans: Vec<AreaPlan> = default_areas().into_iter().map(AreaPlan::new).collect();

    for ecosystem in detect(dir) {
        debug!(?ecosystem, dir = %dir.display(), "detected ecosystem");
        for (category, checker) in ecosystem_commands(ecosystem) {
            let enabled = match category {
                Category::Build => true,
                Category::Test => config.checks.test,
                Category::Lint => config.checks.lint,
                Category::Format => config.checks.format,
            };
            if !enabled {
                continue;
            }
            let soft = config.checks.is_soft(checker.id());
            push(&mut plans, area::QA, Arc::new(checker.soft(soft)));
        }
    }

    push(&mut plans, area::PM, Arc::new(VersionChecker::new(vcs.clone())));
    push(&mut plans, area::PM, Arc::new(PmChecker::new()));
    push(&mut plans, area::DOCS, Arc::new(FileChecker::documentation()));
    push(&mut plans, area::SECURITY, Arc::new(FileChecker::security()));
    push(&mut plans, area::RELEASE, Arc::new(GitStateChecker::new(vcs)));

    for custom in &config.checks.commands {
        let soft = custom.soft || config.checks.is_soft(&custom.id);
        let checker = CommandChecker::from_command_line(&custom.id, &custom.command)?.soft(soft);
        push(&mut plans, &custom.area, Arc::new(checker));
    }

    Ok(plans)
}

fn push(plans: &mut [AreaPlan], area_id: &str, checker: Arc<dyn Checker>) {
    if let Some(plan) = plans.iter_mut().find(|p| p.area.id == area_id) {
        plan.checkers.push(checker);
    }
}
