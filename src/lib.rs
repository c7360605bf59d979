//! Release Warden - go/no-go validation and release orchestration
//!
//! This library runs validation checks across areas of responsibility, rolls
//! their outcomes up into a single go/no-go verdict, and drives the release
//! workflow (commit, push, wait for CI, tag) through a step engine.

pub mod checks;
pub mod ci;
pub mod config;
pub mod error;
pub mod fakes;
pub mod git;
pub mod report;
pub mod status;
pub mod workflow;

pub use error::{Error, ErrorKind, Result};
pub use status::{aggregate, Status};

pub use checks::{
    CheckOptions, Checker, CommandChecker, FileChecker, FileRequirement, GitStateChecker,
    PmChecker, VersionChecker,
};
pub use ci::{CiCheck, CiState, CiStatus, CiStatusSource, CiWaiter, Clock, GhCiStatus, TokioClock};
pub use config::{CommandLine, ReleaseConfig, Validate, ValidationResult, CONFIG_FILE};
pub use git::{GitCli, VersionControl};
pub use report::{
    build_report, default_areas, levels, order, Aggregator, AreaSpec, Check, Report, ReportMeta,
    Team,
};
pub use workflow::release::{release_workflow, ReleaseEnv};
pub use workflow::{
    Context, FnAction, RunFlags, Runner, Step, StepAction, StepKind, StepOutcome, StepResult,
    Workflow, WorkflowResult,
};
