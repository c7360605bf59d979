//! Release configuration loaded from `release-warden.toml`.
//!
//! Built once per run and passed to whatever needs it.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::report::area::is_known_area;

/// File name looked up in the project directory.
pub const CONFIG_FILE: &str = "release-warden.toml";

/// Validation result containing all found issues.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// List of validation errors (fatal).
    pub errors: Vec<String>,
    /// List of validation warnings (non-fatal).
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Adds an error to the result.
    pub fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    /// Adds a warning to the result.
    pub fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    /// Merges another validation result into this one.
    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// Converts to a Result, failing if there are errors.
    pub fn into_result(self) -> Result<Vec<String>> {
        if self.is_valid() {
            Ok(self.warnings)
        } else {
            Err(Error::Config(self.errors.join("; ")))
        }
    }
}

/// Trait for validatable configuration types.
pub trait Validate {
    /// Validates the configuration and returns any issues found.
    fn validate(&self) -> ValidationResult;
}

/// Project metadata for reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project identifier; defaults to the directory name.
    #[serde(default)]
    pub name: Option<String>,
    /// Phase label printed in reports.
    #[serde(default = "default_phase")]
    pub phase: String,
}

fn default_phase() -> String {
    "RELEASE VALIDATION".to_string()
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: None,
            phase: default_phase(),
        }
    }
}

/// Git settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitConfig {
    /// Remote to push commits and tags to.
    #[serde(default = "default_remote")]
    pub remote: String,
    /// Create signed tags.
    #[serde(default)]
    pub sign_tags: bool,
}

fn default_remote() -> String {
    "origin".to_string()
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            remote: default_remote(),
            sign_tags: false,
        }
    }
}

/// CI wait settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CiConfig {
    /// Seconds between CI status polls.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Seconds to wait before giving up.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_timeout_secs() -> u64 {
    600
}

impl CiConfig {
    /// Poll interval as a duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for CiConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// A command from the config file.
///
/// A string is split on whitespace and quotes are not interpreted, so an
/// argument containing spaces needs the array form:
/// `command = ["git-cliff", "-o", "CHANGE LOG.md"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandLine {
    Line(String),
    Argv(Vec<String>),
}

impl CommandLine {
    /// Program followed by its arguments.
    pub fn argv(&self) -> Vec<String> {
        match self {
            CommandLine::Line(line) => line.split_whitespace().map(str::to_string).collect(),
            CommandLine::Argv(argv) => argv.clone(),
        }
    }

    /// True when there is no program to run.
    pub fn is_empty(&self) -> bool {
        self.argv().first().map_or(true, |p| p.trim().is_empty())
    }

    /// A string form containing quote characters, which reach the program literally.
    fn has_quotes(&self) -> bool {
        matches!(self, CommandLine::Line(line) if line.contains('"') || line.contains('\''))
    }
}

impl From<&str> for CommandLine {
    fn from(line: &str) -> Self {
        CommandLine::Line(line.to_string())
    }
}

impl From<Vec<String>> for CommandLine {
    fn from(argv: Vec<String>) -> Self {
        CommandLine::Argv(argv)
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandLine::Line(line) => f.write_str(line.trim()),
            CommandLine::Argv(argv) => f.write_str(&argv.join(" ")),
        }
    }
}

/// A project-specific command check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomCheck {
    /// Area id the check belongs to.
    pub area: String,
    /// Check id.
    pub id: String,
    /// Command to run in the project directory.
    pub command: CommandLine,
    /// Report failure as `WARN`.
    #[serde(default)]
    pub soft: bool,
}

/// Which built-in checks to run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecksConfig {
    /// Run tests.
    #[serde(default = "default_true")]
    pub test: bool,
    /// Run linters.
    #[serde(default = "default_true")]
    pub lint: bool,
    /// Run format checks.
    #[serde(default = "default_true")]
    pub format: bool,
    /// Check ids whose failure is only a warning.
    #[serde(default)]
    pub soft: Vec<String>,
    /// Extra command checks.
    #[serde(default)]
    pub commands: Vec<CustomCheck>,
}

fn default_true() -> bool {
    true
}

impl ChecksConfig {
    /// Whether failures of `id` are downgraded to warnings.
    pub fn is_soft(&self, id: &str) -> bool {
        self.soft.iter().any(|s| s == id)
    }
}

impl Default for ChecksConfig {
    fn default() -> Self {
        Self {
            test: true,
            lint: true,
            format: true,
            soft: Vec::new(),
            commands: Vec::new(),
        }
    }
}

/// Optional commands run by the release workflow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionsConfig {
    /// Regenerates the changelog, e.g. `git-cliff -o CHANGELOG.md`.
    /// `{version}` in any argument is replaced with the release version.
    #[serde(default)]
    pub changelog: Option<CommandLine>,
    /// Regenerates the roadmap.
    #[serde(default)]
    pub roadmap: Option<CommandLine>,
}

/// Complete configuration for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReleaseConfig {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub git: GitConfig,
    #[serde(default)]
    pub ci: CiConfig,
    #[serde(default)]
    pub checks: ChecksConfig,
    #[serde(default)]
    pub actions: ActionsConfig,
}

impl ReleaseConfig {
    /// Loads `release-warden.toml` from `dir`, or defaults if there is none.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        if !path.is_file() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&path)?;
        let config = Self::from_toml(&contents)?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Parses and validates a TOML document.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        for warning in config.validate().into_result()? {
            warn!(%warning, "config warning");
        }
        Ok(config)
    }

    /// Project name, falling back to the directory name.
    pub fn project_name(&self, dir: &Path) -> String {
        if let Some(name) = &self.project.name {
            return name.clone();
        }
        dir.canonicalize()
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_else(|| dir.display().to_string())
    }
}

impl Validate for CiConfig {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.poll_interval_secs == 0 {
            result.add_error("ci.poll_interval_secs must be greater than 0");
        }
        if self.poll_interval_secs > self.timeout_secs {
            result.add_error("ci.poll_interval_secs must not exceed ci.timeout_secs");
        }
        if self.timeout_secs > 3600 {
            result.add_warning("ci.timeout_secs over 1 hour may indicate a misconfiguration");
        }

        result
    }
}

impl Validate for ChecksConfig {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        for custom in &self.commands {
            if !is_known_area(&custom.area) {
                result.add_error(format!(
                    "check '{}' names unknown area '{}'",
                    custom.id, custom.area
                ));
            }
            if custom.id.trim().is_empty() {
                result.add_error("custom check id cannot be empty");
            }
            if custom.command.is_empty() {
                result.add_error(format!("check '{}' has an empty command", custom.id));
            } else if custom.command.has_quotes() {
                result.add_warning(format!(
                    "check '{}' command contains quotes, which are not interpreted; use an array",
                    custom.id
                ));
            }
        }

        if !self.test && !self.lint && !self.format {
            result.add_warning("all built-in quality checks are disabled");
        }

        result
    }
}

impl Validate for ReleaseConfig {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.git.remote.trim().is_empty() {
            result.add_error("git.remote cannot be empty");
        }
        result.merge(self.ci.validate());
        result.merge(self.checks.validate());

        for (name, command) in [
            ("actions.changelog", &self.actions.changelog),
            ("actions.roadmap", &self.actions.roadmap),
        ] {
            match command {
                Some(command) if command.is_empty() => {
                    result.add_error(format!("{} is an empty command", name));
                }
                Some(command) if command.has_quotes() => {
                    result.add_warning(format!(
                        "{} contains quotes, which are not interpreted; use an array",
                        name
                    ));
                }
                _ => {}
            }
        }

        result
    }
}
