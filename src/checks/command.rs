//! Checks backed by an external command's exit status.

use std::io::ErrorKind as IoErrorKind;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::config::CommandLine;
use crate::error::{Error, Result};
use crate::report::Check;
use crate::status::Status;

use super::{summarize_output, CheckOptions, Checker};

/// Runs a command in the project directory and maps its exit status to a check.
#[derive(Debug, Clone)]
pub struct CommandChecker {
    id: String,
    program: String,
    args: Vec<String>,
    soft: bool,
    fail_on_output: bool,
}

impl CommandChecker {
    /// Creates a checker that reports `id` from running `program args...`.
    pub fn new<I, S>(id: impl Into<String>, program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            soft: false,
            fail_on_output: false,
        }
    }

    /// Builds a checker from a configured command.
    pub fn from_command_line(id: impl Into<String>, command: &CommandLine) -> Result<Self> {
        let mut argv = command.argv().into_iter();
        let program = argv
            .next()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| Error::Config("command line is empty".to_string()))?;
        Ok(Self::new(id, program, argv))
    }

    /// Reports failures as `WARN` instead of `NO-GO`.
    pub fn soft(mut self, soft: bool) -> Self {
        self.soft = soft;
        self
    }

    /// Treats any stdout as a failure (for tools like `gofmt -l`).
    pub fn fail_on_output(mut self, fail: bool) -> Self {
        self.fail_on_output = fail;
        self
    }

    /// The check id reported.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether failures are downgraded to warnings.
    pub fn is_soft(&self) -> bool {
        self.soft
    }

    fn failure_status(&self) -> Status {
        if self.soft {
            Status::Warn
        } else {
            Status::NoGo
        }
    }
}

#[async_trait]
impl Checker for CommandChecker {
    async fn check(&self, dir: &Path, options: &CheckOptions) -> Result<Vec<Check>> {
        debug!(check = %self.id, program = %self.program, dir = %dir.display(), "running check command");

        let output = match Command::new(&self.program)
            .args(&self.args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .output()
            .await
        {
            Ok(output) => output,
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                return Ok(vec![Check::new(&self.id, self.failure_status())
                    .with_detail(format!("{} not found in PATH", self.program))]);
            }
            Err(e) => {
                return Err(Error::Checker {
                    checker: self.id.clone(),
                    reason: format!("failed to run {}: {}", self.program, e),
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let has_output = !stdout.trim().is_empty();
        let passed = output.status.success() && !(self.fail_on_output && has_output);

        let mut check = if passed {
            Check::go(&self.id)
        } else {
            Check::new(&self.id, self.failure_status())
        };

        let detail = if passed && !options.verbose {
            None
        } else if !passed && self.fail_on_output && output.status.success() {
            summarize_output(&stdout).map(|line| format!("needs attention: {}", line))
        } else {
            summarize_output(&stderr).or_else(|| summarize_output(&stdout))
        };
        if let Some(detail) = detail {
            check = check.with_detail(detail);
        } else if !passed {
            let code = output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            check = check.with_detail(format!("exited with {}", code));
        }

        Ok(vec![check])
    }

    fn name(&self) -> &str {
        &self.id
    }
}
