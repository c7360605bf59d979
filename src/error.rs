//! Error types for release orchestration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error type for release operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration is invalid or inconsistent.
    #[error("configuration error: {0}")]
    Config(String),

    /// Dependency cycle detected between report teams.
    #[error("dependency cycle detected: {0}")]
    DependencyCycle(String),

    /// Two teams in one report share an id.
    #[error("duplicate team id: {0}")]
    DuplicateTeam(String),

    /// Git operation failed.
    #[error("git operation failed: {0}")]
    Git(String),

    /// A checker could not run at all.
    #[error("checker '{checker}' failed: {reason}")]
    Checker { checker: String, reason: String },

    /// Querying the CI status source failed.
    #[error("CI status query failed: {0}")]
    CiQuery(String),

    /// CI reported a failure for the reference.
    #[error("CI failed for {reference}: {}", failing.join(", "))]
    CiFailed {
        reference: String,
        failing: Vec<String>,
    },

    /// CI was still pending when the deadline passed.
    #[error("timed out after {}s waiting for CI on {reference}", timeout.as_secs())]
    CiTimeout { reference: String, timeout: Duration },

    /// A workflow step action reported a failure.
    #[error("{0}")]
    Step(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Config file could not be parsed.
    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Coarse classification of an [`Error`], kept on step results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A step action failed.
    Step,
    /// Internal consistency or configuration problem.
    Configuration,
    /// An external tool or service failed.
    External,
    /// A wait ran past its deadline.
    Timeout,
    /// CI finished with a failing state.
    CiFailure,
}

impl Error {
    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) | Error::DependencyCycle(_) | Error::DuplicateTeam(_) | Error::Toml(_) => {
                ErrorKind::Configuration
            }
            Error::Git(_)
            | Error::Checker { .. }
            | Error::CiQuery(_)
            | Error::Io(_)
            | Error::Json(_) => ErrorKind::External,
            Error::CiFailed { .. } => ErrorKind::CiFailure,
            Error::CiTimeout { .. } => ErrorKind::Timeout,
            Error::Step(_) => ErrorKind::Step,
        }
    }

    /// Returns true if this error is a timeout.
    pub fn is_timeout(&self) -> bool {
        self.kind() == ErrorKind::Timeout
    }
}

/// Result type alias for release operations.
pub type Result<T> = std::result::Result<T, Error>;
