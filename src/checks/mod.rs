//! Checker capability and the built-in checkers.
//!
//! A checker inspects a directory and returns one or more [`Check`] values.
//! Finding no problems is reported as a `GO` check, never as an empty list.

mod command;
mod files;
mod git_state;
mod pm;
pub mod presets;
mod version;

pub use command::CommandChecker;
pub use files::{FileChecker, FileRequirement};
pub use git_state::GitStateChecker;
pub use pm::PmChecker;
pub use version::{normalize_version, Version, VersionChecker};

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
use crate::report::Check;

/// Options passed to every checker in a run.
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// Target release version, if known.
    pub version: Option<String>,
    /// Include full tool output in check details.
    pub verbose: bool,
}

/// Something that validates one aspect of a project.
#[async_trait]
pub trait Checker: Send + Sync {
    /// Runs the checks against `dir`.
    ///
    /// An `Err` means the checker itself could not run; callers turn it into
    /// a failing check rather than dropping it.
    async fn check(&self, dir: &Path, options: &CheckOptions) -> Result<Vec<Check>>;

    /// Returns the name of this checker.
    fn name(&self) -> &str;
}

/// Maximum characters of tool output kept in a check detail.
pub const DETAIL_MAX_CHARS: usize = 60;

/// First non-empty line of `output`, truncated for display.
pub(crate) fn summarize_output(output: &str) -> Option<String> {
    let line = output.lines().map(str::trim).find(|l| !l.is_empty())?;
    if line.chars().count() <= DETAIL_MAX_CHARS {
        return Some(line.to_string());
    }
    let mut short: String = line.chars().take(DETAIL_MAX_CHARS - 3).collect();
    short.push_str("...");
    Some(short)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summarize_takes_first_non_empty_line() {
        let out = "\n\n  error[E0425]: cannot find value\n  --> src/lib.rs:3:5\n";
        assert_eq!(
            summarize_output(out).as_deref(),
            Some("error[E0425]: cannot find value")
        );
    }

    #[test]
    fn summarize_truncates_long_lines() {
        let out = "x".repeat(100);
        let short = summarize_output(&out).unwrap();
        assert_eq!(short.chars().count(), DETAIL_MAX_CHARS);
        assert!(short.ends_with("..."));
    }

    #[test]
    fn summarize_is_char_boundary_safe() {
        let out = "\u{00e9}".repeat(80);
        let short = summarize_output(&out).unwrap();
        assert!(short.ends_with("..."));
    }

    #[test]
    fn summarize_empty_output() {
        assert_eq!(summarize_output("  \n \n"), None);
    }
}
