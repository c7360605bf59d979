//! Presence checks for project files (README, CHANGELOG, LICENSE, ...).

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
use crate::report::Check;
use crate::status::Status;

use super::{CheckOptions, Checker};

/// A file that should exist, with the status to report when it doesn't.
#[derive(Debug, Clone)]
pub struct FileRequirement {
    /// Check id.
    pub id: String,
    /// Accepted file names; the first one found satisfies the check.
    pub candidates: Vec<String>,
    /// Status reported when none of the candidates exist.
    pub missing: Status,
}

impl FileRequirement {
    /// Creates a requirement.
    pub fn new(id: impl Into<String>, candidates: &[&str], missing: Status) -> Self {
        Self {
            id: id.into(),
            candidates: candidates.iter().map(|c| c.to_string()).collect(),
            missing,
        }
    }
}

/// Checks that required files exist in the project root.
#[derive(Debug, Clone)]
pub struct FileChecker {
    name: String,
    requirements: Vec<FileRequirement>,
}

impl FileChecker {
    /// Creates a checker over the given requirements.
    pub fn new(name: impl Into<String>, requirements: Vec<FileRequirement>) -> Self {
        Self {
            name: name.into(),
            requirements,
        }
    }

    /// README is required, CHANGELOG is strongly recommended.
    pub fn documentation() -> Self {
        Self::new(
            "documentation-files",
            vec![
                FileRequirement::new("readme", &["README.md", "README", "README.rst"], Status::NoGo),
                FileRequirement::new("changelog", &["CHANGELOG.md", "CHANGELOG"], Status::Warn),
            ],
        )
    }

    /// A license file is required for publishing.
    pub fn security() -> Self {
        Self::new(
            "license-file",
            vec![FileRequirement::new(
                "license",
                &["LICENSE", "LICENSE.md", "LICENSE.txt", "LICENSE-MIT", "LICENSE-APACHE"],
                Status::NoGo,
            )],
        )
    }
}

#[async_trait]
impl Checker for FileChecker {
    async fn check(&self, dir: &Path, _options: &CheckOptions) -> Result<Vec<Check>> {
        let mut checks = Vec::with_capacity(self.requirements.len());
        for req in &self.requirements {
            let mut found = None;
            for candidate in &req.candidates {
                if tokio::fs::try_exists(dir.join(candidate)).await? {
                    found = Some(candidate);
                    break;
                }
            }

            checks.push(match found {
                Some(file) => Check::go(&req.id).with_detail(file.clone()),
                None => Check::new(&req.id, req.missing)
                    .with_detail(format!("{} not found", req.candidates[0])),
            });
        }
        Ok(checks)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
