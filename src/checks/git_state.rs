//! Release-readiness checks against version-control state.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::git::VersionControl;
use crate::report::Check;

use super::{CheckOptions, Checker};

/// Checks the working tree and tag state before a release.
pub struct GitStateChecker {
    vcs: Arc<dyn VersionControl>,
}

impl GitStateChecker {
    /// Creates a checker over the given repository.
    pub fn new(vcs: Arc<dyn VersionControl>) -> Self {
        Self { vcs }
    }
}

#[async_trait]
impl Checker for GitStateChecker {
    async fn check(&self, _dir: &Path, options: &CheckOptions) -> Result<Vec<Check>> {
        let mut checks = Vec::with_capacity(2);

        checks.push(if self.vcs.is_dirty()? {
            Check::warn("git-clean", "uncommitted changes")
        } else {
            Check::go("git-clean").with_detail("working tree clean")
        });

        checks.push(match options.version.as_deref().filter(|v| !v.is_empty()) {
            None => Check::skip("version-available", "no target version"),
            Some(version) => {
                if self.vcs.tag_exists(version)? {
                    Check::no_go("version-available", format!("tag {} already exists", version))
                } else {
                    Check::go("version-available").with_detail(format!("{} unused", version))
                }
            }
        });

        Ok(checks)
    }

    fn name(&self) -> &str {
        "git-state"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::FakeVcs;
    use crate::status::Status;

    #[tokio::test]
    async fn clean_tree_and_new_version() {
        let vcs = Arc::new(FakeVcs::new().with_tags(["v1.0.0"]));
        let checker = GitStateChecker::new(vcs);
        let options = CheckOptions {
            version: Some("v1.1.0".to_string()),
            ..Default::default()
        };

        let checks = checker.check(Path::new("."), &options).await.unwrap();
        assert_eq!(checks[0].status, Status::Go);
        assert_eq!(checks[1].status, Status::Go);
    }

    #[tokio::test]
    async fn existing_tag_blocks() {
        let vcs = Arc::new(FakeVcs::new().with_tags(["v1.0.0"]).dirty(true));
        let checker = GitStateChecker::new(vcs);
        let options = CheckOptions {
            version: Some("v1.0.0".to_string()),
            ..Default::default()
        };

        let checks = checker.check(Path::new("."), &options).await.unwrap();
        assert_eq!(checks[0].status, Status::Warn);
        assert_eq!(checks[1].status, Status::NoGo);
        assert_eq!(checks[1].detail.as_deref(), Some("tag v1.0.0 already exists"));
    }

    #[tokio::test]
    async fn no_version_skips_tag_check() {
        let checker = GitStateChecker::new(Arc::new(FakeVcs::new()));

        let checks = checker
            .check(Path::new("."), &CheckOptions::default())
            .await
            .unwrap();
        assert_eq!(checks[1].status, Status::Skip);
    }
}
