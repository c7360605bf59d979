//! Target version format and ordering checks.

use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::git::VersionControl;
use crate::report::Check;

use super::{CheckOptions, Checker};

/// Adds the `v` prefix when it is missing.
pub fn normalize_version(version: &str) -> String {
    let version = version.trim();
    if version.starts_with('v') {
        version.to_string()
    } else {
        format!("v{}", version)
    }
}

/// A parsed `vMAJOR.MINOR.PATCH[-pre]` version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub pre: Option<String>,
}

impl Version {
    /// Parses a version with or without the `v` prefix.
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = || {
            Error::Config(format!(
                "invalid version '{}': expected MAJOR.MINOR.PATCH with an optional -suffix",
                input
            ))
        };

        let raw = input.trim();
        let raw = raw.strip_prefix('v').unwrap_or(raw);
        let (core, pre) = match raw.split_once('-') {
            Some((core, pre)) if !pre.is_empty() => (core, Some(pre.to_string())),
            Some(_) => return Err(invalid()),
            None => (raw, None),
        };

        let mut parts = core.split('.');
        let mut next = || -> Result<u64> {
            let part = parts.next().ok_or_else(invalid)?;
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            part.parse().map_err(|_| invalid())
        };
        let (major, minor, patch) = (next()?, next()?, next()?);
        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(Self {
            major,
            minor,
            patch,
            pre,
        })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (&self.pre, &other.pre) {
                // A release sorts after its pre-releases.
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a.cmp(b),
            })
    }
}

/// Checks that the target version is well formed and newer than every tag.
pub struct VersionChecker {
    vcs: Arc<dyn VersionControl>,
}

impl VersionChecker {
    pub fn new(vcs: Arc<dyn VersionControl>) -> Self {
        Self { vcs }
    }
}

#[async_trait]
impl Checker for VersionChecker {
    async fn check(&self, _dir: &Path, options: &CheckOptions) -> Result<Vec<Check>> {
        let Some(raw) = options.version.as_deref().filter(|v| !v.trim().is_empty()) else {
            return Ok(vec![Check::skip("version-format", "no target version")]);
        };

        let target = match Version::parse(raw) {
            Ok(v) => v,
            Err(e) => return Ok(vec![Check::no_go("version-format", e.to_string())]),
        };
        let mut checks = vec![Check::go("version-format").with_detail(normalize_version(raw))];

        let latest = self
            .vcs
            .all_tags()?
            .iter()
            .filter_map(|t| Version::parse(t).ok().map(|v| (t.clone(), v)))
            .max_by(|a, b| a.1.cmp(&b.1));

        checks.push(match latest {
            None => Check::go("version-increment").with_detail("first release"),
            Some((tag, latest)) if target > latest => {
                Check::go("version-increment").with_detail(format!("after {}", tag))
            }
            Some((tag, _)) => Check::no_go(
                "version-increment",
                format!("{} is not newer than {}", normalize_version(raw), tag),
            ),
        });

        Ok(checks)
    }

    fn name(&self) -> &str {
        "version"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::FakeVcs;
    use crate::status::Status;

    #[test]
    fn normalize_adds_prefix_once() {
        assert_eq!(normalize_version("1.2.3"), "v1.2.3");
        assert_eq!(normalize_version("v1.2.3"), "v1.2.3");
        assert_eq!(normalize_version(" 0.1.0\n"), "v0.1.0");
    }

    #[test]
    fn parse_accepts_release_and_prerelease() {
        let v = Version::parse("v1.2.3").unwrap();
        assert_eq!((v.major, v.minor, v.patch, v.pre), (1, 2, 3, None));

        let v = Version::parse("2.0.0-rc.1").unwrap();
        assert_eq!(v.pre.as_deref(), Some("rc.1"));
    }

    #[test]
    fn parse_rejects_malformed() {
        for bad in ["", "v1", "1.2", "1.2.3.4", "v1.x.3", "1.2.3-", "v-1.2.3", "1..3"] {
            assert!(Version::parse(bad).is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn prerelease_sorts_before_release() {
        let rc = Version::parse("v1.0.0-rc.1").unwrap();
        let release = Version::parse("v1.0.0").unwrap();
        assert!(rc < release);
        assert!(Version::parse("v0.9.9").unwrap() < rc);
    }

    #[tokio::test]
    async fn newer_version_passes() {
        let checker = VersionChecker::new(Arc::new(FakeVcs::new().with_tags(["v0.9.0", "v1.0.0", "notes"])));
        let options = CheckOptions {
            version: Some("1.1.0".to_string()),
            ..Default::default()
        };

        let checks = checker.check(Path::new("."), &options).await.unwrap();
        assert_eq!(checks[0].status, Status::Go);
        assert_eq!(checks[0].detail.as_deref(), Some("v1.1.0"));
        assert_eq!(checks[1].status, Status::Go);
        assert_eq!(checks[1].detail.as_deref(), Some("after v1.0.0"));
    }

    #[tokio::test]
    async fn older_version_blocks() {
        let checker = VersionChecker::new(Arc::new(FakeVcs::new().with_tags(["v2.0.0"])));
        let options = CheckOptions {
            version: Some("v1.5.0".to_string()),
            ..Default::default()
        };

        let checks = checker.check(Path::new("."), &options).await.unwrap();
        assert_eq!(checks[1].status, Status::NoGo);
        assert_eq!(
            checks[1].detail.as_deref(),
            Some("v1.5.0 is not newer than v2.0.0")
        );
    }

    #[tokio::test]
    async fn malformed_version_is_single_no_go() {
        let checker = VersionChecker::new(Arc::new(FakeVcs::new()));
        let options = CheckOptions {
            version: Some("next".to_string()),
            ..Default::default()
        };

        let checks = checker.check(Path::new("."), &options).await.unwrap();
        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].status, Status::NoGo);
    }

    #[tokio::test]
    async fn missing_version_skips() {
        let checker = VersionChecker::new(Arc::new(FakeVcs::new()));
        let checks = checker
            .check(Path::new("."), &CheckOptions::default())
            .await
            .unwrap();
        assert_eq!(checks[0].status, Status::Skip);
    }
}
