//! [`CiStatusSource`] backed by the GitHub CLI.

use std::io::ErrorKind as IoErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Error, Result};
use crate::git::parse_github_remote;

use super::{CiCheck, CiState, CiStatus, CiStatusSource};

#[derive(Debug, Deserialize)]
struct CombinedStatus {
    #[serde(default)]
    statuses: Vec<CommitStatus>,
}

#[derive(Debug, Deserialize)]
struct CommitStatus {
    context: String,
    state: String,
}

#[derive(Debug, Deserialize)]
struct CheckRuns {
    #[serde(default)]
    check_runs: Vec<CheckRun>,
}

#[derive(Debug, Deserialize)]
struct CheckRun {
    name: String,
    status: String,
    conclusion: Option<String>,
}

impl CheckRun {
    fn state(&self) -> CiState {
        if self.status != "completed" {
            return CiState::Pending;
        }
        self.conclusion
            .as_deref()
            .map(CiState::normalize)
            .unwrap_or(CiState::Pending)
    }
}

/// Reads commit statuses and check runs with `gh api`.
#[derive(Debug, Clone)]
pub struct GhCiStatus {
    owner: String,
    repo: String,
    working_dir: PathBuf,
}

impl GhCiStatus {
    /// Creates a source for `owner/repo`.
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            working_dir: working_dir.into(),
        }
    }

    /// Creates a source from a GitHub SSH or HTTPS remote URL.
    pub fn from_remote_url(url: &str, working_dir: impl Into<PathBuf>) -> Result<Self> {
        let (owner, repo) = parse_github_remote(url)
            .ok_or_else(|| Error::CiQuery(format!("could not parse GitHub URL: {}", url.trim())))?;
        Ok(Self::new(owner, repo, working_dir))
    }

    /// `owner/repo` slug.
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    async fn api(&self, path: &str) -> Result<String> {
        debug!(path, "querying GitHub API");
        let output = match Command::new("gh")
            .arg("api")
            .arg(path)
            .current_dir(&self.working_dir)
            .output()
            .await
        {
            Ok(output) => output,
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                return Err(Error::CiQuery("gh CLI not found in PATH".to_string()));
            }
            Err(e) => return Err(Error::CiQuery(format!("failed to run gh: {}", e))),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::CiQuery(format!("gh api {} failed: {}", path, stderr.trim())));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Merges legacy commit statuses and check runs into one snapshot.
fn merge_snapshot(combined: &str, check_runs: &str) -> Result<CiStatus> {
    let combined: CombinedStatus = serde_json::from_str(combined)?;
    let runs: CheckRuns = serde_json::from_str(check_runs)?;

    let statuses = combined
        .statuses
        .into_iter()
        .map(|s| CiCheck::new(s.context, CiState::normalize(&s.state)))
        .chain(runs.check_runs.iter().map(|r| CiCheck::new(r.name.clone(), r.state())))
        .collect();

    Ok(CiStatus::new(statuses))
}

#[async_trait]
impl CiStatusSource for GhCiStatus {
    async fn get(&self, reference: &str) -> Result<CiStatus> {
        let base = format!("repos/{}/{}/commits/{}", self.owner, self.repo, reference);
        let combined = self.api(&format!("{}/status", base)).await?;
        let runs = self.api(&format!("{}/check-runs", base)).await?;
        merge_snapshot(&combined, &runs)
    }
}
