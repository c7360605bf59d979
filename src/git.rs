//! Version-control capability and its `git` CLI implementation.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Error, Result};

/// Version-control operations the release workflow relies on.
pub trait VersionControl: Send + Sync {
    /// Whether the working tree has uncommitted changes.
    fn is_dirty(&self) -> Result<bool>;

    /// Name of the checked-out branch.
    fn current_branch(&self) -> Result<String>;

    /// Full hash of `HEAD`.
    fn current_commit(&self) -> Result<String>;

    /// All tag names, newest version first.
    fn all_tags(&self) -> Result<Vec<String>>;

    /// Creates an annotated tag at `HEAD`.
    fn create_tag(&self, tag: &str, message: &str) -> Result<()>;

    /// Deletes a local tag.
    fn delete_tag(&self, tag: &str) -> Result<()>;

    /// Pushes a single tag to the remote.
    fn push_tag(&self, tag: &str) -> Result<()>;

    /// Pushes the current branch to the remote.
    fn push(&self) -> Result<()>;

    /// Stages everything and commits it.
    fn commit_all(&self, message: &str) -> Result<()>;

    /// Commits on the current branch not yet on its upstream.
    fn ahead_count(&self) -> Result<usize>;

    /// Whether `tag` already exists.
    fn tag_exists(&self, tag: &str) -> Result<bool> {
        Ok(self.all_tags()?.iter().any(|t| t == tag))
    }
}

/// [`VersionControl`] backed by the `git` binary.
#[derive(Debug, Clone)]
pub struct GitCli {
    repo_path: PathBuf,
    remote: String,
    sign_tags: bool,
}

impl GitCli {
    /// Creates a wrapper for the repository at `repo_path` using remote `origin`.
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
            remote: "origin".to_string(),
            sign_tags: false,
        }
    }

    /// Sets the remote name.
    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = remote.into();
        self
    }

    /// Creates signed tags (`git tag -s`).
    pub fn with_signed_tags(mut self, sign: bool) -> Self {
        self.sign_tags = sign;
        self
    }

    /// Repository path.
    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// URL of the configured remote.
    pub fn remote_url(&self) -> Result<String> {
        self.run(&["remote", "get-url", &self.remote])
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .current_dir(&self.repo_path)
            .args(args)
            .output()
            .map_err(|e| Error::Git(format!("failed to run git: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Git(format!(
                "git {} failed: {}",
                args.first().copied().unwrap_or_default(),
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl VersionControl for GitCli {
    fn is_dirty(&self) -> Result<bool> {
        let status = self.run(&["status", "--porcelain"])?;
        Ok(!status.is_empty())
    }

    fn current_branch(&self) -> Result<String> {
        self.run(&["rev-parse", "--abbrev-ref", "HEAD"])
    }

    fn current_commit(&self) -> Result<String> {
        self.run(&["rev-parse", "HEAD"])
    }

    fn all_tags(&self) -> Result<Vec<String>> {
        let output = self.run(&["tag", "--sort=-version:refname"])?;
        Ok(output
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn create_tag(&self, tag: &str, message: &str) -> Result<()> {
        let sign_flag = if self.sign_tags { "-s" } else { "-a" };
        self.run(&["tag", sign_flag, "-m", message, tag])?;
        Ok(())
    }

    fn delete_tag(&self, tag: &str) -> Result<()> {
        self.run(&["tag", "-d", tag])?;
        Ok(())
    }

    fn push_tag(&self, tag: &str) -> Result<()> {
        self.run(&["push", &self.remote, tag])?;
        Ok(())
    }

    fn push(&self) -> Result<()> {
        let branch = self.current_branch()?;
        self.run(&["push", &self.remote, &branch])?;
        Ok(())
    }

    fn commit_all(&self, message: &str) -> Result<()> {
        self.run(&["add", "-A"])?;
        self.run(&["commit", "-m", message])?;
        Ok(())
    }

    fn ahead_count(&self) -> Result<usize> {
        // No upstream means every local commit still needs pushing.
        let range = match self.run(&["rev-parse", "--abbrev-ref", "--symbolic-full-name", "@{u}"]) {
            Ok(upstream) => format!("{}..HEAD", upstream),
            Err(_) => "HEAD".to_string(),
        };
        let count = self.run(&["rev-list", "--count", &range])?;
        count
            .parse()
            .map_err(|e| Error::Git(format!("unexpected rev-list output '{}': {}", count, e)))
    }
}

/// Extracts `(owner, repo)` from a GitHub SSH or HTTPS remote URL.
pub fn parse_github_remote(url: &str) -> Option<(String, String)> {
    let url = url.trim();
    let path = url
        .strip_prefix("git@github.com:")
        .or_else(|| url.strip_prefix("ssh://git@github.com/"))
        .or_else(|| url.strip_prefix("https://github.com/"))
        .or_else(|| url.strip_prefix("http://github.com/"))?;
    let path = path.trim_end_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);

    let (owner, repo) = path.split_once('/')?;
    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        return None;
    }
    Some((owner.to_string(), repo.to_string()))
}
