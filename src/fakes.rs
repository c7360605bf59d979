//! In-memory collaborators for tests.
//!
//! Provides `FakeVcs`, `FakeCi`, `FakeChecker` and `ManualClock`, which
//! satisfy the capability traits without touching git, GitHub or the clock.

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::checks::{CheckOptions, Checker};
use crate::ci::{CiStatus, CiStatusSource, Clock};
use crate::error::{Error, Result};
use crate::git::VersionControl;
use crate::report::Check;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// FakeVcs
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct VcsState {
    tags: Vec<String>,
    pushed_tags: Vec<String>,
    commits: Vec<String>,
    calls: Vec<String>,
    fail_on: HashSet<String>,
    dirty: bool,
    ahead: usize,
    branch: String,
    head: String,
}

/// Repository held in memory. Operations named with [`FakeVcs::fail_on`]
/// return [`Error::Git`].
#[derive(Debug)]
pub struct FakeVcs {
    state: Mutex<VcsState>,
}

impl Default for FakeVcs {
    fn default() -> Self {
        Self {
            state: Mutex::new(VcsState {
                tags: Vec::new(),
                pushed_tags: Vec::new(),
                commits: Vec::new(),
                calls: Vec::new(),
                fail_on: HashSet::new(),
                dirty: false,
                ahead: 0,
                branch: "main".to_string(),
                head: "0000000000000000000000000000000000000000".to_string(),
            }),
        }
    }
}

impl FakeVcs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tags<I, S>(self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        lock(&self.state).tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn dirty(self, dirty: bool) -> Self {
        lock(&self.state).dirty = dirty;
        self
    }

    pub fn ahead(self, commits: usize) -> Self {
        lock(&self.state).ahead = commits;
        self
    }

    pub fn with_head(self, hash: impl Into<String>) -> Self {
        lock(&self.state).head = hash.into();
        self
    }

    /// Makes `operation` (e.g. `push_tag`) fail.
    pub fn fail_on(self, operation: &str) -> Self {
        lock(&self.state).fail_on.insert(operation.to_string());
        self
    }

    /// Local tags.
    pub fn tags(&self) -> Vec<String> {
        lock(&self.state).tags.clone()
    }

    /// Tags pushed to the remote.
    pub fn pushed_tags(&self) -> Vec<String> {
        lock(&self.state).pushed_tags.clone()
    }

    /// Commit messages created.
    pub fn commits(&self) -> Vec<String> {
        lock(&self.state).commits.clone()
    }

    /// Mutating calls in order, e.g. `create_tag v1.0.0`.
    pub fn calls(&self) -> Vec<String> {
        lock(&self.state).calls.clone()
    }

    fn guard(&self, operation: &str, call: String) -> Result<MutexGuard<'_, VcsState>> {
        let mut state = lock(&self.state);
        state.calls.push(call);
        if state.fail_on.contains(operation) {
            return Err(Error::Git(format!("{} failed", operation)));
        }
        Ok(state)
    }
}

impl VersionControl for FakeVcs {
    fn is_dirty(&self) -> Result<bool> {
        Ok(self.guard("is_dirty", "is_dirty".to_string())?.dirty)
    }

    fn current_branch(&self) -> Result<String> {
        Ok(self.guard("current_branch", "current_branch".to_string())?.branch.clone())
    }

    fn current_commit(&self) -> Result<String> {
        Ok(self.guard("current_commit", "current_commit".to_string())?.head.clone())
    }

    fn all_tags(&self) -> Result<Vec<String>> {
        Ok(self.guard("all_tags", "all_tags".to_string())?.tags.clone())
    }

    fn create_tag(&self, tag: &str, _message: &str) -> Result<()> {
        let mut state = self.guard("create_tag", format!("create_tag {}", tag))?;
        if state.tags.iter().any(|t| t == tag) {
            return Err(Error::Git(format!("tag '{}' already exists", tag)));
        }
        state.tags.push(tag.to_string());
        Ok(())
    }

    fn delete_tag(&self, tag: &str) -> Result<()> {
        let mut state = self.guard("delete_tag", format!("delete_tag {}", tag))?;
        state.tags.retain(|t| t != tag);
        Ok(())
    }

    fn push_tag(&self, tag: &str) -> Result<()> {
        let mut state = self.guard("push_tag", format!("push_tag {}", tag))?;
        if !state.tags.iter().any(|t| t == tag) {
            return Err(Error::Git(format!("tag '{}' does not exist", tag)));
        }
        state.pushed_tags.push(tag.to_string());
        Ok(())
    }

    fn push(&self) -> Result<()> {
        let mut state = self.guard("push", "push".to_string())?;
        state.ahead = 0;
        Ok(())
    }

    fn commit_all(&self, message: &str) -> Result<()> {
        let mut state = self.guard("commit_all", format!("commit_all {}", message))?;
        state.commits.push(message.to_string());
        state.dirty = false;
        state.ahead += 1;
        Ok(())
    }

    fn ahead_count(&self) -> Result<usize> {
        Ok(self.guard("ahead_count", "ahead_count".to_string())?.ahead)
    }
}

// ---------------------------------------------------------------------------
// FakeCi
// ---------------------------------------------------------------------------

/// Returns scripted snapshots in order, repeating the last one.
#[derive(Debug, Default)]
pub struct FakeCi {
    script: Vec<CiStatus>,
    failure: Option<String>,
    polls: AtomicUsize,
    references: Mutex<Vec<String>>,
}

impl FakeCi {
    pub fn new(script: impl IntoIterator<Item = CiStatus>) -> Self {
        Self {
            script: script.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Every query fails with [`Error::CiQuery`].
    pub fn failing(mut self, reason: impl Into<String>) -> Self {
        self.failure = Some(reason.into());
        self
    }

    /// Number of queries made.
    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    /// References queried, in order.
    pub fn references(&self) -> Vec<String> {
        lock(&self.references).clone()
    }
}

#[async_trait]
impl CiStatusSource for FakeCi {
    async fn get(&self, reference: &str) -> Result<CiStatus> {
        let poll = self.polls.fetch_add(1, Ordering::SeqCst);
        lock(&self.references).push(reference.to_string());
        if let Some(reason) = &self.failure {
            return Err(Error::CiQuery(reason.clone()));
        }
        let index = poll.min(self.script.len().saturating_sub(1));
        Ok(self.script.get(index).cloned().unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// FakeChecker
// ---------------------------------------------------------------------------

/// Returns fixed checks, or fails, and records how it was called.
#[derive(Debug, Default)]
pub struct FakeChecker {
    name: String,
    checks: Vec<Check>,
    failure: Option<String>,
    calls: AtomicUsize,
    last_version: Mutex<Option<String>>,
}

impl FakeChecker {
    /// A checker that returns no checks until told otherwise.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn returning(mut self, checks: impl IntoIterator<Item = Check>) -> Self {
        self.checks = checks.into_iter().collect();
        self
    }

    /// Fails with [`Error::Checker`] carrying `reason`.
    pub fn failing(mut self, reason: impl Into<String>) -> Self {
        self.failure = Some(reason.into());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Version passed on the most recent call.
    pub fn last_version(&self) -> Option<String> {
        lock(&self.last_version).clone()
    }
}

#[async_trait]
impl Checker for FakeChecker {
    async fn check(&self, _dir: &Path, options: &CheckOptions) -> Result<Vec<Check>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.last_version) = options.version.clone();
        match &self.failure {
            Some(reason) => Err(Error::Checker {
                checker: self.name.clone(),
                reason: reason.clone(),
            }),
            None => Ok(self.checks.clone()),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ---------------------------------------------------------------------------
// ManualClock
// ---------------------------------------------------------------------------

/// Clock that only moves when slept on.
#[derive(Debug)]
pub struct ManualClock {
    start: Instant,
    offset: Mutex<Duration>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self {
            start: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total time slept so far.
    pub fn elapsed(&self) -> Duration {
        *lock(&self.offset)
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.start + *lock(&self.offset)
    }

    async fn sleep(&self, duration: Duration) {
        *lock(&self.offset) += duration;
    }
}
