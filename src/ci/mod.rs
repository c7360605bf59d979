//! Continuous-integration status model and sources.
//!
//! A [`CiStatus`] is a snapshot taken by one poll. Its overall state is
//! always derived from the individual checks it holds.

mod github;
pub mod wait;

pub use github::GhCiStatus;
pub use wait::{CiWaiter, Clock, TokioClock};

use async_trait::async_trait;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::Result;

/// State of a CI check, or of a whole snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CiState {
    Success,
    Pending,
    Failure,
}

impl CiState {
    /// Maps a raw state or conclusion reported by a CI provider.
    ///
    /// Anything unrecognised is treated as still pending.
    pub fn normalize(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "success" | "skipped" | "neutral" => CiState::Success,
            "failure" | "error" | "timed_out" | "cancelled" | "action_required" => {
                CiState::Failure
            }
            _ => CiState::Pending,
        }
    }

    /// Returns true for `Success` and `Failure`.
    pub fn is_terminal(self) -> bool {
        !matches!(self, CiState::Pending)
    }

    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            CiState::Success => "success",
            CiState::Pending => "pending",
            CiState::Failure => "failure",
        }
    }
}

impl std::fmt::Display for CiState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One named check reported by CI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiCheck {
    pub name: String,
    pub state: CiState,
}

impl CiCheck {
    pub fn new(name: impl Into<String>, state: CiState) -> Self {
        Self {
            name: name.into(),
            state,
        }
    }
}

/// Snapshot of CI for one reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CiStatus {
    /// Number of checks the provider reported.
    pub total_count: usize,
    /// Individual checks in provider order.
    pub statuses: Vec<CiCheck>,
}

impl CiStatus {
    /// Creates a snapshot; `total_count` is the number of checks.
    pub fn new(statuses: Vec<CiCheck>) -> Self {
        Self {
            total_count: statuses.len(),
            statuses,
        }
    }

    /// Overall state: any failure wins, then any pending, else success.
    ///
    /// A snapshot with no checks is pending; CI may not have started yet.
    pub fn state(&self) -> CiState {
        if self.statuses.is_empty() {
            return CiState::Pending;
        }
        if self.statuses.iter().any(|s| s.state == CiState::Failure) {
            CiState::Failure
        } else if self.statuses.iter().any(|s| s.state == CiState::Pending) {
            CiState::Pending
        } else {
            CiState::Success
        }
    }

    /// Names of failing checks.
    pub fn failing(&self) -> Vec<String> {
        self.statuses
            .iter()
            .filter(|s| s.state == CiState::Failure)
            .map(|s| s.name.clone())
            .collect()
    }
}

impl Serialize for CiStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("CiStatus", 3)?;
        state.serialize_field("state", &self.state())?;
        state.serialize_field("total_count", &self.total_count)?;
        state.serialize_field("statuses", &self.statuses)?;
        state.end()
    }
}

/// Source of CI snapshots for a commit or branch.
#[async_trait]
pub trait CiStatusSource: Send + Sync {
    /// Fetches a fresh snapshot for `reference`.
    async fn get(&self, reference: &str) -> Result<CiStatus>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(states: &[CiState]) -> CiStatus {
        CiStatus::new(
            states
                .iter()
                .enumerate()
                .map(|(i, s)| CiCheck::new(format!("job-{}", i), *s))
                .collect(),
        )
    }

    #[test]
    fn failure_beats_pending() {
        let s = status(&[CiState::Success, CiState::Pending, CiState::Failure]);
        assert_eq!(s.state(), CiState::Failure);
        assert_eq!(s.failing(), vec!["job-2"]);
    }

    #[test]
    fn pending_beats_success() {
        assert_eq!(
            status(&[CiState::Success, CiState::Pending]).state(),
            CiState::Pending
        );
        assert_eq!(
            status(&[CiState::Success, CiState::Success]).state(),
            CiState::Success
        );
    }

    #[test]
    fn empty_snapshot_is_pending() {
        assert_eq!(CiStatus::default().state(), CiState::Pending);
    }

    #[test]
    fn normalize_provider_states() {
        assert_eq!(CiState::normalize("SUCCESS"), CiState::Success);
        assert_eq!(CiState::normalize("neutral"), CiState::Success);
        assert_eq!(CiState::normalize("timed_out"), CiState::Failure);
        assert_eq!(CiState::normalize("cancelled"), CiState::Failure);
        assert_eq!(CiState::normalize("in_progress"), CiState::Pending);
        assert_eq!(CiState::normalize("stale"), CiState::Pending);
        assert_eq!(CiState::normalize(""), CiState::Pending);
    }

    #[test]
    fn serialized_state_is_derived() {
        let json = serde_json::to_value(status(&[CiState::Failure])).unwrap();
        assert_eq!(json["state"], "failure");
        assert_eq!(json["total_count"], 1);
    }
}
