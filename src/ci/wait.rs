//! Bounded wait for CI to reach a terminal state.
//!
//! The machine starts `Pending` and polls the source every `poll_interval`.
//! `Success` and `Failure` end the wait; a deadline that passes while still
//! `Pending` ends it with [`Error::CiTimeout`]. Dropping the returned future
//! cancels the wait between polls.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

use super::{CiState, CiStatus, CiStatusSource};

/// Time source used by the wait loop.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> Instant;

    /// Suspends for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by `tokio::time`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Polls a [`CiStatusSource`] until CI finishes or the deadline passes.
pub struct CiWaiter {
    source: Arc<dyn CiStatusSource>,
    clock: Arc<dyn Clock>,
}

impl CiWaiter {
    /// Creates a waiter using the wall clock.
    pub fn new(source: Arc<dyn CiStatusSource>) -> Self {
        Self::with_clock(source, Arc::new(TokioClock))
    }

    /// Creates a waiter with an explicit clock.
    pub fn with_clock(source: Arc<dyn CiStatusSource>, clock: Arc<dyn Clock>) -> Self {
        Self { source, clock }
    }

    /// Waits for `reference` to succeed.
    ///
    /// Returns the final snapshot on success, [`Error::CiFailed`] when any
    /// check fails and [`Error::CiTimeout`] when `timeout` elapses first.
    /// Errors from the source are returned as-is.
    pub async fn wait_for_completion(
        &self,
        reference: &str,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<CiStatus> {
        let start = self.clock.now();
        let mut polls = 0u32;

        loop {
            let status = self.source.get(reference).await?;
            polls += 1;
            let state = status.state();
            debug!(reference, polls, %state, checks = status.total_count, "CI poll");

            match state {
                CiState::Success => {
                    info!(reference, polls, "CI passed");
                    return Ok(status);
                }
                CiState::Failure => {
                    let failing = status.failing();
                    warn!(reference, polls, failing = ?failing, "CI failed");
                    return Err(Error::CiFailed {
                        reference: reference.to_string(),
                        failing,
                    });
                }
                CiState::Pending => {}
            }

            let elapsed = self.clock.now().saturating_duration_since(start);
            if elapsed >= timeout {
                warn!(reference, polls, timeout_secs = timeout.as_secs(), "CI wait timed out");
                return Err(Error::CiTimeout {
                    reference: reference.to_string(),
                    timeout,
                });
            }
            self.clock.sleep(poll_interval.min(timeout - elapsed)).await;
        }
    }
}
