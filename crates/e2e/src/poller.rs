//! Bounded polling of observed browser state
//!
//! Cross-tab state (a popup opening, a transaction reaching "Unapproved")
//! has no signalling channel, so every wait in the harness goes through
//! [`PollCondition::wait_until`]: evaluate, sleep, re-evaluate, up to a hard
//! attempt bound.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

use crate::error::{E2eError, E2eResult};

/// Interval between activity-list checks for an unapproved transaction
pub const UNAPPROVED_TX_INTERVAL: Duration = Duration::from_secs(2);

/// Attempts for the activity-list check (15 x 2s = 30s)
pub const UNAPPROVED_TX_MAX_ATTEMPTS: u32 = 15;

/// A single bounded wait: what is awaited, how often, and for how long
#[derive(Debug, Clone)]
pub struct PollCondition {
    pub description: String,
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PollCondition {
    /// `max_attempts` is clamped to at least one evaluation.
    pub fn new(description: impl Into<String>, interval: Duration, max_attempts: u32) -> Self {
        Self {
            description: description.into(),
            interval,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Build a condition whose total sleeping time stays within `timeout`.
    pub fn within(description: impl Into<String>, timeout: Duration, interval: Duration) -> Self {
        let attempts = if interval.is_zero() {
            1
        } else {
            u32::try_from(timeout.as_millis() / interval.as_millis().max(1))
                .unwrap_or(u32::MAX)
                .saturating_add(1)
        };
        Self::new(description, interval, attempts)
    }

    /// Evaluate `condition` until it yields `true`, returning the attempt
    /// number that satisfied it.
    ///
    /// The predicate must only observe. An `Err` from the predicate (a node
    /// detached mid re-render, a tab closing) counts as "not yet" and the
    /// loop keeps going; only exhausting the bound fails, with
    /// [`E2eError::Timeout`].
    pub async fn wait_until<F, Fut>(&self, mut condition: F) -> E2eResult<u32>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = E2eResult<bool>>,
    {
        for attempt in 1..=self.max_attempts {
            debug!(
                "Waiting for {} (attempt {}/{})",
                self.description, attempt, self.max_attempts
            );

            match condition().await {
                Ok(true) => {
                    debug!("{} satisfied on attempt {}", self.description, attempt);
                    return Ok(attempt);
                }
                Ok(false) => {}
                Err(e) => {
                    debug!("Check for {} raised {}; retrying", self.description, e);
                }
            }

            if attempt < self.max_attempts {
                sleep(self.interval).await;
            }
        }

        Err(E2eError::Timeout {
            description: self.description.clone(),
            attempts: self.max_attempts,
        })
    }
}
