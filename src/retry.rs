// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Bounded retry of read-modify-write cycles that hit optimistic-concurrency conflicts.

use crate::constants::retry::{FACTOR, INTERVAL_MILLIS, STEPS};
use crate::error::Result;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first
    pub steps: u32,
    /// Pause before the second attempt
    pub interval: Duration,
    /// Multiplier applied to the pause after each attempt; values below 1.0
    /// (and NaN) are treated as 1.0
    pub factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            steps: STEPS,
            interval: Duration::from_millis(INTERVAL_MILLIS),
            factor: FACTOR,
        }
    }
}

impl RetryPolicy {
    pub fn with_steps(steps: u32) -> Self {
        Self {
            steps,
            ..Self::default()
        }
    }
}

/// Run `op` until it succeeds, fails with something other than a conflict, or
/// the policy runs out of attempts. `op` receives the zero-based attempt number;
/// attempts after the first must re-read the object they modify.
///
/// When every attempt conflicts, the last conflict error is returned.
pub async fn retry_on_conflict<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let steps = policy.steps.max(1);
    let factor = policy.factor.max(1.0);
    let mut interval = policy.interval;
    let mut attempt = 0;

    loop {
        match op(attempt).await {
            Err(e) if e.is_conflict() && attempt + 1 < steps => {
                debug!(
                    "Conflict on attempt {}/{}: {}, retrying in {:?}",
                    attempt + 1,
                    steps,
                    e,
                    interval
                );
                sleep(interval).await;
                interval = interval.mul_f64(factor);
                attempt += 1;
            }
            result => return result,
        }
    }
}
