// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::{retry, DEFAULT_ERROR_REQUEUE_SECS};
use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

/// Operator configuration loaded from environment variables
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Only watch this namespace; cluster-wide when unset
    pub watch_namespace: Option<String>,
    /// Delay before a failed reconciliation is retried
    pub error_requeue: Duration,
    /// Number of attempts for a write that keeps hitting conflicts
    pub conflict_retry_steps: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            watch_namespace: None,
            error_requeue: Duration::from_secs(DEFAULT_ERROR_REQUEUE_SECS),
            conflict_retry_steps: retry::STEPS,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Config::default();

        let watch_namespace = lookup("WATCH_NAMESPACE").filter(|ns| !ns.is_empty());

        let error_requeue = match lookup("ERROR_REQUEUE_SECS") {
            Some(v) => Duration::from_secs(
                v.parse()
                    .with_context(|| format!("ERROR_REQUEUE_SECS is not a number: {}", v))?,
            ),
            None => defaults.error_requeue,
        };

        let conflict_retry_steps = match lookup("CONFLICT_RETRY_STEPS") {
            Some(v) => v
                .parse()
                .with_context(|| format!("CONFLICT_RETRY_STEPS is not a number: {}", v))?,
            None => defaults.conflict_retry_steps,
        };

        Ok(Config {
            watch_namespace,
            error_requeue,
            conflict_retry_steps,
        })
    }
}
