// SPDX-FileCopyrightText: 2026 SimpleMem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deadline and retry policy applied to every capability call.

use std::future::Future;
use std::time::Duration;

use simplemem_config::model::CapabilitiesConfig;
use simplemem_core::{CapabilityError, CapabilityKind};
use tracing::warn;

/// Per-attempt deadline plus exponential backoff between attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub timeout: Duration,
    /// Total attempts including the first. Zero is treated as one.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let base = self.initial_backoff.as_millis() as f64 * self.multiplier.powi(retry as i32);
        let capped = base.min(self.max_backoff.as_millis() as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }

    /// Single attempt, no waiting.
    pub fn no_retry(timeout: Duration) -> Self {
        Self {
            timeout,
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            multiplier: 1.0,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&CapabilitiesConfig::default())
    }
}

impl From<&CapabilitiesConfig> for RetryPolicy {
    fn from(config: &CapabilitiesConfig) -> Self {
        Self {
            timeout: Duration::from_millis(config.timeout_ms),
            max_attempts: config.max_attempts,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            multiplier: config.backoff_multiplier,
        }
    }
}

/// Runs capability calls under a [`RetryPolicy`].
///
/// Timeouts and `Unavailable` errors are retried; `InvalidResponse` is returned at once.
#[derive(Debug, Clone, Default)]
pub struct CapabilityInvoker {
    policy: RetryPolicy,
}

impl CapabilityInvoker {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Call `op` until it succeeds, fails permanently, or attempts run out.
    pub async fn invoke<T, F, Fut>(
        &self,
        capability: CapabilityKind,
        mut op: F,
    ) -> Result<T, CapabilityError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CapabilityError>>,
    {
        let attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = match tokio::time::timeout(self.policy.timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(CapabilityError::Timeout {
                    capability,
                    duration: self.policy.timeout,
                }),
            };

            let err = match outcome {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_transient() || attempt >= attempts {
                crate::metrics::record_capability_failure(capability, &err);
                return Err(err);
            }

            let delay = self.policy.backoff(attempt - 1);
            warn!(
                capability = %capability,
                attempt,
                max_attempts = attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "retrying capability call"
            );
            crate::metrics::record_capability_retry(capability);
            tokio::time::sleep(delay).await;
        }
    }
}
