//! Retry with exponential back-off and jitter for distance-matrix calls.
//!
//! [`RetryingProvider`] wraps any provider and retries transient failures
//! (timeouts, connection errors, 429 and 5xx). Credential and decoding
//! failures are returned immediately.

use super::provider::{remaining, DistanceMatrixProvider};
use super::types::{DistanceMatrixResult, ProviderError};
use crate::location::Coordinate;
use std::time::{Duration, Instant};
use tracing::warn;

const MAX_DELAY_MS: u64 = 30_000;

/// How many times, and how patiently, to retry a provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first one.
    pub max_retries: u32,
    pub backoff_base_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_base_ms: 500,
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff_base_ms: 0,
        }
    }

    /// Delay before retry number `attempt` (1-based): base × 2^(attempt-1), ±25 % jitter, capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let computed = self
            .backoff_base_ms
            .saturating_mul(1u64 << attempt.saturating_sub(1).min(10));
        let capped = computed.min(MAX_DELAY_MS);
        let jitter = rand::random::<f64>() * 0.5 + 0.75;
        Duration::from_millis((capped as f64 * jitter) as u64)
    }
}

/// A provider that retries transient failures of `inner`.
#[derive(Debug)]
pub struct RetryingProvider<P> {
    inner: P,
    policy: RetryPolicy,
}

impl<P> RetryingProvider<P> {
    pub fn new(inner: P, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn into_inner(self) -> P {
        self.inner
    }
}

impl<P: DistanceMatrixProvider> DistanceMatrixProvider for RetryingProvider<P> {
    fn compute_matrix(
        &self,
        origin: Coordinate,
        destinations: &[Coordinate],
    ) -> Result<DistanceMatrixResult, ProviderError> {
        self.compute_matrix_until(origin, destinations, None)
    }

    /// No retry is attempted once its back-off would end past `deadline`.
    fn compute_matrix_until(
        &self,
        origin: Coordinate,
        destinations: &[Coordinate],
        deadline: Option<Instant>,
    ) -> Result<DistanceMatrixResult, ProviderError> {
        let mut attempt = 0u32;
        loop {
            match self.inner.compute_matrix_until(origin, destinations, deadline) {
                Ok(result) => return Ok(result),
                Err(err) => {
                    if !err.is_retriable() || attempt >= self.policy.max_retries {
                        return Err(err);
                    }
                    attempt += 1;
                    let delay = self.policy.delay_for(attempt);
                    if remaining(deadline).is_some_and(|left| left <= delay) {
                        warn!(
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "request deadline reached, not retrying distance provider"
                        );
                        return Err(ProviderError::Timeout);
                    }
                    warn!(
                        attempt,
                        max_retries = self.policy.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "distance provider transient error, retrying after back-off"
                    );
                    std::thread::sleep(delay);
                }
            }
        }
    }
}
