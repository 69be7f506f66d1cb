//! Bounded-retry execution strategy.
//!
//! UI state is racy: a selector that misses now may match a few hundred
//! milliseconds later. This module converts "check now, fail" into "check
//! repeatedly within a budget". The polled action is a probe: it may return
//! nothing or fail, and neither ends the loop before the deadline.

use std::future::Future;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::result::{EnsayoError, EnsayoResult};

/// Default retry budget for bounded waits (60 seconds)
pub const DEFAULT_RETRY_TIMEOUT_MS: u64 = 60_000;

/// Default polling interval between probe attempts (500ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Configuration for a bounded-retry loop.
///
/// Constructed implicitly per call from process-wide defaults; overridable
/// with the builder methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total retry budget in milliseconds
    pub timeout_ms: u64,
    /// Interval between probe attempts in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_RETRY_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the process-wide defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the retry budget in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set the polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Retry budget as a `Duration`
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Polling interval as a `Duration`
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Repeatedly attempt `action` until it yields a value or the budget elapses.
///
/// Semantics (do-while): the action is attempted at least once before the
/// first deadline check, so a budget smaller than the poll interval still
/// gets exactly one attempt. A failed (`Err`) attempt is a probe failure and
/// is swallowed; an `Ok(None)` attempt means "not yet". On the first
/// `Ok(Some(value))` the value is returned immediately. When the budget is
/// exhausted `on_timeout` runs (typically raising a descriptive
/// [`EnsayoError::WaitTimeout`]); its failure propagates, otherwise the
/// call resolves to `Ok(None)`.
///
/// Probe attempts are strictly sequential; there are never concurrent probes.
///
/// # Errors
///
/// Only the error produced by `on_timeout` is ever returned.
pub async fn retry_with_timeout<T, F, Fut, O>(
    mut action: F,
    on_timeout: O,
    policy: RetryPolicy,
) -> EnsayoResult<Option<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = EnsayoResult<Option<T>>>,
    O: FnOnce() -> EnsayoResult<()>,
{
    let start = Instant::now();
    loop {
        if let Some(value) = try_once(action()).await {
            return Ok(Some(value));
        }
        tracing::debug!(ms = policy.poll_interval_ms, "sleeping between probes");
        tokio::time::sleep(policy.poll_interval()).await;
        if start.elapsed() >= policy.timeout() {
            break;
        }
    }
    on_timeout()?;
    Ok(None)
}

/// A single bounded attempt: probe failures never propagate.
///
/// Returns the probe's value, or `None` when the attempt failed.
pub async fn try_once<T, Fut>(attempt: Fut) -> Option<T>
where
    Fut: Future<Output = EnsayoResult<Option<T>>>,
{
    match attempt.await {
        Ok(value) => value,
        Err(err) => {
            tracing::debug!(error = %err, "probe attempt failed");
            None
        }
    }
}

/// Like [`try_once`], but a supplied handler maps the failure to a value.
pub async fn try_once_or<T, Fut, H>(attempt: Fut, on_error: H) -> Option<T>
where
    Fut: Future<Output = EnsayoResult<Option<T>>>,
    H: FnOnce(EnsayoError) -> T,
{
    match attempt.await {
        Ok(value) => value,
        Err(err) => Some(on_error(err)),
    }
}

/// Poll a boolean probe until it turns true, raising a descriptive
/// [`EnsayoError::WaitTimeout`] (naming `condition`) on deadline.
///
/// # Errors
///
/// Returns `WaitTimeout` when the probe never turns true within the budget.
pub async fn wait_until<F, Fut>(
    mut probe: F,
    condition: impl Into<String>,
    policy: RetryPolicy,
) -> EnsayoResult<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let condition = condition.into();
    let _ = retry_with_timeout(
        || {
            let fut = probe();
            async move { Ok(fut.await.then_some(())) }
        },
        move || {
            Err(EnsayoError::WaitTimeout {
                condition,
                ms: policy.timeout_ms,
            })
        },
        policy,
    )
    .await?;
    Ok(())
}
