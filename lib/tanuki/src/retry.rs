//! Retry policy resolution.
//!
//! A call's retry behavior is made of three independent parts:
//!
//! - a [`RetryCheck`] deciding whether an outcome deserves another attempt
//! - a [`Backoff`] computing the wait before that attempt
//! - an attempt budget (`max_attempts` and `max_elapsed` from [`RetryConfig`])
//!
//! [`RetryPolicy`] combines them with the call's [`Context`] into a tower
//! [`Policy`]. Per-call overrides ([`RequestOption::Retry`](crate::RequestOption::Retry),
//! [`RequestOption::Backoff`](crate::RequestOption::Backoff),
//! [`RequestOption::MaxAttempts`](crate::RequestOption::MaxAttempts)) replace
//! the client default for that call only. Two `Retry` options on one call do
//! not merge: the last one wins. Use [`RetryCheck::or`] to combine checks.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use tokio::time::Instant;
use tower::retry::Policy;
use tracing::{debug, warn};

use crate::{Context, Error, Request, Response, Result, RetryConfig};

/// What a retry check or backoff knows about the attempt that just finished.
#[derive(Debug, Clone, Copy)]
pub struct Attempt<'a> {
    number: u32,
    elapsed: Duration,
    context: &'a Context,
    wait_min: Duration,
    wait_max: Duration,
}

impl<'a> Attempt<'a> {
    /// Number of the finished attempt, starting at 1.
    #[must_use]
    pub const fn number(&self) -> u32 {
        self.number
    }

    /// Time since the first attempt started.
    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// The call's context.
    #[must_use]
    pub const fn context(&self) -> &'a Context {
        self.context
    }

    /// Configured minimum wait between attempts.
    #[must_use]
    pub const fn wait_min(&self) -> Duration {
        self.wait_min
    }

    /// Configured maximum wait between attempts.
    #[must_use]
    pub const fn wait_max(&self) -> Duration {
        self.wait_max
    }
}

type CheckFn = dyn Fn(&Attempt<'_>, &Result<Response<Bytes>>) -> Result<bool> + Send + Sync;

/// Decides whether an attempt's outcome should be retried.
///
/// Returning `Ok(false)` stops with the outcome unchanged. Returning an error
/// stops and replaces the outcome with that error.
///
/// ```
/// use tanuki::RetryCheck;
///
/// // Also retry 409 Conflict, on top of the standard conditions
/// let check = RetryCheck::standard().or(RetryCheck::new(|_, outcome| {
///     Ok(matches!(outcome, Ok(response) if response.status() == 409))
/// }));
/// # let _ = check;
/// ```
#[derive(Clone)]
pub struct RetryCheck(Arc<CheckFn>);

impl RetryCheck {
    /// Wrap a decision function.
    pub fn new<F>(check: F) -> Self
    where
        F: Fn(&Attempt<'_>, &Result<Response<Bytes>>) -> Result<bool> + Send + Sync + 'static,
    {
        Self(Arc::new(check))
    }

    /// Retry on 429, any 5xx, and connection or timeout failures.
    ///
    /// An ended context stops with the context's error.
    #[must_use]
    pub fn standard() -> Self {
        Self::new(|attempt, outcome| {
            if let Some(err) = attempt.context().err() {
                return Err(err);
            }
            Ok(match outcome {
                Ok(response) => response.status() == 429 || response.status() >= 500,
                Err(err) => err.is_retryable_transport(),
            })
        })
    }

    /// Never retry.
    #[must_use]
    pub fn never() -> Self {
        Self::new(|_, _| Ok(false))
    }

    /// Retry every outcome, bounded only by the attempt budget.
    #[must_use]
    pub fn always() -> Self {
        Self::new(|_, _| Ok(true))
    }

    /// Retry when either check says so. An error from `self` wins.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        Self::new(move |attempt, outcome| {
            Ok(self.check(attempt, outcome)? || other.check(attempt, outcome)?)
        })
    }

    /// Run the check.
    ///
    /// # Errors
    ///
    /// Returns the error the check produced.
    pub fn check(&self, attempt: &Attempt<'_>, outcome: &Result<Response<Bytes>>) -> Result<bool> {
        (self.0)(attempt, outcome)
    }
}

impl fmt::Debug for RetryCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RetryCheck").finish_non_exhaustive()
    }
}

type BackoffFn = dyn Fn(&Attempt<'_>, &Result<Response<Bytes>>) -> Duration + Send + Sync;

/// Computes the wait before the next attempt.
#[derive(Clone)]
pub struct Backoff(Arc<BackoffFn>);

impl Backoff {
    /// Wrap a delay function.
    pub fn new<F>(backoff: F) -> Self
    where
        F: Fn(&Attempt<'_>, &Result<Response<Bytes>>) -> Duration + Send + Sync + 'static,
    {
        Self(Arc::new(backoff))
    }

    /// Capped exponential backoff with jitter.
    ///
    /// A 429 answer carrying `RateLimit-Reset` or `Retry-After` waits as long
    /// as the server asks instead.
    #[must_use]
    pub fn standard() -> Self {
        Self::new(|attempt, outcome| {
            if let Ok(response) = outcome
                && response.status() == 429
                && let Some(delay) = rate_limit_delay(response)
            {
                return delay;
            }
            jitter(exponential(attempt.number(), attempt.wait_min(), attempt.wait_max()))
        })
    }

    /// The same wait before every attempt.
    #[must_use]
    pub fn constant(delay: Duration) -> Self {
        Self::new(move |_, _| delay)
    }

    /// Compute the delay.
    #[must_use]
    pub fn delay(&self, attempt: &Attempt<'_>, outcome: &Result<Response<Bytes>>) -> Duration {
        (self.0)(attempt, outcome)
    }
}

impl fmt::Debug for Backoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Backoff").finish_non_exhaustive()
    }
}

/// `min * 2^(number - 1)`, capped at `max`.
fn exponential(number: u32, min: Duration, max: Duration) -> Duration {
    let factor = 1_u32.checked_shl(number.saturating_sub(1)).unwrap_or(u32::MAX);
    min.saturating_mul(factor).min(max)
}

/// Somewhere between half and all of `delay`.
fn jitter(delay: Duration) -> Duration {
    delay.mul_f64(fastrand::f64().mul_add(0.5, 0.5))
}

/// Wait requested by a rate-limited answer.
fn rate_limit_delay(response: &Response<Bytes>) -> Option<Duration> {
    if let Some(reset) = response
        .header("ratelimit-reset")
        .and_then(|value| value.trim().parse::<u64>().ok())
    {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).ok()?.as_secs();
        return Some(Duration::from_secs(reset.saturating_sub(now)));
    }
    response
        .header("retry-after")
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// The resolved retry policy of one call.
///
/// Holds its own attempt counter and start time, so it must be created per
/// call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    check: RetryCheck,
    backoff: Backoff,
    context: Context,
    max_attempts: u32,
    wait_min: Duration,
    wait_max: Duration,
    max_elapsed: Duration,
    attempt: u32,
    started: Instant,
}

impl RetryPolicy {
    /// Policy from a client configuration.
    ///
    /// Uses [`RetryCheck::standard`] when retries are enabled and
    /// [`RetryCheck::never`] otherwise, with [`Backoff::standard`].
    #[must_use]
    pub fn new(config: &RetryConfig) -> Self {
        let check = if config.enabled {
            RetryCheck::standard()
        } else {
            RetryCheck::never()
        };
        Self {
            check,
            backoff: Backoff::standard(),
            context: Context::new(),
            max_attempts: config.max_attempts.max(1),
            wait_min: config.wait_min,
            wait_max: config.wait_max,
            max_elapsed: config.max_elapsed,
            attempt: 1,
            started: Instant::now(),
        }
    }

    /// Replace the retry check.
    #[must_use]
    pub fn check(mut self, check: RetryCheck) -> Self {
        self.check = check;
        self
    }

    /// Replace the backoff.
    #[must_use]
    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Bind the policy to a context.
    #[must_use]
    pub fn context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    /// Replace the attempt budget (at least 1).
    #[must_use]
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Number of the current attempt, starting at 1.
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    fn give_up(&self, result: &mut Result<Response<Bytes>>) {
        warn!(attempts = self.attempt, "giving up on retries");
        if let Err(err) = result {
            let source = std::mem::replace(err, Error::Timeout);
            *err = Error::RetriesExhausted {
                attempts: self.attempt,
                source: Box::new(source),
            };
        }
    }
}

impl Policy<Request<Bytes>, Response<Bytes>, Error> for RetryPolicy {
    type Future = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

    fn retry(
        &mut self,
        _req: &mut Request<Bytes>,
        result: &mut Result<Response<Bytes>>,
    ) -> Option<Self::Future> {
        if let Some(err) = self.context.err() {
            *result = Err(err);
            return None;
        }

        let attempt = Attempt {
            number: self.attempt,
            elapsed: self.started.elapsed(),
            context: &self.context,
            wait_min: self.wait_min,
            wait_max: self.wait_max,
        };

        match self.check.check(&attempt, result) {
            Ok(true) => {}
            Ok(false) => return None,
            Err(err) => {
                *result = Err(err);
                return None;
            }
        }

        if self.attempt >= self.max_attempts {
            self.give_up(result);
            return None;
        }

        let delay = self.backoff.delay(&attempt, result);
        if attempt.elapsed.saturating_add(delay) > self.max_elapsed {
            self.give_up(result);
            return None;
        }

        let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        match result {
            Ok(response) => debug!(attempt = self.attempt, delay_ms, status = response.status(), "retrying request"),
            Err(err) => debug!(attempt = self.attempt, delay_ms, error = %err, "retrying request"),
        }
        self.attempt += 1;

        let context = self.context.clone();
        Some(Box::pin(async move {
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                _ = context.done() => {}
            }
        }))
    }

    fn clone_request(&mut self, req: &Request<Bytes>) -> Option<Request<Bytes>> {
        Some(req.clone())
    }
}
