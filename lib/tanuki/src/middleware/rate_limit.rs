//! Client-side rate limiting using governor.
//!
//! The limiter is a token bucket shared by every call of one client.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use governor::{Quota, RateLimiter, clock::DefaultClock, state::InMemoryState};
use tower::{Layer, Service};

use crate::transport::ServiceFuture;
use crate::{Error, Request, Response, Result};

/// Type alias for the governor rate limiter.
type GovernorLimiter = RateLimiter<governor::state::NotKeyed, InMemoryState, DefaultClock>;

/// Layer that applies rate limiting to requests.
///
/// Clones share the same bucket.
///
/// # Example
///
/// ```
/// use std::num::NonZeroU32;
/// use tanuki::middleware::RateLimitLayer;
///
/// let per_second = RateLimitLayer::per_second(NonZeroU32::MIN.saturating_add(9));
/// let per_minute = RateLimitLayer::per_minute(NonZeroU32::MIN.saturating_add(99));
/// # let _ = (per_second, per_minute);
/// ```
#[derive(Debug, Clone)]
pub struct RateLimitLayer {
    limiter: Arc<GovernorLimiter>,
}

impl RateLimitLayer {
    /// Allow `count` requests per second.
    #[must_use]
    pub fn per_second(count: NonZeroU32) -> Self {
        Self::with_quota(Quota::per_second(count))
    }

    /// Allow `count` requests per minute.
    #[must_use]
    pub fn per_minute(count: NonZeroU32) -> Self {
        Self::with_quota(Quota::per_minute(count))
    }

    /// Create a rate limiter with a custom quota.
    #[must_use]
    pub fn with_quota(quota: Quota) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimit<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimit {
            inner,
            limiter: Arc::clone(&self.limiter),
        }
    }
}

/// Service that waits for a token before each request.
#[derive(Debug, Clone)]
pub struct RateLimit<S> {
    inner: S,
    limiter: Arc<GovernorLimiter>,
}

impl<S> Service<Request<Bytes>> for RateLimit<S>
where
    S: Service<Request<Bytes>, Response = Response<Bytes>, Error = Error> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Bytes>;
    type Error = Error;
    type Future = ServiceFuture;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Bytes>) -> Self::Future {
        let limiter = Arc::clone(&self.limiter);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            limiter.until_ready().await;
            inner.call(request).await
        })
    }
}
