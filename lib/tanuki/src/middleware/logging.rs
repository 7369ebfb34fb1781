//! Request/response logging middleware.
//!
//! Each attempt runs inside an `http_request` span carrying the method, URL
//! and attempt number, so retried calls read as one numbered sequence.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::task::{Context, Poll};
use std::time::Instant;

use bytes::Bytes;
use tower::{Layer, Service};
use tracing::{Instrument, Level, debug, info, span, warn};

use crate::transport::ServiceFuture;
use crate::{Error, Request, Response, Result};

/// Layer that adds request/response logging.
///
/// # Example
///
/// ```
/// use tanuki::middleware::{LogLevel, LoggingLayer};
///
/// let layer = LoggingLayer::with_level(LogLevel::Debug);
/// # let _ = layer;
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingLayer {
    level: LogLevel,
}

/// Log level for the logging middleware.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    /// Log at debug level (request headers included).
    Debug,
    /// Log at info level (summary only).
    #[default]
    Info,
}

impl LoggingLayer {
    /// Create a new logging layer with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a logging layer that logs at debug level.
    #[must_use]
    pub const fn debug() -> Self {
        Self::with_level(LogLevel::Debug)
    }

    /// Create a logging layer with an explicit level.
    #[must_use]
    pub const fn with_level(level: LogLevel) -> Self {
        Self { level }
    }
}

impl<S> Layer<S> for LoggingLayer {
    type Service = Logging<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Logging {
            inner,
            level: self.level,
            attempts: Arc::new(AtomicU32::new(0)),
        }
    }
}

/// Service that logs requests and responses.
///
/// Clones share the attempt counter, so a retry middleware above it numbers
/// its attempts 1, 2, 3...
#[derive(Debug, Clone)]
pub struct Logging<S> {
    inner: S,
    level: LogLevel,
    attempts: Arc<AtomicU32>,
}

impl<S> Service<Request<Bytes>> for Logging<S>
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
        let method = request.method();
        let url = request.url().to_string();
        let level = self.level;
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;

        let span = span!(Level::INFO, "http_request", %method, %url, attempt);

        let mut inner = self.inner.clone();
        Box::pin(
            async move {
                let start = Instant::now();

                match level {
                    LogLevel::Debug => {
                        debug!(headers = ?request.headers(), "sending request");
                    }
                    LogLevel::Info => {
                        info!("sending request");
                    }
                }

                let result = inner.call(request).await;

                // Saturating conversion to u64 (truncates after ~584 million years)
                let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

                match &result {
                    Ok(response) if response.is_success() => {
                        info!(status = response.status(), elapsed_ms, "request completed");
                    }
                    Ok(response) => {
                        warn!(status = response.status(), elapsed_ms, "request failed with HTTP error");
                        if level == LogLevel::Debug {
                            debug!(headers = ?response.headers(), "error response headers");
                        }
                    }
                    Err(err) => {
                        warn!(error = %err, elapsed_ms, "request failed");
                    }
                }

                result
            }
            .instrument(span),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tower::ServiceExt;

    use super::*;
    use crate::Method;

    #[derive(Clone)]
    struct Echo;

    impl Service<Request<Bytes>> for Echo {
        type Response = Response<Bytes>;
        type Error = Error;
        type Future = ServiceFuture;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, _request: Request<Bytes>) -> Self::Future {
            Box::pin(async { Ok(Response::new(204, HashMap::new(), Bytes::new())) })
        }
    }

    #[test]
    fn logging_layer_default() {
        let layer = LoggingLayer::new();
        assert_eq!(layer.level, LogLevel::Info);
    }

    #[test]
    fn logging_layer_debug() {
        let layer = LoggingLayer::debug();
        assert_eq!(layer.level, LogLevel::Debug);
    }

    #[tokio::test]
    async fn clones_share_attempt_counter() {
        let service = LoggingLayer::debug().layer(Echo);
        let url = url::Url::parse("https://gitlab.example.com/api/v4/version").expect("valid url");

        for _ in 0..3 {
            let response = service
                .clone()
                .oneshot(Request::builder(Method::Get, url.clone()).build())
                .await
                .expect("response");
            assert_eq!(response.status(), 204);
        }

        assert_eq!(service.attempts.load(Ordering::SeqCst), 3);
    }
}
