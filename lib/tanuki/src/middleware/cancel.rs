//! Context-aware cancellation middleware.

use std::task::{Context as TaskContext, Poll};

use bytes::Bytes;
use tower::{Layer, Service};

use crate::transport::ServiceFuture;
use crate::{Context, Error, Request, Response, Result};

/// Layer that races every request against a [`Context`].
#[derive(Debug, Clone)]
pub struct CancelLayer {
    context: Context,
}

impl CancelLayer {
    /// Create a layer bound to `context`.
    #[must_use]
    pub const fn new(context: Context) -> Self {
        Self { context }
    }
}

impl<S> Layer<S> for CancelLayer {
    type Service = Cancel<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Cancel {
            inner,
            context: self.context.clone(),
        }
    }
}

/// Service that fails fast once its [`Context`] ended.
///
/// An ended context fails the call without reaching the inner service; a
/// context ending mid-flight drops the inner future.
#[derive(Debug, Clone)]
pub struct Cancel<S> {
    inner: S,
    context: Context,
}

impl<S> Service<Request<Bytes>> for Cancel<S>
where
    S: Service<Request<Bytes>, Response = Response<Bytes>, Error = Error> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Bytes>;
    type Error = Error;
    type Future = ServiceFuture;

    fn poll_ready(&mut self, cx: &mut TaskContext<'_>) -> Poll<Result<()>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Bytes>) -> Self::Future {
        let context = self.context.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            if let Some(err) = context.err() {
                return Err(err);
            }
            context.run(inner.call(request)).await
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use tower::ServiceExt;

    use super::*;
    use crate::Method;

    #[derive(Clone)]
    struct SlowService {
        delay: Duration,
        calls: Arc<AtomicU32>,
    }

    impl Service<Request<Bytes>> for SlowService {
        type Response = Response<Bytes>;
        type Error = Error;
        type Future = ServiceFuture;

        fn poll_ready(&mut self, _cx: &mut TaskContext<'_>) -> Poll<Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, _request: Request<Bytes>) -> Self::Future {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let delay = self.delay;
            Box::pin(async move {
                tokio::time::sleep(delay).await;
                Ok(Response::new(200, HashMap::new(), Bytes::new()))
            })
        }
    }

    fn request() -> Request<Bytes> {
        let url = url::Url::parse("https://gitlab.example.com/api/v4/version").expect("valid url");
        Request::builder(Method::Get, url).build()
    }

    #[tokio::test]
    async fn cancelled_context_skips_inner_service() {
        let calls = Arc::new(AtomicU32::new(0));
        let inner = SlowService { delay: Duration::ZERO, calls: Arc::clone(&calls) };
        let context = Context::new();
        context.cancel();

        let result = CancelLayer::new(context).layer(inner).oneshot(request()).await;

        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_interrupts_in_flight_request() {
        let calls = Arc::new(AtomicU32::new(0));
        let inner = SlowService { delay: Duration::from_secs(60), calls: Arc::clone(&calls) };
        let context = Context::with_timeout(Duration::from_millis(100));

        let result = CancelLayer::new(context).layer(inner).oneshot(request()).await;

        assert!(matches!(result, Err(Error::DeadlineExceeded)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn live_context_passes_through() {
        let inner = SlowService { delay: Duration::ZERO, calls: Arc::new(AtomicU32::new(0)) };
        let result = CancelLayer::new(Context::new()).layer(inner).oneshot(request()).await;
        assert_eq!(result.expect("response").status(), 200);
    }
}
