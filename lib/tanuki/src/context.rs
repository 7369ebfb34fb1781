//! Cancellation and deadlines.
//!
//! A [`Context`] is handed to a call through
//! [`RequestOption::Context`](crate::RequestOption::Context). The in-flight
//! request, the rate-limit wait and every backoff sleep race it, so a
//! cancelled call returns promptly instead of finishing the current wait.

use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

use crate::Error;

/// A cancellation signal with an optional deadline.
///
/// Clones share the same signal: cancelling one cancels them all.
///
/// ```
/// use tanuki::Context;
///
/// let ctx = Context::new();
/// let handle = ctx.clone();
/// handle.cancel();
/// assert!(ctx.err().is_some_and(|err| err.is_cancellation()));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Context {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that ends only when cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A context that ends at `deadline`, or earlier when cancelled.
    #[must_use]
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            inner: Arc::new(Inner {
                deadline: Some(deadline),
                ..Inner::default()
            }),
        }
    }

    /// A context that ends after `timeout`, or earlier when cancelled.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// Cancel the context and wake every waiter.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Returns `true` once [`cancel`](Self::cancel) was called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// The deadline, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Why the context ended, or `None` while it is still live.
    ///
    /// Cancellation takes precedence over an expired deadline.
    #[must_use]
    pub fn err(&self) -> Option<Error> {
        if self.is_cancelled() {
            Some(Error::Cancelled)
        } else if self.inner.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            Some(Error::DeadlineExceeded)
        } else {
            None
        }
    }

    /// Wait until the context ends and return why.
    pub async fn done(&self) -> Error {
        loop {
            let mut notified = pin!(self.inner.notify.notified());
            // Register before checking the flag so a concurrent cancel is not missed
            notified.as_mut().enable();

            if let Some(err) = self.err() {
                return err;
            }

            match self.inner.deadline {
                Some(deadline) => {
                    tokio::select! {
                        () = notified => {}
                        () = tokio::time::sleep_until(deadline) => {}
                    }
                }
                None => notified.await,
            }
        }
    }

    /// Run `future` unless the context ends first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] or [`Error::DeadlineExceeded`] if the
    /// context ends before `future` completes, or the future's own error.
    pub async fn run<T, F>(&self, future: F) -> crate::Result<T>
    where
        F: Future<Output = crate::Result<T>>,
    {
        if let Some(err) = self.err() {
            return Err(err);
        }
        tokio::select! {
            result = future => result,
            err = self.done() => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert2::{check, let_assert};

    use super::*;

    #[test]
    fn fresh_context_is_live() {
        let ctx = Context::new();
        check!(ctx.err().is_none());
        check!(!ctx.is_cancelled());
        check!(ctx.deadline().is_none());
    }

    #[test]
    fn clones_share_cancellation() {
        let ctx = Context::new();
        ctx.clone().cancel();
        let_assert!(Some(Error::Cancelled) = ctx.err());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_expires() {
        let ctx = Context::with_timeout(Duration::from_millis(50));
        check!(ctx.err().is_none());

        tokio::time::advance(Duration::from_millis(60)).await;
        let_assert!(Some(Error::DeadlineExceeded) = ctx.err());
    }

    #[tokio::test(start_paused = true)]
    async fn done_wakes_on_deadline() {
        let ctx = Context::with_timeout(Duration::from_secs(5));
        let err = ctx.done().await;
        check!(matches!(err, Error::DeadlineExceeded));
    }

    #[tokio::test]
    async fn done_wakes_on_cancel() {
        let ctx = Context::new();
        let handle = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            handle.cancel();
        });

        let err = ctx.done().await;
        check!(matches!(err, Error::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn run_aborts_pending_future() {
        let ctx = Context::with_timeout(Duration::from_millis(100));
        let result = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(1)
            })
            .await;
        let_assert!(Err(Error::DeadlineExceeded) = result);
    }

    #[tokio::test]
    async fn run_skips_future_when_already_cancelled() {
        let ctx = Context::new();
        ctx.cancel();
        let result = ctx.run(async { Ok(1) }).await;
        let_assert!(Err(Error::Cancelled) = result);
    }
}
