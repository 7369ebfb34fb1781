//! Tower middleware for the per-call service stack.
//!
//! Every call builds its own stack, outermost first:
//!
//! 1. [`RetryLayer`] with the call's resolved retry policy
//! 2. [`CancelLayer`] racing each attempt against the call's [`Context`](crate::Context)
//! 3. [`LoggingLayer`] with one `http_request` span per attempt
//! 4. [`RateLimitLayer`] when the client has a rate limit
//! 5. the [`Transport`](crate::Transport)
//!
//! The layers also work on their own around any service of
//! `Request<Bytes>` to `Response<Bytes>`.

mod cancel;
mod logging;
mod rate_limit;

pub use cancel::{Cancel, CancelLayer};
pub use logging::{LogLevel, Logging, LoggingLayer};
pub use rate_limit::{RateLimit, RateLimitLayer};

// Re-export tower types for convenience
pub use tower::retry::RetryLayer;
pub use tower::{Layer, ServiceBuilder};
