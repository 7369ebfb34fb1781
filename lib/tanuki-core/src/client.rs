//! Transport seam.
//!
//! [`HttpClient`] performs exactly one HTTP exchange. Retries, pagination
//! and decoding are layered on top of it, so tests and custom transports
//! only ever implement this one method.

use std::future::Future;

use bytes::Bytes;

use crate::{Request, Response, Result};

/// Core HTTP client trait.
///
/// Implementations return any answered request as `Ok`, whatever its status;
/// only transport failures are errors:
/// - [`Error::Connection`](crate::Error::Connection) for network errors
/// - [`Error::Tls`](crate::Error::Tls) for handshake failures
/// - [`Error::Timeout`](crate::Error::Timeout) when the request timed out
pub trait HttpClient: Send + Sync {
    /// Execute an HTTP request and return the response.
    ///
    /// # Errors
    ///
    /// Returns an error if no response was received.
    fn execute(
        &self,
        request: Request<Bytes>,
    ) -> impl Future<Output = Result<Response<Bytes>>> + Send;
}
