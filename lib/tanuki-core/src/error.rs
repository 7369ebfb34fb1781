//! Error types for tanuki.

use bytes::Bytes;
use derive_more::{Display, Error, From};

use crate::Response;
use crate::graphql::{GraphQlError, GraphQlErrors};

/// Main error type for tanuki operations.
///
/// Variants that come from a server answer ([`Http`](Self::Http),
/// [`NotFound`](Self::NotFound) and usually [`Decode`](Self::Decode)) keep the
/// response envelope, so status and headers stay inspectable on error paths.
#[derive(Debug, Display, Error, From)]
pub enum Error {
    /// A path identifier is neither an integer nor a non-empty string.
    #[display("invalid ID type {_0}, the ID must be an int or a non-empty string")]
    #[from(skip)]
    InvalidId(#[error(not(source))] String),

    /// A per-call request option could not be applied.
    #[display("invalid request option: {_0}")]
    #[from(skip)]
    InvalidOption(#[error(not(source))] String),

    /// Invalid request configuration.
    #[display("invalid request: {_0}")]
    #[from(skip)]
    InvalidRequest(#[error(not(source))] String),

    /// URL parsing error.
    #[display("invalid URL: {_0}")]
    #[from]
    InvalidUrl(url::ParseError),

    /// Network/connection errors.
    #[display("connection error: {_0}")]
    #[from(skip)]
    Connection(#[error(not(source))] String),

    /// TLS/SSL errors.
    #[display("TLS error: {_0}")]
    #[from(skip)]
    Tls(#[error(not(source))] String),

    /// Request timeout.
    #[display("request timeout")]
    #[from(skip)]
    Timeout,

    /// The retry budget ran out on a transport failure.
    #[display("giving up after {attempts} attempt(s): {source}")]
    #[from(skip)]
    RetriesExhausted {
        /// Number of attempts performed.
        attempts: u32,
        /// The last transport error.
        source: Box<Error>,
    },

    /// The caller's context was cancelled.
    #[display("context cancelled")]
    #[from(skip)]
    Cancelled,

    /// The caller's context deadline passed.
    #[display("context deadline exceeded")]
    #[from(skip)]
    DeadlineExceeded,

    /// Non-2xx answer from the REST API.
    #[display("HTTP error {status}: {message}")]
    #[from(skip)]
    Http {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the response body.
        message: String,
        /// The full response envelope.
        #[error(not(source))]
        response: Box<Response<Bytes>>,
    },

    /// 404 answer from the REST API.
    #[display("404 Not Found")]
    #[from(skip)]
    NotFound {
        /// The full response envelope.
        #[error(not(source))]
        response: Box<Response<Bytes>>,
    },

    /// HTTP 200 with a non-empty GraphQL `errors` array.
    #[display("GraphQL request failed: {_0}")]
    #[from(skip)]
    GraphQl(#[error(not(source))] GraphQlErrors),

    /// The body does not match the declared result shape.
    #[display("decode error at '{path}': {message}")]
    #[from(skip)]
    Decode {
        /// JSON path to the failing field (e.g., "author.username").
        path: String,
        /// Error message.
        message: String,
        /// The response the body came from, when decoding a server answer.
        #[error(not(source))]
        response: Option<Box<Response<Bytes>>>,
    },

    /// JSON serialization error.
    #[display("JSON serialization error: {_0}")]
    #[from]
    JsonSerialization(serde_json::Error),

    /// Query string serialization error.
    #[display("query serialization error: {_0}")]
    #[from]
    QuerySerialization(serde_html_form::ser::Error),

    /// A GraphQL fragment spread names a fragment that is not registered.
    #[display("unknown GraphQL fragment: {_0}")]
    #[from(skip)]
    UnknownFragment(#[error(not(source))] String),

    /// GraphQL fragments reference each other in a cycle.
    #[display("GraphQL fragment cycle through {_0}")]
    #[from(skip)]
    FragmentCycle(#[error(not(source))] String),

    /// A GraphQL variable has an invalid name or type.
    #[display("invalid GraphQL variable: {_0}")]
    #[from(skip)]
    InvalidVariable(#[error(not(source))] String),

    /// A string is not a `gid://namespace/Type/id` global ID.
    #[display("invalid global ID: {_0}")]
    #[from(skip)]
    InvalidGid(#[error(not(source))] String),
}

/// Result type alias using [`crate::Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an invalid ID error.
    #[must_use]
    pub fn invalid_id(description: impl Into<String>) -> Self {
        Self::InvalidId(description.into())
    }

    /// Create an invalid option error.
    #[must_use]
    pub fn invalid_option(message: impl Into<String>) -> Self {
        Self::InvalidOption(message.into())
    }

    /// Create an invalid request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Create a connection error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create a TLS error.
    #[must_use]
    pub fn tls(message: impl Into<String>) -> Self {
        Self::Tls(message.into())
    }

    /// Create a decode error with path context and no response attached.
    #[must_use]
    pub fn decode(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            path: path.into(),
            message: message.into(),
            response: None,
        }
    }

    /// Create a GraphQL application error.
    #[must_use]
    pub fn graphql(errors: Vec<GraphQlError>) -> Self {
        Self::GraphQl(GraphQlErrors::new(errors))
    }

    /// Map a non-2xx response to [`Error::NotFound`] or [`Error::Http`].
    #[must_use]
    pub fn from_response(response: Response<Bytes>) -> Self {
        let status = response.status();
        if status == 404 {
            return Self::NotFound {
                response: Box::new(response),
            };
        }
        let message = error_message(status, response.body());
        Self::Http {
            status,
            message,
            response: Box::new(response),
        }
    }

    /// Attach a response envelope to a [`Error::Decode`] error.
    ///
    /// Other variants are returned unchanged.
    #[must_use]
    pub fn with_response(self, envelope: Response<Bytes>) -> Self {
        match self {
            Self::Decode { path, message, .. } => Self::Decode {
                path,
                message,
                response: Some(Box::new(envelope)),
            },
            other => other,
        }
    }

    /// Returns `true` if this is a timeout error.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// Returns `true` if this is a connection error.
    #[must_use]
    pub const fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Returns `true` for transport failures worth another attempt.
    #[must_use]
    pub const fn is_retryable_transport(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout)
    }

    /// Returns `true` if the caller's context ended the call.
    #[must_use]
    pub const fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }

    /// Returns `true` if this is a 404 Not Found error.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if the body did not match the declared result shape.
    #[must_use]
    pub const fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }

    /// Returns the HTTP status code if the error carries a response.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        self.response().map(Response::status)
    }

    /// Returns the response envelope, if the error came from a server answer.
    #[must_use]
    pub fn response(&self) -> Option<&Response<Bytes>> {
        match self {
            Self::Http { response, .. } | Self::NotFound { response } => Some(&**response),
            Self::Decode { response, .. } => response.as_deref(),
            _ => None,
        }
    }

    /// Returns the structured GraphQL errors, if this is a GraphQL failure.
    #[must_use]
    pub fn graphql_errors(&self) -> Option<&[GraphQlError]> {
        match self {
            Self::GraphQl(errors) => Some(errors.as_slice()),
            _ => None,
        }
    }

    /// Try to decode the response body carried by the error as JSON.
    ///
    /// Returns `None` if the error has no response.
    pub fn decode_body<T: serde::de::DeserializeOwned>(&self) -> Option<Result<T>> {
        self.response().map(|response| crate::from_json(response.body()))
    }
}

/// Extract a readable message from an API error body.
///
/// The API answers errors as `{"message": ...}` where the message can be a
/// string, a list or a map of field errors, or as
/// `{"error": ..., "error_description": ...}`.
fn error_message(status: u16, body: &[u8]) -> String {
    let fallback = || {
        http::StatusCode::from_u16(status)
            .ok()
            .and_then(|code| code.canonical_reason())
            .unwrap_or("unknown status")
            .to_string()
    };

    let Ok(serde_json::Value::Object(fields)) = serde_json::from_slice(body) else {
        return fallback();
    };

    if let Some(message) = fields.get("message") {
        return flatten_message(message);
    }
    match (fields.get("error"), fields.get("error_description")) {
        (Some(error), Some(description)) => {
            format!("{}: {}", flatten_message(error), flatten_message(description))
        }
        (Some(error), None) => flatten_message(error),
        _ => fallback(),
    }
}

fn flatten_message(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(items) => {
            let parts: Vec<_> = items.iter().map(flatten_message).collect();
            format!("[{}]", parts.join(", "))
        }
        serde_json::Value::Object(map) => {
            let mut parts: Vec<_> = map
                .iter()
                .map(|(key, value)| format!("{{{key}: {}}}", flatten_message(value)))
                .collect();
            parts.sort();
            parts.join(", ")
        }
        other => other.to_string(),
    }
}
