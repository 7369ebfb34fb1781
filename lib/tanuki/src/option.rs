//! Per-call request decorators.
//!
//! [`RequestOption`]s are applied in order: client defaults first, then the
//! plan's own options. Headers and "set" query parameters are last-wins,
//! [`Query`](RequestOption::Query) appends. [`Retry`](RequestOption::Retry),
//! [`Backoff`](RequestOption::Backoff), [`Context`](RequestOption::Context)
//! and [`MaxAttempts`](RequestOption::MaxAttempts) are last-wins as well: a
//! second `Retry` replaces the first one instead of merging with it.

use std::collections::BTreeMap;

use http::{HeaderName, HeaderValue};

use crate::pagination::PageCursor;
use crate::{Backoff, Context, Error, Result, RetryCheck};

/// A decorator applied to one call.
#[derive(Debug, Clone)]
pub enum RequestOption {
    /// Set a header, replacing any earlier value.
    Header {
        /// Header name.
        name: String,
        /// Header value.
        value: String,
    },
    /// Append a query parameter.
    Query {
        /// Parameter name.
        name: String,
        /// Parameter value.
        value: String,
    },
    /// Set the `page` query parameter.
    Page(u64),
    /// Set every given query parameter, typically the ones of a `rel="next"` link.
    Keyset(Vec<(String, String)>),
    /// Race the call against a context.
    Context(Context),
    /// Replace the retry check for this call.
    Retry(RetryCheck),
    /// Replace the backoff for this call.
    Backoff(Backoff),
    /// Replace the attempt budget for this call.
    MaxAttempts(u32),
}

impl RequestOption {
    /// Set a header.
    #[must_use]
    pub fn header(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Header {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Append a query parameter.
    #[must_use]
    pub fn query(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Query {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Set the page number.
    #[must_use]
    pub const fn page(page: u64) -> Self {
        Self::Page(page)
    }

    /// Set keyset parameters.
    #[must_use]
    pub fn keyset(params: impl IntoIterator<Item = (String, String)>) -> Self {
        Self::Keyset(params.into_iter().collect())
    }

    /// Bind the call to a context.
    #[must_use]
    pub fn context(context: Context) -> Self {
        Self::Context(context)
    }

    /// Replace the retry check.
    #[must_use]
    pub fn retry(check: RetryCheck) -> Self {
        Self::Retry(check)
    }

    /// Replace the backoff.
    #[must_use]
    pub fn backoff(backoff: Backoff) -> Self {
        Self::Backoff(backoff)
    }

    /// Replace the attempt budget.
    #[must_use]
    pub const fn max_attempts(max_attempts: u32) -> Self {
        Self::MaxAttempts(max_attempts)
    }

    /// The decorator that requests the page a cursor points at.
    #[must_use]
    pub fn from_cursor(cursor: &PageCursor) -> Self {
        match cursor {
            PageCursor::Offset { page, .. } => Self::Page(*page),
            PageCursor::Keyset { params } => Self::Keyset(params.clone()),
        }
    }

    /// Check the option can be applied.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOption`] for a malformed header, an empty
    /// query parameter name or a zero attempt budget.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Header { name, value } => {
                HeaderName::from_bytes(name.as_bytes())
                    .map_err(|_| Error::invalid_option(format!("invalid header name '{name}'")))?;
                HeaderValue::from_str(value)
                    .map_err(|_| Error::invalid_option(format!("invalid value for header '{name}'")))?;
                Ok(())
            }
            Self::Query { name, .. } if name.is_empty() => {
                Err(Error::invalid_option("empty query parameter name"))
            }
            Self::Keyset(params) if params.iter().any(|(name, _)| name.is_empty()) => {
                Err(Error::invalid_option("empty query parameter name"))
            }
            Self::MaxAttempts(0) => Err(Error::invalid_option("max attempts must be at least 1")),
            _ => Ok(()),
        }
    }
}

/// The result of applying a call's options in order.
#[derive(Debug, Clone, Default)]
pub(crate) struct Decorations {
    pub(crate) headers: BTreeMap<String, String>,
    pub(crate) query: Vec<(String, String)>,
    pub(crate) context: Option<Context>,
    pub(crate) retry: Option<RetryCheck>,
    pub(crate) backoff: Option<Backoff>,
    pub(crate) max_attempts: Option<u32>,
}

impl Decorations {
    /// Start from the plan's own query parameters.
    pub(crate) fn new(query: Vec<(String, String)>) -> Self {
        Self {
            query,
            ..Self::default()
        }
    }

    pub(crate) fn apply(&mut self, option: &RequestOption) -> Result<()> {
        option.validate()?;
        match option {
            RequestOption::Header { name, value } => {
                self.headers.insert(name.to_ascii_lowercase(), value.clone());
            }
            RequestOption::Query { name, value } => {
                self.query.push((name.clone(), value.clone()));
            }
            RequestOption::Page(page) => self.set_query("page", &page.to_string()),
            RequestOption::Keyset(params) => {
                for (name, value) in params {
                    self.set_query(name, value);
                }
            }
            RequestOption::Context(context) => self.context = Some(context.clone()),
            RequestOption::Retry(check) => self.retry = Some(check.clone()),
            RequestOption::Backoff(backoff) => self.backoff = Some(backoff.clone()),
            RequestOption::MaxAttempts(max_attempts) => self.max_attempts = Some(*max_attempts),
        }
        Ok(())
    }

    pub(crate) fn apply_all<'a>(
        &mut self,
        options: impl IntoIterator<Item = &'a RequestOption>,
    ) -> Result<()> {
        options.into_iter().try_for_each(|option| self.apply(option))
    }

    fn set_query(&mut self, name: &str, value: &str) {
        self.query.retain(|(existing, _)| existing != name);
        self.query.push((name.to_string(), value.to_string()));
    }
}
