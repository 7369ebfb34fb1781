//! Request plans.
//!
//! A [`RequestPlan`] is everything one call needs before it meets a client:
//! method, escaped path, query parameters, body and per-call options. It is
//! built once and reused unchanged for every attempt.
//!
//! # Example
//!
//! ```
//! use serde::Serialize;
//! use tanuki::{RequestOption, RequestPlan};
//!
//! #[derive(Serialize)]
//! struct ListIssues {
//!     state: &'static str,
//! }
//!
//! let plan = RequestPlan::get("projects/{}/issues")
//!     .arg("group/app")?
//!     .params(&ListIssues { state: "opened" })?
//!     .option(RequestOption::header("Private-Token", "secret"))
//!     .build()?;
//!
//! assert_eq!(plan.path(), "projects/group%2Fapp/issues");
//! assert_eq!(plan.query(), [("state".to_string(), "opened".to_string())]);
//! # Ok::<(), tanuki::Error>(())
//! ```

use bytes::Bytes;
use serde::Serialize;

use crate::option::Decorations;
use crate::{IntoResourceId, Method, PathTemplate, RequestOption, ResourceId, Result};

/// An immutable, fully resolved request description.
#[derive(Debug, Clone)]
pub struct RequestPlan {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Bytes>,
    options: Vec<RequestOption>,
}

impl RequestPlan {
    /// Start a plan for `method` on a `{}` path template, relative to the API base URL.
    #[must_use]
    pub fn builder(method: Method, template: impl Into<String>) -> RequestPlanBuilder {
        RequestPlanBuilder {
            method,
            template: PathTemplate::new(template),
            args: Vec::new(),
            query: Vec::new(),
            body: None,
            options: Vec::new(),
        }
    }

    /// Start a GET plan.
    #[must_use]
    pub fn get(template: impl Into<String>) -> RequestPlanBuilder {
        Self::builder(Method::Get, template)
    }

    /// Start a POST plan.
    #[must_use]
    pub fn post(template: impl Into<String>) -> RequestPlanBuilder {
        Self::builder(Method::Post, template)
    }

    /// Start a PUT plan.
    #[must_use]
    pub fn put(template: impl Into<String>) -> RequestPlanBuilder {
        Self::builder(Method::Put, template)
    }

    /// Start a PATCH plan.
    #[must_use]
    pub fn patch(template: impl Into<String>) -> RequestPlanBuilder {
        Self::builder(Method::Patch, template)
    }

    /// Start a DELETE plan.
    #[must_use]
    pub fn delete(template: impl Into<String>) -> RequestPlanBuilder {
        Self::builder(Method::Delete, template)
    }

    /// HTTP method.
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Escaped path, relative to the API base URL.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Query parameters from the options object.
    #[must_use]
    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    /// JSON body from the options object.
    #[must_use]
    pub const fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Per-call options, in application order.
    #[must_use]
    pub fn options(&self) -> &[RequestOption] {
        &self.options
    }
}

/// Builder for [`RequestPlan`].
///
/// Cloneable, so a list endpoint can rebuild the same plan once per page.
#[derive(Debug, Clone)]
pub struct RequestPlanBuilder {
    method: Method,
    template: PathTemplate,
    args: Vec<ResourceId>,
    query: Vec<(String, String)>,
    body: Option<Bytes>,
    options: Vec<RequestOption>,
}

impl RequestPlanBuilder {
    /// Supply the next positional path argument.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidId`](crate::Error::InvalidId) if the value is
    /// neither an integer nor a non-empty string.
    pub fn arg(mut self, id: impl IntoResourceId) -> Result<Self> {
        self.args.push(id.into_resource_id()?);
        Ok(self)
    }

    /// Attach an options object.
    ///
    /// GET, HEAD and DELETE send it as query parameters (appended to earlier
    /// ones); POST, PUT and PATCH send it as the JSON body (replacing an
    /// earlier one).
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the object cannot be encoded.
    pub fn params<T: Serialize + ?Sized>(mut self, params: &T) -> Result<Self> {
        if self.method.takes_body() {
            self.body = Some(crate::to_json(&params)?);
        } else {
            self.query.extend(crate::to_query_pairs(&params)?);
        }
        Ok(self)
    }

    /// Add a per-call option.
    #[must_use]
    pub fn option(mut self, option: RequestOption) -> Self {
        self.options.push(option);
        self
    }

    /// Add several per-call options, in order.
    #[must_use]
    pub fn options(mut self, options: impl IntoIterator<Item = RequestOption>) -> Self {
        self.options.extend(options);
        self
    }

    /// The HTTP method.
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Expand the path and validate the options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`](crate::Error::InvalidRequest) if the
    /// argument count does not match the template, or
    /// [`Error::InvalidOption`](crate::Error::InvalidOption) for a malformed
    /// option.
    pub fn build(self) -> Result<RequestPlan> {
        let path = self.template.expand(&self.args)?;
        Decorations::default().apply_all(&self.options)?;

        Ok(RequestPlan {
            method: self.method,
            path: path.trim_start_matches('/').to_string(),
            query: self.query,
            body: self.body,
            options: self.options,
        })
    }
}
