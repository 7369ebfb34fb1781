//! Request engine for the GitLab REST and GraphQL APIs.
//!
//! The crate is the shared machinery every endpoint binding is built on:
//!
//! - [`RequestPlan`]: method, escaped path, query or JSON body, per-call [`RequestOption`]s
//! - [`Client::execute`]: the transport executor, retrying through a per-call [`RetryPolicy`]
//! - [`Client::send`]: status check plus decoding into a [`Single`], [`List`] or [`NoContent`] shape
//! - [`Client::paginate`] and [`Pager`]: one lazy loop over offset and keyset pagination
//! - [`Client::query`]: GraphQL operations compiled from [`graphql`] fragments and
//!   `#[derive(GraphQlVariables)]` options
//!
//! # Example
//!
//! ```no_run
//! use tanuki::prelude::*;
//!
//! #[derive(Debug, Deserialize)]
//! struct Issue {
//!     iid: u64,
//!     title: String,
//! }
//!
//! # async fn example() -> tanuki::Result<()> {
//! let client = Client::builder("https://gitlab.example.com")
//!     .default_option(RequestOption::header("Private-Token", "glpat-xxx"))
//!     .build()?;
//!
//! let plan = RequestPlan::get("projects/{}/issues")
//!     .arg("group/app")?
//!     .params(&ListOptions::per_page(50))?;
//!
//! let mut issues = client.paginate::<Issue>(plan);
//! while let Some(issue) = issues.next().await? {
//!     println!("#{} {}", issue.iid, issue.title);
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod context;
pub mod middleware;
mod option;
mod pager;
mod plan;
pub mod prelude;
mod query;
mod retry;
mod transport;

pub use client::{Client, ClientBuilder};
pub use config::{ClientConfig, ClientConfigBuilder, RetryConfig};
pub use context::Context;
pub use option::RequestOption;
pub use pager::{PageFuture, Pager, PagerState};
pub use plan::{RequestPlan, RequestPlanBuilder};
pub use retry::{Attempt, Backoff, RetryCheck, RetryPolicy};
pub use transport::{HyperClient, ServiceFuture, Transport};

// Re-export tower for middleware composition
pub use tower;

// Re-export core types
pub use tanuki_core::{
    Error, Gid, HttpClient, IntoResourceId, Links, List, ListOptions, Method, NoContent, PageCursor,
    PageInfo, PaginationMode, PathTemplate, Request, RequestBuilder, ResourceId, Response, Result,
    ResultShape, ShapeKind, Single, Sort, from_json, path_escape, to_json, to_query_pairs,
    to_query_string,
};
pub use tanuki_core::{graphql, pagination};

// Re-export http types for status codes and headers
pub use tanuki_core::{StatusCode, header};

// Re-export crates for macro-generated code
pub use serde_json;

// Trait and derive share the name, like serde's
pub use tanuki_core::graphql::GraphQlVariables;
pub use tanuki_macro::GraphQlVariables;
