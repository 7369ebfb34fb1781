//! Core types for the tanuki GitLab API client.
//!
//! This crate holds everything that does not need a runtime:
//! - [`Error`] and [`Result`] - the error taxonomy shared by every call
//! - [`Method`], [`Request`] and [`Response`] - wire-level HTTP types
//! - [`HttpClient`] - the transport seam
//! - [`ResourceId`], [`IntoResourceId`] and [`PathTemplate`] - escaped path segments
//! - [`Single`], [`List`] and [`NoContent`] - declared result shapes
//! - [`PageInfo`], [`PaginationMode`] and [`PageCursor`] - pagination headers
//! - [`graphql`] - fragment composition and variable declaration
//! - [`Gid`] - GraphQL global identifiers
//! - [`StatusCode`] and [`header`] - re-exported from the `http` crate

mod body;
mod client;
mod error;
mod gid;
pub mod graphql;
mod method;
pub mod pagination;
mod path;
pub mod prelude;
mod request;
mod response;
mod shape;

pub use body::{from_json, to_json, to_query_pairs, to_query_string};
pub use client::HttpClient;
pub use error::{Error, Result};
pub use gid::Gid;
pub use method::Method;
pub use pagination::{Links, ListOptions, PageCursor, PageInfo, PaginationMode, Sort};
pub use path::{IntoResourceId, PathTemplate, ResourceId, path_escape};
pub use request::{Request, RequestBuilder};
pub use response::Response;
pub use shape::{List, NoContent, ResultShape, ShapeKind, Single};

pub use http::{StatusCode, header};
