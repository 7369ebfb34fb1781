//! Prelude module for convenient imports.
//!
//! ```
//! use tanuki_core::prelude::*;
//! ```

pub use crate::graphql::{Fragment, FragmentRegistry, GraphQlVariables, Operation, Variable};
pub use crate::{
    Error, Gid, HttpClient, IntoResourceId, List, ListOptions, Method, NoContent, Request,
    ResourceId, Response, Result, ResultShape, Single, Sort, from_json, to_json,
};
