//! Prelude module for convenient imports.
//!
//! ```
//! use tanuki::prelude::*;
//! ```

pub use crate::graphql::{Fragment, FragmentRegistry, Operation, Variable};
pub use crate::{
    Backoff, Client, Context, Error, GraphQlVariables, HttpClient, List, ListOptions, Method,
    NoContent, RequestOption, RequestPlan, Response, Result, RetryCheck, RetryConfig, Single,
    Sort,
};
pub use serde::{Deserialize, Serialize};
