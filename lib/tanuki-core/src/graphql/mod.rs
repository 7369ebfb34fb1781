//! GraphQL query compilation.
//!
//! An [`Operation`] holds a top-level selection that may spread named
//! [`Fragment`]s (`...UserFields`). Fragments may spread other fragments.
//! [`Operation::compile`] resolves every spread through a
//! [`FragmentRegistry`], declares the variables that are actually set and
//! produces one [`GraphQlRequest`]: the document text plus its variables map.
//!
//! ```
//! use tanuki_core::graphql::{Fragment, FragmentRegistry, Operation, Variable};
//!
//! let registry = FragmentRegistry::new()
//!     .with(Fragment::new("UserFields", "UserCore", "id\nusername"));
//!
//! let operation = Operation::query("currentUser", "currentUser {\n  ...UserFields\n}");
//! let request = operation.compile(&registry, &()).expect("compile");
//!
//! assert!(request.query.starts_with("query currentUser {"));
//! assert!(request.query.contains("fragment UserFields on UserCore {"));
//! assert!(request.variables.is_empty());
//! ```

mod fragment;
mod variables;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use self::fragment::{Fragment, FragmentRegistry};
pub use self::variables::{GraphQlVariables, Variable};
use crate::{Error, Result};

/// Marker replaced by the argument list of the set variables.
///
/// `workItems{{args}} { ... }` becomes `workItems(state: $state) { ... }`,
/// or `workItems { ... }` when no variable is set.
pub const ARGS_MARKER: &str = "{{args}}";

/// Operation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// `query`.
    Query,
    /// `mutation`.
    Mutation,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Query => f.write_str("query"),
            Self::Mutation => f.write_str("mutation"),
        }
    }
}

/// A named top-level operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    kind: OperationKind,
    name: String,
    selection: String,
}

impl Operation {
    /// A named query.
    #[must_use]
    pub fn query(name: impl Into<String>, selection: impl Into<String>) -> Self {
        Self::new(OperationKind::Query, name, selection)
    }

    /// A named mutation.
    #[must_use]
    pub fn mutation(name: impl Into<String>, selection: impl Into<String>) -> Self {
        Self::new(OperationKind::Mutation, name, selection)
    }

    /// An operation of the given kind.
    #[must_use]
    pub fn new(kind: OperationKind, name: impl Into<String>, selection: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            selection: selection.into(),
        }
    }

    /// Operation kind.
    #[must_use]
    pub const fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Operation name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Compile the document and the variables map.
    ///
    /// Only the variables returned by `variables` are declared and sent;
    /// each referenced fragment is emitted once, in discovery order.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownFragment`] if a spread names an unregistered fragment
    /// - [`Error::FragmentCycle`] if fragments spread each other in a loop
    /// - [`Error::InvalidVariable`] if a variable name or type is invalid, or
    ///   a name is declared twice
    /// - [`Error::JsonSerialization`] if a variable value fails to serialize
    pub fn compile<V>(&self, registry: &FragmentRegistry, variables: &V) -> Result<GraphQlRequest>
    where
        V: GraphQlVariables + ?Sized,
    {
        let variables = variables.graphql_variables()?;
        variables::validate(&variables)?;
        let fragments = registry.resolve(&self.selection)?;

        let mut query = format!("{} {}", self.kind, self.name);
        if !variables.is_empty() {
            let declarations: Vec<_> = variables.iter().map(Variable::declaration).collect();
            query.push('(');
            query.push_str(&declarations.join(", "));
            query.push(')');
        }

        let arguments = if variables.is_empty() {
            String::new()
        } else {
            let arguments: Vec<_> = variables.iter().map(Variable::argument).collect();
            format!("({})", arguments.join(", "))
        };
        let body = self.selection.replace(ARGS_MARKER, &arguments);
        query.push_str(" {\n");
        push_indented(&mut query, &body);
        query.push('}');

        for fragment in fragments {
            query.push_str("\n\n");
            query.push_str(&fragment.definition());
        }

        Ok(GraphQlRequest {
            query,
            variables: variables
                .into_iter()
                .map(Variable::into_entry)
                .collect(),
        })
    }
}

/// Push `text`, trimmed, with every non-empty line indented by two spaces.
pub(crate) fn push_indented(out: &mut String, text: &str) {
    for line in text.trim().lines() {
        if !line.trim().is_empty() {
            out.push_str("  ");
            out.push_str(line);
        }
        out.push('\n');
    }
}

/// Body of one GraphQL call: `{"query": ..., "variables": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphQlRequest {
    /// The complete document.
    pub query: String,
    /// Values of the declared variables, nothing else.
    pub variables: serde_json::Map<String, serde_json::Value>,
}

/// Response envelope: `{"data": ..., "errors": [...]}`.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlResponse<T> {
    /// Payload; may be missing or `null` when the call failed.
    pub data: Option<T>,
    /// Application errors.
    #[serde(default)]
    pub errors: Option<Vec<GraphQlError>>,
}

impl<T> GraphQlResponse<T> {
    /// The payload, or the errors the server reported.
    ///
    /// # Errors
    ///
    /// - [`Error::GraphQl`] if the `errors` array is not empty, even when
    ///   some data came back
    /// - [`Error::Decode`] if there is neither data nor errors
    pub fn into_data(self) -> Result<T> {
        match (self.data, self.errors) {
            (_, Some(errors)) if !errors.is_empty() => Err(Error::graphql(errors)),
            (Some(data), _) => Ok(data),
            (None, _) => Err(Error::decode("data", "missing GraphQL data")),
        }
    }
}

/// One entry of the `errors` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQlError {
    /// Human readable message.
    pub message: String,
    /// Positions in the query document.
    #[serde(default)]
    pub locations: Vec<Location>,
    /// Path of the response field that failed.
    #[serde(default)]
    pub path: Vec<PathSegment>,
}

impl fmt::Display for GraphQlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if !self.path.is_empty() {
            let path: Vec<_> = self.path.iter().map(ToString::to_string).collect();
            write!(f, " (at {})", path.join("."))?;
        }
        Ok(())
    }
}

/// Line and column of an error in the query document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// 1-based line.
    pub line: u32,
    /// 1-based column.
    pub column: u32,
}

/// A field name or list index in an error path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// List index.
    Index(u64),
    /// Field name.
    Field(String),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "{index}"),
            Self::Field(field) => f.write_str(field),
        }
    }
}

/// The non-empty error list of a failed GraphQL call.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphQlErrors(Vec<GraphQlError>);

impl GraphQlErrors {
    /// Wrap an error list.
    #[must_use]
    pub fn new(errors: Vec<GraphQlError>) -> Self {
        Self(errors)
    }

    /// The structured errors.
    #[must_use]
    pub fn as_slice(&self) -> &[GraphQlError] {
        &self.0
    }

    /// Consume into the structured errors.
    #[must_use]
    pub fn into_inner(self) -> Vec<GraphQlError> {
        self.0
    }
}

impl fmt::Display for GraphQlErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, error) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}
