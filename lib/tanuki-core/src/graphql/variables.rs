use std::collections::HashSet;

use serde::Serialize;

use crate::{Error, Result};

/// A declared and supplied GraphQL variable: `$name: Type` plus its value.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    name: String,
    graphql_type: String,
    value: serde_json::Value,
}

impl Variable {
    /// Create a variable from a JSON value.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        graphql_type: impl Into<String>,
        value: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            graphql_type: graphql_type.into(),
            value,
        }
    }

    /// Create a variable from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::JsonSerialization`] if the value fails to serialize.
    pub fn try_new<T: Serialize + ?Sized>(
        name: impl Into<String>,
        graphql_type: impl Into<String>,
        value: &T,
    ) -> Result<Self> {
        Ok(Self::new(name, graphql_type, serde_json::to_value(value)?))
    }

    /// Variable name, without the `$`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared GraphQL type (e.g., `ID!`, `[String!]`).
    #[must_use]
    pub fn graphql_type(&self) -> &str {
        &self.graphql_type
    }

    /// Supplied value.
    #[must_use]
    pub const fn value(&self) -> &serde_json::Value {
        &self.value
    }

    pub(crate) fn declaration(&self) -> String {
        format!("${}: {}", self.name, self.graphql_type)
    }

    pub(crate) fn argument(&self) -> String {
        format!("{0}: ${0}", self.name)
    }

    pub(crate) fn into_entry(self) -> (String, serde_json::Value) {
        (self.name, self.value)
    }
}

/// Types whose set fields become GraphQL variables.
///
/// Usually derived:
///
/// ```
/// use tanuki_core::graphql::{GraphQlVariables, Variable};
///
/// struct ListWorkItems {
///     full_path: String,
///     state: Option<String>,
/// }
///
/// impl GraphQlVariables for ListWorkItems {
///     fn graphql_variables(&self) -> tanuki_core::Result<Vec<Variable>> {
///         let mut variables = vec![Variable::try_new("fullPath", "ID!", &self.full_path)?];
///         if let Some(state) = &self.state {
///             variables.push(Variable::try_new("state", "IssuableState", state)?);
///         }
///         Ok(variables)
///     }
/// }
///
/// let options = ListWorkItems { full_path: "group/app".into(), state: None };
/// let variables = options.graphql_variables().expect("variables");
/// assert_eq!(variables.len(), 1);
/// ```
pub trait GraphQlVariables {
    /// The variables to declare and send. Unset values must be left out,
    /// not sent as `null`.
    ///
    /// # Errors
    ///
    /// Returns an error if a value fails to serialize.
    fn graphql_variables(&self) -> Result<Vec<Variable>>;
}

impl GraphQlVariables for () {
    fn graphql_variables(&self) -> Result<Vec<Variable>> {
        Ok(Vec::new())
    }
}

impl GraphQlVariables for [Variable] {
    fn graphql_variables(&self) -> Result<Vec<Variable>> {
        Ok(self.to_vec())
    }
}

impl GraphQlVariables for Vec<Variable> {
    fn graphql_variables(&self) -> Result<Vec<Variable>> {
        self.as_slice().graphql_variables()
    }
}

impl<T: GraphQlVariables + ?Sized> GraphQlVariables for &T {
    fn graphql_variables(&self) -> Result<Vec<Variable>> {
        (**self).graphql_variables()
    }
}

/// Check names, types and uniqueness.
pub(crate) fn validate(variables: &[Variable]) -> Result<()> {
    let mut seen = HashSet::new();
    for variable in variables {
        if !is_name(&variable.name) {
            return Err(Error::InvalidVariable(format!(
                "'{}' is not a valid variable name",
                variable.name
            )));
        }
        if !is_type(&variable.graphql_type) {
            return Err(Error::InvalidVariable(format!(
                "'{}' has invalid type '{}'",
                variable.name, variable.graphql_type
            )));
        }
        if !seen.insert(variable.name.as_str()) {
            return Err(Error::InvalidVariable(format!(
                "'{}' is declared twice",
                variable.name
            )));
        }
    }
    Ok(())
}

/// `/[_A-Za-z][_0-9A-Za-z]*/`
fn is_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c == '_' || c.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

/// A named type, list type or non-null type, e.g. `[ID!]!`.
fn is_type(graphql_type: &str) -> bool {
    let graphql_type = graphql_type.trim();
    let inner = graphql_type.strip_suffix('!').unwrap_or(graphql_type);
    match inner.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) {
        Some(item) => is_type(item),
        None => is_name(inner),
    }
}

#[cfg(test)]
mod tests {
    use assert2::{check, let_assert};
    use serde_json::json;

    use super::*;

    #[test]
    fn declaration_and_argument_text() {
        let variable = Variable::new("fullPath", "ID!", json!("a/b"));
        check!(variable.declaration() == "$fullPath: ID!");
        check!(variable.argument() == "fullPath: $fullPath");
    }

    #[test]
    fn try_new_serializes_value() {
        let variable = Variable::try_new("iids", "[String!]", &["1", "2"]).expect("serialize");
        check!(variable.value() == &json!(["1", "2"]));
    }

    #[test]
    fn accepts_named_list_and_non_null_types() {
        for graphql_type in ["ID", "ID!", "[ID]", "[ID!]!", "[[Int]]", "WorkItemState"] {
            check!(is_type(graphql_type), "{graphql_type}");
        }
        for graphql_type in ["", "!", "[]", "[ID", "ID!!", "9Lives", "Work Item"] {
            check!(!is_type(graphql_type), "{graphql_type}");
        }
    }

    #[test]
    fn rejects_invalid_names() {
        let_assert!(Err(Error::InvalidVariable(message)) = validate(&[Variable::new("full-path", "ID!", json!("x"))]));
        check!(message.contains("full-path"));
    }

    #[test]
    fn rejects_empty_type() {
        let_assert!(Err(Error::InvalidVariable(message)) = validate(&[Variable::new("state", "", json!("opened"))]));
        check!(message.contains("invalid type"));
    }

    #[test]
    fn rejects_duplicates() {
        let variables = vec![
            Variable::new("first", "Int", json!(1)),
            Variable::new("first", "Int", json!(2)),
        ];
        let_assert!(Err(Error::InvalidVariable(message)) = validate(&variables));
        check!(message.contains("declared twice"));
    }
}
