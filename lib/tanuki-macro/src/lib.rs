//! Procedural macros for the tanuki GitLab API client.
//!
//! - `#[derive(GraphQlVariables)]` - turn an options struct into GraphQL variables

mod graphql_derive;
mod rename;

use proc_macro::TokenStream;

/// Derive the `GraphQlVariables` trait for an options struct.
///
/// Every field becomes one GraphQL variable, declared with the type given in
/// its `#[graphql(type = "...")]` attribute. `Option<T>` fields that are
/// `None` are left out of both the declaration and the variables map; they
/// are never sent as `null`.
///
/// # Struct Attributes
///
/// - `#[graphql(rename_all = "camelCase")]` - Rename all fields using a case convention
///
/// Supported case conventions:
/// - `lowercase`, `UPPERCASE`
/// - `camelCase`, `PascalCase`
/// - `snake_case`, `SCREAMING_SNAKE_CASE`
///
/// # Field Attributes
///
/// - `#[graphql(type = "ID!")]` - GraphQL type of the variable (required)
/// - `#[graphql(rename = "name")]` - Variable name (overrides `rename_all`)
/// - `#[graphql(skip)]` - Not a variable
///
/// # Example
///
/// ```ignore
/// use tanuki::GraphQlVariables;
///
/// #[derive(GraphQlVariables)]
/// #[graphql(rename_all = "camelCase")]
/// struct ListWorkItems {
///     #[graphql(type = "ID!")]
///     full_path: String,           // `$fullPath: ID!`
///     #[graphql(type = "IssuableState")]
///     state: Option<String>,       // omitted when `None`
///     #[graphql(type = "[String!]", rename = "labelName")]
///     labels: Option<Vec<String>>,
/// }
/// ```
#[proc_macro_derive(GraphQlVariables, attributes(graphql))]
pub fn derive_graphql_variables(input: TokenStream) -> TokenStream {
    graphql_derive::expand_graphql_variables(input.into())
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
