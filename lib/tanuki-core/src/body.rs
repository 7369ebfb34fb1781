//! Body and query serialization utilities.

use bytes::Bytes;

use crate::Result;

/// Serialize a value to JSON bytes.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
///
/// # Example
///
/// ```
/// use tanuki_core::to_json;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct NewLabel { name: String }
///
/// let label = NewLabel { name: "bug".to_string() };
/// let bytes = to_json(&label).expect("serialize");
/// assert_eq!(bytes.as_ref(), br#"{"name":"bug"}"#);
/// ```
pub fn to_json<T: serde::Serialize>(value: &T) -> Result<Bytes> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(Into::into)
}

/// Serialize a value to a query string.
///
/// Uses `serde_html_form`, which supports `Vec<T>` for repeated query
/// parameters (e.g., `?labels=a&labels=b`).
///
/// # Errors
///
/// Returns an error if query serialization fails.
///
/// # Example
///
/// ```
/// use tanuki_core::to_query_string;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Search {
///     search: String,
///     #[serde(skip_serializing_if = "Option::is_none")]
///     page: Option<u32>,
/// }
///
/// let search = Search { search: "tanuki".to_string(), page: Some(1) };
/// let query = to_query_string(&search).expect("serialize");
/// assert_eq!(query, "search=tanuki&page=1");
/// ```
pub fn to_query_string<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_html_form::to_string(value).map_err(Into::into)
}

/// Serialize a value to decoded query `(name, value)` pairs.
///
/// # Errors
///
/// Returns an error if query serialization fails.
pub fn to_query_pairs<T: serde::Serialize>(value: &T) -> Result<Vec<(String, String)>> {
    let query = to_query_string(value)?;
    Ok(url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect())
}

/// Deserialize JSON bytes to a value with path-aware error messages.
///
/// Uses `serde_path_to_error` so a failure names the exact field that did
/// not match (e.g., "author.username").
///
/// # Errors
///
/// Returns [`Error::Decode`](crate::Error::Decode) with no response attached.
///
/// # Example
///
/// ```
/// use tanuki_core::from_json;
/// use serde::Deserialize;
///
/// #[derive(Debug, PartialEq, Deserialize)]
/// struct Label { name: String }
///
/// let bytes = br#"{"name":"bug"}"#;
/// let label: Label = from_json(bytes).expect("deserialize");
/// assert_eq!(label, Label { name: "bug".to_string() });
/// ```
pub fn from_json<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let mut deserializer = serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize(&mut deserializer)
        .map_err(|e| crate::Error::decode(e.path().to_string(), e.inner().to_string()))
}
