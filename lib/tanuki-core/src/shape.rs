//! Declared result shapes.
//!
//! A call declares the form it expects the body in: one object, a list of
//! objects, or nothing. The shape is picked at the call site by type, which
//! keeps the set closed to these three decoders.
//!
//! ```
//! use std::collections::HashMap;
//! use bytes::Bytes;
//! use tanuki_core::{List, NoContent, Response, ResultShape, Single};
//!
//! let empty = Response::new(200, HashMap::new(), Bytes::new());
//!
//! let items = List::<serde_json::Value>::decode(&empty).expect("empty list");
//! assert!(items.is_empty());
//! assert!(NoContent::decode(&empty).is_ok());
//! assert!(Single::<serde_json::Value>::decode(&empty).is_err());
//! ```

use std::fmt;
use std::marker::PhantomData;

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::{Error, Response, Result};

/// Which of the three shapes a decoder implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    /// Exactly one object.
    Single,
    /// A list of objects.
    List,
    /// No result expected; the body is ignored.
    NoContent,
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Single => "single",
            Self::List => "list",
            Self::NoContent => "no content",
        };
        f.write_str(name)
    }
}

/// Decoder for a successful response body.
///
/// Status checks happen before decoding: a shape only ever sees 2xx bodies.
/// On error nothing is partially returned.
pub trait ResultShape {
    /// The decoded value.
    type Output;

    /// The shape implemented.
    const KIND: ShapeKind;

    /// Decode the response body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the body does not match the shape.
    fn decode(response: &Response<Bytes>) -> Result<Self::Output>;
}

/// One JSON object decoded into `T`. An empty body is a decode error.
pub struct Single<T>(PhantomData<fn() -> T>);

impl<T: DeserializeOwned> ResultShape for Single<T> {
    type Output = T;

    const KIND: ShapeKind = ShapeKind::Single;

    fn decode(response: &Response<Bytes>) -> Result<T> {
        if response.is_body_empty() {
            return Err(Error::decode("", "empty body, expected a single object"));
        }
        response.json()
    }
}

/// A JSON array decoded into `Vec<T>`.
///
/// An empty body or a JSON `null` decodes to an empty vector.
pub struct List<T>(PhantomData<fn() -> T>);

impl<T: DeserializeOwned> ResultShape for List<T> {
    type Output = Vec<T>;

    const KIND: ShapeKind = ShapeKind::List;

    fn decode(response: &Response<Bytes>) -> Result<Vec<T>> {
        if response.is_body_empty() || response.body().trim_ascii() == b"null" {
            return Ok(Vec::new());
        }
        response.json()
    }
}

/// No result expected: the body is ignored entirely.
pub struct NoContent;

impl ResultShape for NoContent {
    type Output = ();

    const KIND: ShapeKind = ShapeKind::NoContent;

    fn decode(_response: &Response<Bytes>) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert2::{check, let_assert};

    use super::*;

    #[derive(Debug, PartialEq, serde::Deserialize)]
    struct Label {
        name: String,
    }

    fn ok(body: &'static str) -> Response<Bytes> {
        Response::new(200, HashMap::new(), Bytes::from(body))
    }

    #[test]
    fn single_decodes_one_object() {
        let label = Single::<Label>::decode(&ok(r#"{"name":"bug"}"#)).expect("decode");
        check!(label == Label { name: "bug".to_string() });
    }

    #[test]
    fn single_rejects_empty_body() {
        let_assert!(Err(Error::Decode { message, .. }) = Single::<Label>::decode(&ok("")));
        check!(message.contains("empty body"));
    }

    #[test]
    fn list_of_empty_body_is_empty_vec() {
        check!(List::<Label>::decode(&ok("")).expect("decode").is_empty());
        check!(List::<Label>::decode(&ok(" null\n")).expect("decode").is_empty());
        check!(List::<Label>::decode(&ok("[]")).expect("decode").is_empty());
    }

    #[test]
    fn list_decodes_array() {
        let labels = List::<Label>::decode(&ok(r#"[{"name":"a"},{"name":"b"}]"#)).expect("decode");
        check!(labels.len() == 2);
        check!(labels[1].name == "b");
    }

    #[test]
    fn list_rejects_object() {
        let result = List::<Label>::decode(&ok(r#"{"name":"a"}"#));
        let_assert!(Err(err) = result);
        check!(err.is_decode());
    }

    #[test]
    fn no_content_ignores_body() {
        check!(NoContent::decode(&ok("not even json")).is_ok());
        check!(NoContent::KIND.to_string() == "no content");
    }
}
