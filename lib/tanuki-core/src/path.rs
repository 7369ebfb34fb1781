//! Resource identifiers and path templates.
//!
//! Every caller-provided identifier that ends up in a URL path goes through
//! [`ResourceId`] and is percent-escaped before substitution, since project
//! and group paths such as `group/sub.group/project` contain path-significant
//! characters.

use std::fmt;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::{Error, Result};

/// Bytes escaped in a path segment: everything but ASCII alphanumerics and `-_~`.
///
/// `.` is escaped on purpose: the API treats a trailing `.json`-like suffix
/// as a format extension.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'~');

/// Percent-escape a single path segment.
///
/// ```
/// assert_eq!(tanuki_core::path_escape("group/sub.project"), "group%2Fsub%2Eproject");
/// ```
#[must_use]
pub fn path_escape(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT).to_string()
}

/// A resource identifier used as a path segment: a numeric ID or a full path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceId {
    /// Numeric ID (e.g., `42`).
    Int(i64),
    /// Path or name (e.g., `"group/subgroup/project"`).
    Name(String),
}

impl ResourceId {
    /// The escaped form used inside a URL path.
    #[must_use]
    pub fn to_path_segment(&self) -> String {
        match self {
            Self::Int(id) => id.to_string(),
            Self::Name(name) => path_escape(name),
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(id) => write!(f, "{id}"),
            Self::Name(name) => write!(f, "{name}"),
        }
    }
}

/// Conversion into a validated [`ResourceId`].
///
/// Integers and non-empty strings convert; floats, empty strings, the dot
/// segments `.` and `..`, and JSON values of any other kind fail with
/// [`Error::InvalidId`].
pub trait IntoResourceId {
    /// Convert into a [`ResourceId`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidId`] if the value cannot identify a resource.
    fn into_resource_id(self) -> Result<ResourceId>;
}

impl IntoResourceId for ResourceId {
    fn into_resource_id(self) -> Result<ResourceId> {
        match self {
            Self::Name(name) => name.into_resource_id(),
            id @ Self::Int(_) => Ok(id),
        }
    }
}

macro_rules! impl_into_resource_id_for_int {
    ($($ty:ty),*) => {
        $(
            impl IntoResourceId for $ty {
                fn into_resource_id(self) -> Result<ResourceId> {
                    i64::try_from(self)
                        .map(ResourceId::Int)
                        .map_err(|_| Error::invalid_id(format!("{}({self})", stringify!($ty))))
                }
            }
        )*
    };
}

impl_into_resource_id_for_int!(i32, i64, u32, u64, usize);

impl IntoResourceId for String {
    fn into_resource_id(self) -> Result<ResourceId> {
        if self.is_empty() {
            return Err(Error::invalid_id("\"\""));
        }
        // URL parsing resolves `%2E` and `%2E%2E` like `.` and `..`
        if self == "." || self == ".." {
            return Err(Error::invalid_id(format!("{self:?}")));
        }
        Ok(ResourceId::Name(self))
    }
}

impl IntoResourceId for &str {
    fn into_resource_id(self) -> Result<ResourceId> {
        self.to_string().into_resource_id()
    }
}

impl IntoResourceId for &String {
    fn into_resource_id(self) -> Result<ResourceId> {
        self.clone().into_resource_id()
    }
}

impl IntoResourceId for f64 {
    fn into_resource_id(self) -> Result<ResourceId> {
        Err(Error::invalid_id(format!("f64({self})")))
    }
}

impl IntoResourceId for f32 {
    fn into_resource_id(self) -> Result<ResourceId> {
        Err(Error::invalid_id(format!("f32({self})")))
    }
}

impl IntoResourceId for serde_json::Value {
    fn into_resource_id(self) -> Result<ResourceId> {
        match self {
            Self::Number(number) => number
                .as_i64()
                .map(ResourceId::Int)
                .ok_or_else(|| Error::invalid_id(format!("number({number})"))),
            Self::String(name) => name.into_resource_id(),
            other => Err(Error::invalid_id(other.to_string())),
        }
    }
}

/// A path template with positional `{}` placeholders, relative to the API base URL.
///
/// # Example
///
/// ```
/// use tanuki_core::{PathTemplate, ResourceId};
///
/// let template = PathTemplate::new("projects/{}/issues/{}");
/// let path = template
///     .expand(&[ResourceId::Name("group/app".into()), ResourceId::Int(7)])
///     .expect("expand");
/// assert_eq!(path, "projects/group%2Fapp/issues/7");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathTemplate(String);

impl PathTemplate {
    const PLACEHOLDER: &'static str = "{}";

    /// Create a new path template.
    #[must_use]
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    /// Get the template string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of positional placeholders.
    #[must_use]
    pub fn placeholders(&self) -> usize {
        self.0.matches(Self::PLACEHOLDER).count()
    }

    /// Substitute each placeholder with the escaped form of the matching argument.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if the number of arguments does not
    /// match the number of placeholders.
    pub fn expand(&self, args: &[ResourceId]) -> Result<String> {
        let expected = self.placeholders();
        if expected != args.len() {
            return Err(Error::invalid_request(format!(
                "path template '{}' expects {expected} argument(s), got {}",
                self.0,
                args.len()
            )));
        }

        let mut path = String::with_capacity(self.0.len());
        let mut parts = self.0.split(Self::PLACEHOLDER);
        if let Some(head) = parts.next() {
            path.push_str(head);
        }
        for (part, arg) in parts.zip(args) {
            path.push_str(&arg.to_path_segment());
            path.push_str(part);
        }
        Ok(path)
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for PathTemplate {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
