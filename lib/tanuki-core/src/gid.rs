//! GraphQL global identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::Error;

/// A GraphQL global ID: `gid://<namespace>/<TypeName>/<numeric-id>`.
///
/// # Example
///
/// ```
/// use tanuki_core::Gid;
///
/// let gid = Gid::new("WorkItem", 42);
/// assert_eq!(gid.to_string(), "gid://gitlab/WorkItem/42");
///
/// let parsed: Gid = "gid://gitlab/WorkItem/42".parse().expect("valid gid");
/// assert_eq!(parsed, gid);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Gid {
    namespace: String,
    type_name: String,
    id: u64,
}

impl Gid {
    /// Namespace used by the GitLab GraphQL API.
    pub const DEFAULT_NAMESPACE: &'static str = "gitlab";

    const SCHEME: &'static str = "gid://";

    /// Create a global ID in the default namespace.
    #[must_use]
    pub fn new(type_name: impl Into<String>, id: u64) -> Self {
        Self::with_namespace(Self::DEFAULT_NAMESPACE, type_name, id)
    }

    /// Create a global ID in an explicit namespace.
    #[must_use]
    pub fn with_namespace(namespace: impl Into<String>, type_name: impl Into<String>, id: u64) -> Self {
        Self {
            namespace: namespace.into(),
            type_name: type_name.into(),
            id,
        }
    }

    /// Namespace part (e.g., `gitlab`).
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Type name part (e.g., `WorkItem`).
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Numeric ID part.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }
}

impl fmt::Display for Gid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}/{}/{}", Self::SCHEME, self.namespace, self.type_name, self.id)
    }
}

impl FromStr for Gid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidGid(s.to_string());

        let rest = s.strip_prefix(Self::SCHEME).ok_or_else(invalid)?;
        let mut parts = rest.split('/');
        let (Some(namespace), Some(type_name), Some(id), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };
        if namespace.is_empty() || type_name.is_empty() {
            return Err(invalid());
        }
        let id = id.parse::<u64>().map_err(|_| invalid())?;

        Ok(Self::with_namespace(namespace, type_name, id))
    }
}

impl Serialize for Gid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Gid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use assert2::{check, let_assert};

    use super::*;

    #[test]
    fn round_trips_numeric_id_and_type() {
        let gid = Gid::new("WorkItem", 42);
        let parsed: Gid = gid.to_string().parse().expect("parse");

        check!(parsed.id() == 42);
        check!(parsed.type_name() == "WorkItem");
        check!(parsed.namespace() == "gitlab");
    }

    #[test]
    fn keeps_custom_namespace() {
        let parsed: Gid = "gid://other/Project/7".parse().expect("parse");
        check!(parsed == Gid::with_namespace("other", "Project", 7));
    }

    #[test]
    fn rejects_malformed_ids() {
        for input in [
            "",
            "gitlab/WorkItem/1",
            "gid://gitlab/WorkItem",
            "gid://gitlab/WorkItem/abc",
            "gid://gitlab/WorkItem/1/extra",
            "gid:///WorkItem/1",
            "gid://gitlab//1",
        ] {
            let_assert!(Err(Error::InvalidGid(raw)) = input.parse::<Gid>());
            check!(raw == input);
        }
    }

    #[test]
    fn serializes_as_string() {
        let json = serde_json::to_string(&Gid::new("User", 3)).expect("serialize");
        check!(json == r#""gid://gitlab/User/3""#);

        let gid: Gid = serde_json::from_str(r#""gid://gitlab/Issue/9""#).expect("deserialize");
        check!(gid == Gid::new("Issue", 9));

        check!(serde_json::from_str::<Gid>(r#""nope""#).is_err());
    }
}
