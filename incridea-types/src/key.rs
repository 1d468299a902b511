//! Entity keys: the composite type tag + identifier that addresses a record.
//!
//! Keys render as `Typename:id`. The special [`ROOT_QUERY`] key holds the
//! top-level fields of every query and renders as the bare tag.

use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Tag of the record that holds top-level query fields.
pub const ROOT_QUERY: &str = "ROOT_QUERY";

/// Uniquely addresses one logical record across the whole store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey {
    typename: String,
    id: String,
}

impl EntityKey {
    /// Creates a key without validation.
    ///
    /// Callers supply a non-empty type tag without `:`; use [`EntityKey::try_new`]
    /// for data coming off the wire.
    #[must_use]
    pub fn new(typename: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            typename: typename.into(),
            id: id.into(),
        }
    }

    /// Creates a key, rejecting empty parts and reserved tags.
    pub fn try_new(typename: impl Into<String>, id: impl Into<String>) -> Result<Self> {
        let typename = typename.into();
        let id = id.into();

        if typename.is_empty() || typename.contains(':') {
            return Err(Error::InvalidKey(format!("bad type tag {typename:?}")));
        }
        if typename == ROOT_QUERY {
            return Err(Error::InvalidKey(format!("{ROOT_QUERY} is reserved")));
        }
        if id.is_empty() {
            return Err(Error::InvalidKey(format!("empty identifier for {typename}")));
        }

        Ok(Self { typename, id })
    }

    /// The root query key.
    #[must_use]
    pub fn root_query() -> Self {
        Self {
            typename: ROOT_QUERY.to_string(),
            id: String::new(),
        }
    }

    /// Returns true for the root query key.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.typename == ROOT_QUERY && self.id.is_empty()
    }

    /// Returns the type tag.
    #[must_use]
    pub fn typename(&self) -> &str {
        &self.typename
    }

    /// Returns the identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Parses a key from its textual form.
    pub fn parse(s: &str) -> Result<Self> {
        if s == ROOT_QUERY {
            return Ok(Self::root_query());
        }
        let (typename, id) = s
            .split_once(':')
            .ok_or_else(|| Error::InvalidKey(format!("missing ':' in {s:?}")))?;
        Self::try_new(typename, id)
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str(ROOT_QUERY)
        } else {
            write!(f, "{}:{}", self.typename, self.id)
        }
    }
}

impl FromStr for EntityKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for EntityKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EntityKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
