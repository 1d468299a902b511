//! Field values stored inside normalized records.

use crate::{EntityKey, Error, Result};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Wire marker for reference-valued fields: `{"__ref": "User:1"}`.
pub const REF_FIELD: &str = "__ref";

/// A single field value.
///
/// Objects that carry their own identity are never stored inline; they are
/// normalized into their own record and linked with [`FieldValue::Reference`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Any JSON value other than an object or array.
    Scalar(Value),
    /// A link to another record in the same store.
    Reference(EntityKey),
    /// An ordered list of values.
    List(Vec<FieldValue>),
    /// An object without identity, stored inline.
    Object(BTreeMap<String, FieldValue>),
}

impl FieldValue {
    /// Wraps a scalar JSON value.
    pub fn scalar(value: impl Into<Value>) -> Self {
        Self::Scalar(value.into())
    }

    /// Wraps a reference.
    #[must_use]
    pub fn reference(key: EntityKey) -> Self {
        Self::Reference(key)
    }

    /// Returns the referenced key if this is a reference.
    #[must_use]
    pub fn as_reference(&self) -> Option<&EntityKey> {
        match self {
            Self::Reference(key) => Some(key),
            _ => None,
        }
    }

    /// Returns the scalar JSON value if this is a scalar.
    #[must_use]
    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Self::Scalar(v) => Some(v),
            _ => None,
        }
    }

    /// Collects every key referenced by this value, including nested ones.
    pub fn collect_references<'a>(&'a self, out: &mut Vec<&'a EntityKey>) {
        match self {
            Self::Scalar(_) => {}
            Self::Reference(key) => out.push(key),
            Self::List(items) => items.iter().for_each(|item| item.collect_references(out)),
            Self::Object(fields) => fields.values().for_each(|v| v.collect_references(out)),
        }
    }

    /// Converts to the transport JSON shape.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Scalar(v) => v.clone(),
            Self::Reference(key) => {
                let mut map = serde_json::Map::new();
                map.insert(REF_FIELD.to_string(), Value::String(key.to_string()));
                Value::Object(map)
            }
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    /// Parses the transport JSON shape.
    ///
    /// An object whose only member is a string `__ref` becomes a reference.
    pub fn from_json(value: Value) -> Result<Self> {
        match value {
            Value::Array(items) => items
                .into_iter()
                .map(Self::from_json)
                .collect::<Result<Vec<_>>>()
                .map(Self::List),
            Value::Object(map) => {
                if map.len() == 1 {
                    if let Some(r) = map.get(REF_FIELD) {
                        let s = r.as_str().ok_or_else(|| {
                            Error::InvalidField(format!("{REF_FIELD} must be a string"))
                        })?;
                        return Ok(Self::Reference(EntityKey::parse(s)?));
                    }
                }
                map.into_iter()
                    .map(|(k, v)| Self::from_json(v).map(|fv| (k, fv)))
                    .collect::<Result<BTreeMap<_, _>>>()
                    .map(Self::Object)
            }
            scalar => Ok(Self::Scalar(scalar)),
        }
    }
}

impl From<EntityKey> for FieldValue {
    fn from(key: EntityKey) -> Self {
        Self::Reference(key)
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Scalar(v) => v.serialize(serializer),
            Self::Reference(key) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(REF_FIELD, &key.to_string())?;
                map.end()
            }
            Self::List(items) => serializer.collect_seq(items),
            Self::Object(fields) => serializer.collect_map(fields),
        }
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_json(value).map_err(serde::de::Error::custom)
    }
}
