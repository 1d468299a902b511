//! Core type definitions for the Incridea client cache.
//!
//! This crate defines the fundamental types shared by the cache, query and
//! server crates:
//! - [`EntityKey`] addressing one logical record (`Typename:id`)
//! - [`FieldValue`] scalars, references, lists and embedded objects
//! - [`NormalizedRecord`] the flat field map stored per key
//!
//! Query execution, hydration and session handling live in their own crates.

mod key;
mod record;
mod value;

pub use key::{EntityKey, ROOT_QUERY};
pub use record::{NormalizedRecord, TYPENAME_FIELD};
pub use value::{FieldValue, REF_FIELD};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid entity key: {0}")]
    InvalidKey(String),

    #[error("invalid field value: {0}")]
    InvalidField(String),
}
