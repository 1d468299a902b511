//! Error types for the cache layer.

use incridea_types::EntityKey;
use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors that can occur in cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// A write disagrees with the type tag already recorded for an identifier.
    #[error("type conflict for id {id}: recorded as {recorded}, write proposes {proposed}")]
    Conflict {
        id: String,
        recorded: String,
        proposed: String,
    },

    /// A reference points at a key that neither exists nor is part of the batch.
    #[error("dangling reference from {from} to {to}")]
    DanglingReference { from: EntityKey, to: EntityKey },

    /// A query result could not be normalized.
    #[error("normalization error: {0}")]
    Normalization(String),

    /// Invalid key or field value.
    #[error(transparent)]
    Types(#[from] incridea_types::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CacheError {
    /// Returns true for type-tag conflicts.
    pub fn is_conflict(&self) -> bool {
        matches!(self, CacheError::Conflict { .. })
    }
}
