//! Error types for query execution.

use incridea_cache::CacheError;
use std::time::Duration;
use thiserror::Error;

/// Result type for query operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Errors that can occur while executing a query.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Transport failure.
    #[error("network error: {0}")]
    Network(String),

    /// HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The transport did not answer in time.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The server answered with GraphQL errors.
    #[error("GraphQL errors: {}", .0.join("; "))]
    GraphQl(Vec<String>),

    /// The result could not be normalized or merged.
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The owning view was torn down before the result arrived.
    #[error("query cancelled: owning view was torn down")]
    Cancelled,
}

impl QueryError {
    /// Returns true for transport-level failures the user may retry.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            QueryError::Network(_)
                | QueryError::Http(_)
                | QueryError::Timeout(_)
                | QueryError::GraphQl(_)
        )
    }
}
