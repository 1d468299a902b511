//! Authentication error types.

use thiserror::Error;

/// Result type for authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// Errors that can occur while resolving sessions or switching views.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The identity provider reported a failure.
    #[error("identity provider error: {0}")]
    Provider(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A view transition named an unknown target.
    #[error("invalid transition target: {0:?}")]
    InvalidTransition(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
