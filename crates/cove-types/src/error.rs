use thiserror::Error;

/// Errors surfaced by store operations and collaborator contracts.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Malformed or empty required input, detected before any network call
    #[error("validation failed: {0}")]
    Validation(String),

    /// Action forbidden for the acting user's role or ownership
    #[error("not allowed: {0}")]
    Authorization(String),

    /// Target entity no longer exists (usually a race with a concurrent delete)
    #[error("not found: {0}")]
    NotFound(String),

    /// The remote store or storage service failed or is unreachable
    #[error("transport failure: {0}")]
    Transport(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn authorization(msg: impl Into<String>) -> Self {
        Self::Authorization(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}
