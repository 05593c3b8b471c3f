//! Provider error types

use thiserror::Error;

/// Result type for provider calls
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Closed set every provider adapter maps its native errors into
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invite is invalid or expired: {0}")]
    InvalidOrExpiredInvite(String),

    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Provider is not connected")]
    NotConnected,
}
