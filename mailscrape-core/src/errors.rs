//! Error types for the scrape pipeline

use crate::delivery::DeliveryError;
use crate::provider::ProviderError;
use thiserror::Error;

/// Result type for pipeline operations
pub type ScrapeResult<T> = Result<T, ScrapeError>;

/// Errors that can end a scrape request
///
/// Every failure from the resolver and collector is translated into one of
/// these variants at the orchestrator boundary. Two of them are soft: the
/// request stops, but nothing actually went wrong.
#[derive(Error, Debug)]
pub enum ScrapeError {
    /// Command had no channel reference or no usable limit
    #[error("Missing arguments: expected a channel reference and a positive limit")]
    MissingArguments,

    /// Numeric chat ID is unknown to the scraping account
    #[error("Invalid chat id: {0}")]
    InvalidChatId(String),

    /// Private invite token is expired or malformed
    #[error("Invalid invite: {0}")]
    InvalidInvite(String),

    /// Public handle could not be found
    #[error("Unknown username: {0}")]
    UnknownUsername(String),

    /// Limit was zero or negative
    #[error("Invalid limit: {0}")]
    InvalidLimit(i64),

    /// A join request was sent and awaits approval
    #[error("Join request pending approval for {0}")]
    JoinRequestPending(String),

    /// The scanned history contained no credentials
    #[error("No credentials found in {0}")]
    NoMatchesFound(String),

    /// The messaging provider failed mid-request
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The transient artifact could not be written
    #[error("Failed to write artifact: {0}")]
    ArtifactWrite(String),

    /// The delivery sink rejected the file
    #[error("Delivery failed: {0}")]
    DeliveryFailed(#[from] DeliveryError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ScrapeError {
    /// Soft-terminal outcomes stop the request without being failures
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            ScrapeError::JoinRequestPending(_) | ScrapeError::NoMatchesFound(_)
        )
    }

    /// Short machine-friendly name, used as a metrics label and in logs
    pub fn kind(&self) -> &'static str {
        match self {
            ScrapeError::MissingArguments => "missing_arguments",
            ScrapeError::InvalidChatId(_) => "invalid_chat_id",
            ScrapeError::InvalidInvite(_) => "invalid_invite",
            ScrapeError::UnknownUsername(_) => "unknown_username",
            ScrapeError::InvalidLimit(_) => "invalid_limit",
            ScrapeError::JoinRequestPending(_) => "join_request_pending",
            ScrapeError::NoMatchesFound(_) => "no_matches_found",
            ScrapeError::UpstreamUnavailable(_) => "upstream_unavailable",
            ScrapeError::ArtifactWrite(_) => "artifact_write",
            ScrapeError::DeliveryFailed(_) => "delivery_failed",
            ScrapeError::Config(_) => "config",
        }
    }

    /// The single status line shown to the requester
    pub fn user_message(&self) -> String {
        match self {
            ScrapeError::MissingArguments => {
                "Please provide a channel and an amount".to_string()
            }
            ScrapeError::InvalidChatId(_) => "Incorrect chat id".to_string(),
            ScrapeError::InvalidInvite(_) => "Incorrect invite link".to_string(),
            ScrapeError::UnknownUsername(_) => "Incorrect username".to_string(),
            ScrapeError::InvalidLimit(_) => "The amount must be a positive number".to_string(),
            ScrapeError::JoinRequestPending(_) => {
                "Join request sent, try again once it is approved".to_string()
            }
            ScrapeError::NoMatchesFound(_) => "No mail:pass combinations found".to_string(),
            ScrapeError::UpstreamUnavailable(_) => {
                "Telegram is not responding, try again later".to_string()
            }
            ScrapeError::ArtifactWrite(_) | ScrapeError::DeliveryFailed(_) => {
                "Could not send the result file".to_string()
            }
            ScrapeError::Config(_) => "The scraper is misconfigured".to_string(),
        }
    }

    /// Translate a provider failure that happened while resolving a reference
    ///
    /// Network failures stay `UpstreamUnavailable`; anything else becomes the
    /// lookup-specific error produced by `not_found`.
    pub(crate) fn from_lookup(
        err: ProviderError,
        not_found: impl FnOnce(String) -> ScrapeError,
    ) -> Self {
        match err {
            ProviderError::Unavailable(msg) => ScrapeError::UpstreamUnavailable(msg),
            ProviderError::NotConnected => {
                ScrapeError::UpstreamUnavailable("provider is not connected".to_string())
            }
            other => not_found(other.to_string()),
        }
    }
}

impl From<crate::config::ConfigError> for ScrapeError {
    fn from(e: crate::config::ConfigError) -> Self {
        ScrapeError::Config(e.to_string())
    }
}
