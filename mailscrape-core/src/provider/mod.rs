//! MessagingProvider Trait - Abstraction over the messaging account
//!
//! The resolver and collector never talk to Telegram directly. They go
//! through this trait, which keeps the pipeline testable and lets each
//! backend map its native errors into one closed set.
//!
//! # Architecture
//!
//! ```text
//! MembershipResolver   BoundedCollector
//!          \               /
//!           v             v
//!        MessagingProvider (trait)
//!                 |
//!                 +---> InMemoryProvider (tests, fixtures)
//!                 |
//!                 +---> FixtureProvider (JSON export loader)
//! ```

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::fmt;

mod error;
pub mod fixture;
pub mod memory;

pub use error::{ProviderError, ProviderResult};
pub use fixture::FixtureProvider;
pub use memory::InMemoryProvider;

/// Opaque chat identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub i64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Channel metadata returned by lookups
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMetadata {
    /// Chat identifier
    pub id: ChannelId,
    /// Human-readable title
    pub title: String,
    /// Public username, if the channel has one
    pub username: Option<String>,
}

/// Result of a join attempt through an invite
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinResult {
    /// Joined now; the channel is queryable
    Joined(ChannelId),
    /// The account was already a participant
    AlreadyMember,
    /// The invite needs admin approval; a request was filed
    PendingApproval,
}

/// One message of channel history
///
/// Serialized as its text, or `null` when there is none.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub struct HistoryMessage {
    /// Text body; service messages and bare media have none
    pub text: Option<String>,
}

impl From<Option<String>> for HistoryMessage {
    fn from(text: Option<String>) -> Self {
        Self { text }
    }
}

impl From<HistoryMessage> for Option<String> {
    fn from(message: HistoryMessage) -> Self {
        message.text
    }
}

impl HistoryMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }

    pub fn empty() -> Self {
        Self { text: None }
    }
}

/// Lazy newest-first history stream
///
/// Consumers may drop it at any point; implementations must release their
/// cursor when that happens.
pub type HistoryStream = BoxStream<'static, ProviderResult<HistoryMessage>>;

/// Abstraction over the messaging account used for scraping
#[async_trait]
pub trait MessagingProvider: Send + Sync {
    /// Open the underlying connection
    async fn connect(&self) -> ProviderResult<()> {
        Ok(())
    }

    /// Close the underlying connection
    async fn disconnect(&self) -> ProviderResult<()> {
        Ok(())
    }

    /// Fetch metadata for a chat the account can already see
    async fn get_channel_by_id(&self, id: i64) -> ProviderResult<ChannelMetadata>;

    /// Fetch metadata for a public handle (matched case-insensitively)
    async fn get_channel_by_handle(&self, handle: &str) -> ProviderResult<ChannelMetadata>;

    /// Fetch metadata using a private invite token as the key
    async fn get_channel_by_invite(&self, token: &str) -> ProviderResult<ChannelMetadata>;

    /// Join through a private invite token
    ///
    /// # Errors
    ///
    /// `ProviderError::InvalidOrExpiredInvite` when the token is unusable.
    async fn join_channel(&self, token: &str) -> ProviderResult<JoinResult>;

    /// Stream history newest-first
    ///
    /// Access errors surface as the first stream item.
    fn stream_history(&self, channel: ChannelId) -> HistoryStream;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_id_display() {
        assert_eq!(ChannelId(-100123).to_string(), "-100123");
    }

    #[test]
    fn test_history_message_constructors() {
        assert_eq!(HistoryMessage::text("hi").text.as_deref(), Some("hi"));
        assert!(HistoryMessage::empty().text.is_none());
    }
}
