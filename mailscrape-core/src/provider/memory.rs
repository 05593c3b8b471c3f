//! In-memory MessagingProvider
//!
//! Holds channels, invites and history in process memory. Tests use it as a
//! fake account; `FixtureProvider` fills it from a JSON file. It counts join
//! and history calls and tracks open history cursors, so callers can check
//! that a stream was released after an early exit.

use super::{
    ChannelId, ChannelMetadata, HistoryMessage, HistoryStream, JoinResult, MessagingProvider,
    ProviderError, ProviderResult,
};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// How a channel's invite link behaves when used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitePolicy {
    /// Anyone with the link joins at once
    Open,
    /// Joining files a request that an admin must approve
    Approval,
    /// The link was revoked or expired
    Expired,
}

/// Invite link attached to a channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryInvite {
    pub token: String,
    pub policy: InvitePolicy,
}

/// A channel as seen by the fake account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryChannel {
    pub id: ChannelId,
    pub title: String,
    #[serde(default)]
    pub username: Option<String>,
    /// Whether the account is already a participant
    #[serde(default)]
    pub member: bool,
    #[serde(default)]
    pub invite: Option<MemoryInvite>,
    /// Chronological order, oldest first
    #[serde(default)]
    pub messages: Vec<HistoryMessage>,
}

impl MemoryChannel {
    /// Public channel readable through its username
    pub fn public(id: i64, title: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: ChannelId(id),
            title: title.into(),
            username: Some(username.into()),
            member: false,
            invite: None,
            messages: Vec::new(),
        }
    }

    /// Private channel with no username
    pub fn private(id: i64, title: impl Into<String>) -> Self {
        Self {
            id: ChannelId(id),
            title: title.into(),
            username: None,
            member: false,
            invite: None,
            messages: Vec::new(),
        }
    }

    pub fn member(mut self) -> Self {
        self.member = true;
        self
    }

    pub fn with_invite(mut self, token: impl Into<String>, policy: InvitePolicy) -> Self {
        self.invite = Some(MemoryInvite {
            token: token.into(),
            policy,
        });
        self
    }

    /// Append messages in chronological order
    pub fn with_messages<I, S>(mut self, texts: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        self.messages.extend(texts.into_iter().map(|t| HistoryMessage {
            text: t.map(Into::into),
        }));
        self
    }

    fn metadata(&self) -> ChannelMetadata {
        ChannelMetadata {
            id: self.id,
            title: self.title.clone(),
            username: self.username.clone(),
        }
    }

    fn readable(&self) -> bool {
        self.member || self.username.is_some()
    }

    fn invite_token_matches(&self, token: &str) -> bool {
        self.invite.as_ref().is_some_and(|i| i.token == token)
    }
}

/// Decrements the open-cursor count when a history stream is dropped
struct CursorGuard(Arc<AtomicUsize>);

impl Drop for CursorGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// In-memory provider for tests and fixtures
pub struct InMemoryProvider {
    channels: Arc<RwLock<HashMap<ChannelId, MemoryChannel>>>,
    pending_requests: RwLock<Vec<String>>,
    require_connect: bool,
    connected: AtomicBool,
    fail_history_after: Option<usize>,
    join_calls: AtomicUsize,
    history_calls: AtomicUsize,
    messages_pulled: Arc<AtomicUsize>,
    open_cursors: Arc<AtomicUsize>,
}

impl InMemoryProvider {
    /// Create an empty provider
    pub fn new() -> Self {
        Self::from_channels(Vec::new())
    }

    /// Create a provider that already knows `channels`
    pub fn from_channels(channels: Vec<MemoryChannel>) -> Self {
        let map = channels.into_iter().map(|c| (c.id, c)).collect();
        Self {
            channels: Arc::new(RwLock::new(map)),
            pending_requests: RwLock::new(Vec::new()),
            require_connect: false,
            connected: AtomicBool::new(false),
            fail_history_after: None,
            join_calls: AtomicUsize::new(0),
            history_calls: AtomicUsize::new(0),
            messages_pulled: Arc::new(AtomicUsize::new(0)),
            open_cursors: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Reject every call until `connect` has been awaited
    pub fn requiring_connect(mut self) -> Self {
        self.require_connect = true;
        self
    }

    /// Make history streams fail with `Unavailable` after `n` messages
    pub fn failing_history_after(mut self, n: usize) -> Self {
        self.fail_history_after = Some(n);
        self
    }

    /// Add or replace a channel
    pub async fn add_channel(&self, channel: MemoryChannel) {
        self.channels.write().await.insert(channel.id, channel);
    }

    pub fn join_calls(&self) -> usize {
        self.join_calls.load(Ordering::SeqCst)
    }

    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }

    /// Messages handed out across all history streams
    pub fn messages_pulled(&self) -> usize {
        self.messages_pulled.load(Ordering::SeqCst)
    }

    /// History streams created and not yet dropped
    pub fn open_cursors(&self) -> usize {
        self.open_cursors.load(Ordering::SeqCst)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Invite tokens for which a join request was filed
    pub async fn pending_requests(&self) -> Vec<String> {
        self.pending_requests.read().await.clone()
    }

    fn ensure_connected(&self) -> ProviderResult<()> {
        if self.require_connect && !self.is_connected() {
            return Err(ProviderError::NotConnected);
        }
        Ok(())
    }
}

impl Default for InMemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessagingProvider for InMemoryProvider {
    async fn connect(&self) -> ProviderResult<()> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> ProviderResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn get_channel_by_id(&self, id: i64) -> ProviderResult<ChannelMetadata> {
        self.ensure_connected()?;
        let channels = self.channels.read().await;
        channels
            .get(&ChannelId(id))
            .filter(|c| c.member)
            .map(MemoryChannel::metadata)
            .ok_or_else(|| ProviderError::NotFound(format!("chat {}", id)))
    }

    async fn get_channel_by_handle(&self, handle: &str) -> ProviderResult<ChannelMetadata> {
        self.ensure_connected()?;
        let channels = self.channels.read().await;
        channels
            .values()
            .find(|c| {
                c.username
                    .as_deref()
                    .is_some_and(|u| u.eq_ignore_ascii_case(handle))
            })
            .map(MemoryChannel::metadata)
            .ok_or_else(|| ProviderError::NotFound(format!("@{}", handle)))
    }

    async fn get_channel_by_invite(&self, token: &str) -> ProviderResult<ChannelMetadata> {
        self.ensure_connected()?;
        let channels = self.channels.read().await;
        match channels.values().find(|c| c.invite_token_matches(token)) {
            Some(c) if c.invite.as_ref().map(|i| i.policy) == Some(InvitePolicy::Expired) => {
                Err(ProviderError::InvalidOrExpiredInvite(token.to_string()))
            }
            Some(c) => Ok(c.metadata()),
            None => Err(ProviderError::InvalidOrExpiredInvite(token.to_string())),
        }
    }

    async fn join_channel(&self, token: &str) -> ProviderResult<JoinResult> {
        self.ensure_connected()?;
        self.join_calls.fetch_add(1, Ordering::SeqCst);

        let mut channels = self.channels.write().await;
        let channel = channels
            .values_mut()
            .find(|c| c.invite_token_matches(token))
            .ok_or_else(|| ProviderError::InvalidOrExpiredInvite(token.to_string()))?;

        if channel.member {
            return Ok(JoinResult::AlreadyMember);
        }

        match channel.invite.as_ref().map(|i| i.policy) {
            Some(InvitePolicy::Open) => {
                channel.member = true;
                debug!(channel_id = %channel.id, "Joined channel through invite");
                Ok(JoinResult::Joined(channel.id))
            }
            Some(InvitePolicy::Approval) => {
                drop(channels);
                self.pending_requests.write().await.push(token.to_string());
                Ok(JoinResult::PendingApproval)
            }
            Some(InvitePolicy::Expired) | None => {
                Err(ProviderError::InvalidOrExpiredInvite(token.to_string()))
            }
        }
    }

    fn stream_history(&self, channel: ChannelId) -> HistoryStream {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        self.open_cursors.fetch_add(1, Ordering::SeqCst);

        let guard = CursorGuard(Arc::clone(&self.open_cursors));
        let channels = Arc::clone(&self.channels);
        let pulled = Arc::clone(&self.messages_pulled);
        let connected = self.ensure_connected();
        let fail_after = self.fail_history_after;

        let page = async move {
            if let Err(e) = connected {
                return vec![Err(e)];
            }
            let channels = channels.read().await;
            let Some(found) = channels.get(&channel).filter(|c| c.readable()) else {
                return vec![Err(ProviderError::NotFound(format!("chat {}", channel)))];
            };

            let mut items: Vec<ProviderResult<HistoryMessage>> =
                found.messages.iter().rev().cloned().map(Ok).collect();
            if let Some(n) = fail_after {
                items.truncate(n);
                items.push(Err(ProviderError::Unavailable(
                    "history page request failed".to_string(),
                )));
            }
            items
        };

        stream::once(page)
            .flat_map(stream::iter)
            .map(move |item| {
                let _cursor = &guard;
                if item.is_ok() {
                    pulled.fetch_add(1, Ordering::SeqCst);
                }
                item
            })
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    fn sample() -> InMemoryProvider {
        InMemoryProvider::from_channels(vec![
            MemoryChannel::public(-1001, "Public", "PubChan")
                .with_messages([Some("old"), None, Some("new")]),
            MemoryChannel::private(-1002, "Open").with_invite("open-token", InvitePolicy::Open),
            MemoryChannel::private(-1003, "Gated")
                .with_invite("gated-token", InvitePolicy::Approval),
            MemoryChannel::private(-1004, "Gone").with_invite("dead-token", InvitePolicy::Expired),
        ])
    }

    #[tokio::test]
    async fn test_handle_lookup_is_case_insensitive() {
        let provider = sample();
        let meta = provider.get_channel_by_handle("pubchan").await.unwrap();
        assert_eq!(meta.id, ChannelId(-1001));
        assert_eq!(meta.username.as_deref(), Some("PubChan"));
    }

    #[tokio::test]
    async fn test_id_lookup_requires_membership() {
        let provider = sample();
        assert!(matches!(
            provider.get_channel_by_id(-1002).await,
            Err(ProviderError::NotFound(_))
        ));

        provider.join_channel("open-token").await.unwrap();
        assert_eq!(
            provider.get_channel_by_id(-1002).await.unwrap().title,
            "Open"
        );
    }

    #[tokio::test]
    async fn test_join_outcomes() {
        let provider = sample();

        assert_eq!(
            provider.join_channel("open-token").await.unwrap(),
            JoinResult::Joined(ChannelId(-1002))
        );
        assert_eq!(
            provider.join_channel("open-token").await.unwrap(),
            JoinResult::AlreadyMember
        );
        assert_eq!(
            provider.join_channel("gated-token").await.unwrap(),
            JoinResult::PendingApproval
        );
        assert!(matches!(
            provider.join_channel("dead-token").await,
            Err(ProviderError::InvalidOrExpiredInvite(_))
        ));
        assert!(matches!(
            provider.join_channel("nope").await,
            Err(ProviderError::InvalidOrExpiredInvite(_))
        ));

        assert_eq!(provider.join_calls(), 5);
        assert_eq!(provider.pending_requests().await, vec!["gated-token"]);
    }

    #[tokio::test]
    async fn test_history_is_newest_first() {
        let provider = sample();
        let messages: Vec<_> = provider
            .stream_history(ChannelId(-1001))
            .try_collect()
            .await
            .unwrap();

        assert_eq!(
            messages,
            vec![
                HistoryMessage::text("new"),
                HistoryMessage::empty(),
                HistoryMessage::text("old"),
            ]
        );
        assert_eq!(provider.open_cursors(), 0);
        assert_eq!(provider.messages_pulled(), 3);
    }

    #[tokio::test]
    async fn test_history_of_unjoined_private_channel() {
        let provider = sample();
        let first = provider.stream_history(ChannelId(-1002)).next().await;
        assert!(matches!(first, Some(Err(ProviderError::NotFound(_)))));
    }

    #[tokio::test]
    async fn test_dropping_stream_releases_cursor() {
        let provider = sample();
        let mut stream = provider.stream_history(ChannelId(-1001));
        assert_eq!(provider.open_cursors(), 1);
        let _ = stream.next().await;
        drop(stream);
        assert_eq!(provider.open_cursors(), 0);
        assert_eq!(provider.messages_pulled(), 1);
    }

    #[tokio::test]
    async fn test_requires_connect() {
        let provider = sample().requiring_connect();
        assert_eq!(
            provider.get_channel_by_handle("PubChan").await,
            Err(ProviderError::NotConnected)
        );

        provider.connect().await.unwrap();
        assert!(provider.get_channel_by_handle("PubChan").await.is_ok());

        provider.disconnect().await.unwrap();
        assert!(!provider.is_connected());
    }

    #[tokio::test]
    async fn test_injected_history_failure() {
        let provider = sample().failing_history_after(1);
        let items: Vec<_> = provider.stream_history(ChannelId(-1001)).collect().await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(items[1], Err(ProviderError::Unavailable(_))));
    }
}
