//! JSON fixture provider
//!
//! Serves an account snapshot stored on disk. The file is read on
//! `connect`, so the fixture plays the role of a session: nothing is
//! reachable before connecting, and `disconnect` closes it again.
//!
//! ```json
//! {
//!   "channels": [
//!     {
//!       "id": -1001234567890,
//!       "title": "Combo Drops",
//!       "username": "combo_drops",
//!       "member": false,
//!       "invite": { "token": "ZBqGFP5evRpmY2Y1", "policy": "open" },
//!       "messages": ["oldest text", null, "newest text"]
//!     }
//!   ]
//! }
//! ```

use super::memory::{InMemoryProvider, MemoryChannel};
use super::{
    ChannelId, ChannelMetadata, HistoryStream, JoinResult, MessagingProvider, ProviderError,
    ProviderResult,
};
use crate::config::ConfigError;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize)]
struct FixtureFile {
    #[serde(default)]
    channels: Vec<MemoryChannel>,
}

/// Parse and validate fixture JSON
pub fn parse_fixture(contents: &str) -> Result<Vec<MemoryChannel>, ConfigError> {
    let file: FixtureFile =
        serde_json::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

    let mut ids = HashSet::new();
    let mut tokens = HashSet::new();
    for channel in &file.channels {
        if !ids.insert(channel.id) {
            return Err(ConfigError::ValidationFailed(format!(
                "duplicate channel id {}",
                channel.id
            )));
        }
        if let Some(invite) = &channel.invite {
            if !tokens.insert(invite.token.clone()) {
                return Err(ConfigError::ValidationFailed(format!(
                    "invite token {} used by more than one channel",
                    invite.token
                )));
            }
        }
    }

    Ok(file.channels)
}

/// Provider backed by a JSON account snapshot
pub struct FixtureProvider {
    path: PathBuf,
    inner: InMemoryProvider,
}

impl FixtureProvider {
    /// Create a provider for the fixture at `path`; nothing is read yet
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            inner: InMemoryProvider::new().requiring_connect(),
        }
    }
}

#[async_trait]
impl MessagingProvider for FixtureProvider {
    async fn connect(&self) -> ProviderResult<()> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| ProviderError::Unavailable(format!("{}: {}", self.path.display(), e)))?;
        let channels = parse_fixture(&contents)
            .map_err(|e| ProviderError::Unavailable(format!("{}: {}", self.path.display(), e)))?;

        let count = channels.len();
        for channel in channels {
            self.inner.add_channel(channel).await;
        }
        self.inner.connect().await?;

        info!(path = %self.path.display(), channels = count, "Fixture account connected");
        Ok(())
    }

    async fn disconnect(&self) -> ProviderResult<()> {
        info!(path = %self.path.display(), "Fixture account disconnected");
        self.inner.disconnect().await
    }

    async fn get_channel_by_id(&self, id: i64) -> ProviderResult<ChannelMetadata> {
        self.inner.get_channel_by_id(id).await
    }

    async fn get_channel_by_handle(&self, handle: &str) -> ProviderResult<ChannelMetadata> {
        self.inner.get_channel_by_handle(handle).await
    }

    async fn get_channel_by_invite(&self, token: &str) -> ProviderResult<ChannelMetadata> {
        self.inner.get_channel_by_invite(token).await
    }

    async fn join_channel(&self, token: &str) -> ProviderResult<JoinResult> {
        self.inner.join_channel(token).await
    }

    fn stream_history(&self, channel: ChannelId) -> HistoryStream {
        self.inner.stream_history(channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::memory::InvitePolicy;
    use futures::TryStreamExt;
    use std::io::Write;

    const FIXTURE: &str = r#"{
        "channels": [
            {
                "id": -1001,
                "title": "Drops",
                "username": "drops",
                "messages": ["a@b.co:1", null, "c@d.io:2"]
            },
            {
                "id": -1002,
                "title": "Vault",
                "invite": { "token": "tok", "policy": "approval" }
            }
        ]
    }"#;

    #[test]
    fn test_parse_fixture() {
        let channels = parse_fixture(FIXTURE).unwrap();
        assert_eq!(channels.len(), 2);
        assert_eq!(channels[0].messages.len(), 3);
        assert!(channels[0].messages[1].text.is_none());
        assert!(!channels[1].member);
        assert_eq!(
            channels[1].invite.as_ref().map(|i| i.policy),
            Some(InvitePolicy::Approval)
        );
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let json = r#"{"channels":[{"id":1,"title":"a"},{"id":1,"title":"b"}]}"#;
        assert!(matches!(
            parse_fixture(json),
            Err(ConfigError::ValidationFailed(_))
        ));
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(matches!(
            parse_fixture("{ not json"),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_loads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FIXTURE.as_bytes()).unwrap();

        let provider = FixtureProvider::new(file.path());
        assert_eq!(
            provider.get_channel_by_handle("drops").await,
            Err(ProviderError::NotConnected)
        );

        provider.connect().await.unwrap();
        let meta = provider.get_channel_by_handle("DROPS").await.unwrap();
        assert_eq!(meta.title, "Drops");

        let history: Vec<_> = provider
            .stream_history(meta.id)
            .try_collect()
            .await
            .unwrap();
        assert_eq!(history[0].text.as_deref(), Some("c@d.io:2"));

        provider.disconnect().await.unwrap();
        assert!(!provider.inner.is_connected());
    }

    #[tokio::test]
    async fn test_connect_missing_file() {
        let provider = FixtureProvider::new("/definitely/not/here.json");
        assert!(matches!(
            provider.connect().await,
            Err(ProviderError::Unavailable(_))
        ));
    }
}
