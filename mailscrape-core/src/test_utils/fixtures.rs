//! Channel fixtures for pipeline tests
//!
//! `MemoryChannel` stores messages oldest first. The builders here take
//! messages in the order the collector will see them (newest first) and
//! reverse them, which keeps scenario tables readable.

use crate::config::Config;
use crate::context::ScrapeContext;
use crate::delivery::DeliverySink;
use crate::orchestrator::RequestOrchestrator;
use crate::provider::memory::{InMemoryProvider, MemoryChannel};
use std::path::Path;
use std::sync::Arc;

/// Credential string `u<n>@mail.test:pw<n>`
pub fn credential(n: usize) -> String {
    format!("u{}@mail.test:pw{}", n, n)
}

/// Builder for a channel's history, written newest first
#[derive(Debug, Default)]
pub struct HistoryBuilder {
    newest_first: Vec<Option<String>>,
}

impl HistoryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.newest_first.push(Some(text.into()));
        self
    }

    /// A message without text, such as a photo or sticker
    pub fn media(mut self) -> Self {
        self.newest_first.push(None);
        self
    }

    /// One message per credential index
    pub fn credentials(mut self, range: impl IntoIterator<Item = usize>) -> Self {
        self.newest_first
            .extend(range.into_iter().map(|n| Some(credential(n))));
        self
    }

    pub fn build_into(self, channel: MemoryChannel) -> MemoryChannel {
        let mut chronological = self.newest_first;
        chronological.reverse();
        channel.with_messages(chronological)
    }
}

/// Public channel whose history streams as
/// - `u0..u9`
/// - five repeats of `u0..u4`
/// - `u10..u49`
/// - five messages each holding a new `u50..u54` and a repeat
///
/// 60 messages, 55 distinct credentials, 10 repeated occurrences. A request
/// for 50 stops after `u49` having seen 5 repeats.
pub fn scenario_a_channel() -> MemoryChannel {
    let mut history = HistoryBuilder::new()
        .credentials(0..10)
        .credentials(0..5)
        .credentials(10..50);
    for n in 50..55 {
        history = history.text(format!("{} {}", credential(n), credential(n - 50)));
    }
    history.build_into(MemoryChannel::public(-1001, "Combo Dumps", "combodumps"))
}

/// Provider, orchestrator and output directory wired together for a test
pub async fn test_orchestrator(
    channels: Vec<MemoryChannel>,
    sink: Arc<dyn DeliverySink>,
    output_dir: &Path,
) -> (RequestOrchestrator, Arc<InMemoryProvider>) {
    let mut config = Config::default();
    config.scrape.output_dir = output_dir.to_path_buf();
    test_orchestrator_with_config(config, channels, sink).await
}

pub async fn test_orchestrator_with_config(
    config: Config,
    channels: Vec<MemoryChannel>,
    sink: Arc<dyn DeliverySink>,
) -> (RequestOrchestrator, Arc<InMemoryProvider>) {
    let provider = Arc::new(InMemoryProvider::from_channels(channels));
    let ctx = ScrapeContext::start(config, provider.clone())
        .await
        .expect("test context should start");
    (RequestOrchestrator::new(Arc::new(ctx), sink), provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_builder_reverses() {
        let channel = HistoryBuilder::new()
            .text("newest")
            .media()
            .text("oldest")
            .build_into(MemoryChannel::private(1, "t"));
        assert_eq!(channel.messages.first().and_then(|m| m.text.as_deref()), Some("oldest"));
        assert_eq!(channel.messages.last().and_then(|m| m.text.as_deref()), Some("newest"));
    }

    #[test]
    fn test_scenario_a_shape() {
        assert_eq!(scenario_a_channel().messages.len(), 60);
    }
}
