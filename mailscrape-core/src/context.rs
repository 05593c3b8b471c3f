//! Shared, immutable state for all requests
//!
//! `ScrapeContext` owns the provider connection. It is built once, wrapped in
//! an `Arc`, and handed to every request task.

use crate::collector::BoundedCollector;
use crate::config::Config;
use crate::delivery::ArtifactWriter;
use crate::errors::{ScrapeError, ScrapeResult};
use crate::provider::MessagingProvider;
use crate::resolver::MembershipResolver;
use std::sync::Arc;
use tracing::info;

pub struct ScrapeContext {
    config: Config,
    provider: Arc<dyn MessagingProvider>,
    resolver: MembershipResolver,
    collector: BoundedCollector,
    artifacts: ArtifactWriter,
}

impl ScrapeContext {
    /// Validate `config`, connect `provider` and wire up the pipeline stages
    pub async fn start(config: Config, provider: Arc<dyn MessagingProvider>) -> ScrapeResult<Self> {
        config.validate()?;
        provider.connect().await.map_err(|e| {
            ScrapeError::from_lookup(e, ScrapeError::UpstreamUnavailable)
        })?;

        let resolver = MembershipResolver::new(provider.clone());
        let collector = BoundedCollector::new(provider.clone())
            .with_deadline(config.scrape.scan_deadline())
            .with_max_limit(config.scrape.max_limit);
        let artifacts = ArtifactWriter::new(
            config.scrape.output_dir.clone(),
            config.scrape.artifact_encoding,
        );

        info!(
            output_dir = %config.scrape.output_dir.display(),
            max_limit = config.scrape.max_limit,
            "Scrape context started"
        );

        Ok(Self {
            config,
            provider,
            resolver,
            collector,
            artifacts,
        })
    }

    /// Disconnect the provider
    pub async fn shutdown(&self) -> ScrapeResult<()> {
        info!("Scrape context shutting down");
        self.provider
            .disconnect()
            .await
            .map_err(|e| ScrapeError::from_lookup(e, ScrapeError::UpstreamUnavailable))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn provider(&self) -> &Arc<dyn MessagingProvider> {
        &self.provider
    }

    pub fn resolver(&self) -> &MembershipResolver {
        &self.resolver
    }

    pub fn collector(&self) -> &BoundedCollector {
        &self.collector
    }

    pub fn artifacts(&self) -> &ArtifactWriter {
        &self.artifacts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::InMemoryProvider;

    #[tokio::test]
    async fn test_start_connects_and_shutdown_disconnects() {
        let provider = Arc::new(InMemoryProvider::new().requiring_connect());
        let ctx = ScrapeContext::start(Config::default(), provider.clone())
            .await
            .unwrap();
        assert!(provider.is_connected());

        ctx.shutdown().await.unwrap();
        assert!(!provider.is_connected());
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_config() {
        let mut config = Config::default();
        config.scrape.max_limit = 0;
        let result = ScrapeContext::start(config, Arc::new(InMemoryProvider::new())).await;
        assert!(matches!(result, Err(ScrapeError::Config(_))));
    }
}
