//! Bounded Collector
//!
//! Streams a channel's history newest-first, runs every message through the
//! extractor and stops once enough unique credentials are in hand or the
//! history runs out.
//!
//! Deduplication happens once, over the whole raw list, after the scan. That
//! way `duplicates_removed` counts every repeated occurrence in the scanned
//! window. First-seen order is kept so truncation to `limit` is
//! deterministic.

use crate::errors::{ScrapeError, ScrapeResult};
use crate::extract::{extract, Credential};
use crate::metrics::{self, Timer};
use crate::provider::MessagingProvider;
use crate::resolver::ResolvedChannel;
use futures::StreamExt;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Outcome of one history scan
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CollectionResult {
    /// Unique credentials in first-seen order, at most `limit` of them
    pub credentials: Vec<Credential>,
    /// Raw matches minus unique matches over the scanned window
    pub duplicates_removed: usize,
    /// The history stream ended before the limit was reached
    pub exhausted: bool,
    /// Messages pulled from the stream
    pub scanned_messages: usize,
    /// The scan deadline cut the stream short
    pub deadline_hit: bool,
}

impl CollectionResult {
    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}

/// Collapse duplicates, keeping each credential's first occurrence
pub fn dedup_first_seen(raw: Vec<Credential>) -> Vec<Credential> {
    let mut seen = HashSet::with_capacity(raw.len());
    raw.into_iter()
        .filter(|c| seen.insert(c.clone()))
        .collect()
}

/// Streams history under a hard bound on unique results
pub struct BoundedCollector {
    provider: Arc<dyn MessagingProvider>,
    scan_deadline: Option<Duration>,
    max_limit: usize,
}

impl BoundedCollector {
    pub fn new(provider: Arc<dyn MessagingProvider>) -> Self {
        Self {
            provider,
            scan_deadline: None,
            max_limit: usize::MAX,
        }
    }

    /// Stop scanning after `deadline` and return what was found
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.scan_deadline = deadline;
        self
    }

    /// Clamp requested limits to `max_limit`
    pub fn with_max_limit(mut self, max_limit: usize) -> Self {
        self.max_limit = max_limit;
        self
    }

    /// Collect up to `limit` unique credentials from `channel`
    ///
    /// # Errors
    ///
    /// - `InvalidLimit` if `limit <= 0`; no stream is opened
    /// - `UpstreamUnavailable` if the history stream fails
    pub async fn collect(
        &self,
        channel: &ResolvedChannel,
        limit: i64,
    ) -> ScrapeResult<CollectionResult> {
        if limit <= 0 {
            return Err(ScrapeError::InvalidLimit(limit));
        }
        let requested = usize::try_from(limit).unwrap_or(usize::MAX);
        let limit = requested.min(self.max_limit);
        if limit < requested {
            warn!(requested, max = self.max_limit, "Limit clamped to configured maximum");
        }

        info!(channel_id = %channel.id, limit, "Collecting credentials");
        let timer = Timer::new(metrics::COLLECT_DURATION_MS);
        let deadline = self
            .scan_deadline
            .map(|d| tokio::time::Instant::now() + d);

        let mut stream = self.provider.stream_history(channel.id);
        let mut raw: Vec<Credential> = Vec::new();
        let mut running_unique: HashSet<Credential> = HashSet::new();
        let mut scanned_messages = 0usize;
        let mut exhausted = false;
        let mut deadline_hit = false;

        loop {
            let next = match deadline {
                Some(at) => match tokio::time::timeout_at(at, stream.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        warn!(
                            channel_id = %channel.id,
                            scanned_messages,
                            found = running_unique.len(),
                            "Scan deadline reached, returning partial result"
                        );
                        deadline_hit = true;
                        break;
                    }
                },
                None => stream.next().await,
            };

            let Some(item) = next else {
                exhausted = true;
                break;
            };

            let message = item.map_err(|e| {
                warn!(channel_id = %channel.id, error = %e, "History stream failed");
                ScrapeError::from_lookup(e, ScrapeError::UpstreamUnavailable)
            })?;
            scanned_messages += 1;

            let found = extract(message.text.as_deref());
            if !found.is_empty() {
                trace!(count = found.len(), "Credentials found in message");
            }
            for credential in found {
                running_unique.insert(credential.clone());
                raw.push(credential);
            }

            if running_unique.len() >= limit {
                debug!(limit, scanned_messages, "Limit reached, stopping scan");
                break;
            }
        }
        drop(stream);
        timer.stop();

        let total = raw.len();
        let mut credentials = dedup_first_seen(raw);
        let duplicates_removed = total - credentials.len();
        credentials.truncate(limit);

        metrics::record_counter(metrics::MESSAGES_SCANNED, scanned_messages as u64);
        metrics::record_counter(metrics::DUPLICATES_REMOVED, duplicates_removed as u64);

        info!(
            channel_id = %channel.id,
            total,
            unique = credentials.len(),
            duplicates_removed,
            exhausted,
            "Collection finished"
        );

        Ok(CollectionResult {
            credentials,
            duplicates_removed,
            exhausted,
            scanned_messages,
            deadline_hit,
        })
    }
}
