//! Request Orchestrator
//!
//! Drives one request through
//! `Parsing → Resolving → (JoinPending | Collecting) → Delivering → Done`,
//! with `Aborted` reachable from every step. Each transition posts or edits
//! the request's status message; nothing is retried.
//!
//! Status calls are best-effort: a failed status edit is logged and the
//! request carries on. Only a failed file delivery aborts the request.

pub mod request;

pub use request::{RequestId, Requester, ScrapeRequest};

use crate::collector::CollectionResult;
use crate::context::ScrapeContext;
use crate::delivery::{DeliverySink, DeliverySummary};
use crate::errors::{ScrapeError, ScrapeResult};
use crate::metrics;
use crate::reference::ChannelReference;
use crate::resolver::{MembershipOutcome, ResolvedChannel};
use crate::spans::{collect, deliver, resolve};
use std::fmt;
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};

pub const STATUS_CHECKING: &str = "Checking channel...";
pub const STATUS_SCRAPING: &str = "Scraping in progress...";

/// Where a request is, or where it ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestState {
    Parsing,
    Resolving,
    /// Terminal: a join request awaits approval
    JoinPending,
    Collecting,
    Delivering,
    /// Terminal: the file was delivered
    Done,
    /// Terminal: holds the error kind that stopped the request
    Aborted(&'static str),
}

impl RequestState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestState::JoinPending | RequestState::Done | RequestState::Aborted(_)
        )
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestState::Parsing => f.write_str("parsing"),
            RequestState::Resolving => f.write_str("resolving"),
            RequestState::JoinPending => f.write_str("join_pending"),
            RequestState::Collecting => f.write_str("collecting"),
            RequestState::Delivering => f.write_str("delivering"),
            RequestState::Done => f.write_str("done"),
            RequestState::Aborted(reason) => write!(f, "aborted({})", reason),
        }
    }
}

/// Everything known about a finished request
#[derive(Debug)]
pub struct RequestReport {
    pub request_id: RequestId,
    pub state: RequestState,
    pub outcome: Option<MembershipOutcome>,
    pub collection: Option<CollectionResult>,
    pub delivery: Option<DeliverySummary>,
    /// Why the request stopped short of `Done`, if it did
    pub error: Option<ScrapeError>,
}

impl RequestReport {
    fn new(request_id: RequestId) -> Self {
        Self {
            request_id,
            state: RequestState::Parsing,
            outcome: None,
            collection: None,
            delivery: None,
            error: None,
        }
    }

    pub fn is_delivered(&self) -> bool {
        self.state == RequestState::Done
    }

    fn abort(&mut self, error: ScrapeError) {
        self.state = RequestState::Aborted(error.kind());
        self.error = Some(error);
    }
}

/// Validate the raw arguments: both present, limit a positive integer
fn parse_arguments(request: &ScrapeRequest) -> ScrapeResult<(String, i64)> {
    let reference = request
        .reference
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .ok_or(ScrapeError::MissingArguments)?;
    let limit = request
        .limit
        .as_deref()
        .and_then(|l| l.trim().parse::<i64>().ok())
        .filter(|l| *l > 0)
        .ok_or(ScrapeError::MissingArguments)?;
    Ok((reference.to_string(), limit))
}

/// Runs requests end to end against a shared context and sink
#[derive(Clone)]
pub struct RequestOrchestrator {
    ctx: Arc<ScrapeContext>,
    sink: Arc<dyn DeliverySink>,
}

impl RequestOrchestrator {
    pub fn new(ctx: Arc<ScrapeContext>, sink: Arc<dyn DeliverySink>) -> Self {
        Self { ctx, sink }
    }

    pub fn context(&self) -> &Arc<ScrapeContext> {
        &self.ctx
    }

    /// Run `request` to a terminal state
    ///
    /// Never fails: every error ends up in the report and, as text, in the
    /// request's status message.
    pub async fn handle(&self, request: ScrapeRequest) -> RequestReport {
        let request_id = request.id;
        metrics::record_counter(metrics::REQUESTS_TOTAL, 1);

        let span = info_span!("scrape_request", %request_id);
        let report = self.run(request).instrument(span).await;

        match &report.state {
            RequestState::Aborted(reason) => {
                metrics::record_abort(*reason);
                info!(%request_id, state = %report.state, "Request aborted");
            }
            state => info!(%request_id, %state, "Request finished"),
        }
        report
    }

    async fn run(&self, request: ScrapeRequest) -> RequestReport {
        let id = request.id;
        let mut report = RequestReport::new(id);

        // Parsing
        let (raw_reference, limit) = match parse_arguments(&request) {
            Ok(args) => args,
            Err(e) => {
                self.post_status(id, &e.user_message()).await;
                report.abort(e);
                return report;
            }
        };

        // Resolving
        report.state = RequestState::Resolving;
        self.post_status(id, STATUS_CHECKING).await;

        let channel = match self.resolve(id, &raw_reference).await {
            Ok((outcome, Some(channel))) => {
                report.outcome = Some(outcome);
                channel
            }
            Ok((outcome, None)) => {
                let pending = ScrapeError::JoinRequestPending(raw_reference);
                self.update_status(id, &pending.user_message()).await;
                report.outcome = Some(outcome);
                report.state = RequestState::JoinPending;
                report.error = Some(pending);
                return report;
            }
            Err(e) => {
                self.update_status(id, &e.user_message()).await;
                report.abort(e);
                return report;
            }
        };

        // Collecting
        report.state = RequestState::Collecting;
        self.update_status(id, STATUS_SCRAPING).await;

        let op = collect::trace_collect(id.as_uuid(), channel.id.0, limit as usize);
        let collected = op.run(self.ctx.collector().collect(&channel, limit)).await;
        op.complete();

        let collection = match collected {
            Ok(c) if c.is_empty() => {
                let e = ScrapeError::NoMatchesFound(channel.display_name.clone());
                self.update_status(id, &e.user_message()).await;
                report.collection = Some(c);
                report.abort(e);
                return report;
            }
            Ok(c) => c,
            Err(e) => {
                self.update_status(id, &e.user_message()).await;
                report.abort(e);
                return report;
            }
        };

        // Delivering
        report.state = RequestState::Delivering;
        let delivered = self
            .deliver(id, &channel, &collection, &request.requester)
            .await;
        report.collection = Some(collection);

        match delivered {
            Ok(summary) => {
                self.clear_status(id).await;
                metrics::record_counter(metrics::CREDENTIALS_COLLECTED, summary.amount as u64);
                report.delivery = Some(summary);
                report.state = RequestState::Done;
            }
            Err(e) => {
                self.update_status(id, &e.user_message()).await;
                report.abort(e);
            }
        }
        report
    }

    async fn resolve(
        &self,
        id: RequestId,
        raw_reference: &str,
    ) -> ScrapeResult<(MembershipOutcome, Option<ResolvedChannel>)> {
        let reference = ChannelReference::parse(raw_reference)?;
        let op = resolve::trace_resolve(id.as_uuid(), reference.kind());
        let resolution = op.run(self.ctx.resolver().resolve(&reference)).await;
        if let Err(e) = &resolution {
            op.record_error(&e.to_string());
        }
        op.complete();

        let resolution = resolution?;
        Ok((resolution.outcome, resolution.channel))
    }

    /// Write the artifact, hand it to the sink, then remove it regardless
    async fn deliver(
        &self,
        id: RequestId,
        channel: &ResolvedChannel,
        collection: &CollectionResult,
        requester: &Requester,
    ) -> ScrapeResult<DeliverySummary> {
        let writer = self.ctx.artifacts();
        let path = writer.path_for(channel.id, id);
        let op = deliver::trace_deliver(id.as_uuid(), collection.credentials.len());

        let result = op
            .run(async {
                let written = writer
                    .write(&path, &collection.credentials)
                    .await
                    .map_err(|e| ScrapeError::ArtifactWrite(e.to_string()))?;

                let summary = DeliverySummary {
                    source: channel.display_name.clone(),
                    amount: collection.credentials.len(),
                    duplicates_removed: collection.duplicates_removed,
                    requester: requester.clone(),
                    skipped_unencodable: written.skipped_unencodable,
                };
                self.sink.deliver_file(id, &path, &summary).await?;
                Ok::<_, ScrapeError>(summary)
            })
            .await;

        writer.remove(&path).await;
        if let Err(e) = &result {
            op.record_error(&e.to_string());
        }
        op.complete();
        result
    }

    async fn post_status(&self, id: RequestId, text: &str) {
        if let Err(e) = self.sink.post_status(id, text).await {
            warn!(request_id = %id, error = %e, "Failed to post status");
        }
    }

    async fn update_status(&self, id: RequestId, text: &str) {
        if let Err(e) = self.sink.update_status(id, text).await {
            warn!(request_id = %id, error = %e, "Failed to update status");
        }
    }

    async fn clear_status(&self, id: RequestId) {
        if let Err(e) = self.sink.clear_status(id).await {
            warn!(request_id = %id, error = %e, "Failed to clear status");
        }
    }
}
