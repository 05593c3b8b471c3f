//! Span helpers for pipeline stages
//!
//! Each stage of a request runs inside a `TracedOperation`, which carries the
//! request ID and logs the stage duration when it completes.

use std::time::Instant;
use tracing::{span, Instrument, Level, Span};
use uuid::Uuid;

/// Traced operation wrapper
pub struct TracedOperation {
    span: Span,
    start: Instant,
}

impl TracedOperation {
    /// Start a new traced operation
    pub fn new(operation_name: &'static str) -> Self {
        let span = span!(Level::INFO, "operation", name = operation_name);
        Self {
            span,
            start: Instant::now(),
        }
    }

    /// Start a traced operation tied to a request
    pub fn for_request(operation_name: &'static str, request_id: Uuid) -> Self {
        let span = span!(
            Level::INFO,
            "operation",
            name = operation_name,
            request_id = %request_id
        );
        Self {
            span,
            start: Instant::now(),
        }
    }

    /// Run `fut` inside this operation's span
    pub async fn run<F: std::future::Future>(&self, fut: F) -> F::Output {
        fut.instrument(self.span.clone()).await
    }

    /// Record an error in the trace
    pub fn record_error(&self, error: &str) {
        tracing::warn!(parent: &self.span, error = error, "operation failed");
    }

    /// Complete the operation and record duration
    pub fn complete(self) {
        tracing::debug!(
            parent: &self.span,
            duration_ms = self.start.elapsed().as_millis() as u64,
            "operation completed"
        );
    }
}

/// Spans for the resolver
pub mod resolve {
    use super::*;

    pub fn trace_resolve(request_id: Uuid, reference_kind: &'static str) -> TracedOperation {
        let op = TracedOperation::for_request("resolve", request_id);
        tracing::debug!(parent: &op.span, reference_kind, "Resolving reference");
        op
    }
}

/// Spans for the collector
pub mod collect {
    use super::*;

    pub fn trace_collect(request_id: Uuid, channel_id: i64, limit: usize) -> TracedOperation {
        let op = TracedOperation::for_request("collect", request_id);
        tracing::debug!(parent: &op.span, channel_id, limit, "Collecting history");
        op
    }
}

/// Spans for delivery
pub mod deliver {
    use super::*;

    pub fn trace_deliver(request_id: Uuid, credentials: usize) -> TracedOperation {
        let op = TracedOperation::for_request("deliver", request_id);
        tracing::debug!(parent: &op.span, credentials, "Delivering artifact");
        op
    }
}
