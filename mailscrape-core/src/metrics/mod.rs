//! Metrics for the scrape pipeline
//!
//! Recorded through the `metrics` facade. Installing an exporter is left to
//! the embedding process; without one, every call is a no-op.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::time::Instant;

pub const REQUESTS_TOTAL: &str = "scrape.requests.total";
pub const REQUESTS_ABORTED: &str = "scrape.requests.aborted";
pub const CREDENTIALS_COLLECTED: &str = "scrape.credentials.collected";
pub const DUPLICATES_REMOVED: &str = "scrape.duplicates.removed";
pub const ENCODING_SKIPPED: &str = "scrape.encoding.skipped";
pub const MESSAGES_SCANNED: &str = "scrape.messages.scanned";
pub const COLLECT_DURATION_MS: &str = "scrape.collect.duration_ms";

/// Initialize metrics with descriptions
pub fn init_metrics() {
    describe_counter!(REQUESTS_TOTAL, "Scrape requests received");
    describe_counter!(
        REQUESTS_ABORTED,
        "Scrape requests that ended without a delivered file, by reason"
    );
    describe_counter!(CREDENTIALS_COLLECTED, "Unique credentials delivered");
    describe_counter!(DUPLICATES_REMOVED, "Duplicate credential occurrences dropped");
    describe_counter!(
        ENCODING_SKIPPED,
        "Credentials left out of an artifact because the encoding could not represent them"
    );
    describe_counter!(MESSAGES_SCANNED, "History messages run through the extractor");
    describe_histogram!(COLLECT_DURATION_MS, "History scan duration in milliseconds");
}

/// Record a counter metric
pub fn record_counter(name: &'static str, value: u64) {
    counter!(name).increment(value);
}

/// Count an aborted request under its reason
pub fn record_abort(reason: &'static str) {
    counter!(REQUESTS_ABORTED, "reason" => reason).increment(1);
}

/// Timer for measuring operation duration
pub struct Timer {
    name: &'static str,
    start: Instant,
}

impl Timer {
    /// Create a new timer
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            start: Instant::now(),
        }
    }

    /// Stop the timer and record the duration
    pub fn stop(self) {
        histogram!(self.name).record(self.start.elapsed().as_secs_f64() * 1000.0);
    }
}
