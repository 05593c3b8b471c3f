//! mailscrape core library
//!
//! Scans a Telegram channel's history for `email:password` pairs and
//! delivers the unique ones as a text file.
//!
//! ```text
//! ScrapeCommand ─> RequestOrchestrator
//!                      │
//!                      ├─> MembershipResolver ─┐
//!                      ├─> BoundedCollector  ──┼─> MessagingProvider
//!                      │      └─> extract      │
//!                      └─> ArtifactWriter ─> DeliverySink
//! ```

pub mod collector;
pub mod command;
pub mod config;
pub mod context;
pub mod delivery;
pub mod errors;
pub mod extract;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod provider;
pub mod reference;
pub mod resolver;
pub mod shutdown;
pub mod spans;
pub mod test_utils;

pub use collector::{BoundedCollector, CollectionResult};
pub use command::ScrapeCommand;
pub use config::{Config, ConfigError};
pub use context::ScrapeContext;
pub use delivery::{ArtifactEncoding, DeliveryError, DeliverySink, DeliverySummary, DirectorySink};
pub use errors::{ScrapeError, ScrapeResult};
pub use extract::{extract, Credential};
pub use logging::{init_logging, init_logging_with_config, LogConfig, LogLevel};
pub use orchestrator::{
    RequestId, RequestOrchestrator, RequestReport, RequestState, Requester, ScrapeRequest,
};
pub use provider::{
    ChannelId, FixtureProvider, InMemoryProvider, MessagingProvider, ProviderError,
};
pub use reference::ChannelReference;
pub use resolver::{MembershipOutcome, MembershipResolver, ResolvedChannel};
