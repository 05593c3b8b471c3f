//! Test utilities for mailscrape
//!
//! Fixtures, a recording delivery sink, and assertions shared by unit and
//! integration tests.

pub mod assertions;
pub mod async_helpers;
pub mod fixtures;
pub mod recording_sink;

pub use assertions::*;
pub use async_helpers::*;
pub use fixtures::*;
pub use recording_sink::{RecordingSink, SinkCall};
