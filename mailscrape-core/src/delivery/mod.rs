//! Delivery of status text and result files back to the requester
//!
//! # Architecture
//!
//! ```text
//! RequestOrchestrator
//!       |
//!       v
//! DeliverySink (trait)
//!       |
//!       +---> DirectorySink (CLI: copies files into a directory)
//!       |
//!       +---> RecordingSink (test_utils)
//! ```

pub mod artifact;

pub use artifact::{ArtifactEncoding, ArtifactWriter, WrittenArtifact};

use crate::orchestrator::{RequestId, Requester};
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Errors raised by a delivery sink
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The destination refused the call
    #[error("Delivery rejected: {0}")]
    Rejected(String),

    /// Local I/O failed while handing the file over
    #[error("I/O error during delivery: {0}")]
    Io(String),

    /// Unrecognised artifact encoding name
    #[error("Unknown encoding '{0}'")]
    UnknownEncoding(String),
}

impl From<std::io::Error> for DeliveryError {
    fn from(e: std::io::Error) -> Self {
        DeliveryError::Io(e.to_string())
    }
}

/// Caption metadata sent along with the result file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliverySummary {
    /// Channel display name
    pub source: String,
    /// Credentials in the file
    pub amount: usize,
    pub duplicates_removed: usize,
    pub requester: Requester,
    /// Credentials left out because the encoding could not represent them
    pub skipped_unencodable: usize,
}

impl fmt::Display for DeliverySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const RULE: &str = "━━━━━━━━━━━━━━━━";
        writeln!(f, "Mail Scraped Successful")?;
        writeln!(f, "{}", RULE)?;
        writeln!(f, "Source: {}", self.source)?;
        writeln!(f, "Amount: {}", self.amount)?;
        writeln!(f, "Duplicates Removed: {}", self.duplicates_removed)?;
        if self.skipped_unencodable > 0 {
            writeln!(f, "Skipped (encoding): {}", self.skipped_unencodable)?;
        }
        writeln!(f, "{}", RULE)?;
        let link = &self.requester.profile_link;
        if link.is_empty() || *link == self.requester.display_name {
            write!(f, "Scraped By: {}", self.requester.display_name)
        } else {
            write!(
                f,
                "Scraped By: {} ({})",
                self.requester.display_name, self.requester.profile_link
            )
        }
    }
}

/// Outbound side of a request: one status message and one file
#[async_trait]
pub trait DeliverySink: Send + Sync {
    /// Post the request's status message
    async fn post_status(&self, request_id: RequestId, text: &str) -> Result<(), DeliveryError>;

    /// Replace the text of the request's status message
    async fn update_status(&self, request_id: RequestId, text: &str)
        -> Result<(), DeliveryError>;

    /// Send the result file with its caption
    async fn deliver_file(
        &self,
        request_id: RequestId,
        path: &Path,
        caption: &DeliverySummary,
    ) -> Result<(), DeliveryError>;

    /// Remove the request's status message
    async fn clear_status(&self, request_id: RequestId) -> Result<(), DeliveryError>;
}

/// Sink that copies delivered files into a directory
///
/// Status text goes to the log. Each delivered file gets a sibling
/// `.caption.txt` holding the rendered caption.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dest: PathBuf,
}

impl DirectorySink {
    pub fn new(dest: impl Into<PathBuf>) -> Self {
        Self { dest: dest.into() }
    }

    /// Whether files written under `dir` would be delivered onto themselves
    pub fn is_source_dir(&self, dir: &Path) -> bool {
        same_path(&self.dest, dir)
    }
}

/// Compare two paths after resolving them; unresolvable paths compare as written
fn same_path(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

#[async_trait]
impl DeliverySink for DirectorySink {
    async fn post_status(&self, request_id: RequestId, text: &str) -> Result<(), DeliveryError> {
        info!(%request_id, status = text, "Status posted");
        Ok(())
    }

    async fn update_status(
        &self,
        request_id: RequestId,
        text: &str,
    ) -> Result<(), DeliveryError> {
        info!(%request_id, status = text, "Status updated");
        Ok(())
    }

    async fn deliver_file(
        &self,
        request_id: RequestId,
        path: &Path,
        caption: &DeliverySummary,
    ) -> Result<(), DeliveryError> {
        let file_name = path
            .file_name()
            .ok_or_else(|| DeliveryError::Rejected(format!("not a file: {}", path.display())))?;

        tokio::fs::create_dir_all(&self.dest).await?;
        let target = self.dest.join(file_name);
        if same_path(path, &target) {
            return Err(DeliveryError::Rejected(format!(
                "{} is already in the delivery directory",
                path.display()
            )));
        }
        tokio::fs::copy(path, &target).await?;

        let mut caption_path = target.clone().into_os_string();
        caption_path.push(".caption.txt");
        tokio::fs::write(&caption_path, caption.to_string()).await?;

        info!(
            %request_id,
            target = %target.display(),
            amount = caption.amount,
            "File delivered"
        );
        Ok(())
    }

    async fn clear_status(&self, request_id: RequestId) -> Result<(), DeliveryError> {
        debug!(%request_id, "Status cleared");
        Ok(())
    }
}
