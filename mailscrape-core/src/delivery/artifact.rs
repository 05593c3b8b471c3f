//! Transient per-request artifact
//!
//! One credential per line, newline-terminated. Credentials the configured
//! encoding cannot represent are skipped with a warning; the file is always
//! removed once delivery has been attempted.

use super::DeliveryError;
use crate::extract::Credential;
use crate::metrics;
use crate::orchestrator::RequestId;
use crate::provider::ChannelId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, warn};

/// Character encoding of the written artifact
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactEncoding {
    #[default]
    #[serde(rename = "utf-8", alias = "utf8")]
    Utf8,
    Ascii,
    #[serde(alias = "latin-1", alias = "iso-8859-1")]
    Latin1,
}

impl ArtifactEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactEncoding::Utf8 => "utf-8",
            ArtifactEncoding::Ascii => "ascii",
            ArtifactEncoding::Latin1 => "latin1",
        }
    }

    /// Encode `text`, or `None` if any character has no representation
    pub fn encode(&self, text: &str) -> Option<Vec<u8>> {
        match self {
            ArtifactEncoding::Utf8 => Some(text.as_bytes().to_vec()),
            ArtifactEncoding::Ascii => text.is_ascii().then(|| text.as_bytes().to_vec()),
            ArtifactEncoding::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).ok())
                .collect(),
        }
    }
}

impl fmt::Display for ArtifactEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactEncoding {
    type Err = DeliveryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(ArtifactEncoding::Utf8),
            "ascii" | "us-ascii" => Ok(ArtifactEncoding::Ascii),
            "latin1" | "latin-1" | "iso-8859-1" => Ok(ArtifactEncoding::Latin1),
            other => Err(DeliveryError::UnknownEncoding(other.to_string())),
        }
    }
}

/// What ended up in a written artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenArtifact {
    pub path: PathBuf,
    pub written: usize,
    pub skipped_unencodable: usize,
}

/// Writes and removes request artifacts under one directory
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    dir: PathBuf,
    encoding: ArtifactEncoding,
}

impl ArtifactWriter {
    pub fn new(dir: impl Into<PathBuf>, encoding: ArtifactEncoding) -> Self {
        Self {
            dir: dir.into(),
            encoding,
        }
    }

    /// `<channel-id>_<request-id>_combos.txt` inside the output directory
    pub fn path_for(&self, channel: ChannelId, request_id: RequestId) -> PathBuf {
        self.dir
            .join(format!("{}_{}_combos.txt", channel, request_id))
    }

    /// Write `credentials` to `path`, one per line
    pub async fn write(
        &self,
        path: &Path,
        credentials: &[Credential],
    ) -> io::Result<WrittenArtifact> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut out = BufWriter::new(fs::File::create(path).await?);
        let mut written = 0;
        let mut skipped = 0;

        for credential in credentials {
            let line = format!("{}\n", credential);
            match self.encoding.encode(&line) {
                Some(bytes) => {
                    out.write_all(&bytes).await?;
                    written += 1;
                }
                None => {
                    warn!(
                        encoding = %self.encoding,
                        credential = %credential,
                        "Skipped credential the artifact encoding cannot represent"
                    );
                    skipped += 1;
                }
            }
        }
        out.flush().await?;

        if skipped > 0 {
            metrics::record_counter(metrics::ENCODING_SKIPPED, skipped as u64);
        }
        debug!(path = %path.display(), written, skipped, "Artifact written");

        Ok(WrittenArtifact {
            path: path.to_path_buf(),
            written,
            skipped_unencodable: skipped,
        })
    }

    /// Remove the artifact; a file that was never created is not an error
    pub async fn remove(&self, path: &Path) {
        match fs::remove_file(path).await {
            Ok(()) => debug!(path = %path.display(), "Artifact removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove artifact"),
        }
    }
}
