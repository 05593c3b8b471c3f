//! Chat command recognition
//!
//! Commands look like `<prefix><alias>[@bot] <reference> <limit>`, for
//! example `/scrmail @leaks 500` or `.mailscr@my_bot -1001234 20`.

use crate::config::CommandConfig;
use crate::errors::{ScrapeError, ScrapeResult};
use crate::orchestrator::{Requester, ScrapeRequest};

/// A fully validated scrape command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeCommand {
    pub reference: String,
    pub limit: i64,
}

impl ScrapeCommand {
    /// Parse `text` as a scrape command
    ///
    /// Returns `Ok(None)` when the text is not one of our commands, and
    /// `MissingArguments` when it is but the reference or limit is unusable.
    pub fn parse(text: &str, config: &CommandConfig) -> ScrapeResult<Option<Self>> {
        let Some(args) = recognize(text, config) else {
            return Ok(None);
        };
        let [reference, limit, ..] = args.as_slice() else {
            return Err(ScrapeError::MissingArguments);
        };
        let limit = limit
            .parse::<i64>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or(ScrapeError::MissingArguments)?;

        Ok(Some(Self {
            reference: reference.to_string(),
            limit,
        }))
    }

    pub fn into_request(self, requester: Requester) -> ScrapeRequest {
        ScrapeRequest::new(self.reference, self.limit.to_string(), requester)
    }
}

/// Build a request from any text addressed to us, leaving validation to the
/// orchestrator so that bad arguments still get a status reply
pub fn request_from_text(
    text: &str,
    config: &CommandConfig,
    requester: Requester,
) -> Option<ScrapeRequest> {
    recognize(text, config).map(|args| ScrapeRequest::from_args(&args, requester))
}

/// Arguments following the command word, if `text` is one of our commands
fn recognize<'a>(text: &'a str, config: &CommandConfig) -> Option<Vec<&'a str>> {
    let mut parts = text.split_whitespace();
    let head = parts.next()?;

    let word = config
        .prefixes
        .iter()
        .find_map(|p| head.strip_prefix(p.as_str()))?;

    let (name, addressed_to) = match word.split_once('@') {
        Some((name, bot)) => (name, Some(bot)),
        None => (word, None),
    };

    if !config.aliases.iter().any(|a| a.eq_ignore_ascii_case(name)) {
        return None;
    }

    if let (Some(target), Some(ours)) = (addressed_to, config.bot_username.as_deref()) {
        if !target.eq_ignore_ascii_case(ours.trim_start_matches('@')) {
            return None;
        }
    }

    Some(parts.collect())
}
