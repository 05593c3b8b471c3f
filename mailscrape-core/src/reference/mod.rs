//! Channel reference parsing
//!
//! Users name channels in four ways: a numeric chat ID, a bare handle
//! (`@name` or `name`), a public link (`t.me/name`) or a private invite link
//! (`t.me/+TOKEN`, `t.me/joinchat/TOKEN`). All of them are classified here,
//! once per request.

use crate::errors::{ScrapeError, ScrapeResult};
use std::fmt;
use url::Url;

const LINK_HOSTS: [&str; 2] = ["t.me", "telegram.me"];

/// A parsed, user-supplied channel reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelReference {
    /// Numeric chat ID such as `-100123456789`
    NumericId(i64),
    /// `@name` or `name`
    PublicHandle(String),
    /// Token from a `+TOKEN` or `joinchat/TOKEN` invite link
    PrivateInvite(String),
    /// Handle taken from a public `t.me/name` link
    PublicInvite(String),
}

impl ChannelReference {
    /// Classify a raw reference string
    pub fn parse(raw: &str) -> ScrapeResult<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ScrapeError::MissingArguments);
        }

        if let Some(link) = strip_link_host(raw) {
            return Self::from_link_path(raw, &link);
        }

        if let Some(token) = raw.strip_prefix('+') {
            return invite_token(raw, token);
        }

        let digits = raw.strip_prefix('-').unwrap_or(raw);
        if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
            return raw
                .parse::<i64>()
                .map(ChannelReference::NumericId)
                .map_err(|e| ScrapeError::InvalidChatId(format!("{}: {}", raw, e)));
        }

        let handle = raw.trim_start_matches('@');
        if handle.is_empty() {
            return Err(ScrapeError::UnknownUsername(raw.to_string()));
        }
        Ok(ChannelReference::PublicHandle(handle.to_string()))
    }

    fn from_link_path(raw: &str, path: &str) -> ScrapeResult<Self> {
        let path = path.trim_start_matches('/');

        if let Some(token) = path.strip_prefix('+') {
            return invite_token(raw, first_segment(token));
        }
        if let Some(token) = path.strip_prefix("joinchat/") {
            return invite_token(raw, first_segment(token));
        }
        // Private channel message link: t.me/c/<id>/<msg>
        if let Some(rest) = path.strip_prefix("c/") {
            let id = first_segment(rest);
            if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
                return Err(ScrapeError::InvalidChatId(raw.to_string()));
            }
            return format!("-100{}", id)
                .parse::<i64>()
                .map(ChannelReference::NumericId)
                .map_err(|e| ScrapeError::InvalidChatId(format!("{}: {}", raw, e)));
        }
        // Web preview: t.me/s/<name>
        let path = path.strip_prefix("s/").unwrap_or(path);

        let handle = first_segment(path.trim_start_matches('@'));
        if handle.is_empty() {
            return Err(ScrapeError::UnknownUsername(raw.to_string()));
        }
        Ok(ChannelReference::PublicInvite(handle.to_string()))
    }

    /// Handle to look up, for the public variants
    pub fn handle(&self) -> Option<&str> {
        match self {
            ChannelReference::PublicHandle(h) | ChannelReference::PublicInvite(h) => Some(h),
            _ => None,
        }
    }

    /// Short variant name for logs and spans
    pub fn kind(&self) -> &'static str {
        match self {
            ChannelReference::NumericId(_) => "numeric_id",
            ChannelReference::PublicHandle(_) => "public_handle",
            ChannelReference::PrivateInvite(_) => "private_invite",
            ChannelReference::PublicInvite(_) => "public_invite",
        }
    }
}

impl fmt::Display for ChannelReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelReference::NumericId(id) => write!(f, "{}", id),
            ChannelReference::PublicHandle(h) | ChannelReference::PublicInvite(h) => {
                write!(f, "@{}", h)
            }
            ChannelReference::PrivateInvite(token) => write!(f, "t.me/+{}", token),
        }
    }
}

/// Return the URL path if `raw` is a link to a known Telegram host
fn strip_link_host(raw: &str) -> Option<String> {
    let lower = raw.to_ascii_lowercase();
    let has_scheme = lower.starts_with("http://") || lower.starts_with("https://");
    let bare = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"))
        .unwrap_or(&lower);

    if !LINK_HOSTS
        .iter()
        .any(|host| bare.starts_with(&format!("{}/", host)) || bare == *host)
    {
        return None;
    }

    let with_scheme = if has_scheme {
        raw.to_string()
    } else {
        format!("https://{}", raw)
    };

    Url::parse(&with_scheme)
        .ok()
        .map(|url| url.path().to_string())
}

fn first_segment(path: &str) -> &str {
    path.split(['/', '?', '#']).next().unwrap_or_default()
}

fn invite_token(raw: &str, token: &str) -> ScrapeResult<ChannelReference> {
    if token.is_empty() {
        return Err(ScrapeError::InvalidInvite(raw.to_string()));
    }
    Ok(ChannelReference::PrivateInvite(token.to_string()))
}
