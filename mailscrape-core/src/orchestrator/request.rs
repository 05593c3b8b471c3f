//! Per-request identity and input

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifies one scrape request across status messages and artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

const UNNAMED_CHAT: &str = "this group";

/// Who asked for the scrape, shown in the delivery caption
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Requester {
    pub display_name: String,
    pub profile_link: String,
}

impl Requester {
    pub fn new(display_name: impl Into<String>, profile_link: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            profile_link: profile_link.into(),
        }
    }

    /// Requester derived from a Telegram user
    ///
    /// First and last name are joined; a missing last name is dropped.
    pub fn from_user(first_name: &str, last_name: Option<&str>, user_id: i64) -> Self {
        let display_name = match last_name.filter(|l| !l.is_empty()) {
            Some(last) => format!("{} {}", first_name, last),
            None => first_name.to_string(),
        };
        Self::new(display_name, format!("tg://user?id={}", user_id))
    }

    /// Requester derived from the chat when a message has no sender
    ///
    /// A missing title or username falls back to `"this group"`.
    pub fn from_chat(title: Option<&str>, username: Option<&str>) -> Self {
        let title = title.filter(|t| !t.is_empty()).unwrap_or(UNNAMED_CHAT);
        let link = username
            .filter(|u| !u.is_empty())
            .map(|u| format!("https://t.me/{}", u))
            .unwrap_or_else(|| UNNAMED_CHAT.to_string());
        Self::new(title, link)
    }
}

/// Raw command arguments as they arrived from the chat
///
/// Either field may be missing; the orchestrator validates them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeRequest {
    pub id: RequestId,
    pub reference: Option<String>,
    pub limit: Option<String>,
    pub requester: Requester,
}

impl ScrapeRequest {
    pub fn new(
        reference: impl Into<String>,
        limit: impl Into<String>,
        requester: Requester,
    ) -> Self {
        Self {
            id: RequestId::new(),
            reference: Some(reference.into()),
            limit: Some(limit.into()),
            requester,
        }
    }

    /// Request built from positional command arguments
    pub fn from_args(args: &[&str], requester: Requester) -> Self {
        Self {
            id: RequestId::new(),
            reference: args.first().map(|s| s.to_string()),
            limit: args.get(1).map(|s| s.to_string()),
            requester,
        }
    }
}
