//! Membership Resolver
//!
//! Turns a [`ChannelReference`] into a concrete, queryable channel and
//! reports how access was obtained.
//!
//! # Algorithm
//!
//! - **Numeric ID**: direct lookup; never joins, since only existing
//!   membership makes a private chat's ID resolvable.
//! - **Private invite**: join first. An existing participant is looked up by
//!   the invite token; a fresh join is looked up by the returned ID; an
//!   approval-gated invite stops here with no channel.
//! - **Public handle / link**: lookup by handle.

use crate::errors::{ScrapeError, ScrapeResult};
use crate::provider::{ChannelId, ChannelMetadata, JoinResult, MessagingProvider, ProviderError};
use crate::reference::ChannelReference;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How access to the channel was established
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipOutcome {
    /// The account was already a participant
    AlreadyMember,
    /// The account joined during this request
    Joined,
    /// A join request awaits approval; the channel is not queryable yet
    JoinRequestPending,
    /// Public channel readable without a join action
    PublicAccess,
}

impl MembershipOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipOutcome::AlreadyMember => "already_member",
            MembershipOutcome::Joined => "joined",
            MembershipOutcome::JoinRequestPending => "join_request_pending",
            MembershipOutcome::PublicAccess => "public_access",
        }
    }
}

impl fmt::Display for MembershipOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Concrete channel identity for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedChannel {
    pub id: ChannelId,
    pub display_name: String,
    pub handle: Option<String>,
}

impl From<ChannelMetadata> for ResolvedChannel {
    fn from(meta: ChannelMetadata) -> Self {
        Self {
            id: meta.id,
            display_name: meta.title,
            handle: meta.username,
        }
    }
}

/// Outcome of resolving a reference
///
/// `channel` is `None` exactly when the outcome is `JoinRequestPending`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub outcome: MembershipOutcome,
    pub channel: Option<ResolvedChannel>,
}

impl Resolution {
    fn ready(outcome: MembershipOutcome, meta: ChannelMetadata) -> Self {
        Self {
            outcome,
            channel: Some(meta.into()),
        }
    }

    fn pending() -> Self {
        Self {
            outcome: MembershipOutcome::JoinRequestPending,
            channel: None,
        }
    }
}

/// Resolves channel references against a messaging provider
pub struct MembershipResolver {
    provider: Arc<dyn MessagingProvider>,
}

impl MembershipResolver {
    pub fn new(provider: Arc<dyn MessagingProvider>) -> Self {
        Self { provider }
    }

    /// Resolve `reference`, joining through an invite when needed
    pub async fn resolve(&self, reference: &ChannelReference) -> ScrapeResult<Resolution> {
        debug!(kind = reference.kind(), reference = %reference, "Resolving channel reference");

        let resolution = match reference {
            ChannelReference::NumericId(id) => self.resolve_numeric(*id).await?,
            ChannelReference::PrivateInvite(token) => self.resolve_invite(token).await?,
            ChannelReference::PublicHandle(handle) | ChannelReference::PublicInvite(handle) => {
                self.resolve_handle(handle).await?
            }
        };

        match &resolution.channel {
            Some(channel) => info!(
                channel_id = %channel.id,
                name = %channel.display_name,
                outcome = %resolution.outcome,
                "Channel resolved"
            ),
            None => info!(outcome = %resolution.outcome, "Channel not yet queryable"),
        }

        Ok(resolution)
    }

    async fn resolve_numeric(&self, id: i64) -> ScrapeResult<Resolution> {
        let meta = self.provider.get_channel_by_id(id).await.map_err(|e| {
            warn!(chat_id = id, error = %e, "Chat id lookup failed");
            ScrapeError::from_lookup(e, ScrapeError::InvalidChatId)
        })?;
        Ok(Resolution::ready(MembershipOutcome::AlreadyMember, meta))
    }

    async fn resolve_handle(&self, handle: &str) -> ScrapeResult<Resolution> {
        let meta = self
            .provider
            .get_channel_by_handle(handle)
            .await
            .map_err(|e| {
                warn!(handle, error = %e, "Handle lookup failed");
                ScrapeError::from_lookup(e, ScrapeError::UnknownUsername)
            })?;
        Ok(Resolution::ready(MembershipOutcome::PublicAccess, meta))
    }

    async fn resolve_invite(&self, token: &str) -> ScrapeResult<Resolution> {
        let joined = self.provider.join_channel(token).await.map_err(|e| {
            warn!(error = %e, "Join through invite failed");
            match e {
                ProviderError::InvalidOrExpiredInvite(msg) => ScrapeError::InvalidInvite(msg),
                other => ScrapeError::from_lookup(other, ScrapeError::InvalidInvite),
            }
        })?;

        match joined {
            JoinResult::AlreadyMember => {
                debug!("Already a participant, looking up by invite");
                let meta = self
                    .provider
                    .get_channel_by_invite(token)
                    .await
                    .map_err(|e| ScrapeError::from_lookup(e, ScrapeError::InvalidInvite))?;
                Ok(Resolution::ready(MembershipOutcome::AlreadyMember, meta))
            }
            JoinResult::Joined(id) => {
                debug!(channel_id = %id, "Joined, looking up by id");
                let meta = self
                    .provider
                    .get_channel_by_id(id.0)
                    .await
                    .map_err(|e| ScrapeError::from_lookup(e, ScrapeError::InvalidInvite))?;
                Ok(Resolution::ready(MembershipOutcome::Joined, meta))
            }
            JoinResult::PendingApproval => {
                info!("Join request sent, waiting for approval");
                Ok(Resolution::pending())
            }
        }
    }
}
