//! Remediation actions
//!
//! The detector only sees the [`RemediationInvoker`] trait. The serenity
//! implementation checks its own preconditions (owner and self protection,
//! target still present) and never propagates a failure beyond a
//! [`RemediationError`] value.

use crate::detection::ActionKind;
use crate::error::{RemediationError, RemediationResult};
use async_trait::async_trait;
use poise::serenity_prelude::{ChannelId, GuildId, Http, Member, PartialGuild, RoleId, UserId, WebhookId};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Default bound on a single platform call
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Outward calls the detector makes when a burst is detected
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemediationInvoker: Send + Sync {
    /// Kick `user_id` from the guild
    async fn kick(&self, guild_id: GuildId, user_id: UserId, reason: &str) -> RemediationResult<()>;

    /// Ban `user_id` from the guild
    async fn ban(&self, guild_id: GuildId, user_id: UserId, reason: &str) -> RemediationResult<()>;

    /// Undo the creation of a channel, role or webhook
    async fn revert(
        &self,
        guild_id: GuildId,
        kind: ActionKind,
        target_id: u64,
        reason: &str,
    ) -> RemediationResult<()>;
}

/// Remediation through the Discord HTTP API
pub struct SerenityRemediator {
    http: Arc<Http>,
    /// The bot's own user, which is never punished
    bot_user_id: Option<UserId>,
    timeout: Duration,
}

impl SerenityRemediator {
    #[must_use]
    pub fn new(http: Arc<Http>, bot_user_id: Option<UserId>, timeout: Duration) -> Self {
        Self {
            http,
            bot_user_id,
            timeout,
        }
    }

    fn http(&self) -> &Http {
        &self.http
    }

    /// Run a platform call, treating a timeout as a failure
    async fn bounded<T, F>(&self, call: F) -> RemediationResult<T>
    where
        F: Future<Output = RemediationResult<T>> + Send,
    {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| RemediationError::TimedOut)?
    }

    /// Fetch the guild and the member, refusing protected targets
    async fn punishable_member(
        &self,
        guild_id: GuildId,
        user_id: UserId,
    ) -> RemediationResult<(PartialGuild, Member)> {
        if self.bot_user_id == Some(user_id) {
            return Err(RemediationError::Protected("refusing to act on the bot itself".to_string()));
        }

        let (guild, member) = get_guild_and_member(self.http(), guild_id, user_id).await?;
        if guild.owner_id == user_id {
            return Err(RemediationError::Protected(format!(
                "{user_id} owns guild {guild_id}"
            )));
        }
        Ok((guild, member))
    }
}

/// Fetch a guild and one of its members
///
/// # Errors
///
/// Returns `TargetNotPresent` if the member cannot be fetched.
pub async fn get_guild_and_member(
    http: &Http,
    guild_id: GuildId,
    user_id: UserId,
) -> RemediationResult<(PartialGuild, Member)> {
    let guild = guild_id.to_partial_guild(http).await?;
    let member = guild
        .member(http, user_id)
        .await
        .map_err(|_| RemediationError::TargetNotPresent(user_id.get()))?;
    Ok((guild, member))
}

#[async_trait]
impl RemediationInvoker for SerenityRemediator {
    async fn kick(&self, guild_id: GuildId, user_id: UserId, reason: &str) -> RemediationResult<()> {
        let result = self
            .bounded(async {
                self.punishable_member(guild_id, user_id).await?;
                guild_id.kick_with_reason(self.http(), user_id, reason).await?;
                Ok::<(), RemediationError>(())
            })
            .await;

        match &result {
            Ok(()) => info!("Kicked {user_id} from guild {guild_id}: {reason}"),
            Err(e) => warn!("Failed to kick {user_id} from guild {guild_id}: {e}"),
        }
        result
    }

    async fn ban(&self, guild_id: GuildId, user_id: UserId, reason: &str) -> RemediationResult<()> {
        let result = self
            .bounded(async {
                self.punishable_member(guild_id, user_id).await?;
                guild_id.ban_with_reason(self.http(), user_id, 0, reason).await?;
                Ok::<(), RemediationError>(())
            })
            .await;

        match &result {
            Ok(()) => info!("Banned {user_id} from guild {guild_id}: {reason}"),
            Err(e) => warn!("Failed to ban {user_id} from guild {guild_id}: {e}"),
        }
        result
    }

    async fn revert(
        &self,
        guild_id: GuildId,
        kind: ActionKind,
        target_id: u64,
        reason: &str,
    ) -> RemediationResult<()> {
        if target_id == 0 {
            return Err(RemediationError::Unsupported("missing target id".to_string()));
        }

        let result = self
            .bounded(async {
                match kind {
                    ActionKind::ChannelCreate => {
                        ChannelId::new(target_id).delete(self.http()).await?;
                    }
                    ActionKind::RoleCreate => {
                        guild_id.delete_role(self.http(), RoleId::new(target_id)).await?;
                    }
                    ActionKind::WebhookCreate => {
                        self.http()
                            .delete_webhook(WebhookId::new(target_id), Some(reason))
                            .await?;
                    }
                    ActionKind::Kick | ActionKind::Ban => {
                        return Err(RemediationError::Unsupported(format!(
                            "a {kind} cannot be reverted"
                        )));
                    }
                }
                Ok::<(), RemediationError>(())
            })
            .await;

        match &result {
            Ok(()) => info!("Reverted {kind} of {target_id} in guild {guild_id}: {reason}"),
            Err(e) => warn!("Failed to revert {kind} of {target_id} in guild {guild_id}: {e}"),
        }
        result
    }
}
