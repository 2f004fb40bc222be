//! Inbound events handed to the detector

use crate::policy::{PolicyFlag, RoleSlot};
use derive_more::Display;
use poise::serenity_prelude::{GuildId, RoleId, UserId};
use serde::{Deserialize, Serialize};

/// A monitored action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    #[display("kick")]
    Kick,
    #[display("ban")]
    Ban,
    #[display("channel creation")]
    ChannelCreate,
    #[display("role creation")]
    RoleCreate,
    #[display("webhook creation")]
    WebhookCreate,
}

impl ActionKind {
    pub const ALL: [Self; 5] = [
        Self::Kick,
        Self::Ban,
        Self::ChannelCreate,
        Self::RoleCreate,
        Self::WebhookCreate,
    ];

    /// Flag that turns monitoring of this action on or off
    #[must_use]
    pub const fn policy_flag(self) -> PolicyFlag {
        match self {
            Self::Kick => PolicyFlag::MassKickEnabled,
            Self::Ban => PolicyFlag::MassBanEnabled,
            Self::ChannelCreate => PolicyFlag::ChannelMonitorEnabled,
            Self::RoleCreate => PolicyFlag::RoleMonitorEnabled,
            Self::WebhookCreate => PolicyFlag::IntegrationMonitorEnabled,
        }
    }

    /// Slot whose roles and users are exempt from monitoring of this action
    #[must_use]
    pub const fn bypass_slot(self) -> RoleSlot {
        match self {
            Self::Kick => RoleSlot::MassKickBypassRoles,
            Self::Ban => RoleSlot::MassBanBypassRoles,
            Self::ChannelCreate => RoleSlot::ChannelMonitorBypassRoles,
            Self::RoleCreate => RoleSlot::RoleMonitorBypassRoles,
            Self::WebhookCreate => RoleSlot::IntegrationMonitorBypassRoles,
        }
    }

    /// Flag that reverts every created object of this kind, if the kind creates one
    #[must_use]
    pub const fn auto_delete_flag(self) -> Option<PolicyFlag> {
        match self {
            Self::Kick | Self::Ban => None,
            Self::ChannelCreate => Some(PolicyFlag::AutoDeleteChannels),
            Self::RoleCreate => Some(PolicyFlag::AutoDeleteRoles),
            Self::WebhookCreate => Some(PolicyFlag::AutoDeleteWebhooks),
        }
    }

    #[must_use]
    pub const fn is_creation(self) -> bool {
        self.auto_delete_flag().is_some()
    }

    /// Plural noun used in reasons, e.g. "3 bans in 10s"
    #[must_use]
    pub const fn plural(self) -> &'static str {
        match self {
            Self::Kick => "kicks",
            Self::Ban => "bans",
            Self::ChannelCreate => "channels created",
            Self::RoleCreate => "roles created",
            Self::WebhookCreate => "webhooks created",
        }
    }

    /// Object noun for creation kinds
    #[must_use]
    pub const fn object(self) -> &'static str {
        match self {
            Self::Kick | Self::Ban => "Member",
            Self::ChannelCreate => "Channel",
            Self::RoleCreate => "Role",
            Self::WebhookCreate => "Webhook",
        }
    }

    /// Prefix of the per-kind environment overrides
    #[must_use]
    pub const fn env_prefix(self) -> &'static str {
        match self {
            Self::Kick => "MASS_KICK",
            Self::Ban => "MASS_BAN",
            Self::ChannelCreate => "MASS_CHANNEL",
            Self::RoleCreate => "MASS_ROLE",
            Self::WebhookCreate => "MASS_WEBHOOK",
        }
    }
}

/// One occurrence of a monitored action, with the executor already resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedAction {
    pub guild_id: GuildId,
    /// Who performed the action
    pub actor_id: UserId,
    /// What the action was performed on (member, channel, role or webhook id)
    pub target_id: Option<u64>,
    pub kind: ActionKind,
    pub occurred_at_millis: i64,
}

/// What the detector needs to know about the actor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorContext {
    pub user_id: UserId,
    pub role_ids: Vec<RoleId>,
    /// Guild owner or configured bot owner
    pub is_owner: bool,
}

impl ActorContext {
    #[must_use]
    pub fn new(user_id: UserId, role_ids: Vec<RoleId>) -> Self {
        Self {
            user_id,
            role_ids,
            is_owner: false,
        }
    }

    #[must_use]
    pub fn owner(mut self, is_owner: bool) -> Self {
        self.is_owner = is_owner;
        self
    }
}
