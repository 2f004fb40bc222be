//! Policy flag and role slot names
//!
//! Both enums serialize to the SCREAMING_SNAKE_CASE names used in the policy
//! document and double as slash command choices.

use serde::{Deserialize, Serialize};

/// A named boolean toggle controlling whether a feature is active in a guild
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    poise::ChoiceParameter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyFlag {
    #[name = "message security"]
    MessageSecurityEnabled,
    #[name = "alt detection"]
    AltDetectionEnabled,
    #[name = "mass kick protection"]
    MassKickEnabled,
    #[name = "mass ban protection"]
    MassBanEnabled,
    #[name = "vanity protection"]
    VanityProtectionEnabled,
    #[name = "role monitor"]
    RoleMonitorEnabled,
    #[name = "channel monitor"]
    ChannelMonitorEnabled,
    #[name = "member update monitor"]
    MemberUpdateEnabled,
    #[name = "server settings monitor"]
    ServerSettingsEnabled,
    #[name = "integration monitor"]
    IntegrationMonitorEnabled,
    #[name = "block links"]
    BlockLinks,
    #[name = "enable blacklist"]
    EnableBlacklist,
    #[name = "auto delete violations"]
    AutoDeleteViolations,
    #[name = "auto delete channels"]
    AutoDeleteChannels,
    #[name = "auto delete roles"]
    AutoDeleteRoles,
    #[name = "auto delete webhooks"]
    AutoDeleteWebhooks,
    #[name = "server scan"]
    ServerScanEnabled,
    #[name = "anti bot"]
    AntiBotEnabled,
}

impl PolicyFlag {
    /// Every flag, in the order they are listed to administrators
    pub const ALL: [Self; 18] = [
        Self::MessageSecurityEnabled,
        Self::AltDetectionEnabled,
        Self::MassKickEnabled,
        Self::MassBanEnabled,
        Self::VanityProtectionEnabled,
        Self::RoleMonitorEnabled,
        Self::ChannelMonitorEnabled,
        Self::MemberUpdateEnabled,
        Self::ServerSettingsEnabled,
        Self::IntegrationMonitorEnabled,
        Self::BlockLinks,
        Self::EnableBlacklist,
        Self::AutoDeleteViolations,
        Self::AutoDeleteChannels,
        Self::AutoDeleteRoles,
        Self::AutoDeleteWebhooks,
        Self::ServerScanEnabled,
        Self::AntiBotEnabled,
    ];

    /// Value used when a guild has not set this flag explicitly
    #[must_use]
    pub const fn default_value(self) -> bool {
        !matches!(
            self,
            Self::AutoDeleteChannels | Self::AutoDeleteRoles | Self::AutoDeleteWebhooks
        )
    }

    /// Name as stored in the policy document
    #[must_use]
    pub fn key(self) -> String {
        serde_json::to_value(self)
            .ok()
            .and_then(|value| value.as_str().map(str::to_owned))
            .unwrap_or_default()
    }
}

/// A guild role list. Bypass slots also key the per-user bypass lists.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    poise::ChoiceParameter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoleSlot {
    #[name = "censor moderators"]
    CensorModeratorRoles,
    #[name = "message security bypass"]
    MessageSecurityBypassRoles,
    #[name = "alt detection bypass"]
    AltDetectionBypassRoles,
    #[name = "mass kick bypass"]
    MassKickBypassRoles,
    #[name = "mass ban bypass"]
    MassBanBypassRoles,
    #[name = "vanity protection bypass"]
    VanityProtectionBypassRoles,
    #[name = "role monitor bypass"]
    RoleMonitorBypassRoles,
    #[name = "channel monitor bypass"]
    ChannelMonitorBypassRoles,
    #[name = "member update bypass"]
    MemberUpdateBypassRoles,
    #[name = "server settings bypass"]
    ServerSettingsBypassRoles,
    #[name = "integration monitor bypass"]
    IntegrationMonitorBypassRoles,
}

impl RoleSlot {
    pub const ALL: [Self; 11] = [
        Self::CensorModeratorRoles,
        Self::MessageSecurityBypassRoles,
        Self::AltDetectionBypassRoles,
        Self::MassKickBypassRoles,
        Self::MassBanBypassRoles,
        Self::VanityProtectionBypassRoles,
        Self::RoleMonitorBypassRoles,
        Self::ChannelMonitorBypassRoles,
        Self::MemberUpdateBypassRoles,
        Self::ServerSettingsBypassRoles,
        Self::IntegrationMonitorBypassRoles,
    ];

    /// Whether membership in this slot exempts an actor from detection
    #[must_use]
    pub const fn is_bypass(self) -> bool {
        !matches!(self, Self::CensorModeratorRoles)
    }

    #[must_use]
    pub fn key(self) -> String {
        serde_json::to_value(self)
            .ok()
            .and_then(|value| value.as_str().map(str::to_owned))
            .unwrap_or_default()
    }
}
