//! Security reports
//!
//! The detector produces a structured [`SecurityReport`]; rendering and
//! delivery belong to a [`ReportSink`].

use async_trait::async_trait;
use derive_more::Display;
use poise::serenity_prelude::{
    ChannelId, CreateEmbed, CreateEmbedFooter, CreateMessage, GuildId, Http, Timestamp,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, warn};
use uuid::Uuid;

/// How urgent a report is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[display("info")]
    Info,
    #[display("warn")]
    Warn,
    #[display("danger")]
    Danger,
}

impl Severity {
    /// Embed colour for this severity
    #[must_use]
    pub const fn colour(self) -> u32 {
        match self {
            Self::Info => 0x2e_d5_73,
            Self::Warn => 0xff_6b_6b,
            Self::Danger => 0xff_47_57,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// One structured log record for administrators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityReport {
    pub title: String,
    pub severity: Severity,
    pub fields: Vec<ReportField>,
    pub guild_id: GuildId,
    /// Correlates this report with the tracing output for the same incident
    pub incident_id: Uuid,
}

impl SecurityReport {
    #[must_use]
    pub fn new(guild_id: GuildId, title: impl Into<String>, severity: Severity) -> Self {
        Self {
            title: title.into(),
            severity,
            fields: Vec::new(),
            guild_id,
            incident_id: Uuid::new_v4(),
        }
    }

    #[must_use]
    pub fn with_incident(mut self, incident_id: Uuid) -> Self {
        self.incident_id = incident_id;
        self
    }

    /// Add an inline field
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(ReportField {
            name: name.into(),
            value: value.into(),
            inline: true,
        });
        self
    }

    /// Add a full-width field
    #[must_use]
    pub fn wide_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(ReportField {
            name: name.into(),
            value: value.into(),
            inline: false,
        });
        self
    }

    /// Value of the first field called `name`
    #[must_use]
    pub fn field_value(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| field.value.as_str())
    }

    /// Render as a Discord embed
    #[must_use]
    pub fn to_embed(&self) -> CreateEmbed {
        self.fields.iter().fold(
            CreateEmbed::new()
                .title(&self.title)
                .colour(self.severity.colour())
                .timestamp(Timestamp::now())
                .footer(CreateEmbedFooter::new(format!("Security • {}", self.incident_id))),
            |embed, field| embed.field(&field.name, &field.value, field.inline),
        )
    }
}

/// Receives reports produced by the detector
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn publish(&self, report: &SecurityReport);
}

/// Guild the log channel belongs to, resolved once and shared between sinks.
///
/// Holds `None` when the channel is not a guild channel.
pub type ChannelGuild = Arc<OnceCell<Option<GuildId>>>;

/// Whether a report about `report_guild` may go to a channel in `channel_guild`
#[must_use]
pub fn routes_to(channel_guild: Option<GuildId>, report_guild: GuildId) -> bool {
    channel_guild == Some(report_guild)
}

/// Posts reports to a guild log channel.
///
/// Without a configured channel, reports are dropped silently. Reports about
/// other guilds are never posted there.
pub struct ChannelReportSink {
    http: Arc<Http>,
    channel_id: Option<ChannelId>,
    channel_guild: ChannelGuild,
}

impl ChannelReportSink {
    #[must_use]
    pub fn new(http: Arc<Http>, channel_id: Option<ChannelId>, channel_guild: ChannelGuild) -> Self {
        Self {
            http,
            channel_id,
            channel_guild,
        }
    }

    /// Look up the channel's guild on first use; lookup failures are retried next time
    async fn channel_guild(&self, channel_id: ChannelId) -> Result<Option<GuildId>, serenity::Error> {
        self.channel_guild
            .get_or_try_init(|| async {
                let channel = channel_id.to_channel(&*self.http).await?;
                Ok::<_, serenity::Error>(channel.guild().map(|channel| channel.guild_id))
            })
            .await
            .copied()
    }
}

#[async_trait]
impl ReportSink for ChannelReportSink {
    async fn publish(&self, report: &SecurityReport) {
        let Some(channel_id) = self.channel_id else {
            return;
        };

        let channel_guild = match self.channel_guild(channel_id).await {
            Ok(guild) => guild,
            Err(e) => {
                warn!(%channel_id, incident_id = %report.incident_id, error = %e, "Failed to resolve log channel");
                return;
            }
        };
        if !routes_to(channel_guild, report.guild_id) {
            debug!(
                %channel_id,
                guild_id = %report.guild_id,
                incident_id = %report.incident_id,
                "Log channel belongs to another guild, report not posted"
            );
            return;
        }

        let message = CreateMessage::new().embed(report.to_embed());
        if let Err(e) = channel_id.send_message(&*self.http, message).await {
            warn!(
                channel_id = %channel_id,
                incident_id = %report.incident_id,
                error = %e,
                "Failed to post security report"
            );
        }
    }
}
