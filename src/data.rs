use std::{ops::Deref, sync::Arc};

use crate::config::BotConfig;
use crate::detection::AbuseDetector;
use crate::policy::GuildPolicyStore;
use crate::remediation::SerenityRemediator;
use crate::report::{ChannelGuild, ChannelReportSink};
use poise::serenity_prelude as serenity;

/// Centralized data structure for the bot
#[derive(Clone)]
pub struct Data(pub Arc<DataInner>);

impl Default for Data {
    fn default() -> Self {
        Self::new(BotConfig::default())
    }
}

impl std::fmt::Debug for Data {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Data")
            .field("config", &self.config)
            .field("policy", &self.policy)
            .field("tracked_windows", &self.detector.window().tracked_keys())
            .field("held_latches", &self.detector.latch().held())
            .finish()
    }
}

impl Deref for Data {
    type Target = DataInner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Data {
    /// Build the shared state from validated configuration
    #[must_use]
    pub fn new(config: BotConfig) -> Self {
        Self(Arc::new(DataInner::new(config)))
    }

    /// Remediator bound to the given HTTP client
    #[must_use]
    pub fn remediator(
        &self,
        http: Arc<serenity::Http>,
        bot_user_id: Option<serenity::UserId>,
    ) -> SerenityRemediator {
        SerenityRemediator::new(http, bot_user_id, self.config.remediation_timeout())
    }

    /// Report sink posting to the configured log channel
    #[must_use]
    pub fn report_sink(&self, http: Arc<serenity::Http>) -> ChannelReportSink {
        ChannelReportSink::new(http, self.config.log_channel_id, Arc::clone(&self.log_channel_guild))
    }
}

/// State shared by the event handler and the commands
pub struct DataInner {
    pub config: BotConfig,
    pub policy: GuildPolicyStore,
    /// Owns every occurrence window and punishment latch
    pub detector: AbuseDetector,
    /// Guild of the log channel once a sink has looked it up
    log_channel_guild: ChannelGuild,
}

impl DataInner {
    #[must_use]
    pub fn new(config: BotConfig) -> Self {
        let policy = GuildPolicyStore::new(&config.policy_file);
        let detector = AbuseDetector::from_config(&config);
        Self {
            config,
            policy,
            detector,
            log_channel_guild: ChannelGuild::default(),
        }
    }
}
