//! Bot configuration
//!
//! Loaded once at startup from a YAML file, then overridden from the
//! environment, then validated. A configuration that fails validation stops
//! the bot before it connects.

use crate::detection::ActionKind;
use crate::error::ConfigError;
use crate::policy::DEFAULT_POLICY_FILE;
use poise::serenity_prelude::{ChannelId, GuildId, RoleId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Default location of the configuration file
pub const CONFIG_FILE: &str = "config/guild_warden.yaml";

/// What the detector does to the executor of a burst
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleResponse {
    Kick,
    Ban,
    /// Report only
    AlertOnly,
}

/// Resolved detection parameters for one action kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionRule {
    pub threshold: u32,
    pub window_seconds: u64,
    pub response: RuleResponse,
    /// Revert the created object for every occurrence at or over the threshold
    pub revert_on_trigger: bool,
}

/// Per-kind overrides as written in the configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleOverride {
    pub threshold: Option<u32>,
    pub window_seconds: Option<u64>,
    pub response: Option<RuleResponse>,
    pub revert_on_trigger: Option<bool>,
}

/// Process-wide configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Default threshold for kick and ban bursts
    pub threshold: u32,
    /// Default window for kick and ban bursts
    pub window_seconds: u64,
    /// How long an executor stays latched after a remediation
    pub punishment_cooldown_seconds: u64,
    /// Role that bypasses every check in guilds without their own universal role
    pub universal_bypass_role: Option<RoleId>,
    /// Users treated as owners in every guild
    pub owner_ids: Vec<UserId>,
    /// If non-empty, only these guilds are protected
    pub approved_guilds: Vec<GuildId>,
    /// Channel that receives security reports
    pub log_channel_id: Option<ChannelId>,
    pub policy_file: String,
    /// Audit log entries older than this are not attributed to an event
    pub audit_log_max_age_ms: i64,
    pub remediation_timeout_seconds: u64,
    pub max_occurrences_per_key: usize,
    pub sweep_interval_seconds: u64,
    pub rules: BTreeMap<ActionKind, RuleOverride>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            threshold: 3,
            window_seconds: 10,
            punishment_cooldown_seconds: 60,
            universal_bypass_role: None,
            owner_ids: Vec::new(),
            approved_guilds: Vec::new(),
            log_channel_id: None,
            policy_file: DEFAULT_POLICY_FILE.to_string(),
            audit_log_max_age_ms: 5_000,
            remediation_timeout_seconds: 10,
            max_occurrences_per_key: 100,
            sweep_interval_seconds: 300,
            rules: BTreeMap::new(),
        }
    }
}

impl BotConfig {
    /// Load from `path`, apply environment overrides and validate.
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file is unreadable or malformed, an
    /// override cannot be parsed, or the result fails [`BotConfig::validate`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = match std::fs::read_to_string(path) {
            Ok(content) => serde_yaml::from_str::<Self>(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => return Err(e.into()),
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from `lookup`, usually the process environment
    ///
    /// # Errors
    ///
    /// Returns `InvalidValue` for a variable that is set but unparsable.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = parse_var(&lookup, "THRESHOLD")? {
            self.threshold = value;
        }
        if let Some(value) = parse_var(&lookup, "WINDOW_SECONDS")? {
            self.window_seconds = value;
        }
        if let Some(value) = parse_var(&lookup, "PUNISHMENT_COOLDOWN_SECONDS")? {
            self.punishment_cooldown_seconds = value;
        }
        if let Some(value) = parse_var::<u64, _>(&lookup, "UNIVERSAL_BYPASS_ROLE")? {
            self.universal_bypass_role = non_zero(value).map(RoleId::new);
        }
        if let Some(value) = parse_var::<u64, _>(&lookup, "LOG_CHANNEL_ID")? {
            self.log_channel_id = non_zero(value).map(ChannelId::new);
        }
        if let Some(ids) = parse_list(&lookup, "OWNER_IDS")? {
            self.owner_ids = ids.into_iter().map(UserId::new).collect();
        }
        if let Some(ids) = parse_list(&lookup, "APPROVED_GUILDS")? {
            self.approved_guilds = ids.into_iter().map(GuildId::new).collect();
        }
        if let Some(path) = lookup("POLICY_FILE").filter(|p| !p.trim().is_empty()) {
            self.policy_file = path;
        }

        for kind in ActionKind::ALL {
            let prefix = kind.env_prefix();
            let threshold = parse_var(&lookup, &format!("{prefix}_THRESHOLD"))?;
            let window = parse_var(&lookup, &format!("{prefix}_WINDOW_SECONDS"))?;
            if threshold.is_some() || window.is_some() {
                let rule = self.rules.entry(kind).or_default();
                rule.threshold = threshold.or(rule.threshold);
                rule.window_seconds = window.or(rule.window_seconds);
            }
        }
        Ok(())
    }

    /// Built-in rule for a kind before any per-kind override
    fn base_rule(&self, kind: ActionKind) -> DetectionRule {
        match kind {
            ActionKind::Kick | ActionKind::Ban => DetectionRule {
                threshold: self.threshold,
                window_seconds: self.window_seconds,
                response: RuleResponse::Kick,
                revert_on_trigger: false,
            },
            ActionKind::ChannelCreate => DetectionRule {
                threshold: 5,
                window_seconds: 60,
                response: RuleResponse::AlertOnly,
                revert_on_trigger: true,
            },
            ActionKind::RoleCreate | ActionKind::WebhookCreate => DetectionRule {
                threshold: 3,
                window_seconds: 60,
                response: RuleResponse::AlertOnly,
                revert_on_trigger: true,
            },
        }
    }

    /// Effective rule for one kind
    #[must_use]
    pub fn rule(&self, kind: ActionKind) -> DetectionRule {
        let base = self.base_rule(kind);
        let Some(overrides) = self.rules.get(&kind) else {
            return base;
        };
        DetectionRule {
            threshold: overrides.threshold.unwrap_or(base.threshold),
            window_seconds: overrides.window_seconds.unwrap_or(base.window_seconds),
            response: overrides.response.unwrap_or(base.response),
            revert_on_trigger: overrides.revert_on_trigger.unwrap_or(base.revert_on_trigger),
        }
    }

    /// Effective rules for every kind
    #[must_use]
    pub fn detection_rules(&self) -> BTreeMap<ActionKind, DetectionRule> {
        ActionKind::ALL
            .iter()
            .map(|&kind| (kind, self.rule(kind)))
            .collect()
    }

    #[must_use]
    pub fn punishment_cooldown(&self) -> Duration {
        Duration::from_secs(self.punishment_cooldown_seconds)
    }

    #[must_use]
    pub fn remediation_timeout(&self) -> Duration {
        Duration::from_secs(self.remediation_timeout_seconds)
    }

    /// Whether events from this guild are handled at all
    #[must_use]
    pub fn guild_allowed(&self, guild_id: GuildId) -> bool {
        self.approved_guilds.is_empty() || self.approved_guilds.contains(&guild_id)
    }

    #[must_use]
    pub fn is_bot_owner(&self, user_id: UserId) -> bool {
        self.owner_ids.contains(&user_id)
    }

    /// Check invariants that must hold before the detector starts
    ///
    /// # Errors
    ///
    /// Returns `Invalid` describing the first violated invariant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.punishment_cooldown_seconds == 0 {
            return Err(ConfigError::Invalid(
                "punishment_cooldown_seconds must be at least 1".to_string(),
            ));
        }
        if self.remediation_timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "remediation_timeout_seconds must be at least 1".to_string(),
            ));
        }
        if self.sweep_interval_seconds == 0 {
            return Err(ConfigError::Invalid(
                "sweep_interval_seconds must be at least 1".to_string(),
            ));
        }
        if self.audit_log_max_age_ms < 0 {
            return Err(ConfigError::Invalid(
                "audit_log_max_age_ms must not be negative".to_string(),
            ));
        }

        for (kind, rule) in self.detection_rules() {
            if rule.threshold == 0 {
                return Err(ConfigError::Invalid(format!("{kind} threshold must be at least 1")));
            }
            if rule.window_seconds == 0 {
                return Err(ConfigError::Invalid(format!("{kind} window must be at least 1 second")));
            }
            if usize::try_from(rule.threshold).map_or(true, |t| t > self.max_occurrences_per_key) {
                return Err(ConfigError::Invalid(format!(
                    "max_occurrences_per_key ({}) is below the {kind} threshold ({})",
                    self.max_occurrences_per_key, rule.threshold
                )));
            }
        }
        Ok(())
    }
}

fn non_zero(value: u64) -> Option<u64> {
    (value != 0).then_some(value)
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse()
        .map(Some)
        .map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.clone(),
        })
}

/// Comma-separated list of non-zero ids
fn parse_list<F>(lookup: &F, key: &str) -> Result<Option<Vec<u64>>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            item.parse::<u64>()
                .ok()
                .and_then(non_zero)
                .ok_or_else(|| ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: item.to_string(),
                })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}
