//! Error types for guild_warden
//!
//! Each concern gets its own error enum. Command and framework code uses the
//! boxed [`crate::Error`] instead.

use thiserror::Error;

/// Errors raised while persisting guild policy
#[derive(Debug, Error)]
pub enum PolicyError {
    /// Reading or writing the policy file failed
    #[error("Policy storage error: {0}")]
    Io(#[from] std::io::Error),

    /// The policy document could not be encoded
    #[error("Policy encoding error: {0}")]
    Encode(#[from] serde_json::Error),

    /// The document on disk does not parse, so writing would discard it
    #[error("Policy document {path} is malformed, refusing to overwrite it: {source}")]
    Malformed {
        path: String,
        source: serde_json::Error,
    },
}

/// Result type for policy store writes
pub type PolicyResult<T> = Result<T, PolicyError>;

/// Errors raised while loading or validating the bot configuration.
///
/// All of these are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file exists but could not be read
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid YAML for [`crate::config::BotConfig`]
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// An environment override could not be parsed
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },

    /// The configuration parsed but breaks an invariant
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Errors reported by a remediation attempt.
///
/// These are values handed back to the detector, never propagated further.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemediationError {
    /// The bot lacks the permission needed for the action
    #[error("Missing permission: {0}")]
    MissingPermission(String),

    /// The target is no longer in the guild
    #[error("Target {0} is not present in the guild")]
    TargetNotPresent(u64),

    /// The target is protected (guild owner or the bot itself)
    #[error("Target is protected: {0}")]
    Protected(String),

    /// The platform did not answer within the configured timeout
    #[error("Remediation timed out")]
    TimedOut,

    /// The action does not apply to this kind of object
    #[error("Unsupported remediation: {0}")]
    Unsupported(String),

    /// Any other platform error
    #[error("Discord API error: {0}")]
    DiscordApi(String),
}

impl From<serenity::Error> for RemediationError {
    fn from(error: serenity::Error) -> Self {
        let message = error.to_string();
        if message.contains("Missing Permissions") {
            Self::MissingPermission(message)
        } else {
            Self::DiscordApi(message)
        }
    }
}

/// Result type for remediation calls
pub type RemediationResult<T> = Result<T, RemediationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = RemediationError::TargetNotPresent(42);
        assert_eq!(error.to_string(), "Target 42 is not present in the guild");

        let error = RemediationError::TimedOut;
        assert_eq!(error.to_string(), "Remediation timed out");

        let error = ConfigError::InvalidValue {
            key: "THRESHOLD".to_string(),
            value: "three".to_string(),
        };
        assert_eq!(error.to_string(), "Invalid value for THRESHOLD: \"three\"");
    }

    #[test]
    fn test_policy_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let error = PolicyError::from(io);
        assert!(matches!(error, PolicyError::Io(_)));
        assert!(error.to_string().contains("read-only"));
    }

    #[test]
    fn test_malformed_policy_error_names_the_file() {
        let source = serde_json::from_str::<serde_json::Value>("{ nope").unwrap_err();
        let error = PolicyError::Malformed {
            path: "data/guild-permissions.json".to_string(),
            source,
        };
        assert!(error.to_string().contains("data/guild-permissions.json"));
        assert!(std::error::Error::source(&error).is_some());
    }
}
