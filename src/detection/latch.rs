//! One-shot punishment latch per (guild, actor)
//!
//! A latch is granted at most once until its cooldown expires. Expiry is
//! unconditional: it does not wait for the remediation to finish.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use poise::serenity_prelude::{GuildId, UserId};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::AbortHandle;
use tracing::debug;

/// Default time a latch stays held
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60);

/// Latches currently held, each with the handle of its expiry task
#[derive(Debug, Default)]
pub struct PunishmentDeduplicator {
    latches: Arc<DashMap<(GuildId, UserId), AbortHandle>>,
}

impl PunishmentDeduplicator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to become the exclusive holder of the latch for `actor_id`.
    ///
    /// Returns `true` if the latch was free and is now held; it is released
    /// automatically after `cooldown`. Returns `false` if it was already held.
    /// Must be called from within a tokio runtime.
    pub fn try_latch(&self, guild_id: GuildId, actor_id: UserId, cooldown: Duration) -> bool {
        let key = (guild_id, actor_id);
        match self.latches.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                let latches = Arc::clone(&self.latches);
                let expiry = tokio::spawn(async move {
                    tokio::time::sleep(cooldown).await;
                    latches.remove(&key);
                    debug!(guild_id = %key.0, actor_id = %key.1, "Punishment latch expired");
                });
                vacant.insert(expiry.abort_handle());
                true
            }
        }
    }

    #[must_use]
    pub fn is_latched(&self, guild_id: GuildId, actor_id: UserId) -> bool {
        self.latches.contains_key(&(guild_id, actor_id))
    }

    /// Number of latches currently held
    #[must_use]
    pub fn held(&self) -> usize {
        self.latches.len()
    }
}

impl Drop for PunishmentDeduplicator {
    fn drop(&mut self) {
        for entry in self.latches.iter() {
            entry.value().abort();
        }
    }
}
