//! Sliding-window occurrence counter
//!
//! Stale timestamps are pruned lazily whenever a key is recorded again, plus
//! an explicit [`ActionWindow::sweep`] for keys that went quiet.

use crate::detection::ActionKind;
use dashmap::DashMap;
use poise::serenity_prelude::{GuildId, UserId};
use std::collections::VecDeque;

/// Key of one occurrence window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowKey {
    pub guild_id: GuildId,
    pub actor_id: UserId,
    pub kind: ActionKind,
}

/// Occurrence windows for every (guild, actor, kind)
#[derive(Debug, Default)]
pub struct ActionWindow {
    windows: DashMap<WindowKey, VecDeque<i64>>,
    /// Upper bound on stored timestamps per key
    max_per_key: Option<usize>,
}

impl ActionWindow {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a window that keeps at most `max_per_key` timestamps per key.
    ///
    /// The cap must be at least the largest threshold in use, otherwise counts
    /// saturate below it.
    #[must_use]
    pub fn with_capacity_limit(max_per_key: usize) -> Self {
        Self {
            windows: DashMap::new(),
            max_per_key: Some(max_per_key.max(1)),
        }
    }

    /// Record one occurrence at `now_millis` and return how many occurrences
    /// fall inside the trailing window, this one included.
    ///
    /// Every call prunes and mutates the stored window.
    pub fn record(
        &self,
        guild_id: GuildId,
        actor_id: UserId,
        kind: ActionKind,
        now_millis: i64,
        window_seconds: u64,
    ) -> usize {
        let key = WindowKey {
            guild_id,
            actor_id,
            kind,
        };
        let window_millis = i64::try_from(window_seconds.saturating_mul(1000)).unwrap_or(i64::MAX);

        let mut entry = self.windows.entry(key).or_default();
        let timestamps = entry.value_mut();
        timestamps.retain(|&t| now_millis.saturating_sub(t) <= window_millis);
        timestamps.push_back(now_millis);

        if let Some(max) = self.max_per_key {
            while timestamps.len() > max {
                timestamps.pop_front();
            }
        }

        timestamps.len()
    }

    /// Number of stored occurrences for a key, without pruning or recording
    #[must_use]
    pub fn occurrences(&self, guild_id: GuildId, actor_id: UserId, kind: ActionKind) -> usize {
        let key = WindowKey {
            guild_id,
            actor_id,
            kind,
        };
        self.windows.get(&key).map_or(0, |entry| entry.len())
    }

    /// Number of keys currently tracked
    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }

    /// Drop every key whose newest occurrence is older than `horizon_seconds`.
    /// Returns the number of keys removed.
    pub fn sweep(&self, now_millis: i64, horizon_seconds: u64) -> usize {
        let horizon_millis = i64::try_from(horizon_seconds.saturating_mul(1000)).unwrap_or(i64::MAX);
        let before = self.windows.len();
        self.windows.retain(|_, timestamps| {
            timestamps
                .back()
                .is_some_and(|&newest| now_millis.saturating_sub(newest) <= horizon_millis)
        });
        before.saturating_sub(self.windows.len())
    }
}
