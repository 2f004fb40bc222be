use crate::detection::{ActionKind, ActorContext, Detection, ObservedAction};
use crate::remediation::get_guild_and_member;
use crate::{Data, EVENT_TARGET};
use ::serenity::model::guild::audit_log::{
    Action, ChannelAction, MemberAction, RoleAction, WebhookAction,
};
use dashmap::DashMap;
use poise::serenity_prelude::{
    self as serenity, ChannelId, Context, EventHandler, GuildChannel, GuildId, Member, Ready, Role,
    User, UserId,
};
use tracing::{debug, info, warn};

/// Milliseconds between the Unix epoch and the first Discord snowflake
const DISCORD_EPOCH_MILLIS: i64 = 1_420_070_400_000;

/// Creation time encoded in a snowflake id
#[must_use]
pub fn snowflake_millis(id: u64) -> i64 {
    i64::try_from(id >> 22).unwrap_or(i64::MAX).saturating_add(DISCORD_EPOCH_MILLIS)
}

/// The parts of an audit log entry needed to attribute an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditMatch {
    pub entry_id: u64,
    pub executor: UserId,
    pub target_id: Option<u64>,
}

impl AuditMatch {
    #[must_use]
    pub fn created_at_millis(&self) -> i64 {
        snowflake_millis(self.entry_id)
    }
}

/// Pick the entry responsible for an event on a known target.
///
/// The newest entry wins if it targets `expected_target` and is no older
/// than `max_age_ms`.
#[must_use]
pub fn select_entry(
    entries: &[AuditMatch],
    expected_target: u64,
    now_millis: i64,
    max_age_ms: i64,
) -> Option<AuditMatch> {
    entries
        .iter()
        .filter(|entry| entry.target_id == Some(expected_target))
        .max_by_key(|entry| entry.entry_id)
        .filter(|entry| is_fresh(entry, now_millis, max_age_ms))
        .copied()
}

/// Pick the entry for an event that names no target.
///
/// The oldest fresh entry newer than `last_seen` wins, so a burst of
/// events walks the audit log in order instead of skipping entries.
#[must_use]
pub fn select_unseen_entry(
    entries: &[AuditMatch],
    last_seen: u64,
    now_millis: i64,
    max_age_ms: i64,
) -> Option<AuditMatch> {
    entries
        .iter()
        .filter(|entry| entry.entry_id > last_seen && is_fresh(entry, now_millis, max_age_ms))
        .min_by_key(|entry| entry.entry_id)
        .copied()
}

fn is_fresh(entry: &AuditMatch, now_millis: i64, max_age_ms: i64) -> bool {
    now_millis.saturating_sub(entry.created_at_millis()) <= max_age_ms
}

fn audit_action(kind: ActionKind) -> Action {
    match kind {
        ActionKind::Kick => Action::Member(MemberAction::Kick),
        ActionKind::Ban => Action::Member(MemberAction::BanAdd),
        ActionKind::ChannelCreate => Action::Channel(ChannelAction::Create),
        ActionKind::RoleCreate => Action::Role(RoleAction::Create),
        ActionKind::WebhookCreate => Action::Webhook(WebhookAction::Create),
    }
}

/// Correlates gateway events with the audit log and feeds the detector
pub struct Handler {
    data: Data,
    /// Newest target-less audit entry already attributed, per guild and kind
    seen_entries: DashMap<(GuildId, ActionKind), u64>,
}

impl Handler {
    #[must_use]
    pub fn new(data: Data) -> Self {
        Self {
            data,
            seen_entries: DashMap::new(),
        }
    }

    /// Claim the next unattributed entry for a target-less event.
    ///
    /// Selection and the high-water mark update happen under one map entry
    /// lock, so concurrent events each claim a different entry.
    fn claim_unseen(
        &self,
        guild_id: GuildId,
        kind: ActionKind,
        entries: &[AuditMatch],
        now_millis: i64,
    ) -> Option<AuditMatch> {
        let mut last = self.seen_entries.entry((guild_id, kind)).or_insert(0);
        let found = select_unseen_entry(entries, *last, now_millis, self.data.config.audit_log_max_age_ms)?;
        *last = found.entry_id;
        Some(found)
    }

    /// Find who performed `kind` on `target_id` through the audit log
    async fn resolve_executor(
        &self,
        ctx: &Context,
        guild_id: GuildId,
        kind: ActionKind,
        target_id: Option<u64>,
    ) -> Option<AuditMatch> {
        // A handful of recent entries covers events arriving close together
        let logs = match guild_id
            .audit_logs(&ctx.http, Some(audit_action(kind)), None, None, Some(5))
            .await
        {
            Ok(logs) => logs,
            Err(e) => {
                warn!(target: EVENT_TARGET, %guild_id, %kind, error = %e, "Failed to fetch audit log");
                return None;
            }
        };

        let entries: Vec<AuditMatch> = logs
            .entries
            .iter()
            .map(|entry| AuditMatch {
                entry_id: entry.id.get(),
                executor: entry.user_id,
                target_id: entry.target_id.map(|id| id.get()),
            })
            .collect();

        let now = chrono::Utc::now().timestamp_millis();
        match target_id {
            Some(target) => select_entry(&entries, target, now, self.data.config.audit_log_max_age_ms),
            // Without a target to match, each entry may be attributed once
            None => self.claim_unseen(guild_id, kind, &entries, now),
        }
    }

    async fn actor_context(&self, ctx: &Context, guild_id: GuildId, executor: UserId) -> ActorContext {
        let configured_owner = self.data.config.is_bot_owner(executor);
        match get_guild_and_member(&ctx.http, guild_id, executor).await {
            Ok((guild, member)) => ActorContext::new(executor, member.roles)
                .owner(configured_owner || guild.owner_id == executor),
            Err(e) => {
                debug!(target: EVENT_TARGET, %guild_id, %executor, error = %e, "Executor roles unavailable");
                ActorContext::new(executor, Vec::new()).owner(configured_owner)
            }
        }
    }

    /// Attribute one event and run it through the detector
    async fn handle(&self, ctx: &Context, guild_id: GuildId, kind: ActionKind, target_id: Option<u64>) {
        if !self.data.config.guild_allowed(guild_id) {
            return;
        }
        let Some(found) = self.resolve_executor(ctx, guild_id, kind, target_id).await else {
            return;
        };

        // Our own reverts show up in the audit log too
        let bot_id = ctx.cache.current_user().id;
        if found.executor == bot_id {
            return;
        }

        let actor = self.actor_context(ctx, guild_id, found.executor).await;
        let event = ObservedAction {
            guild_id,
            actor_id: found.executor,
            target_id: target_id.or(found.target_id),
            kind,
            // When Discord recorded the action, not when we heard of it
            occurred_at_millis: found.created_at_millis(),
        };

        // Bound to this shard's HTTP client
        let remediator = self.data.remediator(ctx.http.clone(), Some(bot_id));
        let sink = self.data.report_sink(ctx.http.clone());
        let detection = self
            .data
            .detector
            .observe(&event, &actor, &self.data.policy, &remediator, &sink)
            .await;

        match &detection {
            Detection::Triggered {
                count, incident_id, ..
            } => info!(
                target: EVENT_TARGET,
                %guild_id,
                executor = %found.executor,
                %kind,
                count,
                %incident_id,
                "Burst handled"
            ),
            other => debug!(target: EVENT_TARGET, %guild_id, executor = %found.executor, %kind, detection = ?other),
        }
    }
}

#[serenity::async_trait]
impl EventHandler for Handler {
    /// Called when the bot is ready, but the cache may not be fully populated yet.
    async fn ready(&self, ctx: Context, ready: Ready) {
        let user_name = ready.user.name.clone();
        let shard_id = ctx.shard_id;
        info!("Connected as {user_name}, shard {shard_id}");
    }

    /// Called when the cache is fully populated.
    async fn cache_ready(&self, ctx: Context, guilds: Vec<GuildId>) {
        let guild_count_cache = ctx.cache.guild_count();
        let guild_count = guilds.len();
        if guild_count != guild_count_cache {
            warn!(
                "Cache guild count mismatch: {guild_count_cache} (cache) vs {guild_count} (actual)"
            );
        }
        info!("Cache ready! The bot is in {guild_count} guild(s)");
    }

    async fn guild_ban_addition(&self, ctx: Context, guild_id: GuildId, banned_user: User) {
        self.handle(&ctx, guild_id, ActionKind::Ban, Some(banned_user.id.get()))
            .await;
    }

    /// Fires for leaves too; only removals with a matching kick entry count.
    async fn guild_member_removal(
        &self,
        ctx: Context,
        guild_id: GuildId,
        user: User,
        _member_data_if_available: Option<Member>,
    ) {
        self.handle(&ctx, guild_id, ActionKind::Kick, Some(user.id.get()))
            .await;
    }

    async fn channel_create(&self, ctx: Context, channel: GuildChannel) {
        self.handle(
            &ctx,
            channel.guild_id,
            ActionKind::ChannelCreate,
            Some(channel.id.get()),
        )
        .await;
    }

    async fn guild_role_create(&self, ctx: Context, new: Role) {
        self.handle(&ctx, new.guild_id, ActionKind::RoleCreate, Some(new.id.get()))
            .await;
    }

    /// Webhook events carry no webhook id; the audit entry supplies it.
    async fn webhook_update(&self, ctx: Context, guild_id: GuildId, belongs_to_channel_id: ChannelId) {
        debug!(target: EVENT_TARGET, %guild_id, channel_id = %belongs_to_channel_id, "Webhooks updated");
        self.handle(&ctx, guild_id, ActionKind::WebhookCreate, None).await;
    }
}
