//! Abuse detector
//!
//! Ties the policy lookup, the occurrence window and the punishment latch
//! together. One instance lives for the whole process and owns all
//! in-memory detection state.

use crate::config::{BotConfig, DetectionRule, RuleResponse};
use crate::detection::{ActionKind, ActionWindow, ActorContext, ObservedAction, PunishmentDeduplicator};
use crate::logging::log_report;
use crate::policy::{BypassRules, GuildPolicy, GuildPolicyStore, is_bypassed};
use crate::remediation::RemediationInvoker;
use crate::report::{ReportSink, SecurityReport, Severity};
use poise::serenity_prelude::RoleId;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Result of a remediation attempt, as surfaced in reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemediationOutcome {
    NotAttempted,
    Succeeded,
    Failed(String),
}

impl RemediationOutcome {
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// What the detector did with one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection {
    /// Monitoring for this kind is turned off in the guild
    Disabled,
    /// The actor is an owner or holds a bypass
    Bypassed,
    /// Recorded, still below the threshold
    Counting { count: usize },
    /// At or over the threshold, but this burst was already handled
    Suppressed { count: usize },
    /// A new burst was detected and handled
    Triggered {
        count: usize,
        outcome: RemediationOutcome,
        incident_id: Uuid,
    },
}

#[derive(Debug)]
pub struct AbuseDetector {
    window: ActionWindow,
    latch: PunishmentDeduplicator,
    rules: BTreeMap<ActionKind, DetectionRule>,
    cooldown: Duration,
    /// Used in guilds that have no universal bypass role of their own
    universal_bypass_role: Option<RoleId>,
}

impl AbuseDetector {
    #[must_use]
    pub fn new(rules: BTreeMap<ActionKind, DetectionRule>, cooldown: Duration) -> Self {
        Self {
            window: ActionWindow::new(),
            latch: PunishmentDeduplicator::new(),
            rules,
            cooldown,
            universal_bypass_role: None,
        }
    }

    /// Build a detector from validated configuration
    #[must_use]
    pub fn from_config(config: &BotConfig) -> Self {
        Self {
            window: ActionWindow::with_capacity_limit(config.max_occurrences_per_key),
            latch: PunishmentDeduplicator::new(),
            rules: config.detection_rules(),
            cooldown: config.punishment_cooldown(),
            universal_bypass_role: config.universal_bypass_role,
        }
    }

    #[must_use]
    pub fn with_universal_bypass_role(mut self, role_id: Option<RoleId>) -> Self {
        self.universal_bypass_role = role_id;
        self
    }

    /// Rule for `kind`, falling back to the default configuration
    #[must_use]
    pub fn rule(&self, kind: ActionKind) -> DetectionRule {
        self.rules
            .get(&kind)
            .copied()
            .unwrap_or_else(|| BotConfig::default().rule(kind))
    }

    #[must_use]
    pub fn window(&self) -> &ActionWindow {
        &self.window
    }

    #[must_use]
    pub fn latch(&self) -> &PunishmentDeduplicator {
        &self.latch
    }

    /// Feed one observed action through the detector.
    ///
    /// Never fails: remediation and delivery problems end up in the report
    /// and in the returned outcome.
    pub async fn observe(
        &self,
        event: &ObservedAction,
        actor: &ActorContext,
        store: &GuildPolicyStore,
        invoker: &dyn RemediationInvoker,
        sink: &dyn ReportSink,
    ) -> Detection {
        let kind = event.kind;
        let policy = store.guild(event.guild_id).await;

        if !policy.flag(kind.policy_flag()) {
            debug!(guild_id = %event.guild_id, %kind, "Monitoring disabled");
            return Detection::Disabled;
        }
        if actor.is_owner || self.bypassed(&policy, kind, actor) {
            debug!(guild_id = %event.guild_id, actor_id = %actor.user_id, %kind, "Actor bypassed");
            return Detection::Bypassed;
        }

        let rule = self.rule(kind);
        let count = self.window.record(
            event.guild_id,
            event.actor_id,
            kind,
            event.occurred_at_millis,
            rule.window_seconds,
        );
        let hot = count >= usize::try_from(rule.threshold).unwrap_or(usize::MAX);
        let auto_delete = kind.auto_delete_flag().is_some_and(|flag| policy.flag(flag));
        let revert = kind.is_creation() && (auto_delete || (hot && rule.revert_on_trigger));

        if !hot {
            if kind.is_creation() {
                self.report_creation(event, revert, invoker, sink).await;
            }
            return Detection::Counting { count };
        }

        if !self.latch.try_latch(event.guild_id, event.actor_id, self.cooldown) {
            debug!(
                guild_id = %event.guild_id,
                actor_id = %event.actor_id,
                %kind,
                count,
                "Burst already handled"
            );
            if revert {
                self.revert(event, &burst_reason(kind, count, &rule), invoker).await;
            }
            return Detection::Suppressed { count };
        }

        let incident_id = Uuid::new_v4();
        let reason = burst_reason(kind, count, &rule);
        warn!(
            guild_id = %event.guild_id,
            actor_id = %event.actor_id,
            %kind,
            count,
            %incident_id,
            "{reason}"
        );

        let outcome = match rule.response {
            RuleResponse::Kick => outcome_of(invoker.kick(event.guild_id, event.actor_id, &reason).await),
            RuleResponse::Ban => outcome_of(invoker.ban(event.guild_id, event.actor_id, &reason).await),
            RuleResponse::AlertOnly => RemediationOutcome::NotAttempted,
        };
        let reverted = if revert {
            Some(self.revert(event, &reason, invoker).await)
        } else {
            None
        };

        let mut report = SecurityReport::new(event.guild_id, burst_title(kind), Severity::Danger)
            .with_incident(incident_id)
            .field("Executor", format!("<@{}>", event.actor_id))
            .field(
                "Actions",
                format!("{count} {} in {}s", kind.plural(), rule.window_seconds),
            )
            .field("Last Target", target_mention(kind, event.target_id))
            .wide_field("Action Taken", response_text(rule.response, &outcome));
        if let Some(reverted) = reverted {
            report = report.wide_field("Reverted", revert_text(kind, &reverted));
        }
        self.publish(&report, sink).await;

        Detection::Triggered {
            count,
            outcome,
            incident_id,
        }
    }

    /// Drop windows that have been quiet for longer than the largest window
    pub fn sweep(&self, now_millis: i64) -> usize {
        let horizon = ActionKind::ALL
            .iter()
            .map(|&kind| self.rule(kind).window_seconds)
            .max()
            .unwrap_or_default();
        let removed = self.window.sweep(now_millis, horizon);
        if removed > 0 {
            debug!(removed, remaining = self.window.tracked_keys(), "Swept idle action windows");
        }
        removed
    }

    fn bypassed(&self, policy: &GuildPolicy, kind: ActionKind, actor: &ActorContext) -> bool {
        let rules = BypassRules::for_slot(policy, kind.bypass_slot(), self.universal_bypass_role);
        is_bypassed(actor, &rules)
    }

    async fn revert(
        &self,
        event: &ObservedAction,
        reason: &str,
        invoker: &dyn RemediationInvoker,
    ) -> RemediationOutcome {
        let Some(target_id) = event.target_id else {
            return RemediationOutcome::Failed("unknown target".to_string());
        };
        outcome_of(invoker.revert(event.guild_id, event.kind, target_id, reason).await)
    }

    /// Report a creation that did not cross the threshold
    async fn report_creation(
        &self,
        event: &ObservedAction,
        revert: bool,
        invoker: &dyn RemediationInvoker,
        sink: &dyn ReportSink,
    ) {
        let kind = event.kind;
        let object = kind.object();
        let reverted = if revert {
            let reason = format!("{object} auto-deletion is enabled");
            Some(self.revert(event, &reason, invoker).await)
        } else {
            None
        };

        let (title, severity) = match &reverted {
            None => (format!("{object} Created"), Severity::Info),
            Some(RemediationOutcome::Succeeded) => (format!("{object} Created & Auto-Deleted"), Severity::Warn),
            Some(_) => (format!("{object} Created"), Severity::Warn),
        };
        let mut report = SecurityReport::new(event.guild_id, title, severity)
            .field("Executor", format!("<@{}>", event.actor_id))
            .field(object, target_mention(kind, event.target_id));
        if let Some(reverted) = reverted {
            report = report.wide_field("Action Taken", revert_text(kind, &reverted));
        }
        self.publish(&report, sink).await;
    }

    async fn publish(&self, report: &SecurityReport, sink: &dyn ReportSink) {
        log_report(report);
        sink.publish(report).await;
        info!(incident_id = %report.incident_id, title = %report.title, "Security report published");
    }
}

fn outcome_of<E: std::fmt::Display>(result: Result<(), E>) -> RemediationOutcome {
    match result {
        Ok(()) => RemediationOutcome::Succeeded,
        Err(e) => RemediationOutcome::Failed(e.to_string()),
    }
}

/// Reason attached to remediation calls, e.g. "Mass ban detected: 3 bans in 10s"
fn burst_reason(kind: ActionKind, count: usize, rule: &DetectionRule) -> String {
    format!(
        "Mass {kind} detected: {count} {} in {}s",
        kind.plural(),
        rule.window_seconds
    )
}

fn burst_title(kind: ActionKind) -> String {
    match kind {
        ActionKind::Kick => "Mass Kick Protection Triggered".to_string(),
        ActionKind::Ban => "Mass Ban Protection Triggered".to_string(),
        _ => format!("Mass {} Creation Alert", kind.object()),
    }
}

fn target_mention(kind: ActionKind, target_id: Option<u64>) -> String {
    match (kind, target_id) {
        (_, None) => "Unknown".to_string(),
        (ActionKind::Kick | ActionKind::Ban, Some(id)) => format!("<@{id}>"),
        (ActionKind::ChannelCreate, Some(id)) => format!("<#{id}>"),
        (ActionKind::RoleCreate, Some(id)) => format!("<@&{id}>"),
        (ActionKind::WebhookCreate, Some(id)) => format!("`{id}`"),
    }
}

fn response_text(response: RuleResponse, outcome: &RemediationOutcome) -> String {
    let (verb, done) = match response {
        RuleResponse::Kick => ("kick", "kicked"),
        RuleResponse::Ban => ("ban", "banned"),
        RuleResponse::AlertOnly => return "Alert only".to_string(),
    };
    match outcome {
        RemediationOutcome::Succeeded => format!("Executor {done}"),
        RemediationOutcome::Failed(e) => format!("Failed to {verb} executor: {e}"),
        RemediationOutcome::NotAttempted => "None".to_string(),
    }
}

fn revert_text(kind: ActionKind, outcome: &RemediationOutcome) -> String {
    let object = kind.object();
    match outcome {
        RemediationOutcome::Succeeded => format!("{object} automatically deleted"),
        RemediationOutcome::Failed(e) => format!("Failed to delete {}: {e}", object.to_lowercase()),
        RemediationOutcome::NotAttempted => "None".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemediationError;
    use crate::policy::PolicyFlag;
    use crate::remediation::MockRemediationInvoker;
    use crate::report::MockReportSink;
    use async_trait::async_trait;
    use poise::serenity_prelude::{GuildId, UserId};
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingSink {
        reports: Mutex<Vec<SecurityReport>>,
    }

    impl RecordingSink {
        fn reports(&self) -> Vec<SecurityReport> {
            self.reports.lock().expect("Sink lock poisoned").clone()
        }
    }

    #[async_trait]
    impl ReportSink for RecordingSink {
        async fn publish(&self, report: &SecurityReport) {
            self.reports.lock().expect("Sink lock poisoned").push(report.clone());
        }
    }

    fn guild() -> GuildId {
        GuildId::new(100)
    }

    fn actor_id() -> UserId {
        UserId::new(200)
    }

    fn temp_store() -> GuildPolicyStore {
        let path: PathBuf = std::env::temp_dir()
            .join(format!("guild_warden_detector_{}", Uuid::new_v4()))
            .join("policy.json");
        GuildPolicyStore::new(path)
    }

    fn detector() -> AbuseDetector {
        AbuseDetector::from_config(&BotConfig::default())
    }

    fn event(kind: ActionKind, at_millis: i64, target: u64) -> ObservedAction {
        ObservedAction {
            guild_id: guild(),
            actor_id: actor_id(),
            target_id: Some(target),
            kind,
            occurred_at_millis: at_millis,
        }
    }

    fn actor() -> ActorContext {
        ActorContext::new(actor_id(), vec![RoleId::new(7)])
    }

    #[tokio::test]
    async fn test_ban_burst_kicks_executor_once() {
        let detector = detector();
        let store = temp_store();
        let sink = RecordingSink::default();
        let mut invoker = MockRemediationInvoker::new();
        invoker
            .expect_kick()
            .withf(|guild_id, user_id, reason| {
                *guild_id == guild() && *user_id == actor_id() && reason == "Mass ban detected: 3 bans in 10s"
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut results = Vec::new();
        for (at, target) in [(0, 1), (2_000, 2), (4_000, 3), (5_000, 4)] {
            results.push(
                detector
                    .observe(&event(ActionKind::Ban, at, target), &actor(), &store, &invoker, &sink)
                    .await,
            );
        }

        assert_eq!(results[0], Detection::Counting { count: 1 });
        assert_eq!(results[1], Detection::Counting { count: 2 });
        assert!(matches!(
            results[2],
            Detection::Triggered {
                count: 3,
                outcome: RemediationOutcome::Succeeded,
                ..
            }
        ));
        assert_eq!(results[3], Detection::Suppressed { count: 4 });

        let reports = sink.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].title, "Mass Ban Protection Triggered");
        assert_eq!(reports[0].severity, Severity::Danger);
        assert_eq!(reports[0].field_value("Actions"), Some("3 bans in 10s"));
        assert_eq!(reports[0].field_value("Last Target"), Some("<@3>"));
        assert_eq!(reports[0].field_value("Action Taken"), Some("Executor kicked"));
        if let Detection::Triggered { incident_id, .. } = &results[2] {
            assert_eq!(&reports[0].incident_id, incident_id);
        }
    }

    #[tokio::test]
    async fn test_stale_occurrence_does_not_trigger() {
        let detector = detector();
        let store = temp_store();
        let invoker = MockRemediationInvoker::new();
        let sink = MockReportSink::new();

        let first = detector
            .observe(&event(ActionKind::Kick, 0, 1), &actor(), &store, &invoker, &sink)
            .await;
        let second = detector
            .observe(&event(ActionKind::Kick, 11_000, 2), &actor(), &store, &invoker, &sink)
            .await;
        let third = detector
            .observe(&event(ActionKind::Kick, 12_000, 3), &actor(), &store, &invoker, &sink)
            .await;

        assert_eq!(first, Detection::Counting { count: 1 });
        assert_eq!(second, Detection::Counting { count: 1 });
        assert_eq!(third, Detection::Counting { count: 2 });
    }

    #[tokio::test]
    async fn test_universal_bypass_records_nothing() {
        let detector = detector().with_universal_bypass_role(Some(RoleId::new(7)));
        let store = temp_store();
        let invoker = MockRemediationInvoker::new();
        let sink = MockReportSink::new();

        for at in [0, 1_000, 2_000, 3_000] {
            let result = detector
                .observe(&event(ActionKind::Ban, at, 1), &actor(), &store, &invoker, &sink)
                .await;
            assert_eq!(result, Detection::Bypassed);
        }
        assert_eq!(detector.window().occurrences(guild(), actor_id(), ActionKind::Ban), 0);
        assert_eq!(detector.window().tracked_keys(), 0);
    }

    #[tokio::test]
    async fn test_guild_bypass_lists() {
        let detector = detector();
        let store = temp_store();
        let invoker = MockRemediationInvoker::new();
        let sink = MockReportSink::new();

        store
            .add_user_bypass(guild(), ActionKind::Kick.bypass_slot(), actor_id())
            .await
            .expect("Failed to add user bypass");
        let kick = detector
            .observe(&event(ActionKind::Kick, 0, 1), &actor(), &store, &invoker, &sink)
            .await;
        assert_eq!(kick, Detection::Bypassed);

        // A bypass for kicks does not cover bans
        let ban = detector
            .observe(&event(ActionKind::Ban, 0, 1), &actor(), &store, &invoker, &sink)
            .await;
        assert_eq!(ban, Detection::Counting { count: 1 });
    }

    #[tokio::test]
    async fn test_owner_is_exempt() {
        let detector = detector();
        let store = temp_store();
        let invoker = MockRemediationInvoker::new();
        let sink = MockReportSink::new();
        let owner = actor().owner(true);

        for at in [0, 1, 2, 3] {
            let result = detector
                .observe(&event(ActionKind::Ban, at, 1), &owner, &store, &invoker, &sink)
                .await;
            assert_eq!(result, Detection::Bypassed);
        }
    }

    #[tokio::test]
    async fn test_disabled_flag_skips_detection() {
        let detector = detector();
        let store = temp_store();
        let invoker = MockRemediationInvoker::new();
        let sink = MockReportSink::new();

        store
            .set_flag(guild(), PolicyFlag::MassBanEnabled, false)
            .await
            .expect("Failed to set flag");

        for at in [0, 1, 2, 3] {
            let result = detector
                .observe(&event(ActionKind::Ban, at, 1), &actor(), &store, &invoker, &sink)
                .await;
            assert_eq!(result, Detection::Disabled);
        }
        assert_eq!(detector.window().tracked_keys(), 0);
    }

    #[tokio::test]
    async fn test_failed_remediation_keeps_latch() {
        let detector = detector();
        let store = temp_store();
        let sink = RecordingSink::default();
        let mut invoker = MockRemediationInvoker::new();
        invoker
            .expect_kick()
            .times(1)
            .returning(|_, _, _| Err(RemediationError::MissingPermission("Kick Members".to_string())));

        let mut last = Detection::Disabled;
        for at in [0, 1_000, 2_000] {
            last = detector
                .observe(&event(ActionKind::Kick, at, 1), &actor(), &store, &invoker, &sink)
                .await;
        }
        assert!(matches!(
            last,
            Detection::Triggered {
                outcome: RemediationOutcome::Failed(_),
                ..
            }
        ));
        assert!(detector.latch().is_latched(guild(), actor_id()));

        let again = detector
            .observe(&event(ActionKind::Kick, 3_000, 1), &actor(), &store, &invoker, &sink)
            .await;
        assert_eq!(again, Detection::Suppressed { count: 4 });

        let reports = sink.reports();
        assert_eq!(reports.len(), 1);
        let action = reports[0].field_value("Action Taken").unwrap_or_default();
        assert!(action.starts_with("Failed to kick executor"), "unexpected action text: {action}");
    }

    #[tokio::test]
    async fn test_retriggers_after_cooldown_while_window_is_hot() {
        let detector = AbuseDetector::new(BotConfig::default().detection_rules(), Duration::from_millis(50));
        let store = temp_store();
        let mut sink = MockReportSink::new();
        sink.expect_publish().times(2).returning(|_| ());
        let mut invoker = MockRemediationInvoker::new();
        invoker.expect_kick().times(2).returning(|_, _, _| Ok(()));

        for at in [0, 1_000, 2_000] {
            detector
                .observe(&event(ActionKind::Ban, at, 1), &actor(), &store, &invoker, &sink)
                .await;
        }
        tokio::time::sleep(Duration::from_millis(150)).await;

        let result = detector
            .observe(&event(ActionKind::Ban, 3_000, 1), &actor(), &store, &invoker, &sink)
            .await;
        assert!(matches!(result, Detection::Triggered { count: 4, .. }));
    }

    #[tokio::test]
    async fn test_channel_burst_alerts_and_reverts() {
        let detector = detector();
        let store = temp_store();
        let sink = RecordingSink::default();
        let mut invoker = MockRemediationInvoker::new();
        invoker.expect_kick().never();
        invoker
            .expect_revert()
            .withf(|_, kind, target, _| *kind == ActionKind::ChannelCreate && *target >= 5)
            .times(2)
            .returning(|_, _, _, _| Ok(()));

        let mut results = Vec::new();
        for i in 1..=6_u64 {
            results.push(
                detector
                    .observe(
                        &event(ActionKind::ChannelCreate, i64::try_from(i * 1_000).unwrap_or_default(), i),
                        &actor(),
                        &store,
                        &invoker,
                        &sink,
                    )
                    .await,
            );
        }

        assert_eq!(results[3], Detection::Counting { count: 4 });
        assert!(matches!(
            results[4],
            Detection::Triggered {
                count: 5,
                outcome: RemediationOutcome::NotAttempted,
                ..
            }
        ));
        assert_eq!(results[5], Detection::Suppressed { count: 6 });

        let reports = sink.reports();
        // Four plain creation reports and one alert
        assert_eq!(reports.len(), 5);
        assert!(reports[..4].iter().all(|r| r.title == "Channel Created" && r.severity == Severity::Info));
        assert_eq!(reports[4].title, "Mass Channel Creation Alert");
        assert_eq!(reports[4].field_value("Action Taken"), Some("Alert only"));
        assert_eq!(reports[4].field_value("Reverted"), Some("Channel automatically deleted"));
    }

    #[tokio::test]
    async fn test_auto_delete_reverts_every_creation() {
        let detector = detector();
        let store = temp_store();
        let sink = RecordingSink::default();
        let mut invoker = MockRemediationInvoker::new();
        invoker
            .expect_revert()
            .withf(|_, kind, target, _| *kind == ActionKind::RoleCreate && *target == 42)
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        store
            .set_flag(guild(), PolicyFlag::AutoDeleteRoles, true)
            .await
            .expect("Failed to set flag");

        let result = detector
            .observe(&event(ActionKind::RoleCreate, 0, 42), &actor(), &store, &invoker, &sink)
            .await;
        assert_eq!(result, Detection::Counting { count: 1 });

        let reports = sink.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].title, "Role Created & Auto-Deleted");
        assert_eq!(reports[0].severity, Severity::Warn);
        assert_eq!(reports[0].field_value("Role"), Some("<@&42>"));
    }

    #[tokio::test]
    async fn test_sweep_uses_largest_window() {
        let detector = detector();
        let store = temp_store();
        let invoker = MockRemediationInvoker::new();
        let sink = MockReportSink::new();

        detector
            .observe(&event(ActionKind::Kick, 0, 1), &actor(), &store, &invoker, &sink)
            .await;
        // Largest default window is 60s
        assert_eq!(detector.sweep(30_000), 0);
        assert_eq!(detector.sweep(61_000), 1);
        assert_eq!(detector.window().tracked_keys(), 0);
    }

    #[test]
    fn test_reason_and_texts() {
        let rule = BotConfig::default().rule(ActionKind::Kick);
        assert_eq!(burst_reason(ActionKind::Kick, 3, &rule), "Mass kick detected: 3 kicks in 10s");
        assert_eq!(
            response_text(RuleResponse::Ban, &RemediationOutcome::Succeeded),
            "Executor banned"
        );
        assert_eq!(
            response_text(RuleResponse::Kick, &RemediationOutcome::Succeeded),
            "Executor kicked"
        );
        assert_eq!(burst_title(ActionKind::WebhookCreate), "Mass Webhook Creation Alert");
        assert_eq!(target_mention(ActionKind::ChannelCreate, Some(9)), "<#9>");
        assert_eq!(target_mention(ActionKind::Ban, None), "Unknown");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_parallel_burst_remediates_once() {
        const EVENTS: u64 = 32;
        let detector = Arc::new(detector());
        let store = Arc::new(temp_store());
        let sink = Arc::new(RecordingSink::default());
        let mut invoker = MockRemediationInvoker::new();
        invoker.expect_kick().times(1).returning(|_, _, _| Ok(()));
        let invoker = Arc::new(invoker);
        let start = Arc::new(tokio::sync::Barrier::new(32));

        let tasks: Vec<_> = (1..=EVENTS)
            .map(|target| {
                let detector = Arc::clone(&detector);
                let store = Arc::clone(&store);
                let sink = Arc::clone(&sink);
                let invoker = Arc::clone(&invoker);
                let start = Arc::clone(&start);
                tokio::spawn(async move {
                    start.wait().await;
                    let at = i64::try_from(target).unwrap_or_default() * 10;
                    detector
                        .observe(
                            &event(ActionKind::Ban, at, target),
                            &actor(),
                            &store,
                            invoker.as_ref(),
                            sink.as_ref(),
                        )
                        .await
                })
            })
            .collect();

        let mut results = Vec::new();
        for task in tasks {
            results.push(task.await.expect("observe task panicked"));
        }

        let triggered = results
            .iter()
            .filter(|result| matches!(result, Detection::Triggered { .. }))
            .count();
        let suppressed = results
            .iter()
            .filter(|result| matches!(result, Detection::Suppressed { .. }))
            .count();
        let counting = results
            .iter()
            .filter(|result| matches!(result, Detection::Counting { .. }))
            .count();
        assert_eq!(triggered, 1);
        assert_eq!(counting, 2);
        assert_eq!(suppressed, 29);

        // Every event was counted exactly once
        let mut counts: Vec<usize> = results
            .iter()
            .filter_map(|result| match result {
                Detection::Counting { count }
                | Detection::Suppressed { count }
                | Detection::Triggered { count, .. } => Some(*count),
                _ => None,
            })
            .collect();
        counts.sort_unstable();
        assert_eq!(counts, (1..=32).collect::<Vec<usize>>());
        assert_eq!(detector.window().occurrences(guild(), actor_id(), ActionKind::Ban), 32);
        assert_eq!(sink.reports().len(), 1);
        assert!(detector.latch().is_latched(guild(), actor_id()));
    }
}
