//! Guild policy store
//!
//! Policy lives in a single JSON document keyed by guild id. Every call
//! reloads the document and every effective mutation writes it back, so the
//! file is always the source of truth.
//!
//! Each guild record is flat: flag keys map to booleans, role slot keys to
//! id lists, `UNIVERSAL_BYPASS_ROLE` to one id or null and `userBypasses` to
//! user id lists per slot. Keys this version does not know survive a rewrite.

use crate::error::{PolicyError, PolicyResult};
use crate::policy::{PolicyFlag, RoleSlot};
use poise::serenity_prelude::{GuildId, RoleId, UserId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Default location of the policy document
pub const DEFAULT_POLICY_FILE: &str = "data/guild-permissions.json";

const UNIVERSAL_KEY: &str = "UNIVERSAL_BYPASS_ROLE";
const USER_BYPASSES_KEY: &str = "userBypasses";

/// Whole policy document, keyed by guild id
pub type PolicyDocument = BTreeMap<u64, GuildPolicy>;

/// Raw JSON form of one guild record
type RawPolicy = BTreeMap<String, Value>;

/// Policy record for one guild.
///
/// Only explicit overrides are stored. Reads that miss fall back to
/// [`PolicyFlag::default_value`] or an empty list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawPolicy", into = "RawPolicy")]
pub struct GuildPolicy {
    /// Flags an administrator has set explicitly
    pub flags: BTreeMap<PolicyFlag, bool>,
    /// Role lists per slot
    pub roles: BTreeMap<RoleSlot, Vec<RoleId>>,
    /// Role that bypasses every check in this guild
    pub universal_bypass_role: Option<RoleId>,
    /// User lists per bypass slot
    pub user_bypasses: BTreeMap<RoleSlot, Vec<UserId>>,
    /// Entries not understood here, written back as found
    pub extra: RawPolicy,
}

impl GuildPolicy {
    /// The explicitly stored value, if any
    #[must_use]
    pub fn flag_override(&self, flag: PolicyFlag) -> Option<bool> {
        self.flags.get(&flag).copied()
    }

    /// Effective value of a flag
    #[must_use]
    pub fn flag(&self, flag: PolicyFlag) -> bool {
        self.flag_override(flag)
            .unwrap_or_else(|| flag.default_value())
    }

    #[must_use]
    pub fn roles(&self, slot: RoleSlot) -> &[RoleId] {
        self.roles.get(&slot).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn users(&self, slot: RoleSlot) -> &[UserId] {
        self.user_bypasses.get(&slot).map_or(&[], Vec::as_slice)
    }
}

/// Parse a record key as one of the policy enums
fn parse_key<T: DeserializeOwned>(key: &str) -> Option<T> {
    serde_json::from_value(Value::String(key.to_owned())).ok()
}

fn parse_value<T: DeserializeOwned>(value: &Value) -> Option<T> {
    serde_json::from_value(value.clone()).ok()
}

fn id_array<T: std::fmt::Display>(ids: &[T]) -> Value {
    Value::Array(ids.iter().map(|id| Value::String(id.to_string())).collect())
}

/// Move the entries of a nested section up into the flat record
fn hoist_section(raw: &mut RawPolicy, section: &str) {
    if !matches!(raw.get(section), Some(Value::Object(_))) {
        return;
    }
    if let Some(Value::Object(inner)) = raw.remove(section) {
        for (key, value) in inner {
            raw.entry(key).or_insert(value);
        }
    }
}

/// Rename a key unless the target is already present
fn rename_key(raw: &mut RawPolicy, from: &str, to: &str) {
    if raw.contains_key(to) {
        return;
    }
    if let Some(value) = raw.remove(from) {
        raw.insert(to.to_owned(), value);
    }
}

impl From<RawPolicy> for GuildPolicy {
    fn from(mut raw: RawPolicy) -> Self {
        // Records from before the flat layout nested these under snake_case keys
        hoist_section(&mut raw, "flags");
        hoist_section(&mut raw, "roles");
        rename_key(&mut raw, "universal_bypass_role", UNIVERSAL_KEY);
        rename_key(&mut raw, "user_bypasses", USER_BYPASSES_KEY);

        let mut policy = Self::default();
        for (key, value) in raw {
            if key == UNIVERSAL_KEY {
                match parse_value::<Option<RoleId>>(&value) {
                    Some(role) => policy.universal_bypass_role = role,
                    None => {
                        policy.extra.insert(key, value);
                    }
                }
                continue;
            }
            if key == USER_BYPASSES_KEY {
                let Value::Object(slots) = value else {
                    policy.extra.insert(key, value);
                    continue;
                };
                let mut unknown = serde_json::Map::new();
                for (slot_key, ids) in slots {
                    match (parse_key::<RoleSlot>(&slot_key), parse_value::<Vec<UserId>>(&ids)) {
                        (Some(slot), Some(users)) => {
                            policy.user_bypasses.insert(slot, users);
                        }
                        _ => {
                            unknown.insert(slot_key, ids);
                        }
                    }
                }
                if !unknown.is_empty() {
                    policy.extra.insert(key, Value::Object(unknown));
                }
                continue;
            }
            if let (Some(flag), Value::Bool(enabled)) = (parse_key::<PolicyFlag>(&key), &value) {
                policy.flags.insert(flag, *enabled);
                continue;
            }
            if let (Some(slot), Some(roles)) = (parse_key::<RoleSlot>(&key), parse_value::<Vec<RoleId>>(&value)) {
                policy.roles.insert(slot, roles);
                continue;
            }
            policy.extra.insert(key, value);
        }
        policy
    }
}

impl From<GuildPolicy> for RawPolicy {
    fn from(policy: GuildPolicy) -> Self {
        let mut raw = policy.extra;
        for (flag, enabled) in policy.flags {
            raw.insert(flag.key(), Value::Bool(enabled));
        }
        for (slot, roles) in policy.roles {
            raw.insert(slot.key(), id_array(&roles));
        }
        raw.insert(
            UNIVERSAL_KEY.to_owned(),
            policy
                .universal_bypass_role
                .map_or(Value::Null, |role| Value::String(role.to_string())),
        );

        let mut users = match raw.remove(USER_BYPASSES_KEY) {
            Some(Value::Object(kept)) => kept,
            _ => serde_json::Map::new(),
        };
        for (slot, ids) in policy.user_bypasses {
            users.insert(slot.key(), id_array(&ids));
        }
        if !users.is_empty() {
            raw.insert(USER_BYPASSES_KEY.to_owned(), Value::Object(users));
        }
        raw
    }
}

/// File-backed store for [`GuildPolicy`] records
#[derive(Debug)]
pub struct GuildPolicyStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl Default for GuildPolicyStore {
    fn default() -> Self {
        Self::new(DEFAULT_POLICY_FILE)
    }
}

impl GuildPolicyStore {
    /// Create a store backed by the given file. Nothing is read until first use.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling file a new document is written to before it replaces the old one
    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Read and parse the document. A missing or blank file is empty.
    async fn read_document(&self) -> PolicyResult<PolicyDocument> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(PolicyDocument::new()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(PolicyDocument::new());
        }
        serde_json::from_str(&content).map_err(|source| PolicyError::Malformed {
            path: self.path.display().to_string(),
            source,
        })
    }

    /// Load the whole document.
    ///
    /// A missing file is an empty document. An unreadable or malformed file is
    /// logged and also treated as empty.
    pub async fn load_document(&self) -> PolicyDocument {
        self.read_document().await.unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "Failed to load guild policy, using defaults");
            PolicyDocument::new()
        })
    }

    async fn persist(&self, document: &PolicyDocument) -> PolicyResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let json = serde_json::to_string_pretty(document)?;
        let temp = self.temp_path();
        tokio::fs::write(&temp, json).await?;
        if let Err(e) = tokio::fs::rename(&temp, &self.path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e.into());
        }
        debug!(path = %self.path.display(), guilds = document.len(), "Guild policy saved");
        Ok(())
    }

    /// Apply `change` to one guild's record and persist if it reports a change.
    ///
    /// A document that cannot be read or parsed is left alone and the error
    /// is returned.
    async fn update<F>(&self, guild_id: GuildId, change: F) -> PolicyResult<()>
    where
        F: FnOnce(&mut GuildPolicy) -> bool,
    {
        let _guard = self.write_lock.lock().await;
        let mut document = self.read_document().await?;
        let changed = change(document.entry(guild_id.get()).or_default());
        if changed {
            self.persist(&document).await?;
        }
        Ok(())
    }

    /// Policy for one guild, or the empty policy if none was ever written
    pub async fn guild(&self, guild_id: GuildId) -> GuildPolicy {
        self.load_document()
            .await
            .remove(&guild_id.get())
            .unwrap_or_default()
    }

    pub async fn flag(&self, guild_id: GuildId, flag: PolicyFlag) -> bool {
        self.guild(guild_id).await.flag(flag)
    }

    /// Effective value of every flag for a guild
    pub async fn flags(&self, guild_id: GuildId) -> Vec<(PolicyFlag, bool)> {
        let policy = self.guild(guild_id).await;
        PolicyFlag::ALL
            .iter()
            .map(|&flag| (flag, policy.flag(flag)))
            .collect()
    }

    /// # Errors
    ///
    /// Returns an error if the policy document cannot be read back or written.
    pub async fn set_flag(&self, guild_id: GuildId, flag: PolicyFlag, value: bool) -> PolicyResult<()> {
        self.update(guild_id, |policy| {
            policy.flags.insert(flag, value);
            true
        })
        .await
    }

    pub async fn role_list(&self, guild_id: GuildId, slot: RoleSlot) -> Vec<RoleId> {
        self.guild(guild_id).await.roles(slot).to_vec()
    }

    /// # Errors
    ///
    /// Returns an error if the policy document cannot be read back or written.
    pub async fn set_role_list(&self, guild_id: GuildId, slot: RoleSlot, role_ids: Vec<RoleId>) -> PolicyResult<()> {
        self.update(guild_id, |policy| {
            policy.roles.insert(slot, role_ids);
            true
        })
        .await
    }

    /// Add a role to a slot. Adding a role that is already listed does nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the policy document cannot be read back or written.
    pub async fn add_role(&self, guild_id: GuildId, slot: RoleSlot, role_id: RoleId) -> PolicyResult<()> {
        self.update(guild_id, |policy| {
            let roles = policy.roles.entry(slot).or_default();
            if roles.contains(&role_id) {
                return false;
            }
            roles.push(role_id);
            true
        })
        .await
    }

    /// Remove a role from a slot. Removing an absent role does nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the policy document cannot be read back or written.
    pub async fn remove_role(&self, guild_id: GuildId, slot: RoleSlot, role_id: RoleId) -> PolicyResult<()> {
        self.update(guild_id, |policy| {
            let Some(roles) = policy.roles.get_mut(&slot) else {
                return false;
            };
            let before = roles.len();
            roles.retain(|id| *id != role_id);
            roles.len() != before
        })
        .await
    }

    pub async fn universal_role(&self, guild_id: GuildId) -> Option<RoleId> {
        self.guild(guild_id).await.universal_bypass_role
    }

    /// # Errors
    ///
    /// Returns an error if the policy document cannot be read back or written.
    pub async fn set_universal_role(&self, guild_id: GuildId, role_id: Option<RoleId>) -> PolicyResult<()> {
        self.update(guild_id, |policy| {
            let changed = policy.universal_bypass_role != role_id;
            policy.universal_bypass_role = role_id;
            changed
        })
        .await
    }

    pub async fn user_bypass_list(&self, guild_id: GuildId, slot: RoleSlot) -> Vec<UserId> {
        self.guild(guild_id).await.users(slot).to_vec()
    }

    /// # Errors
    ///
    /// Returns an error if the policy document cannot be read back or written.
    pub async fn set_user_bypass_list(&self, guild_id: GuildId, slot: RoleSlot, user_ids: Vec<UserId>) -> PolicyResult<()> {
        self.update(guild_id, |policy| {
            policy.user_bypasses.insert(slot, user_ids);
            true
        })
        .await
    }

    /// # Errors
    ///
    /// Returns an error if the policy document cannot be read back or written.
    pub async fn add_user_bypass(&self, guild_id: GuildId, slot: RoleSlot, user_id: UserId) -> PolicyResult<()> {
        self.update(guild_id, |policy| {
            let users = policy.user_bypasses.entry(slot).or_default();
            if users.contains(&user_id) {
                return false;
            }
            users.push(user_id);
            true
        })
        .await
    }

    /// # Errors
    ///
    /// Returns an error if the policy document cannot be read back or written.
    pub async fn remove_user_bypass(&self, guild_id: GuildId, slot: RoleSlot, user_id: UserId) -> PolicyResult<()> {
        self.update(guild_id, |policy| {
            let Some(users) = policy.user_bypasses.get_mut(&slot) else {
                return false;
            };
            let before = users.len();
            users.retain(|id| *id != user_id);
            users.len() != before
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_store() -> GuildPolicyStore {
        let path = std::env::temp_dir()
            .join(format!("guild_warden_test_{}", Uuid::new_v4()))
            .join("guild-permissions.json");
        GuildPolicyStore::new(path)
    }

    async fn cleanup(store: &GuildPolicyStore) {
        if let Some(dir) = store.path().parent() {
            let _ = tokio::fs::remove_dir_all(dir).await;
        }
    }

    #[tokio::test]
    async fn test_flag_defaults_without_record() {
        let store = temp_store();
        let guild = GuildId::new(1001);

        assert!(store.flag(guild, PolicyFlag::MassBanEnabled).await);
        assert!(!store.flag(guild, PolicyFlag::AutoDeleteChannels).await);
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_set_flag_persists() {
        let store = temp_store();
        let guild = GuildId::new(1001);

        store
            .set_flag(guild, PolicyFlag::MassKickEnabled, false)
            .await
            .expect("Failed to set flag");

        assert!(!store.flag(guild, PolicyFlag::MassKickEnabled).await);
        // A second store over the same file sees the write
        let reopened = GuildPolicyStore::new(store.path());
        let policy = reopened.guild(guild).await;
        assert_eq!(policy.flag_override(PolicyFlag::MassKickEnabled), Some(false));
        assert_eq!(policy.flag_override(PolicyFlag::MassBanEnabled), None);
        // Other guilds are untouched
        assert!(store.flag(GuildId::new(2002), PolicyFlag::MassKickEnabled).await);

        cleanup(&store).await;
    }

    #[tokio::test]
    async fn test_add_role_is_idempotent() {
        let store = temp_store();
        let guild = GuildId::new(1001);
        let role = RoleId::new(77);

        store
            .add_role(guild, RoleSlot::MassKickBypassRoles, role)
            .await
            .expect("Failed to add role");
        store
            .add_role(guild, RoleSlot::MassKickBypassRoles, role)
            .await
            .expect("Failed to add role");

        assert_eq!(
            store.role_list(guild, RoleSlot::MassKickBypassRoles).await,
            vec![role]
        );

        cleanup(&store).await;
    }

    #[tokio::test]
    async fn test_remove_absent_role_is_noop() {
        let store = temp_store();
        let guild = GuildId::new(1001);

        store
            .remove_role(guild, RoleSlot::MassBanBypassRoles, RoleId::new(5))
            .await
            .expect("Removing an absent role should succeed");
        assert!(store.role_list(guild, RoleSlot::MassBanBypassRoles).await.is_empty());

        store
            .set_role_list(guild, RoleSlot::MassBanBypassRoles, vec![RoleId::new(6), RoleId::new(7)])
            .await
            .expect("Failed to set roles");
        store
            .remove_role(guild, RoleSlot::MassBanBypassRoles, RoleId::new(5))
            .await
            .expect("Removing an absent role should succeed");
        store
            .remove_role(guild, RoleSlot::MassBanBypassRoles, RoleId::new(6))
            .await
            .expect("Failed to remove role");

        assert_eq!(
            store.role_list(guild, RoleSlot::MassBanBypassRoles).await,
            vec![RoleId::new(7)]
        );

        cleanup(&store).await;
    }

    #[tokio::test]
    async fn test_user_bypass_lists() {
        let store = temp_store();
        let guild = GuildId::new(1001);
        let user = UserId::new(4242);

        store
            .add_user_bypass(guild, RoleSlot::ChannelMonitorBypassRoles, user)
            .await
            .expect("Failed to add user");
        store
            .add_user_bypass(guild, RoleSlot::ChannelMonitorBypassRoles, user)
            .await
            .expect("Failed to add user");
        assert_eq!(
            store.user_bypass_list(guild, RoleSlot::ChannelMonitorBypassRoles).await,
            vec![user]
        );
        // User lists are separate from role lists
        assert!(store.role_list(guild, RoleSlot::ChannelMonitorBypassRoles).await.is_empty());

        store
            .remove_user_bypass(guild, RoleSlot::ChannelMonitorBypassRoles, user)
            .await
            .expect("Failed to remove user");
        assert!(store
            .user_bypass_list(guild, RoleSlot::ChannelMonitorBypassRoles)
            .await
            .is_empty());

        cleanup(&store).await;
    }

    #[tokio::test]
    async fn test_universal_role_slot() {
        let store = temp_store();
        let guild = GuildId::new(1001);

        assert_eq!(store.universal_role(guild).await, None);
        store
            .set_universal_role(guild, Some(RoleId::new(900)))
            .await
            .expect("Failed to set universal role");
        assert_eq!(store.universal_role(guild).await, Some(RoleId::new(900)));
        store
            .set_universal_role(guild, None)
            .await
            .expect("Failed to clear universal role");
        assert_eq!(store.universal_role(guild).await, None);

        cleanup(&store).await;
    }

    async fn write_raw(store: &GuildPolicyStore, content: &str) {
        let dir = store.path().parent().expect("temp path has a parent");
        tokio::fs::create_dir_all(dir).await.expect("Failed to create dir");
        tokio::fs::write(store.path(), content).await.expect("Failed to write");
    }

    async fn read_raw(store: &GuildPolicyStore) -> Value {
        let content = tokio::fs::read_to_string(store.path())
            .await
            .expect("Failed to read policy file");
        serde_json::from_str(&content).expect("Policy file should be valid JSON")
    }

    #[tokio::test]
    async fn test_malformed_document_reads_as_defaults_but_refuses_writes() {
        let store = temp_store();
        let guild = GuildId::new(1001);
        write_raw(&store, "{ not json").await;

        assert!(store.flag(guild, PolicyFlag::MassBanEnabled).await);
        assert_eq!(store.guild(guild).await, GuildPolicy::default());

        let result = store.set_flag(guild, PolicyFlag::MassBanEnabled, false).await;
        assert!(matches!(result, Err(PolicyError::Malformed { .. })));
        let result = store
            .add_role(guild, RoleSlot::MassBanBypassRoles, RoleId::new(5))
            .await;
        assert!(matches!(result, Err(PolicyError::Malformed { .. })));

        // The file is left exactly as found
        let content = tokio::fs::read_to_string(store.path())
            .await
            .expect("Failed to read policy file");
        assert_eq!(content, "{ not json");

        cleanup(&store).await;
    }

    #[tokio::test]
    async fn test_write_keeps_other_guilds_and_unknown_keys() {
        let store = temp_store();
        write_raw(
            &store,
            r#"{"111":{"flags":{"MASS_BAN_ENABLED":false,"FUTURE_FLAG":true}},"222":{"flags":{"MASS_KICK_ENABLED":false}}}"#,
        )
        .await;

        assert!(!store.flag(GuildId::new(111), PolicyFlag::MassBanEnabled).await);
        store
            .set_flag(GuildId::new(333), PolicyFlag::AutoDeleteRoles, true)
            .await
            .expect("Failed to set flag");

        assert!(!store.flag(GuildId::new(111), PolicyFlag::MassBanEnabled).await);
        assert!(!store.flag(GuildId::new(222), PolicyFlag::MassKickEnabled).await);
        assert!(store.flag(GuildId::new(333), PolicyFlag::AutoDeleteRoles).await);

        let raw = read_raw(&store).await;
        assert_eq!(raw["111"]["FUTURE_FLAG"], Value::Bool(true));
        assert_eq!(raw["111"]["MASS_BAN_ENABLED"], Value::Bool(false));
        assert_eq!(raw["222"]["MASS_KICK_ENABLED"], Value::Bool(false));

        cleanup(&store).await;
    }

    #[tokio::test]
    async fn test_reads_flat_layout_with_string_ids() {
        let store = temp_store();
        let guild = GuildId::new(111);
        write_raw(
            &store,
            r#"{
                "111": {
                    "MASS_BAN_ENABLED": false,
                    "AUTO_DELETE_WEBHOOKS": true,
                    "MASS_BAN_BYPASS_ROLES": ["55", "56"],
                    "UNIVERSAL_BYPASS_ROLE": "900",
                    "userBypasses": {
                        "MASS_BAN_BYPASS_ROLES": ["4242"],
                        "SOME_LATER_SLOT": ["1"]
                    },
                    "joinGate": {"minAgeDays": 3}
                }
            }"#,
        )
        .await;

        assert!(!store.flag(guild, PolicyFlag::MassBanEnabled).await);
        assert!(store.flag(guild, PolicyFlag::AutoDeleteWebhooks).await);
        assert_eq!(
            store.role_list(guild, RoleSlot::MassBanBypassRoles).await,
            vec![RoleId::new(55), RoleId::new(56)]
        );
        assert_eq!(store.universal_role(guild).await, Some(RoleId::new(900)));
        assert_eq!(
            store.user_bypass_list(guild, RoleSlot::MassBanBypassRoles).await,
            vec![UserId::new(4242)]
        );

        store
            .add_user_bypass(guild, RoleSlot::MassKickBypassRoles, UserId::new(7))
            .await
            .expect("Failed to add user");
        let raw = read_raw(&store).await;
        let record = &raw["111"];
        assert_eq!(record["joinGate"]["minAgeDays"], Value::from(3));
        assert_eq!(record["userBypasses"]["SOME_LATER_SLOT"][0], Value::from("1"));
        assert_eq!(record["userBypasses"]["MASS_KICK_BYPASS_ROLES"][0], Value::from("7"));
        assert_eq!(record["MASS_BAN_BYPASS_ROLES"][1], Value::from("56"));
        assert_eq!(record["UNIVERSAL_BYPASS_ROLE"], Value::from("900"));

        cleanup(&store).await;
    }

    #[tokio::test]
    async fn test_write_replaces_file_without_leaving_temp() {
        let store = temp_store();
        let guild = GuildId::new(1001);

        store
            .set_flag(guild, PolicyFlag::MassKickEnabled, false)
            .await
            .expect("Failed to set flag");
        store
            .set_flag(guild, PolicyFlag::MassBanEnabled, false)
            .await
            .expect("Failed to set flag");

        assert!(!store.temp_path().exists());
        let raw = read_raw(&store).await;
        assert_eq!(raw["1001"]["MASS_KICK_ENABLED"], Value::Bool(false));
        assert_eq!(raw["1001"]["MASS_BAN_ENABLED"], Value::Bool(false));

        cleanup(&store).await;
    }

    #[tokio::test]
    async fn test_blank_file_is_an_empty_document() {
        let store = temp_store();
        let guild = GuildId::new(1001);
        write_raw(&store, "\n").await;

        store
            .set_flag(guild, PolicyFlag::MassBanEnabled, false)
            .await
            .expect("A blank file should accept writes");
        assert!(!store.flag(guild, PolicyFlag::MassBanEnabled).await);

        cleanup(&store).await;
    }

    #[tokio::test]
    async fn test_flags_lists_every_flag() {
        let store = temp_store();
        let guild = GuildId::new(1001);
        store
            .set_flag(guild, PolicyFlag::AutoDeleteRoles, true)
            .await
            .expect("Failed to set flag");

        let flags = store.flags(guild).await;
        assert_eq!(flags.len(), PolicyFlag::ALL.len());
        assert!(flags.contains(&(PolicyFlag::AutoDeleteRoles, true)));
        assert!(flags.contains(&(PolicyFlag::AutoDeleteWebhooks, false)));

        cleanup(&store).await;
    }

    #[test]
    fn test_document_serialization() {
        let mut policy = GuildPolicy::default();
        policy.flags.insert(PolicyFlag::MassKickEnabled, false);
        policy
            .roles
            .insert(RoleSlot::MassKickBypassRoles, vec![RoleId::new(11)]);
        let mut document = PolicyDocument::new();
        document.insert(1001, policy.clone());

        let json = serde_json::to_string(&document).expect("Failed to serialize");
        assert!(json.contains("\"1001\""));
        assert!(json.contains("MASS_KICK_ENABLED"));
        assert!(json.contains("MASS_KICK_BYPASS_ROLES"));

        let parsed: PolicyDocument = serde_json::from_str(&json).expect("Failed to deserialize");
        assert_eq!(parsed.get(&1001), Some(&policy));
        assert!(parsed.get(&1001).is_some_and(|policy| policy.extra.is_empty()));
    }
}
