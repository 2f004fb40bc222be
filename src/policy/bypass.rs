//! Bypass resolution
//!
//! Deciding whether an actor is exempt is a pure function of the actor and
//! the rules. Loading the rules from the store is the caller's job.

use crate::detection::ActorContext;
use crate::policy::{GuildPolicy, RoleSlot};
use poise::serenity_prelude::{RoleId, UserId};

/// Exemption inputs for one policy
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BypassRules {
    /// Holding this role exempts an actor from every policy
    pub universal_role: Option<RoleId>,
    /// Roles exempt from this policy
    pub roles: Vec<RoleId>,
    /// Users exempt from this policy
    pub users: Vec<UserId>,
}

impl BypassRules {
    /// Collect the rules for `slot` from a guild policy.
    ///
    /// The guild's own universal role takes precedence over `fallback_universal`.
    #[must_use]
    pub fn for_slot(policy: &GuildPolicy, slot: RoleSlot, fallback_universal: Option<RoleId>) -> Self {
        Self {
            universal_role: policy.universal_bypass_role.or(fallback_universal),
            roles: policy.roles(slot).to_vec(),
            users: policy.users(slot).to_vec(),
        }
    }
}

/// Whether `actor` is exempt under `rules`
#[must_use]
pub fn is_bypassed(actor: &ActorContext, rules: &BypassRules) -> bool {
    if let Some(universal) = rules.universal_role {
        if actor.role_ids.contains(&universal) {
            return true;
        }
    }

    actor.role_ids.iter().any(|role| rules.roles.contains(role))
        || rules.users.contains(&actor.user_id)
}
