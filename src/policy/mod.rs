//! Per-guild policy
//!
//! Feature flags, bypass role and user lists, and the resolver that decides
//! whether an actor is exempt from a policy.

mod bypass;
mod flags;
mod store;

pub use bypass::{BypassRules, is_bypassed};
pub use flags::{PolicyFlag, RoleSlot};
pub use store::{DEFAULT_POLICY_FILE, GuildPolicy, GuildPolicyStore, PolicyDocument};
