use crate::config::BotConfig;
use crate::policy::{PolicyFlag, RoleSlot};
use crate::{Context, Error};
use poise::serenity_prelude::{CreateEmbed, GuildId, Role, User, UserId};
use poise::{CreateReply, command};

/// Whether `author` may change security settings.
///
/// Only the guild owner and configured bot owners can.
#[must_use]
pub fn may_administer(author: UserId, guild_owner: Option<UserId>, bot_owners: &[UserId]) -> bool {
    guild_owner == Some(author) || bot_owners.contains(&author)
}

/// Why the author may not run a security command here, if they may not.
///
/// Guilds outside `approved_guilds` are refused before ownership is checked.
#[must_use]
pub fn admin_refusal(
    config: &BotConfig,
    guild_id: Option<GuildId>,
    author: UserId,
    guild_owner: Option<UserId>,
) -> Option<&'static str> {
    if guild_id.is_some_and(|guild_id| !config.guild_allowed(guild_id)) {
        return Some("This server is not approved to use this bot.");
    }
    if !may_administer(author, guild_owner, &config.owner_ids) {
        return Some("Only the server owner can change security settings.");
    }
    None
}

/// Command check restricting security commands to owners of approved guilds
async fn is_owner(ctx: Context<'_>) -> Result<bool, Error> {
    let config = &ctx.data().config;
    let guild_id = ctx.guild_id();
    let guild_owner = match guild_id {
        Some(guild_id) if config.guild_allowed(guild_id) => guild_owner(ctx, guild_id).await,
        _ => None,
    };
    match admin_refusal(config, guild_id, ctx.author().id, guild_owner) {
        Some(message) => {
            reply(ctx, message).await?;
            Ok(false)
        }
        None => Ok(true),
    }
}

async fn guild_owner(ctx: Context<'_>, guild_id: GuildId) -> Option<UserId> {
    let cached = ctx.guild().map(|guild| guild.owner_id);
    if cached.is_some() {
        return cached;
    }
    guild_id
        .to_partial_guild(ctx.http())
        .await
        .ok()
        .map(|guild| guild.owner_id)
}

/// Guild the command runs in; commands below are all guild-only
fn require_guild(ctx: Context<'_>) -> Result<GuildId, Error> {
    ctx.guild_id().ok_or_else(|| "This command can only be used in a server".into())
}

async fn reply(ctx: Context<'_>, content: impl Into<String>) -> Result<(), Error> {
    ctx.send(CreateReply::default().content(content).ephemeral(true))
        .await?;
    Ok(())
}

fn on_off(value: bool) -> &'static str {
    if value { "enabled" } else { "disabled" }
}

/// Render id mentions as one line, or a placeholder when empty
fn mention_list<T: std::fmt::Display>(ids: &[T], prefix: &str) -> String {
    if ids.is_empty() {
        return "None".to_string();
    }
    ids.iter()
        .map(|id| format!("<{prefix}{id}>"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Manage security feature flags
#[command(
    slash_command,
    guild_only,
    subcommands("permission_set", "permission_list"),
    subcommand_required,
    check = "is_owner"
)]
pub async fn permission(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Turn a security feature on or off
#[command(slash_command, guild_only, rename = "set", check = "is_owner")]
pub async fn permission_set(
    ctx: Context<'_>,
    #[description = "Feature to change"] flag: PolicyFlag,
    #[description = "Whether the feature is enabled"] enabled: bool,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    ctx.data().policy.set_flag(guild_id, flag, enabled).await?;
    reply(ctx, format!("`{}` is now {}.", flag.key(), on_off(enabled))).await
}

/// Show every security feature and whether it is enabled
#[command(slash_command, guild_only, rename = "list", check = "is_owner")]
pub async fn permission_list(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let lines = ctx
        .data()
        .policy
        .flags(guild_id)
        .await
        .into_iter()
        .map(|(flag, value)| format!("{} `{}`", if value { "✅" } else { "❌" }, flag.key()))
        .collect::<Vec<_>>()
        .join("\n");

    let embed = CreateEmbed::new()
        .title("Security Features")
        .description(lines);
    ctx.send(CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}

/// Manage bypass roles and users
#[command(
    slash_command,
    guild_only,
    subcommands("bypass_add", "bypass_remove", "bypass_list", "bypass_universal"),
    subcommand_required,
    check = "is_owner"
)]
pub async fn bypass(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Exempt a role or a user from one security feature
#[command(slash_command, guild_only, rename = "add", check = "is_owner")]
pub async fn bypass_add(
    ctx: Context<'_>,
    #[description = "Bypass list to change"] slot: RoleSlot,
    #[description = "Role to exempt"] role: Option<Role>,
    #[description = "User to exempt"] user: Option<User>,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    if user.is_some() && !slot.is_bypass() {
        return reply(ctx, "Users can only be added to bypass lists.").await;
    }
    let store = &ctx.data().policy;
    let mut changed = Vec::new();

    if let Some(role) = role {
        store.add_role(guild_id, slot, role.id).await?;
        changed.push(format!("<@&{}>", role.id));
    }
    if let Some(user) = user {
        store.add_user_bypass(guild_id, slot, user.id).await?;
        changed.push(format!("<@{}>", user.id));
    }

    if changed.is_empty() {
        return reply(ctx, "Provide a role or a user.").await;
    }
    reply(ctx, format!("Added {} to `{}`.", changed.join(" and "), slot.key())).await
}

/// Remove a role or a user from a bypass list
#[command(slash_command, guild_only, rename = "remove", check = "is_owner")]
pub async fn bypass_remove(
    ctx: Context<'_>,
    #[description = "Bypass list to change"] slot: RoleSlot,
    #[description = "Role to remove"] role: Option<Role>,
    #[description = "User to remove"] user: Option<User>,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let store = &ctx.data().policy;
    let mut changed = Vec::new();

    if let Some(role) = role {
        store.remove_role(guild_id, slot, role.id).await?;
        changed.push(format!("<@&{}>", role.id));
    }
    if let Some(user) = user {
        store.remove_user_bypass(guild_id, slot, user.id).await?;
        changed.push(format!("<@{}>", user.id));
    }

    if changed.is_empty() {
        return reply(ctx, "Provide a role or a user.").await;
    }
    reply(ctx, format!("Removed {} from `{}`.", changed.join(" and "), slot.key())).await
}

/// Show the roles and users on every bypass list
#[command(slash_command, guild_only, rename = "list", check = "is_owner")]
pub async fn bypass_list(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let policy = ctx.data().policy.guild(guild_id).await;
    let universal = policy
        .universal_bypass_role
        .or(ctx.data().config.universal_bypass_role);

    let embed = RoleSlot::ALL.iter().fold(
        CreateEmbed::new().title("Bypass Lists").field(
            "Universal Bypass Role",
            universal.map_or_else(|| "None".to_string(), |role| format!("<@&{role}>")),
            false,
        ),
        |embed, &slot| {
            let roles = mention_list(policy.roles(slot), "@&");
            let users = mention_list(policy.users(slot), "@");
            embed.field(slot.key(), format!("Roles: {roles}\nUsers: {users}"), false)
        },
    );
    ctx.send(CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}

/// Set or clear the role that bypasses every security feature
#[command(slash_command, guild_only, rename = "universal", check = "is_owner")]
pub async fn bypass_universal(
    ctx: Context<'_>,
    #[description = "Role to use; leave empty to clear"] role: Option<Role>,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx)?;
    let role_id = role.map(|role| role.id);
    ctx.data().policy.set_universal_role(guild_id, role_id).await?;

    match role_id {
        Some(role_id) => reply(ctx, format!("Universal bypass role set to <@&{role_id}>.")).await,
        None => reply(ctx, "Universal bypass role cleared.").await,
    }
}

/// Every command the bot registers
#[must_use]
pub fn all() -> Vec<poise::Command<crate::Data, Error>> {
    vec![permission(), bypass()]
}
