//! Exemption checks: members holding a configured role are never moderated.

use serenity::all::{Context, GuildId, RoleId, UserId};
use tracing::{debug, warn};

/// Returns true if any of the member's role names is an exemption role.
pub fn is_exempt<'a>(role_names: impl IntoIterator<Item = &'a str>, exemptions: &[String]) -> bool {
    role_names
        .into_iter()
        .any(|name| exemptions.iter().any(|ex| ex == name))
}

/// Resolve the role names of a guild member.
///
/// `known_roles` comes from the partial member attached to a message; when
/// absent the member is fetched. Role ids are named from the cache first.
pub async fn member_role_names(
    ctx: &Context,
    guild_id: GuildId,
    user_id: UserId,
    known_roles: Option<&[RoleId]>,
) -> serenity::Result<Vec<String>> {
    let role_ids = match known_roles {
        Some(roles) => roles.to_vec(),
        None => {
            debug!("Member {} not attached, fetching", user_id);
            guild_id.member(ctx, user_id).await?.roles
        }
    };

    if role_ids.is_empty() {
        return Ok(Vec::new());
    }

    let cached: Option<Vec<String>> = ctx.cache.guild(guild_id).map(|guild| {
        role_ids
            .iter()
            .filter_map(|id| guild.roles.get(id).map(|role| role.name.clone()))
            .collect()
    });
    if let Some(names) = cached {
        return Ok(names);
    }

    let roles = guild_id.roles(&ctx.http).await?;
    Ok(role_ids
        .iter()
        .filter_map(|id| roles.get(id).map(|role| role.name.clone()))
        .collect())
}

/// Check whether a guild member is exempt from moderation.
///
/// A member that cannot be resolved (left the guild, API failure) is not exempt.
pub async fn check_member(
    ctx: &Context,
    guild_id: GuildId,
    user_id: UserId,
    known_roles: Option<&[RoleId]>,
    exemptions: &[String],
) -> bool {
    if exemptions.is_empty() {
        return false;
    }

    match member_role_names(ctx, guild_id, user_id, known_roles).await {
        Ok(names) => is_exempt(names.iter().map(String::as_str), exemptions),
        Err(e) => {
            warn!("Failed to resolve roles for {}: {}", user_id, e);
            false
        }
    }
}
