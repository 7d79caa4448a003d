//! Channel permission computation (guild base permissions, then channel overwrites).

use serde::Deserialize;

pub const ADMINISTRATOR: u64 = 1 << 3;
pub const MANAGE_MESSAGES: u64 = 1 << 13;
pub const ALL: u64 = u64::MAX;

/// Permission bitsets arrive as decimal strings; anything unparseable counts as no permissions.
pub fn parse_bits(s: &str) -> u64 {
    s.trim().parse().unwrap_or(0)
}

#[derive(Debug, Clone, Deserialize)]
pub struct Role {
    pub id: String,
    #[serde(default)]
    pub permissions: String,
}

/// Overwrite kind: 0 = role, 1 = member.
#[derive(Debug, Clone, Deserialize)]
pub struct Overwrite {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub allow: String,
    #[serde(default)]
    pub deny: String,
}

/// Inputs for computing a member's effective permissions in one channel.
pub struct PermissionContext<'a> {
    pub guild_id: &'a str,
    pub owner_id: &'a str,
    pub user_id: &'a str,
    pub guild_roles: &'a [Role],
    pub member_roles: &'a [String],
    pub overwrites: &'a [Overwrite],
}

pub fn compute_channel_permissions(ctx: &PermissionContext<'_>) -> u64 {
    if ctx.user_id == ctx.owner_id {
        return ALL;
    }

    let mut perms = 0u64;
    for role in ctx.guild_roles {
        if role.id == ctx.guild_id || ctx.member_roles.iter().any(|r| *r == role.id) {
            perms |= parse_bits(&role.permissions);
        }
    }
    if perms & ADMINISTRATOR != 0 {
        return ALL;
    }

    if let Some(everyone) = ctx.overwrites.iter().find(|o| o.id == ctx.guild_id) {
        perms &= !parse_bits(&everyone.deny);
        perms |= parse_bits(&everyone.allow);
    }

    let (mut allow, mut deny) = (0u64, 0u64);
    for o in ctx.overwrites.iter().filter(|o| o.kind == 0) {
        if ctx.member_roles.iter().any(|r| *r == o.id) {
            allow |= parse_bits(&o.allow);
            deny |= parse_bits(&o.deny);
        }
    }
    perms &= !deny;
    perms |= allow;

    if let Some(member) = ctx
        .overwrites
        .iter()
        .find(|o| o.kind == 1 && o.id == ctx.user_id)
    {
        perms &= !parse_bits(&member.deny);
        perms |= parse_bits(&member.allow);
    }
    perms
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role(id: &str, bits: u64) -> Role {
        Role {
            id: id.to_string(),
            permissions: bits.to_string(),
        }
    }

    fn overwrite(id: &str, kind: u8, allow: u64, deny: u64) -> Overwrite {
        Overwrite {
            id: id.to_string(),
            kind,
            allow: allow.to_string(),
            deny: deny.to_string(),
        }
    }

    fn can_manage(
        roles: &[Role],
        member_roles: &[&str],
        overwrites: &[Overwrite],
        owner: &str,
    ) -> bool {
        let member_roles: Vec<String> = member_roles.iter().map(|s| s.to_string()).collect();
        let ctx = PermissionContext {
            guild_id: "g",
            owner_id: owner,
            user_id: "bot",
            guild_roles: roles,
            member_roles: &member_roles,
            overwrites,
        };
        compute_channel_permissions(&ctx) & MANAGE_MESSAGES != 0
    }

    #[test]
    fn owner_has_everything() {
        assert!(can_manage(&[role("g", 0)], &[], &[], "bot"));
    }

    #[test]
    fn role_grants_manage_messages() {
        let roles = [role("g", 0), role("mod", MANAGE_MESSAGES)];
        assert!(can_manage(&roles, &["mod"], &[], "owner"));
        assert!(!can_manage(&roles, &[], &[], "owner"));
    }

    #[test]
    fn administrator_overrides_channel_deny() {
        let roles = [role("g", 0), role("admin", ADMINISTRATOR)];
        let ow = [overwrite("g", 0, 0, MANAGE_MESSAGES)];
        assert!(can_manage(&roles, &["admin"], &ow, "owner"));
    }

    #[test]
    fn everyone_deny_then_role_allow() {
        let roles = [role("g", MANAGE_MESSAGES), role("r", 0)];
        let deny_all = [overwrite("g", 0, 0, MANAGE_MESSAGES)];
        assert!(!can_manage(&roles, &["r"], &deny_all, "owner"));
        let with_role_allow = [
            overwrite("g", 0, 0, MANAGE_MESSAGES),
            overwrite("r", 0, MANAGE_MESSAGES, 0),
        ];
        assert!(can_manage(&roles, &["r"], &with_role_allow, "owner"));
    }

    #[test]
    fn member_overwrite_wins() {
        let roles = [role("g", 0), role("mod", MANAGE_MESSAGES)];
        let ow = [overwrite("bot", 1, 0, MANAGE_MESSAGES)];
        assert!(!can_manage(&roles, &["mod"], &ow, "owner"));
    }

    #[test]
    fn garbage_bits_are_zero() {
        assert_eq!(parse_bits("not a number"), 0);
        assert_eq!(parse_bits(" 8192 "), MANAGE_MESSAGES);
    }
}
