use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use aether_core::{
    ActivityKind, GuildOverview, InfoCard, Lookup, MemberProfile, PlatformError, RoleRef, Session,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serenity::all::{
    ChannelId, Context, CreateEmbed, CreateEmbedFooter, CreateMessage, GuildId, Member, Role,
    RoleId, ShardManager, Timestamp, UserId,
};
use serenity::gateway::ActivityData;
use serenity::http::HttpError;
use serenity::prelude::TypeMapKey;
use tracing::warn;

/// Number of days of message history removed alongside a ban.
const BAN_DELETE_MESSAGE_DAYS: u8 = 1;
const MEMBER_SEARCH_LIMIT: u64 = 25;

pub struct ShardManagerKey;

impl TypeMapKey for ShardManagerKey {
    type Value = Arc<ShardManager>;
}

/// `Session` backed by a serenity event context.
pub struct DiscordSession {
    ctx: Context,
}

impl DiscordSession {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    async fn shard_manager(&self) -> Option<Arc<ShardManager>> {
        self.ctx.data.read().await.get::<ShardManagerKey>().cloned()
    }
}

#[async_trait]
impl Session for DiscordSession {
    async fn send_text(&self, channel_id: u64, content: &str) -> Result<(), PlatformError> {
        ChannelId::new(channel_id)
            .say(&self.ctx.http, content)
            .await
            .map(|_| ())
            .map_err(platform_error)
    }

    async fn send_card(&self, channel_id: u64, card: &InfoCard) -> Result<(), PlatformError> {
        let message = CreateMessage::new().embed(build_embed(card));
        ChannelId::new(channel_id)
            .send_message(&self.ctx.http, message)
            .await
            .map(|_| ())
            .map_err(platform_error)
    }

    async fn find_member(
        &self,
        guild_id: u64,
        lookup: &Lookup,
    ) -> Result<Option<MemberProfile>, PlatformError> {
        let guild = GuildId::new(guild_id);
        match lookup {
            Lookup::Id(id) => match guild.member(&self.ctx, UserId::new(*id)).await {
                Ok(member) => Ok(Some(member_profile(&member))),
                Err(err) if is_not_found(&err) => Ok(None),
                Err(err) => Err(platform_error(err)),
            },
            Lookup::Name(name) => {
                let candidates = guild
                    .search_members(&self.ctx.http, name, Some(MEMBER_SEARCH_LIMIT))
                    .await
                    .map_err(platform_error)?;
                Ok(candidates
                    .iter()
                    .find(|member| {
                        member_matches_name(
                            name,
                            &member.user.name,
                            member.user.global_name.as_deref(),
                            member.nick.as_deref(),
                        )
                    })
                    .map(member_profile))
            }
        }
    }

    async fn find_role(
        &self,
        guild_id: u64,
        lookup: &Lookup,
    ) -> Result<Option<RoleRef>, PlatformError> {
        let roles = GuildId::new(guild_id)
            .roles(&self.ctx.http)
            .await
            .map_err(platform_error)?;
        Ok(select_role(&roles, lookup).map(|role| RoleRef {
            id: role.id.get(),
            name: role.name.clone(),
        }))
    }

    async fn guild_overview(&self, guild_id: u64) -> Result<GuildOverview, PlatformError> {
        let guild_id = GuildId::new(guild_id);
        let cached = self.ctx.cache.guild(guild_id).map(|guild| GuildOverview {
            id: guild.id.get(),
            name: guild.name.clone(),
            owner_id: guild.owner_id.get(),
            member_count: Some(guild.member_count),
            role_count: guild.roles.len(),
            created_at: to_utc(guild.id.created_at()),
            icon_url: guild.icon_url(),
        });
        if let Some(overview) = cached {
            return Ok(overview);
        }

        let guild = guild_id
            .to_partial_guild_with_counts(&self.ctx.http)
            .await
            .map_err(platform_error)?;
        Ok(GuildOverview {
            id: guild.id.get(),
            name: guild.name.clone(),
            owner_id: guild.owner_id.get(),
            member_count: guild.approximate_member_count,
            role_count: guild.roles.len(),
            created_at: to_utc(guild.id.created_at()),
            icon_url: guild.icon_url(),
        })
    }

    async fn kick(
        &self,
        guild_id: u64,
        user_id: u64,
        reason: Option<&str>,
    ) -> Result<(), PlatformError> {
        let guild = GuildId::new(guild_id);
        let user = UserId::new(user_id);
        let result = match reason {
            Some(reason) => guild.kick_with_reason(&self.ctx.http, user, reason).await,
            None => guild.kick(&self.ctx.http, user).await,
        };
        result.map_err(platform_error)
    }

    async fn ban(
        &self,
        guild_id: u64,
        user_id: u64,
        reason: Option<&str>,
    ) -> Result<(), PlatformError> {
        let guild = GuildId::new(guild_id);
        let user = UserId::new(user_id);
        let result = match reason {
            Some(reason) => {
                guild
                    .ban_with_reason(&self.ctx.http, user, BAN_DELETE_MESSAGE_DAYS, reason)
                    .await
            }
            None => guild.ban(&self.ctx.http, user, BAN_DELETE_MESSAGE_DAYS).await,
        };
        result.map_err(platform_error)
    }

    async fn add_role(
        &self,
        guild_id: u64,
        user_id: u64,
        role_id: u64,
    ) -> Result<(), PlatformError> {
        self.ctx
            .http
            .add_member_role(
                GuildId::new(guild_id),
                UserId::new(user_id),
                RoleId::new(role_id),
                None,
            )
            .await
            .map_err(platform_error)
    }

    async fn remove_role(
        &self,
        guild_id: u64,
        user_id: u64,
        role_id: u64,
    ) -> Result<(), PlatformError> {
        self.ctx
            .http
            .remove_member_role(
                GuildId::new(guild_id),
                UserId::new(user_id),
                RoleId::new(role_id),
                None,
            )
            .await
            .map_err(platform_error)
    }

    async fn latency(&self) -> Option<Duration> {
        let manager = self.shard_manager().await?;
        let runners = manager.runners.lock().await;
        runners.get(&self.ctx.shard_id).and_then(|runner| runner.latency)
    }

    async fn set_activity(&self, kind: ActivityKind, text: &str) -> Result<(), PlatformError> {
        self.ctx.set_activity(Some(activity_data(kind, text)));
        Ok(())
    }

    async fn close(&self) {
        match self.shard_manager().await {
            Some(manager) => manager.shutdown_all().await,
            None => warn!("shard manager unavailable; cannot close session"),
        }
    }
}

pub(crate) fn activity_data(kind: ActivityKind, text: &str) -> ActivityData {
    match kind {
        ActivityKind::Playing => ActivityData::playing(text),
        ActivityKind::Listening => ActivityData::listening(text),
        ActivityKind::Watching => ActivityData::watching(text),
        ActivityKind::Competing => ActivityData::competing(text),
    }
}

fn build_embed(card: &InfoCard) -> CreateEmbed {
    let mut embed = CreateEmbed::new().title(&card.title).color(card.color);
    if let Some(description) = &card.description {
        embed = embed.description(description);
    }
    for field in &card.fields {
        embed = embed.field(&field.name, &field.value, field.inline);
    }
    if let Some(url) = &card.thumbnail_url {
        embed = embed.thumbnail(url);
    }
    if let Some(footer) = &card.footer {
        embed = embed.footer(CreateEmbedFooter::new(footer));
    }
    embed
}

fn member_profile(member: &Member) -> MemberProfile {
    MemberProfile {
        id: member.user.id.get(),
        tag: member.user.tag(),
        display_name: member.display_name().to_string(),
        joined_at: member.joined_at.map(to_utc),
        created_at: to_utc(member.user.id.created_at()),
        role_ids: member.roles.iter().map(|role| role.get()).collect(),
        avatar_url: member.user.avatar_url(),
    }
}

/// Exact match on account name, global display name, or guild nickname.
pub(crate) fn member_matches_name(
    query: &str,
    username: &str,
    global_name: Option<&str>,
    nick: Option<&str>,
) -> bool {
    username == query || global_name == Some(query) || nick == Some(query)
}

/// Id match first, then exact name, then case-insensitive name.
fn select_role<'a>(roles: &'a HashMap<RoleId, Role>, lookup: &Lookup) -> Option<&'a Role> {
    match lookup {
        Lookup::Id(id) => roles.get(&RoleId::new(*id)),
        Lookup::Name(name) => roles
            .values()
            .find(|role| role.name == *name)
            .or_else(|| {
                roles
                    .values()
                    .find(|role| role.name.eq_ignore_ascii_case(name))
            }),
    }
}

fn to_utc(at: Timestamp) -> DateTime<Utc> {
    DateTime::from_timestamp(at.unix_timestamp(), 0).unwrap_or_default()
}

fn is_not_found(err: &serenity::Error) -> bool {
    matches!(
        err,
        serenity::Error::Http(HttpError::UnsuccessfulRequest(response))
            if response.status_code.as_u16() == 404
    )
}

fn platform_error(err: serenity::Error) -> PlatformError {
    PlatformError::new(err.to_string())
}
