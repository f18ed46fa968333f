use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::args::Lookup;
use crate::presence::ActivityKind;

/// Failure reported by the platform client (HTTP error, missing permission, gateway gone).
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct PlatformError(pub String);

impl PlatformError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRef {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberProfile {
    pub id: u64,
    /// Account name as shown in titles, e.g. `alice` or `alice#0420`.
    pub tag: String,
    pub display_name: String,
    pub joined_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Assigned roles, `@everyone` excluded.
    pub role_ids: Vec<u64>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildOverview {
    pub id: u64,
    pub name: String,
    pub owner_id: u64,
    pub member_count: Option<u64>,
    pub role_count: usize,
    pub created_at: DateTime<Utc>,
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// Platform-neutral rich message. The session decides how to render it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoCard {
    pub title: String,
    pub description: Option<String>,
    pub color: u32,
    pub fields: Vec<CardField>,
    pub thumbnail_url: Option<String>,
    pub footer: Option<String>,
}

impl InfoCard {
    pub fn new(title: impl Into<String>, color: u32) -> Self {
        Self {
            title: title.into(),
            description: None,
            color,
            fields: Vec::new(),
            thumbnail_url: None,
            footer: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(CardField {
            name: name.into(),
            value: value.into(),
            inline,
        });
        self
    }

    pub fn thumbnail(mut self, url: Option<String>) -> Self {
        self.thumbnail_url = url;
        self
    }

    pub fn footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = Some(footer.into());
        self
    }

    pub fn field_value(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| field.value.as_str())
    }
}

/// Handle to the live platform connection, passed explicitly into every dispatch.
#[async_trait]
pub trait Session: Send + Sync {
    async fn send_text(&self, channel_id: u64, content: &str) -> Result<(), PlatformError>;

    async fn send_card(&self, channel_id: u64, card: &InfoCard) -> Result<(), PlatformError>;

    /// `Ok(None)` when nothing matches; `Err` only for transport failures.
    async fn find_member(
        &self,
        guild_id: u64,
        lookup: &Lookup,
    ) -> Result<Option<MemberProfile>, PlatformError>;

    async fn find_role(&self, guild_id: u64, lookup: &Lookup)
    -> Result<Option<RoleRef>, PlatformError>;

    async fn guild_overview(&self, guild_id: u64) -> Result<GuildOverview, PlatformError>;

    async fn kick(
        &self,
        guild_id: u64,
        user_id: u64,
        reason: Option<&str>,
    ) -> Result<(), PlatformError>;

    async fn ban(
        &self,
        guild_id: u64,
        user_id: u64,
        reason: Option<&str>,
    ) -> Result<(), PlatformError>;

    async fn add_role(&self, guild_id: u64, user_id: u64, role_id: u64)
    -> Result<(), PlatformError>;

    async fn remove_role(
        &self,
        guild_id: u64,
        user_id: u64,
        role_id: u64,
    ) -> Result<(), PlatformError>;

    /// Gateway heartbeat round trip, if one has been measured yet.
    async fn latency(&self) -> Option<Duration>;

    async fn set_activity(&self, kind: ActivityKind, text: &str) -> Result<(), PlatformError>;

    /// Disconnects every shard. Pending HTTP requests are unaffected.
    async fn close(&self);
}
