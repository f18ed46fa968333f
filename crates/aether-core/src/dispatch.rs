use std::sync::Arc;

use aether_store::{ConfigStore, StatusDescriptor, StoreError};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::args::{self, Args, Lookup, MemberArg, RoleArg};
use crate::lifecycle::{ExitRequest, ExitSignal};
use crate::policy::{AccessPolicy, Actor};
use crate::presence::{ActivityKind, PresenceManager};
use crate::registry::{Action, CommandRegistry, CommandSpec, Privilege, Section};
use crate::session::{InfoCard, MemberProfile, PlatformError, RoleRef, Session};

const DENIED: &str = "⛔ You don't have permission to use this command.";
const GUILD_ONLY: &str = "⚠️ This command can only be used in a server.";
const INVALID_STATUS: &str = "⚠️ Invalid status type. Use: playing, listening, watching, competing";
const STORAGE_FAILED: &str = "⚠️ Command failed: could not access bot storage.";
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const BLUE: u32 = 0x3498db;
const GREEN: u32 = 0x2ecc71;
const PURPLE: u32 = 0x9b59b6;

#[derive(Debug, Clone, Copy)]
pub struct InboundMessage<'a> {
    pub actor: Actor,
    pub channel_id: u64,
    pub content: &'a str,
}

/// Why a command did not complete. Every variant is turned into a channel reply.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("missing or malformed arguments")]
    Usage,
    #[error("member \"{0}\" not found")]
    UnresolvedMember(String),
    #[error("role \"{0}\" not found")]
    UnresolvedRole(String),
    #[error("command requires a server")]
    GuildOnly,
    #[error(transparent)]
    Platform(#[from] PlatformError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct Dispatcher {
    registry: CommandRegistry,
    policy: AccessPolicy,
    store: Arc<ConfigStore>,
    presence: PresenceManager,
    prefix: String,
    exit: ExitSignal,
}

impl Dispatcher {
    pub fn new(policy: AccessPolicy, store: Arc<ConfigStore>, prefix: impl Into<String>) -> Self {
        Self {
            registry: CommandRegistry::with_defaults(),
            policy,
            store,
            presence: PresenceManager::new(),
            prefix: prefix.into(),
            exit: ExitSignal::new(),
        }
    }

    /// Set by `shutdown`/`restart` before the session is closed.
    pub fn exit_signal(&self) -> &ExitSignal {
        &self.exit
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Splits `<prefix><name> <rest>`. `None` for anything that is not a command.
    pub fn parse<'m>(&self, content: &'m str) -> Option<(&'m str, &'m str)> {
        let body = content.strip_prefix(self.prefix.as_str())?;
        let end = body.find(char::is_whitespace).unwrap_or(body.len());
        let name = &body[..end];
        if name.is_empty() {
            return None;
        }
        Some((name, &body[end..]))
    }

    /// The registered command a message invokes, if any.
    pub fn command_for(&self, content: &str) -> Option<&CommandSpec> {
        let (name, _) = self.parse(content)?;
        self.registry.get(name)
    }

    /// Applies the persisted status once the session is up.
    pub async fn on_ready(&self, session: &dyn Session) {
        match self.store.load_status() {
            Ok(status) => {
                if let Err(err) = self.presence.apply(session, &status).await {
                    warn!(error = %err, "failed to apply persisted status");
                }
            }
            Err(err) => error!(error = %err, "failed to load persisted status"),
        }
    }

    /// Handles one inbound message. Returns an exit request when the owner asked to stop.
    pub async fn dispatch(
        &self,
        session: &dyn Session,
        message: &InboundMessage<'_>,
    ) -> Option<ExitRequest> {
        if message.actor.is_bot {
            return None;
        }
        let (name, rest) = self.parse(message.content)?;
        let Some(spec) = self.registry.get(name) else {
            debug!(command = name, "ignoring unknown command");
            return None;
        };
        let actor = &message.actor;
        let channel_id = message.channel_id;
        info!(
            command = spec.name,
            actor_id = actor.id,
            guild_id = ?actor.guild_id,
            "command received"
        );

        match self.denial_for(spec, actor) {
            Ok(None) => {}
            Ok(Some(denial)) => {
                info!(command = spec.name, actor_id = actor.id, "command denied");
                self.reply_best_effort(session, channel_id, denial).await;
                return None;
            }
            Err(err) => {
                self.report(session, channel_id, spec, &CommandError::Store(err))
                    .await;
                return None;
            }
        }

        match self.execute(session, spec, actor, channel_id, rest).await {
            Ok(exit) => exit,
            Err(err) => {
                self.report(session, channel_id, spec, &err).await;
                None
            }
        }
    }

    fn denial_for(
        &self,
        spec: &CommandSpec,
        actor: &Actor,
    ) -> Result<Option<&'static str>, StoreError> {
        match spec.privilege {
            Privilege::Public => Ok(None),
            Privilege::OwnerOnly { denial } => {
                Ok((!self.policy.is_owner(actor)).then_some(denial))
            }
            Privilege::Trusted => {
                // Re-read on every check so edits made elsewhere apply immediately.
                let allowlist = self.store.load_allowlist()?;
                Ok((!self.policy.is_authorized(actor, &allowlist)).then_some(DENIED))
            }
        }
    }

    async fn execute(
        &self,
        session: &dyn Session,
        spec: &CommandSpec,
        actor: &Actor,
        channel_id: u64,
        rest: &str,
    ) -> Result<Option<ExitRequest>, CommandError> {
        if spec.guild_only() && actor.guild_id.is_none() {
            return Err(CommandError::GuildOnly);
        }
        let args = args::bind(spec.params, rest).ok_or(CommandError::Usage)?;

        match (spec.action, args) {
            (Action::Kick | Action::Ban, Args::MemberWithReason { member, reason }) => {
                let reason = reason.as_deref();
                self.moderate(session, spec.action, actor, channel_id, &member, reason)
                    .await?;
            }
            (Action::AddRole | Action::RemoveRole, Args::MemberAndRole { member, role }) => {
                let add = spec.action == Action::AddRole;
                self.change_role(session, add, actor, channel_id, &member, &role)
                    .await?;
            }
            (Action::Shutdown, Args::None) => {
                let request = ExitRequest::Shutdown;
                self.request_exit(session, actor, channel_id, request).await;
                return Ok(Some(request));
            }
            (Action::Restart, Args::None) => {
                let request = ExitRequest::Restart;
                self.request_exit(session, actor, channel_id, request).await;
                return Ok(Some(request));
            }
            (Action::Status, Args::None) => {
                self.send(session, channel_id, "✅ I'm online and ready!").await?;
            }
            (Action::ServerInfo, Args::None) => {
                self.server_info(session, actor, channel_id).await?;
            }
            (Action::UserInfo, Args::OptionalMember(member)) => {
                self.user_info(session, actor, channel_id, member).await?;
            }
            (Action::Ping, Args::None) => {
                let reply = match session.latency().await {
                    Some(latency) => format!("🏓 Pong! Latency: `{}ms`", latency.as_millis()),
                    None => "🏓 Pong! Latency: `unknown`".to_string(),
                };
                self.send(session, channel_id, &reply).await?;
            }
            (Action::SetStatus, Args::StatusText { kind, text }) => {
                self.set_status(session, channel_id, &kind, text).await?;
            }
            (Action::AddWhitelist, Args::Member(member)) => {
                let id = self.whitelist_target(session, actor, &member, true).await?;
                let reply = if self.store.add_to_allowlist(id)? {
                    info!(user_id = id, "whitelist entry added");
                    format!("✅ <@{id}> has been added to the whitelist.")
                } else {
                    format!("⚠️ <@{id}> is already whitelisted.")
                };
                self.send(session, channel_id, &reply).await?;
            }
            (Action::RemoveWhitelist, Args::Member(member)) => {
                let id = self.whitelist_target(session, actor, &member, false).await?;
                let reply = if self.store.remove_from_allowlist(id)? {
                    info!(user_id = id, "whitelist entry removed");
                    format!("❌ <@{id}> has been removed from the whitelist.")
                } else {
                    format!("⚠️ <@{id}> is not whitelisted.")
                };
                self.send(session, channel_id, &reply).await?;
            }
            (Action::ShowWhitelist, Args::None) => {
                let allowlist = self.store.load_allowlist()?;
                let reply = if allowlist.is_empty() {
                    "📭 Whitelist is empty.".to_string()
                } else {
                    let mentions: Vec<String> =
                        allowlist.ids().iter().map(|id| format!("<@{id}>")).collect();
                    format!("✅ Whitelisted users:\n{}", mentions.join("\n"))
                };
                self.send(session, channel_id, &reply).await?;
            }
            (Action::Help, Args::None) => {
                session.send_card(channel_id, &self.help_card()).await?;
            }
            (action, args) => {
                error!(?action, ?args, "registry shape does not match handler");
                return Err(CommandError::Usage);
            }
        }
        Ok(None)
    }

    async fn request_exit(
        &self,
        session: &dyn Session,
        actor: &Actor,
        channel_id: u64,
        request: ExitRequest,
    ) {
        let farewell = match request {
            ExitRequest::Shutdown => "👋 Shutting down...",
            ExitRequest::Restart => "🔄 Restarting bot...",
        };
        self.reply_best_effort(session, channel_id, farewell).await;
        // Closing lets the client loop return, and the driver reads the signal right after.
        self.exit.request(request);
        info!(actor_id = actor.id, ?request, "exit requested");
        session.close().await;
    }

    async fn moderate(
        &self,
        session: &dyn Session,
        action: Action,
        actor: &Actor,
        channel_id: u64,
        member: &MemberArg,
        reason: Option<&str>,
    ) -> Result<(), CommandError> {
        let guild_id = require_guild(actor)?;
        let target = resolve_member(session, guild_id, member).await?;
        let verb = if action == Action::Ban {
            session.ban(guild_id, target.id, reason).await?;
            "banned"
        } else {
            session.kick(guild_id, target.id, reason).await?;
            "kicked"
        };
        info!(
            actor_id = actor.id,
            target_id = target.id,
            guild_id,
            reason = reason.unwrap_or(""),
            "member {verb}"
        );
        self.send(session, channel_id, &format!("<@{}> has been {verb}.", target.id))
            .await
    }

    async fn change_role(
        &self,
        session: &dyn Session,
        add: bool,
        actor: &Actor,
        channel_id: u64,
        member: &MemberArg,
        role: &RoleArg,
    ) -> Result<(), CommandError> {
        let guild_id = require_guild(actor)?;
        let target = resolve_member(session, guild_id, member).await?;
        let role_ref = resolve_role(session, guild_id, role).await?;

        let reply = if add {
            session.add_role(guild_id, target.id, role_ref.id).await?;
            format!("✅ {} role added to <@{}>", role_ref.name, target.id)
        } else {
            session.remove_role(guild_id, target.id, role_ref.id).await?;
            format!("❌ {} role removed from <@{}>", role_ref.name, target.id)
        };
        info!(
            actor_id = actor.id,
            target_id = target.id,
            role_id = role_ref.id,
            add,
            "member roles changed"
        );
        self.send(session, channel_id, &reply).await
    }

    async fn server_info(
        &self,
        session: &dyn Session,
        actor: &Actor,
        channel_id: u64,
    ) -> Result<(), CommandError> {
        let guild = session.guild_overview(require_guild(actor)?).await?;
        let members = guild
            .member_count
            .map(|count| count.to_string())
            .unwrap_or_else(|| "Unknown".to_string());
        let card = InfoCard::new(format!("📊 Server Info: {}", guild.name), BLUE)
            .field("🆔 Server ID", guild.id.to_string(), false)
            .field("👑 Owner", format!("<@{}>", guild.owner_id), false)
            .field("👥 Members", members, true)
            .field("📂 Roles", guild.role_count.to_string(), true)
            .field("📅 Created On", format_time(&guild.created_at), false)
            .thumbnail(guild.icon_url);
        session.send_card(channel_id, &card).await?;
        Ok(())
    }

    async fn user_info(
        &self,
        session: &dyn Session,
        actor: &Actor,
        channel_id: u64,
        member: Option<MemberArg>,
    ) -> Result<(), CommandError> {
        let guild_id = require_guild(actor)?;
        let member = member.unwrap_or_else(|| MemberArg {
            raw: format!("<@{}>", actor.id),
            lookup: Lookup::Id(actor.id),
        });
        let profile = resolve_member(session, guild_id, &member).await?;
        session.send_card(channel_id, &user_card(&profile)).await?;
        Ok(())
    }

    async fn set_status(
        &self,
        session: &dyn Session,
        channel_id: u64,
        kind: &str,
        text: String,
    ) -> Result<(), CommandError> {
        let Some(activity) = ActivityKind::parse(&kind.to_lowercase()) else {
            return self.send(session, channel_id, INVALID_STATUS).await;
        };
        let status = StatusDescriptor::new(activity.as_str(), text);
        self.store.save_status(&status)?;
        self.presence.apply(session, &status).await?;
        let reply = format!("✅ Status updated to **{} {}**", activity.as_str(), status.text);
        self.send(session, channel_id, &reply).await
    }

    /// In a guild, additions must name a current member. Removals take mentions and
    /// raw ids as-is so departed users can still be dropped. Names need a guild.
    async fn whitelist_target(
        &self,
        session: &dyn Session,
        actor: &Actor,
        member: &MemberArg,
        must_be_member: bool,
    ) -> Result<u64, CommandError> {
        match (&member.lookup, actor.guild_id) {
            (_, Some(guild_id)) if must_be_member => {
                Ok(resolve_member(session, guild_id, member).await?.id)
            }
            (Lookup::Id(id), _) => Ok(*id),
            (Lookup::Name(_), Some(guild_id)) => {
                Ok(resolve_member(session, guild_id, member).await?.id)
            }
            (Lookup::Name(_), None) => Err(CommandError::UnresolvedMember(member.raw.clone())),
        }
    }

    pub fn help_card(&self) -> InfoCard {
        let mut card = InfoCard::new("🤖 Bot Commands", PURPLE)
            .description("Here are the available commands:");
        for section in [Section::Moderation, Section::OwnerOnly, Section::Info] {
            let lines: Vec<String> = self
                .registry
                .in_section(section)
                .map(|spec| format!("`{}{}`", self.prefix, spec.usage))
                .collect();
            card = card.field(section.heading(), lines.join("\n"), false);
        }
        card.footer("✅ Only Owner/Admin/Whitelisted users can use most commands.")
    }

    async fn send(
        &self,
        session: &dyn Session,
        channel_id: u64,
        content: &str,
    ) -> Result<(), CommandError> {
        session.send_text(channel_id, content).await?;
        Ok(())
    }

    async fn reply_best_effort(&self, session: &dyn Session, channel_id: u64, content: &str) {
        if let Err(err) = session.send_text(channel_id, content).await {
            warn!(channel_id, error = %err, "failed to send reply");
        }
    }

    async fn report(
        &self,
        session: &dyn Session,
        channel_id: u64,
        spec: &CommandSpec,
        err: &CommandError,
    ) {
        let reply = match err {
            CommandError::Usage => format!("⚠️ Usage: `{}{}`", self.prefix, spec.usage),
            CommandError::UnresolvedMember(raw) => format!("⚠️ Member \"{raw}\" not found."),
            CommandError::UnresolvedRole(raw) => format!("⚠️ Role \"{raw}\" not found."),
            CommandError::GuildOnly => GUILD_ONLY.to_string(),
            CommandError::Platform(err) => {
                warn!(command = spec.name, error = %err, "platform action failed");
                format!("⚠️ Command failed: {err}")
            }
            CommandError::Store(err) => {
                error!(command = spec.name, error = %err, "storage failure");
                STORAGE_FAILED.to_string()
            }
        };
        self.reply_best_effort(session, channel_id, &reply).await;
    }
}

fn require_guild(actor: &Actor) -> Result<u64, CommandError> {
    actor.guild_id.ok_or(CommandError::GuildOnly)
}

/// All-digit input is tried as an id first, then as a name.
async fn resolve_member(
    session: &dyn Session,
    guild_id: u64,
    member: &MemberArg,
) -> Result<MemberProfile, CommandError> {
    if let Some(profile) = session.find_member(guild_id, &member.lookup).await? {
        return Ok(profile);
    }
    if let Some(name) = member.name_fallback() {
        if let Some(profile) = session.find_member(guild_id, &name).await? {
            return Ok(profile);
        }
    }
    Err(CommandError::UnresolvedMember(member.raw.clone()))
}

async fn resolve_role(
    session: &dyn Session,
    guild_id: u64,
    role: &RoleArg,
) -> Result<RoleRef, CommandError> {
    if let Some(found) = session.find_role(guild_id, &role.lookup).await? {
        return Ok(found);
    }
    if let Some(name) = role.name_fallback() {
        if let Some(found) = session.find_role(guild_id, &name).await? {
            return Ok(found);
        }
    }
    Err(CommandError::UnresolvedRole(role.raw.clone()))
}

fn user_card(profile: &MemberProfile) -> InfoCard {
    let roles = if profile.role_ids.is_empty() {
        "No roles".to_string()
    } else {
        profile
            .role_ids
            .iter()
            .map(|id| format!("<@&{id}>"))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let joined = profile
        .joined_at
        .as_ref()
        .map(format_time)
        .unwrap_or_else(|| "Unknown".to_string());
    InfoCard::new(format!("👤 User Info: {}", profile.tag), GREEN)
        .field("🆔 User ID", profile.id.to_string(), false)
        .field("📛 Nickname", profile.display_name.clone(), true)
        .field("📅 Joined Server", joined, false)
        .field("📅 Account Created", format_time(&profile.created_at), false)
        .field("📂 Roles", roles, false)
        .thumbnail(profile.avatar_url.clone())
}

fn format_time(at: &DateTime<Utc>) -> String {
    at.format(TIME_FORMAT).to_string()
}
