mod session;

use std::collections::HashMap;
use std::sync::Arc;

use aether_core::{Actor, CommandSpec, Dispatcher, ExitRequest, InboundMessage, Privilege};
use anyhow::{Context as _, Result, bail};
use async_trait::async_trait;
use serenity::all::{
    Client, Context, EventHandler, GatewayIntents, GuildId, Message, Permissions, Ready, RoleId,
};
use tracing::{info, warn};

pub use session::{DiscordSession, ShardManagerKey};

/// Routes gateway events into the dispatcher.
pub struct Handler {
    dispatcher: Arc<Dispatcher>,
}

impl Handler {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!(
            bot = %ready.user.tag(),
            guilds = ready.guilds.len(),
            "connected to discord gateway"
        );
        let session = DiscordSession::new(ctx);
        self.dispatcher.on_ready(&session).await;
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        let Some(spec) = self.dispatcher.command_for(&msg.content) else {
            return;
        };
        let actor = actor_for(&ctx, &msg, needs_admin_flag(spec)).await;
        let session = DiscordSession::new(ctx);
        let inbound = InboundMessage {
            actor,
            channel_id: msg.channel_id.get(),
            content: &msg.content,
        };
        // Exit requests land on the dispatcher's signal, read by `run`.
        self.dispatcher.dispatch(&session, &inbound).await;
    }
}

pub fn gateway_intents() -> GatewayIntents {
    GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
}

/// Connects and processes events until the session is closed by a command or Ctrl-C.
pub async fn run(token: &str, dispatcher: Arc<Dispatcher>) -> Result<Option<ExitRequest>> {
    let token = token.trim();
    if token.is_empty() {
        bail!("discord token is empty");
    }

    let exit = dispatcher.exit_signal().clone();
    let handler = Handler::new(dispatcher);
    let mut client = Client::builder(token, gateway_intents())
        .event_handler(handler)
        .await
        .with_context(|| "failed to build discord client")?;

    let shard_manager = Arc::clone(&client.shard_manager);
    client
        .data
        .write()
        .await
        .insert::<ShardManagerKey>(Arc::clone(&shard_manager));

    let interrupt_signal = exit.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received; closing discord session");
            interrupt_signal.request(ExitRequest::Shutdown);
            shard_manager.shutdown_all().await;
        }
    });

    client
        .start()
        .await
        .with_context(|| "discord client stopped with an error")?;
    Ok(exit.requested())
}

/// Only `Trusted` commands consult the administrator flag.
fn needs_admin_flag(spec: &CommandSpec) -> bool {
    spec.privilege == Privilege::Trusted
}

async fn actor_for(ctx: &Context, msg: &Message, check_admin: bool) -> Actor {
    let Some(guild_id) = msg.guild_id else {
        return Actor {
            id: msg.author.id.get(),
            is_guild_administrator: false,
            guild_id: None,
            is_bot: msg.author.bot,
        };
    };
    Actor {
        id: msg.author.id.get(),
        is_guild_administrator: check_admin && is_administrator(ctx, guild_id, msg).await,
        guild_id: Some(guild_id.get()),
        is_bot: msg.author.bot,
    }
}

/// Guild owner, or any held role (including `@everyone`) with ADMINISTRATOR.
async fn is_administrator(ctx: &Context, guild_id: GuildId, msg: &Message) -> bool {
    let member = match msg.member(ctx).await {
        Ok(member) => member,
        Err(err) => {
            warn!(user_id = msg.author.id.get(), error = %err, "failed to fetch invoking member");
            return false;
        }
    };
    let member_roles: Vec<u64> = member.roles.iter().map(|role| role.get()).collect();

    let cached = ctx.cache.guild(guild_id).map(|guild| {
        let permissions = role_permissions(&guild.roles);
        grants_administrator(
            guild.owner_id.get(),
            guild_id.get(),
            msg.author.id.get(),
            &member_roles,
            &permissions,
        )
    });
    if let Some(flag) = cached {
        return flag;
    }

    match guild_id.to_partial_guild(&ctx.http).await {
        Ok(guild) => grants_administrator(
            guild.owner_id.get(),
            guild_id.get(),
            msg.author.id.get(),
            &member_roles,
            &role_permissions(&guild.roles),
        ),
        Err(err) => {
            warn!(guild_id = guild_id.get(), error = %err, "failed to fetch guild roles");
            false
        }
    }
}

fn role_permissions(roles: &HashMap<RoleId, serenity::all::Role>) -> HashMap<u64, Permissions> {
    roles
        .iter()
        .map(|(id, role)| (id.get(), role.permissions))
        .collect()
}

fn grants_administrator(
    owner_id: u64,
    guild_id: u64,
    member_id: u64,
    member_roles: &[u64],
    permissions: &HashMap<u64, Permissions>,
) -> bool {
    if member_id == owner_id {
        return true;
    }
    // The @everyone role shares the guild's id.
    std::iter::once(&guild_id)
        .chain(member_roles.iter())
        .filter_map(|role| permissions.get(role))
        .any(|perms| perms.administrator())
}

#[cfg(test)]
mod tests {
    use aether_core::CommandRegistry;

    use super::*;

    const GUILD: u64 = 10;
    const OWNER: u64 = 1;
    const MEMBER: u64 = 2;
    const ADMIN_ROLE: u64 = 20;
    const PLAIN_ROLE: u64 = 21;

    fn permissions(everyone: Permissions) -> HashMap<u64, Permissions> {
        HashMap::from([
            (GUILD, everyone),
            (ADMIN_ROLE, Permissions::ADMINISTRATOR),
            (PLAIN_ROLE, Permissions::SEND_MESSAGES | Permissions::KICK_MEMBERS),
        ])
    }

    #[test]
    fn owner_is_administrator_without_roles() {
        let perms = permissions(Permissions::empty());
        assert!(grants_administrator(OWNER, GUILD, OWNER, &[], &perms));
    }

    #[test]
    fn administrator_role_grants_flag() {
        let perms = permissions(Permissions::empty());
        assert!(grants_administrator(OWNER, GUILD, MEMBER, &[PLAIN_ROLE, ADMIN_ROLE], &perms));
        assert!(!grants_administrator(OWNER, GUILD, MEMBER, &[PLAIN_ROLE], &perms));
    }

    #[test]
    fn everyone_role_counts() {
        let perms = permissions(Permissions::ADMINISTRATOR);
        assert!(grants_administrator(OWNER, GUILD, MEMBER, &[], &perms));
    }

    #[test]
    fn unknown_roles_are_ignored() {
        let perms = permissions(Permissions::empty());
        assert!(!grants_administrator(OWNER, GUILD, MEMBER, &[999], &perms));
    }

    #[test]
    fn admin_flag_is_only_fetched_for_trusted_commands() {
        let registry = CommandRegistry::with_defaults();
        let needs = |name: &str| registry.get(name).map(needs_admin_flag);
        assert_eq!(needs("kick"), Some(true));
        assert_eq!(needs("ping"), Some(true));
        assert_eq!(needs("help"), Some(false));
        assert_eq!(needs("shutdown"), Some(false));
        assert_eq!(needs("addwhitelist"), Some(false));
    }

    #[test]
    fn intents_include_message_content() {
        let intents = gateway_intents();
        assert!(intents.contains(GatewayIntents::MESSAGE_CONTENT));
        assert!(intents.contains(GatewayIntents::GUILD_MEMBERS));
    }
}
