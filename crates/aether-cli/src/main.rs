mod restart;

use std::sync::Arc;
use std::time::Duration;

use aether_common::config::AetherConfig;
use aether_common::{APP_NAME, logging};
use aether_core::{AccessPolicy, ActivityKind, Dispatcher, ExitRequest};
use aether_store::{ConfigStore, StatusDescriptor};
use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use tracing::info;

use crate::restart::restarter_for;

#[derive(Debug, Parser)]
#[command(name = "aether", about = "Aether Discord moderation bot", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Connect to Discord and start handling commands.
    Run,
    /// Validate local setup and generate default config if missing.
    Doctor,
    /// Inspect or edit the persisted whitelist without starting the bot.
    Whitelist {
        #[command(subcommand)]
        command: WhitelistCommand,
    },
    /// Inspect or edit the persisted presence status.
    Status {
        #[command(subcommand)]
        command: StatusCommand,
    },
}

#[derive(Debug, Subcommand)]
enum WhitelistCommand {
    /// List whitelisted user ids.
    List,
    /// Add a user id.
    Add { user_id: u64 },
    /// Remove a user id.
    Remove { user_id: u64 },
}

#[derive(Debug, Subcommand)]
enum StatusCommand {
    /// Show the status applied on startup.
    Show,
    /// Set the status applied on next startup (playing, listening, watching, competing).
    Set { kind: String, text: Vec<String> },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Some(Command::Run) => run(),
        Some(Command::Doctor) => doctor(),
        Some(Command::Whitelist { command }) => whitelist(command),
        Some(Command::Status { command }) => status(command),
        None => {
            println!("{APP_NAME} CLI bootstrap complete.");
            println!("Run `aether doctor` to generate and validate local config.");
            Ok(())
        }
    }
}

fn load_initialized_config() -> Result<AetherConfig> {
    let (config, _, _) = AetherConfig::load_or_create()?;
    config.validate_and_prepare()?;
    logging::init(&config.log_level);
    Ok(config)
}

fn open_store(config: &AetherConfig) -> ConfigStore {
    ConfigStore::in_dir(&config.data_dir)
}

fn run() -> Result<()> {
    let config = load_initialized_config()?;
    let token = config.resolve_token().ok_or_else(|| {
        anyhow!(
            "discord token missing: set {} or discord.token",
            config.discord.token_env
        )
    })?;

    let store = Arc::new(open_store(&config));
    // Refuse to start on corrupt state rather than silently resetting it.
    store
        .verify()
        .with_context(|| "persisted bot state is unreadable; fix or remove the file")?;

    let dispatcher = Arc::new(Dispatcher::new(
        AccessPolicy::new(config.discord.owner_id),
        store,
        config.discord.command_prefix.clone(),
    ));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    info!(
        owner_id = config.discord.owner_id,
        prefix = %config.discord.command_prefix,
        data_dir = %config.data_dir.display(),
        "starting {APP_NAME}"
    );
    let exit = runtime.block_on(aether_discord::run(&token, dispatcher))?;
    runtime.shutdown_timeout(Duration::from_secs(5));

    match exit {
        Some(ExitRequest::Restart) => {
            info!(mode = ?config.process.restart_mode, "restarting");
            let restarter = restarter_for(config.process.restart_mode)
                .with_context(|| "failed to locate current executable")?;
            let err = restarter.restart_in_place();
            Err::<(), _>(err).with_context(|| "failed to restart process")
        }
        Some(ExitRequest::Shutdown) | None => {
            info!("{APP_NAME} stopped");
            Ok(())
        }
    }
}

fn doctor() -> Result<()> {
    let (config, path, created) = AetherConfig::load_or_create()?;
    config.validate_and_prepare()?;
    logging::init(&config.log_level);

    let store = open_store(&config);
    let (allowlist, status) = store.verify()?;

    println!("{} doctor: OK", APP_NAME);
    println!("config: {}", path.display());
    println!("data_dir: {}", config.data_dir.display());
    println!("owner_id: {}", config.discord.owner_id);
    println!("command_prefix: {}", config.discord.command_prefix);
    println!("token_configured: {}", config.resolve_token().is_some());
    println!("restart_mode: {:?}", config.process.restart_mode);
    println!("whitelisted_users: {}", allowlist.len());
    println!("status: {} {}", status.kind, status.text);
    println!("created_config: {created}");

    Ok(())
}

fn whitelist(command: WhitelistCommand) -> Result<()> {
    let config = load_initialized_config()?;
    let store = open_store(&config);

    match command {
        WhitelistCommand::List => {
            let allowlist = store.load_allowlist()?;
            println!("whitelisted_users: {}", allowlist.len());
            for id in allowlist.ids() {
                println!("- {id}");
            }
        }
        WhitelistCommand::Add { user_id } => {
            let added = store.add_to_allowlist(user_id)?;
            println!("user_id: {user_id}");
            println!("added: {added}");
        }
        WhitelistCommand::Remove { user_id } => {
            let removed = store.remove_from_allowlist(user_id)?;
            println!("user_id: {user_id}");
            println!("removed: {removed}");
        }
    }
    Ok(())
}

fn status(command: StatusCommand) -> Result<()> {
    let config = load_initialized_config()?;
    let store = open_store(&config);

    match command {
        StatusCommand::Show => {
            let status = store.load_status()?;
            println!("type: {}", status.kind);
            println!("text: {}", status.text);
        }
        StatusCommand::Set { kind, text } => {
            let kind = kind.to_lowercase();
            let Some(activity) = ActivityKind::parse(&kind) else {
                bail!("invalid status type: {kind} (use playing, listening, watching, competing)");
            };
            let text = text.join(" ");
            if text.trim().is_empty() {
                bail!("status text cannot be empty");
            }
            store.save_status(&StatusDescriptor::new(activity.as_str(), text.trim()))?;
            println!("status_saved: true");
            println!("note: a running bot picks this up on its next restart");
        }
    }
    Ok(())
}
