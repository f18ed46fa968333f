pub mod config;
pub mod logging;

pub const APP_NAME: &str = "Aether";

pub use config::{AetherConfig, ConfigError, DiscordConfig, ProcessConfig, RestartMode};
