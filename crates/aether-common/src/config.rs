use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_CONFIG_FILE: &str = ".aether/config.toml";
const DEFAULT_DATA_DIR: &str = ".aether";
const OWNER_ID_ENV: &str = "AETHER_OWNER_ID";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AetherConfig {
    pub data_dir: PathBuf,
    pub log_level: String,
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub process: ProcessConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Inline token. The variable named by `token_env` wins when set.
    pub token: Option<String>,
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default)]
    pub owner_id: u64,
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: None,
            token_env: default_token_env(),
            owner_id: 0,
            command_prefix: default_command_prefix(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartMode {
    /// Replace the running process image with a fresh copy of itself.
    #[default]
    Exec,
    /// Exit with a dedicated status code and let the service manager relaunch.
    Supervisor,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessConfig {
    #[serde(default)]
    pub restart_mode: RestartMode,
}

impl Default for AetherConfig {
    fn default() -> Self {
        let data_dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DEFAULT_DATA_DIR);

        Self {
            data_dir,
            log_level: "info".to_string(),
            discord: DiscordConfig::default(),
            process: ProcessConfig::default(),
        }
    }
}

fn default_token_env() -> String {
    "DISCORD_TOKEN".to_string()
}

fn default_command_prefix() -> String {
    "!".to_string()
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write config at {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    ParseFailed {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to serialize default config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("config has invalid value: {0}")]
    ValidationFailed(String),
}

impl AetherConfig {
    pub fn resolve_path() -> PathBuf {
        if let Ok(path) = env::var("AETHER_CONFIG") {
            return PathBuf::from(path);
        }

        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DEFAULT_CONFIG_FILE)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::ParseFailed {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let raw = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::WriteFailed {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, raw).map_err(|source| ConfigError::WriteFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }

    pub fn load_or_create() -> Result<(Self, PathBuf, bool), ConfigError> {
        let path = Self::resolve_path();
        if path.exists() {
            let mut cfg = Self::load(&path)?;
            cfg.apply_env_overrides()?;
            return Ok((cfg, path, false));
        }

        let mut cfg = Self::default();
        cfg.save(&path)?;
        cfg.apply_env_overrides()?;
        Ok((cfg, path, true))
    }

    /// Lets deployments pin the owner without editing the file.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(raw) = env::var(OWNER_ID_ENV) {
            self.discord.owner_id = parse_owner_id(&raw)?;
        }
        Ok(())
    }

    pub fn validate_and_prepare(&self) -> Result<(), ConfigError> {
        if self.log_level.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "log_level cannot be empty".to_string(),
            ));
        }
        let prefix = &self.discord.command_prefix;
        if prefix.is_empty() || prefix.chars().any(char::is_whitespace) {
            return Err(ConfigError::ValidationFailed(
                "discord.command_prefix must be non-empty and contain no whitespace".to_string(),
            ));
        }
        if self.discord.owner_id == 0 {
            return Err(ConfigError::ValidationFailed(format!(
                "discord.owner_id must be set (or export {OWNER_ID_ENV})"
            )));
        }
        fs::create_dir_all(&self.data_dir).map_err(|source| ConfigError::WriteFailed {
            path: self.data_dir.clone(),
            source,
        })?;
        Ok(())
    }

    pub fn resolve_token(&self) -> Option<String> {
        env::var(&self.discord.token_env)
            .ok()
            .or_else(|| self.discord.token.clone())
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
    }
}

fn parse_owner_id(raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse::<u64>().map_err(|_| {
        ConfigError::ValidationFailed(format!("{OWNER_ID_ENV} is not a numeric user id: {raw}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample(data_dir: PathBuf) -> AetherConfig {
        AetherConfig {
            data_dir,
            log_level: "debug".to_string(),
            discord: DiscordConfig {
                owner_id: 123_456_789_012_345_678,
                ..DiscordConfig::default()
            },
            process: ProcessConfig::default(),
        }
    }

    #[test]
    fn save_then_load_preserves_fields() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("nested/config.toml");
        let mut cfg = sample(dir.path().join("data"));
        cfg.process.restart_mode = RestartMode::Supervisor;
        cfg.save(&path).expect("save");

        let loaded = AetherConfig::load(&path).expect("load");
        assert_eq!(loaded.discord.owner_id, 123_456_789_012_345_678);
        assert_eq!(loaded.discord.command_prefix, "!");
        assert_eq!(loaded.discord.token_env, "DISCORD_TOKEN");
        assert_eq!(loaded.process.restart_mode, RestartMode::Supervisor);
        assert_eq!(loaded.log_level, "debug");
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let raw = "data_dir = \"/tmp/aether\"\nlog_level = \"info\"\n";
        let cfg: AetherConfig = toml::from_str(raw).expect("parse");
        assert_eq!(cfg.discord.command_prefix, "!");
        assert_eq!(cfg.discord.owner_id, 0);
        assert_eq!(cfg.process.restart_mode, RestartMode::Exec);
    }

    #[test]
    fn validation_rejects_unset_owner() {
        let dir = tempdir().expect("tempdir");
        let mut cfg = sample(dir.path().join("data"));
        cfg.discord.owner_id = 0;
        let err = cfg.validate_and_prepare().expect_err("must fail");
        assert!(err.to_string().contains("owner_id"));
    }

    #[test]
    fn validation_rejects_whitespace_prefix() {
        let dir = tempdir().expect("tempdir");
        let mut cfg = sample(dir.path().join("data"));
        cfg.discord.command_prefix = "! ".to_string();
        assert!(cfg.validate_and_prepare().is_err());
    }

    #[test]
    fn validation_creates_data_dir() {
        let dir = tempdir().expect("tempdir");
        let data_dir = dir.path().join("state");
        let cfg = sample(data_dir.clone());
        cfg.validate_and_prepare().expect("validate");
        assert!(data_dir.is_dir());
    }

    #[test]
    fn owner_id_override_must_be_numeric() {
        assert_eq!(parse_owner_id(" 42 ").expect("numeric"), 42);
        assert!(parse_owner_id("owner").is_err());
    }
}
