use std::path::Path;

use serde::Deserialize;
use serenity::model::prelude::ChannelId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file `{0}` could not be read")]
    FileUnreadable(String),
    #[error("config file `{0}` is not valid JSON: {1}")]
    FileInvalid(String, serde_json::Error),
    #[error("required environment variable {0} is not set")]
    EnvMissing(&'static str),
    #[error("{0} value `{1}` is not a valid channel id")]
    InvalidForumId(&'static str, String),
}

/// Resolved bot settings. The forum id is static for the process lifetime;
/// one help forum is supported per deployment.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub token: String,
    #[serde(alias = "forumID")]
    pub forum_id: ChannelId,
}

impl Config {
    /// `CONFIG_PATH` selects a JSON config file; otherwise `DISCORD_TOKEN`
    /// and `HELP_FORUM_ID` come from the environment.
    pub fn load() -> Result<Self, ConfigError> {
        match std::env::var("CONFIG_PATH") {
            Ok(path) => Self::from_file(Path::new(&path)),
            Err(_) => Self::from_env(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileUnreadable(path.display().to_string()))?;
        serde_json::from_str(&raw)
            .map_err(|e| ConfigError::FileInvalid(path.display().to_string(), e))
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let token = std::env::var("DISCORD_TOKEN")
            .map_err(|_| ConfigError::EnvMissing("DISCORD_TOKEN"))?;
        let raw = std::env::var("HELP_FORUM_ID")
            .map_err(|_| ConfigError::EnvMissing("HELP_FORUM_ID"))?;
        let forum_id = raw
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidForumId("HELP_FORUM_ID", raw.clone()))?;
        Ok(Self {
            token,
            forum_id: ChannelId(forum_id),
        })
    }
}
