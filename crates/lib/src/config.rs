//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.embedfix/config.json`) and environment.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::channels::discord::DEFAULT_API_BASE;
use crate::dedup;
use crate::rewrite::DEFAULT_MAX_MESSAGE_LEN;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Discord connection settings.
    #[serde(default)]
    pub discord: DiscordConfig,

    /// Rewrite pipeline limits.
    #[serde(default)]
    pub rewrite: RewriteConfig,
}

/// Discord bot settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscordConfig {
    /// Bot token. Overridden by DISCORD_BOT_TOKEN or BOT_TOKEN env.
    pub bot_token: Option<String>,

    /// REST API base URL (default https://discord.com/api/v10).
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

/// Rewrite pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewriteConfig {
    /// How many handled message ids to remember for loop prevention (default 1000).
    #[serde(default = "default_dedup_capacity")]
    pub dedup_capacity: usize,

    /// Longest repost sent; longer text is truncated with "..." (default 2000).
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_dedup_capacity() -> usize {
    dedup::DEFAULT_CAPACITY
}

fn default_max_message_length() -> usize {
    DEFAULT_MAX_MESSAGE_LEN
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            api_base: default_api_base(),
        }
    }
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            dedup_capacity: default_dedup_capacity(),
            max_message_length: default_max_message_length(),
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

/// Resolve the Discord bot token: env DISCORD_BOT_TOKEN, then BOT_TOKEN, then config.
pub fn resolve_discord_token(config: &Config) -> Option<String> {
    non_empty_env("DISCORD_BOT_TOKEN")
        .or_else(|| non_empty_env("BOT_TOKEN"))
        .or_else(|| {
            config
                .discord
                .bot_token
                .as_ref()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("EMBEDFIX_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".embedfix").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Load config from the given path, or the default path. Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}
