//! Herald configuration.
//!
//! Loaded from a TOML file (path in `HERALD_CONFIG`, default `herald.toml`);
//! a missing file yields pure defaults. Twitch credentials can be supplied or
//! overridden through `HERALD_TWITCH_CLIENT_ID` / `HERALD_TWITCH_CLIENT_SECRET`
//! so secrets stay out of the config file.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Complete herald configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HeraldConfig {
    #[serde(default)]
    pub twitch: TwitchConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

/// Twitch application credentials (client-credentials grant).
///
/// Empty values are allowed at load time; the token cache reports
/// `MissingCredentials` when a call actually needs them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TwitchConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
}

/// Reconciliation loop tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct PollConfig {
    /// Delay between the end of one tick and the start of the next (seconds).
    #[serde(default = "default_tick_delay")]
    pub tick_delay_secs: u64,
    /// Per-target update budget (seconds); targets over budget are skipped.
    #[serde(default = "default_target_timeout")]
    pub target_timeout_secs: u64,
    /// How many guilds are reconciled concurrently within a tick.
    #[serde(default = "default_guild_concurrency")]
    pub guild_concurrency: usize,
}

fn default_tick_delay() -> u64 {
    15
}

fn default_target_timeout() -> u64 {
    15
}

fn default_guild_concurrency() -> usize {
    5
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            tick_delay_secs: default_tick_delay(),
            target_timeout_secs: default_target_timeout(),
            guild_concurrency: default_guild_concurrency(),
        }
    }
}

/// Watchlist store location.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

fn default_db_path() -> String {
    "herald.db".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

impl HeraldConfig {
    /// Loads configuration from the conventional location, then applies
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let path = std::env::var("HERALD_CONFIG").unwrap_or_else(|_| "herald.toml".to_string());
        let mut config = Self::from_file(&path)?;
        config.apply_env();
        Ok(config)
    }

    /// Loads configuration from a specific file; a missing file is not an
    /// error and yields defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    fn apply_env(&mut self) {
        if let Ok(id) = std::env::var("HERALD_TWITCH_CLIENT_ID") {
            self.twitch.client_id = id;
        }
        if let Ok(secret) = std::env::var("HERALD_TWITCH_CLIENT_SECRET") {
            self.twitch.client_secret = secret;
        }
    }
}
