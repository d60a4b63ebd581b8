//! # Configuration
//!
//! Manages the loading and parsing of the bot's configuration file (`config.yaml`).
//! Defines the structs for bot instances, federation, logging, storage and the
//! bundled plugins.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::domain::paths;

/// Main application configuration structure.
/// Matches the layout of `data/config.yaml`.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub room: String,
    pub instances: Vec<InstanceConfig>,
    #[serde(default)]
    pub federation: FederationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub plugins: PluginsConfig,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: AppConfig = serde_yaml::from_str(content)?;
        if config.instances.is_empty() {
            anyhow::bail!("at least one bot instance must be configured");
        }
        Ok(config)
    }
}

/// One bot instance joining the room.
#[derive(Debug, Deserialize, Clone)]
pub struct InstanceConfig {
    pub nick: String,
    #[serde(default)]
    pub plugins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FederationConfig {
    #[serde(default = "default_forward_timeout")]
    pub forward_timeout_secs: u64,
}

impl FederationConfig {
    pub fn forward_timeout(&self) -> Duration {
        Duration::from_secs(self.forward_timeout_secs)
    }
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            forward_timeout_secs: default_forward_timeout(),
        }
    }
}

fn default_forward_timeout() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub directory: String,
    #[serde(default = "default_log_file")]
    pub file: String,
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_log_dir(),
            file: default_log_file(),
            filter: default_log_filter(),
        }
    }
}

fn default_log_dir() -> String {
    paths::DATA_DIR.to_string()
}
fn default_log_file() -> String {
    paths::LOG_FILE.to_string()
}
fn default_log_filter() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

fn default_storage_path() -> String {
    paths::STORAGE_FILE.to_string()
}

/// Settings of the bundled plugins.
#[derive(Debug, Default, Deserialize, Clone)]
pub struct PluginsConfig {
    #[serde(default)]
    pub fortune: FortuneConfig,
    #[serde(default)]
    pub music: MusicConfig,
    #[serde(default)]
    pub say: SayConfig,
    #[serde(default)]
    pub volunteer: VolunteerConfig,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct FortuneConfig {
    /// One sentence per line. A small built-in list is used when absent.
    #[serde(default)]
    pub dictionary: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MusicConfig {
    #[serde(default = "default_music_player")]
    pub player: String,
    #[serde(default = "default_music_library")]
    pub library: String,
    #[serde(default)]
    pub default_track: Option<String>,
}

impl Default for MusicConfig {
    fn default() -> Self {
        Self {
            player: default_music_player(),
            library: default_music_library(),
            default_track: None,
        }
    }
}

fn default_music_player() -> String {
    "paplay".to_string()
}
fn default_music_library() -> String {
    ".".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SayConfig {
    #[serde(default = "default_say_player")]
    pub player: String,
    #[serde(default = "default_say_voice")]
    pub voice: String,
}

impl Default for SayConfig {
    fn default() -> Self {
        Self {
            player: default_say_player(),
            voice: default_say_voice(),
        }
    }
}

fn default_say_player() -> String {
    "espeak".to_string()
}
fn default_say_voice() -> String {
    "fr-fr".to_string()
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct VolunteerConfig {
    #[serde(default)]
    pub roles: Vec<RoleConfig>,
}

/// A recurring duty. A new volunteer is picked every `period_secs` after `start`.
#[derive(Debug, Deserialize, Clone)]
pub struct RoleConfig {
    pub name: String,
    /// RFC 3339 timestamp of the first period.
    pub start: String,
    pub period_secs: u64,
}
