use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::platform;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub channels: ChannelsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Which kind of player the daemon runs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlayerKind {
    /// Audio only, continuously tuned.
    #[default]
    Radio,
    /// Audio + video with a fullscreen-capable window.
    Tv,
}

impl PlayerKind {
    pub fn has_visual_surface(self) -> bool {
        matches!(self, PlayerKind::Tv)
    }

    pub fn default_loop_progressive(self) -> bool {
        matches!(self, PlayerKind::Tv)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    #[serde(default)]
    pub kind: PlayerKind,
    /// Seconds a source may stay in Loading before it is marked as an error.
    #[serde(default = "default_watchdog_secs")]
    pub watchdog_secs: u64,
    /// Initial volume, 0.0–1.0.
    #[serde(default = "default_volume")]
    pub default_volume: f32,
    /// Override of the per-kind power-off policy.
    #[serde(default)]
    pub retains_session_on_power_off: Option<bool>,
    /// Override of the per-kind progressive looping.
    #[serde(default)]
    pub loop_progressive: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Use the built-in manifest engine for `.m3u8` sources.  When off, the
    /// sink's own adaptive support is used if it has one.
    #[serde(default = "default_true")]
    pub adaptive_engine: bool,
    #[serde(default = "default_manifest_timeout_secs")]
    pub manifest_timeout_secs: u64,
    /// Highest variant bandwidth (bits/s) the engine picks from a master
    /// playlist.
    #[serde(default)]
    pub max_bandwidth: Option<u64>,
}

/// Channel list source and the filters applied after loading it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelsConfig {
    /// URL or file path of an extended m3u list.
    #[serde(default = "default_playlist")]
    pub playlist: String,
    #[serde(default = "default_exclude_categories")]
    pub exclude_categories: Vec<String>,
    #[serde(default)]
    pub require_artwork: bool,
    #[serde(default = "default_playable_extensions")]
    pub playable_extensions: Vec<String>,
    #[serde(default = "default_true")]
    pub dedupe: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            kind: PlayerKind::default(),
            watchdog_secs: default_watchdog_secs(),
            default_volume: default_volume(),
            retains_session_on_power_off: None,
            loop_progressive: None,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            adaptive_engine: true,
            manifest_timeout_secs: default_manifest_timeout_secs(),
            max_bandwidth: None,
        }
    }
}

impl Default for ChannelsConfig {
    fn default() -> Self {
        Self {
            playlist: default_playlist(),
            exclude_categories: default_exclude_categories(),
            require_artwork: false,
            playable_extensions: default_playable_extensions(),
            dedupe: true,
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    platform::DAEMON_TCP_PORT
}

fn default_true() -> bool {
    true
}

fn default_watchdog_secs() -> u64 {
    10
}

fn default_volume() -> f32 {
    0.7
}

fn default_manifest_timeout_secs() -> u64 {
    8
}

fn default_playlist() -> String {
    platform::config_dir()
        .join("channels.m3u")
        .display()
        .to_string()
}

fn default_exclude_categories() -> Vec<String> {
    vec!["xxx".to_string()]
}

fn default_playable_extensions() -> Vec<String> {
    vec![".m3u8".to_string(), ".mp4".to_string()]
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(&config_path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}
