use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub mpd: MpdConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

/// Where the player daemon listens and how long to wait for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MpdConfig {
    #[serde(default = "default_mpd_host")]
    pub host: String,
    #[serde(default = "default_mpd_port")]
    pub port: u16,
    /// Per-command deadline.  A command that blows through it drops the
    /// connection; the next command reconnects.
    #[serde(default = "default_mpd_timeout_ms")]
    pub timeout_ms: u64,
}

/// Serial line the status display hangs off.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_display_device")]
    pub device: PathBuf,
    #[serde(default = "default_display_baud")]
    pub baud_rate: u32,
    /// How long a transient message stays up before live status resumes.
    #[serde(default = "default_hold_secs")]
    pub hold_secs: u64,
}

impl MpdConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl DisplayConfig {
    pub fn hold(&self) -> Duration {
        Duration::from_secs(self.hold_secs)
    }
}

impl Default for MpdConfig {
    fn default() -> Self {
        Self {
            host: default_mpd_host(),
            port: default_mpd_port(),
            timeout_ms: default_mpd_timeout_ms(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            device: default_display_device(),
            baud_rate: default_display_baud(),
            hold_secs: default_hold_secs(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mpd: MpdConfig::default(),
            display: DisplayConfig::default(),
        }
    }
}

fn default_mpd_host() -> String {
    "localhost".to_string()
}

fn default_mpd_port() -> u16 {
    6600
}

fn default_mpd_timeout_ms() -> u64 {
    2000
}

fn default_display_device() -> PathBuf {
    PathBuf::from("/dev/serial0")
}

fn default_display_baud() -> u32 {
    115200
}

fn default_hold_secs() -> u64 {
    30
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            info!("config: wrote defaults to {}", config_path.display());
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
        config_dir().join("config.toml")
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("pibeat")
}
