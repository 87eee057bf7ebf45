use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct KrakenProviderConfig {
    pub base_url: String,
    #[serde(default = "default_quote_currency")]
    pub quote_currency: String,
    /// Candle width in minutes.
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u32,
}

fn default_quote_currency() -> String {
    "USD".to_string()
}

fn default_interval_minutes() -> u32 {
    21600
}

impl Default for KrakenProviderConfig {
    fn default() -> Self {
        KrakenProviderConfig {
            base_url: "https://api.kraken.com".to_string(),
            quote_currency: default_quote_currency(),
            interval_minutes: default_interval_minutes(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub kraken: KrakenProviderConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LookupConfig {
    /// Unix timestamp the opening series is requested from.
    #[serde(default)]
    pub opening_since: i64,
    /// How far back the recent series reaches.
    #[serde(default = "default_recent_days")]
    pub recent_days: i64,
    /// Upper bound for every call to the price source.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_recent_days() -> i64 {
    84
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for LookupConfig {
    fn default() -> Self {
        LookupConfig {
            opening_since: 0,
            recent_days: default_recent_days(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl LookupConfig {
    pub fn opening_since(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.opening_since, 0).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    pub fn recent_window(&self) -> Duration {
        Duration::days(self.recent_days.max(1))
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs.max(1))
    }

    /// Budget for a single HTTP attempt, sized so the initial try and both
    /// retries fit inside [`LookupConfig::timeout`].
    pub fn request_timeout(&self) -> std::time::Duration {
        self.timeout() / 4
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub lookup: LookupConfig,
    pub data_path: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "lambo", "lambo")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    /// Directory holding the persistent cache.
    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("io", "lambo", "lambo")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}
