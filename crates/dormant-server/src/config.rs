//! Server configuration.

use anyhow::{Context, Result};
use dormant_core::{SeedPage, SuspensionConfig, SYNC_QUOTA_BYTES_PER_ITEM};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default = "default_sync_quota_bytes")]
    pub sync_quota_bytes: usize,
    /// JSON file with pages to open in the in-process host at startup.
    #[serde(default)]
    pub seed_pages: Option<PathBuf>,
    #[serde(default)]
    pub suspension: SuspensionConfig,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8787
}

fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("dormant")
        .join("state.db")
}

fn default_sync_quota_bytes() -> usize {
    SYNC_QUOTA_BYTES_PER_ITEM
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            db_path: default_db_path(),
            sync_quota_bytes: default_sync_quota_bytes(),
            seed_pages: None,
            suspension: SuspensionConfig::default(),
        }
    }
}

impl Config {
    /// Load config from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load config from default location (config/default.toml) or fall back to defaults.
    pub fn load() -> Result<Self> {
        let config_path = PathBuf::from("config/default.toml");
        if config_path.exists() {
            return Self::load_from(&config_path);
        }
        Ok(Config::default())
    }

    /// Pages listed in the `seed_pages` file, if one is configured.
    pub fn load_seed_pages(&self) -> Result<Vec<SeedPage>> {
        let Some(path) = &self.seed_pages else {
            return Ok(Vec::new());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading seed pages {}", path.display()))?;
        let pages = serde_json::from_str(&content)
            .with_context(|| format!("parsing seed pages {}", path.display()))?;
        Ok(pages)
    }
}
