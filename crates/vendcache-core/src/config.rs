//! Application configuration management.
//!
//! This module handles loading and saving the client configuration, which
//! includes the API base URL, the last used email and whether the session
//! record is sealed at rest.
//!
//! Configuration is stored at `~/.config/vendcache/config.json`. The
//! `VENDCACHE_API_URL` environment variable overrides the configured base
//! URL without touching the file.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::api::DEFAULT_API_BASE_URL;

/// Application name used for config/data directory paths
const APP_NAME: &str = "vendcache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding the API base URL
const API_URL_ENV: &str = "VENDCACHE_API_URL";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_base_url: Option<String>,
    pub last_email: Option<String>,
    /// Encrypt the stored session record at rest. Off by default so the
    /// stored files stay inspectable plain JSON.
    #[serde(default)]
    pub seal_storage: bool,
    /// Overrides the default data directory. Mostly for tests and portable
    /// installs.
    pub data_dir: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Effective API base URL: environment override, then config, then the
    /// production default.
    pub fn api_base_url(&self) -> String {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.is_empty() {
                return url;
            }
        }
        self.api_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
    }

    /// Directory holding the persisted session record.
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.data_dir {
            return Ok(dir.clone());
        }
        let data_dir =
            dirs::data_dir().ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }
}
