//! Application configuration management.
//!
//! Configuration is stored at `~/.config/snapish/config.json`. Every field has
//! a default, so a missing or partial file is fine. `SNAPISH_*` environment
//! variables override what the file says.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::client::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::models::Coordinates;

/// Application name used for config/data directory paths
const APP_NAME: &str = "snapish";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";
pub const DEFAULT_SOCKET_URL: &str = "ws://localhost:5000/ws";

pub const ENV_BASE_URL: &str = "SNAPISH_BASE_URL";
pub const ENV_SOCKET_URL: &str = "SNAPISH_SOCKET_URL";
pub const ENV_USERNAME: &str = "SNAPISH_USERNAME";
pub const ENV_PASSWORD: &str = "SNAPISH_PASSWORD";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub socket_url: String,
    pub last_username: Option<String>,
    pub request_timeout_secs: u64,
    pub home_latitude: Option<f64>,
    pub home_longitude: Option<f64>,
    /// Overrides the platform data directory for local storage
    pub storage_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            socket_url: DEFAULT_SOCKET_URL.to_string(),
            last_username: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            home_latitude: None,
            home_longitude: None,
            storage_dir: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))
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

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Apply `SNAPISH_*` overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from `lookup`; blank values are ignored
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(ENV_BASE_URL) {
            self.base_url = url;
        }
        if let Some(url) = get(ENV_SOCKET_URL) {
            self.socket_url = url;
        }
        if let Some(username) = get(ENV_USERNAME) {
            self.last_username = Some(username);
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Configured home position; needs both coordinates
    pub fn home_location(&self) -> Option<Coordinates> {
        Some(Coordinates::new(self.home_latitude?, self.home_longitude?))
    }

    fn data_dir() -> PathBuf {
        dirs::data_dir()
            .map(|dir| dir.join(APP_NAME))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn storage_dir(&self) -> PathBuf {
        self.storage_dir
            .clone()
            .unwrap_or_else(|| Self::data_dir().join("storage"))
    }

    pub fn log_dir(&self) -> PathBuf {
        Self::data_dir().join("logs")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"base_url": "https://api.snapish.kr"}"#).expect("config");
        assert_eq!(config.base_url, "https://api.snapish.kr");
        assert_eq!(config.socket_url, DEFAULT_SOCKET_URL);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.home_location(), None);
    }

    #[test]
    fn test_home_location_needs_both_coordinates() {
        let mut config = Config {
            home_latitude: Some(35.1),
            ..Default::default()
        };
        assert_eq!(config.home_location(), None);

        config.home_longitude = Some(129.04);
        assert_eq!(config.home_location(), Some(Coordinates::new(35.1, 129.04)));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_BASE_URL, "https://staging.snapish.kr"),
            (ENV_SOCKET_URL, "  "),
            (ENV_USERNAME, "gull"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.base_url, "https://staging.snapish.kr");
        assert_eq!(config.socket_url, DEFAULT_SOCKET_URL);
        assert_eq!(config.last_username.as_deref(), Some("gull"));
    }

    #[test]
    fn test_storage_dir_override() {
        let config = Config {
            storage_dir: Some(PathBuf::from("/tmp/snapish-test")),
            ..Default::default()
        };
        assert_eq!(config.storage_dir(), PathBuf::from("/tmp/snapish-test"));
        assert!(Config::default().storage_dir().ends_with("storage"));
    }
}
