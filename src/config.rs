//! Configuration for the access layer
//!
//! Holds the API endpoint, request timeout, legacy token key and the paths
//! that govern session teardown. Persisted as JSON.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Environment variable overriding [`AccessConfig::api_base_url`]
pub const API_URL_ENV: &str = "STUDIO_ACCESS_API_URL";

/// Access layer configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccessConfig {
    /// Base URL every request path is joined onto
    pub api_base_url: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Cookie and local-store key of the legacy token
    #[serde(default = "default_legacy_token_key")]
    pub legacy_token_key: String,
    /// Lifetime of cookies written for the legacy token
    #[serde(default = "default_cookie_days")]
    pub cookie_days: i64,
    /// Application root, where session teardown navigates to
    #[serde(default = "default_root_path")]
    pub root_path: String,
    /// Public pages that must not be redirected away from on 401
    #[serde(default = "default_auth_entry_paths")]
    pub auth_entry_paths: Vec<String>,
    /// Whether the page is served over HTTPS (forces `secure` cookies)
    #[serde(default)]
    pub secure_transport: bool,
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_legacy_token_key() -> String {
    "token".to_string()
}

fn default_cookie_days() -> i64 {
    7
}

fn default_root_path() -> String {
    "/".to_string()
}

fn default_auth_entry_paths() -> Vec<String> {
    ["/login", "/register", "/signup", "/auth"]
        .iter()
        .map(|p| p.to_string())
        .collect()
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:5001/api".to_string(),
            timeout_secs: default_timeout_secs(),
            legacy_token_key: default_legacy_token_key(),
            cookie_days: default_cookie_days(),
            root_path: default_root_path(),
            auth_entry_paths: default_auth_entry_paths(),
            secure_transport: false,
        }
    }
}

impl AccessConfig {
    /// Creates the default configuration pointed at `base_url`
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Loads configuration from `path`
    ///
    /// A missing or unreadable file yields the defaults.
    pub fn load_from(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => tracing::warn!("Ignoring invalid config {:?}: {}", path, e),
                },
                Err(e) => tracing::warn!("Failed to read config {:?}: {}", path, e),
            }
        }
        Self::default()
    }

    /// Writes configuration to `path` as pretty JSON
    pub fn save_to(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create config dir {:?}", parent))?;
            }
        }
        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).with_context(|| format!("Failed to write config {:?}", path))?;
        Ok(())
    }

    /// Applies environment overrides
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                self.api_base_url = url.trim().to_string();
            }
        }
        self
    }

    /// Default config file location (cross-platform)
    pub fn default_path() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        let base = std::env::var("APPDATA").ok().map(PathBuf::from);

        #[cfg(not(target_os = "windows"))]
        let base = std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| std::env::var("HOME").ok().map(|h| PathBuf::from(h).join(".config")));

        base.map(|p| p.join("studio-access").join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AccessConfig::default();
        assert_eq!(config.timeout(), Duration::from_secs(60));
        assert_eq!(config.legacy_token_key, "token");
        assert_eq!(config.cookie_days, 7);
        assert_eq!(config.root_path, "/");
        assert!(config.auth_entry_paths.contains(&"/login".to_string()));
        assert!(!config.secure_transport);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: AccessConfig =
            serde_json::from_str(r#"{"api_base_url": "https://api.example.com"}"#).unwrap();
        assert_eq!(config.api_base_url, "https://api.example.com");
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(config.auth_entry_paths, default_auth_entry_paths());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("conf").join("config.json");

        let mut config = AccessConfig::with_base_url("https://api.example.com");
        config.timeout_secs = 30;
        config.secure_transport = true;
        config.save_to(&path).unwrap();

        assert_eq!(AccessConfig::load_from(&path), config);
    }

    #[test]
    fn test_load_missing_or_corrupt_falls_back() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.json");
        assert_eq!(AccessConfig::load_from(&missing), AccessConfig::default());

        let corrupt = dir.path().join("corrupt.json");
        fs::write(&corrupt, "{ nope").unwrap();
        assert_eq!(AccessConfig::load_from(&corrupt), AccessConfig::default());
    }

    #[test]
    fn test_default_path_shape() {
        if let Some(path) = AccessConfig::default_path() {
            assert!(path.ends_with("studio-access/config.json"));
        }
    }
}
