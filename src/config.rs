//! Configuration management with YAML support

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable overriding `provider.cache_dir`
pub const CACHE_DIR_ENV: &str = "PADDOCK_CACHE_DIR";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub live: LiveConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
}

/// Batch provider used by `load`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_url")]
    pub base_url: String,

    /// Raw session documents are cached here; `load` refuses to run without it
    #[serde(default)]
    pub cache_dir: Option<String>,

    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
}

/// Live-timing API used by `live`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveConfig {
    #[serde(default = "default_live_url")]
    pub base_url: String,

    #[serde(default = "default_token_url")]
    pub token_url: String,

    #[serde(default = "default_live_timeout")]
    pub timeout_secs: u64,
}

/// JSON API server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_addr")]
    pub addr: String,
}

// Default value functions
fn default_database_path() -> String {
    "~/.local/share/paddock/paddock.db".to_string()
}

fn default_provider_url() -> String {
    "https://archive.paddock.dev/v1/sessions".to_string()
}

fn default_provider_timeout() -> u64 {
    120
}

fn default_live_url() -> String {
    "https://api.openf1.org/v1".to_string()
}

fn default_token_url() -> String {
    "https://api.openf1.org/token".to_string()
}

fn default_live_timeout() -> u64 {
    10
}

fn default_server_addr() -> String {
    "127.0.0.1:8000".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_provider_url(),
            cache_dir: None,
            timeout_secs: default_provider_timeout(),
        }
    }
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            base_url: default_live_url(),
            token_url: default_token_url(),
            timeout_secs: default_live_timeout(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_server_addr(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    /// Searches in order:
    /// 1. Provided path
    /// 2. ./paddock.yaml (current directory)
    /// 3. <config dir>/paddock/paddock.yaml (~/.config on Linux)
    pub fn load(path: &str) -> Result<Self> {
        let mut search_paths = vec![
            shellexpand::tilde(path).to_string(),
            "paddock.yaml".to_string(),
        ];
        if let Some(config_dir) = dirs::config_dir() {
            search_paths.push(
                config_dir
                    .join("paddock")
                    .join("paddock.yaml")
                    .to_string_lossy()
                    .into_owned(),
            );
        }

        for search_path in &search_paths {
            if std::path::Path::new(search_path).exists() {
                let content = std::fs::read_to_string(search_path)?;
                let config: Config = serde_yaml::from_str(&content)?;
                return Ok(config);
            }
        }

        // No config file found, use defaults
        Ok(Config::default())
    }

    /// Get the database path, expanding ~ to home directory
    pub fn database_path(&self) -> PathBuf {
        let expanded = shellexpand::tilde(&self.database.path).to_string();
        PathBuf::from(expanded)
    }

    /// Provider cache directory: `PADDOCK_CACHE_DIR` wins over the config file
    pub fn cache_dir(&self) -> Option<PathBuf> {
        let from_env = std::env::var(CACHE_DIR_ENV).ok().filter(|v| !v.trim().is_empty());
        from_env
            .or_else(|| self.provider.cache_dir.clone())
            .map(|p| PathBuf::from(shellexpand::tilde(&p).to_string()))
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider.timeout_secs)
    }

    pub fn live_timeout(&self) -> Duration {
        Duration::from_secs(self.live.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.live.timeout_secs, 10);
        assert_eq!(config.server.addr, "127.0.0.1:8000");
        assert!(config.provider.cache_dir.is_none());
        assert!(config.database_path().ends_with("paddock/paddock.db"));
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r#"
database:
  path: /tmp/paddock-test.db

provider:
  base_url: http://localhost:9000/sessions
  cache_dir: /tmp/paddock-cache

live:
  timeout_secs: 5
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.database_path(), PathBuf::from("/tmp/paddock-test.db"));
        assert_eq!(config.provider.base_url, "http://localhost:9000/sessions");
        assert_eq!(config.provider.timeout_secs, 120);
        assert_eq!(config.live_timeout(), Duration::from_secs(5));
        assert_eq!(config.live.base_url, "https://api.openf1.org/v1");
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = Config::load("/nonexistent/paddock.yaml").unwrap();
        assert_eq!(config.server.addr, default_server_addr());
    }
}
