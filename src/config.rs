use crate::proxy::{CacheNamespace, Credentials, ProxyError, ProxyResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to write config file: {0}")]
    Write(String),

    #[error("Unable to determine config directory")]
    NoConfigDir,
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Proxy server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub bind: String,
    pub upstream_url: String,
    pub org_id: String,
    pub api_key: String,
    /// Callers presenting this token see configuration errors in detail
    pub admin_token: Option<String>,
    pub events_ttl_secs: u64,
    pub listing_ttl_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            upstream_url: "https://api.neoncrm.com/v2".to_string(),
            org_id: String::new(),
            api_key: String::new(),
            admin_token: None,
            events_ttl_secs: 300,
            listing_ttl_secs: 3600,
            request_timeout_secs: 15,
        }
    }
}

impl ProxyConfig {
    /// Load from `path`, or from the default location. A missing file yields
    /// the defaults.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path()?,
        };

        if !path.exists() {
            tracing::info!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Write the configuration, creating parent directories as needed
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Write(e.to_string()))?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Write(e.to_string()))?;
        fs::write(path, content).map_err(|e| ConfigError::Write(e.to_string()))
    }

    /// `<config_dir>/campaign-calendar/proxy.toml`
    pub fn default_path() -> ConfigResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("campaign-calendar").join("proxy.toml"))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Credentials for the upstream, api key checked first
    pub fn credentials(&self) -> ProxyResult<Credentials> {
        if self.api_key.trim().is_empty() {
            return Err(ProxyError::MissingApiKey);
        }
        if self.org_id.trim().is_empty() {
            return Err(ProxyError::MissingOrgId);
        }
        Ok(Credentials {
            org_id: self.org_id.clone(),
            api_key: self.api_key.clone(),
        })
    }

    pub fn events_namespace(&self) -> CacheNamespace {
        CacheNamespace::new(
            CacheNamespace::events().name,
            Duration::from_secs(self.events_ttl_secs),
        )
    }

    pub fn campaigns_namespace(&self) -> CacheNamespace {
        CacheNamespace::new(
            CacheNamespace::campaigns().name,
            Duration::from_secs(self.listing_ttl_secs),
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Whether `token` unlocks detailed configuration errors
    pub fn is_admin(&self, token: Option<&str>) -> bool {
        match (&self.admin_token, token) {
            (Some(expected), Some(given)) => !expected.is_empty() && expected == given,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = ProxyConfig::from_toml_str(
            r#"
            org_id = "acme"
            api_key = "secret"
            events_ttl_secs = 60
            "#,
        )
        .unwrap();

        assert_eq!(config.bind, "127.0.0.1:8080");
        assert_eq!(config.listing_ttl_secs, 3600);
        assert_eq!(config.events_namespace().ttl, Duration::from_secs(60));
        assert_eq!(config.events_namespace().name, "events");
        assert_eq!(config.credentials().unwrap().org_id, "acme");
    }

    #[test]
    fn test_missing_credentials() {
        let config = ProxyConfig::default();
        assert_eq!(config.credentials().unwrap_err(), ProxyError::MissingApiKey);

        let config = ProxyConfig {
            api_key: "secret".to_string(),
            ..ProxyConfig::default()
        };
        assert_eq!(config.credentials().unwrap_err(), ProxyError::MissingOrgId);
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            ProxyConfig::from_toml_str("events_ttl_secs = \"soon\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let path = std::env::temp_dir().join("campaign-calendar-missing-config.toml");
        let config = ProxyConfig::load(Some(&path)).unwrap();
        assert_eq!(config, ProxyConfig::default());
    }

    #[test]
    fn test_admin_token() {
        let config = ProxyConfig {
            admin_token: Some("letmein".to_string()),
            ..ProxyConfig::default()
        };
        assert!(config.is_admin(Some("letmein")));
        assert!(!config.is_admin(Some("nope")));
        assert!(!config.is_admin(None));
        assert!(!ProxyConfig::default().is_admin(Some("")));
    }
}
