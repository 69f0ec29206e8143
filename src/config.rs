//! Configuration loading and persistence.
//!
//! Settings are layered: built-in defaults, then `config.json` in the
//! configuration directory, then `COUPLES_*` environment variables. CLI
//! flags are applied last by the binary.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::{fs, path::Path, path::PathBuf};

/// Name of the configuration file inside the configuration directory.
pub const CONFIG_FILE: &str = "config.json";

/// Configuration for the couples companion server.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Socket address the HTTP server binds to.
    pub listen_addr: String,
    /// Route that serves VAPID key generation.
    pub vapid_route: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8787".to_string(),
            vapid_route: "/generate-vapid-keys".to_string(),
        }
    }
}

impl Config {
    /// Returns the configuration directory path, creating it if necessary.
    ///
    /// Directory selection priority:
    /// 1. `COUPLES_CONFIG_DIR` env var: explicit override
    /// 2. `COUPLES_ENV=test`: `<tmp>/couples-test`
    /// 3. Default: platform config dir joined with `couples`
    pub fn config_dir() -> Result<PathBuf> {
        let dir = if let Ok(dir) = std::env::var("COUPLES_CONFIG_DIR") {
            PathBuf::from(dir)
        } else if crate::env::is_test_mode() {
            std::env::temp_dir().join("couples-test")
        } else {
            dirs::config_dir()
                .context("Could not determine config directory")?
                .join("couples")
        };
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory {}", dir.display()))?;
        Ok(dir)
    }

    /// Loads configuration from the default directory with environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_dir(&Self::config_dir()?)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Loads `config.json` from `dir`, falling back to defaults when absent.
    ///
    /// A present but malformed file is an error rather than a silent reset.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE);
        if !config_path.exists() {
            log::debug!("No config file at {}, using defaults", config_path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid config file {}", config_path.display()))
    }

    /// Apply `COUPLES_*` overrides using `lookup` to resolve variables.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = lookup("COUPLES_LISTEN_ADDR") {
            self.listen_addr = addr;
        }
        if let Some(route) = lookup("COUPLES_VAPID_ROUTE") {
            self.vapid_route = route;
        }
    }

    /// Check that the listen address parses and the route is absolute.
    pub fn validate(&self) -> Result<()> {
        self.socket_addr()?;
        anyhow::ensure!(
            self.vapid_route.starts_with('/') && self.vapid_route.len() > 1,
            "vapid_route must be an absolute path other than '/', got {:?}",
            self.vapid_route
        );
        Ok(())
    }

    /// Parsed listen address.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.listen_addr
            .parse()
            .with_context(|| format!("Invalid listen address {:?}", self.listen_addr))
    }

    /// Persists the current configuration to `dir`.
    pub fn save_to_dir(&self, dir: &Path) -> Result<()> {
        let config_path = dir.join(CONFIG_FILE);
        fs::write(&config_path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.listen_addr, "127.0.0.1:8787");
        assert_eq!(config.vapid_route, "/generate-vapid-keys");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from_dir(dir.path()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            listen_addr: "0.0.0.0:9000".to_string(),
            vapid_route: "/vapid".to_string(),
        };
        config.save_to_dir(dir.path()).unwrap();
        assert_eq!(Config::load_from_dir(dir.path()).unwrap(), config);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), r#"{"listen_addr":"0.0.0.0:1234"}"#).unwrap();
        let config = Config::load_from_dir(dir.path()).unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:1234");
        assert_eq!(config.vapid_route, "/generate-vapid-keys");
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "{not json").unwrap();
        assert!(Config::load_from_dir(dir.path()).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("COUPLES_LISTEN_ADDR", "127.0.0.1:0"),
            ("COUPLES_VAPID_ROUTE", "/keys"),
        ]
        .into_iter()
        .collect();
        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).map(|v| (*v).to_string()));
        assert_eq!(config.listen_addr, "127.0.0.1:0");
        assert_eq!(config.vapid_route, "/keys");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.listen_addr = "not-an-address".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.vapid_route = "keys".to_string();
        assert!(config.validate().is_err());

        config.vapid_route = "/".to_string();
        assert!(config.validate().is_err());
    }
}
