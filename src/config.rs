use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

// ============================================================================
// Config
// ============================================================================

/// setsync configuration, loaded from `config.toml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub topo: TopoConfig,
    pub registry: RegistryConfig,
}

/// Connection settings for the topology server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopoConfig {
    pub endpoint: String,
    pub user: String,
    pub supplier_account: String,
    /// Deadline for one command's whole run against the server; 0 disables it
    pub timeout_secs: u64,
}

impl Default for TopoConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8080".to_string(),
            user: "admin".to_string(),
            supplier_account: "0".to_string(),
            timeout_secs: 30,
        }
    }
}

impl TopoConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

/// Coordination service settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub endpoint: String,
    pub path: String,
    /// Key lifetime; 0 keeps the registration until removed
    pub ttl_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:2379".to_string(),
            path: "/cc/services/endpoints/setsync".to_string(),
            ttl_secs: 0,
        }
    }
}

impl RegistryConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Config {
    /// Load config from `path`, falling back to defaults when it is absent
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid config: {}", path.display()))
    }

    /// Write config to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Could not create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Could not serialize config")?;
        fs::write(path, content).with_context(|| format!("Could not write {}", path.display()))?;
        Ok(())
    }

    /// Apply command-line overrides on top of the file
    pub fn with_overrides(mut self, endpoint: Option<&str>, user: Option<&str>) -> Self {
        if let Some(endpoint) = endpoint {
            self.topo.endpoint = endpoint.to_string();
        }
        if let Some(user) = user {
            self.topo.user = user.to_string();
        }
        self
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.topo.user, "admin");
        assert_eq!(config.topo.supplier_account, "0");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[topo]
endpoint = "http://cmdb.internal:8080"

[registry]
ttl_secs = 60
"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.topo.endpoint, "http://cmdb.internal:8080");
        assert_eq!(config.topo.user, "admin");
        assert_eq!(config.topo.timeout_secs, 30);
        assert_eq!(config.registry.ttl(), Duration::from_secs(60));
        assert_eq!(config.registry.path, "/cc/services/endpoints/setsync");
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.topo.user = "ops".to_string();
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[topo\nendpoint = ").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_overrides() {
        let config = Config::default().with_overrides(Some("http://other:80"), None);
        assert_eq!(config.topo.endpoint, "http://other:80");
        assert_eq!(config.topo.user, "admin");
    }

    #[test]
    fn test_zero_timeout_disables_deadline() {
        let mut topo = TopoConfig::default();
        assert_eq!(topo.timeout(), Some(Duration::from_secs(30)));
        topo.timeout_secs = 0;
        assert_eq!(topo.timeout(), None);
    }
}
