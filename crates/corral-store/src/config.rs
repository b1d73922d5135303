//! Template store configuration
//!
//! ```yaml
//! directory: /data/templates
//! categories: [apps, capsules]
//! watch: true
//! sync:
//!   enabled: true
//!   address: https://templates.example.com/repo
//!   index: index.list
//!   interval: 10m
//!   timeout: 30s
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Where templates live and how they are kept up to date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreConfig {
    /// Root directory, one sub-directory per category
    pub directory: PathBuf,
    pub categories: Vec<String>,
    /// Reload templates on filesystem changes
    pub watch: bool,
    pub sync: SyncConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("/data/templates"),
            categories: vec![APPS.to_string(), CAPSULES.to_string()],
            watch: true,
            sync: SyncConfig::default(),
        }
    }
}

/// Category holding application templates
pub const APPS: &str = "apps";
/// Category holding capsule templates
pub const CAPSULES: &str = "capsules";

/// Remote index synchronization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncConfig {
    pub enabled: bool,
    /// Base URL; index and packages are fetched relative to it
    pub address: String,
    /// Index file name under `address`
    pub index: String,
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    /// Per-request timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: String::new(),
            index: "index.list".to_string(),
            interval: Duration::from_secs(10 * 60),
            timeout: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: StoreConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, StoreConfig::default());
        assert_eq!(config.categories, vec!["apps", "capsules"]);
        assert!(!config.sync.enabled);
    }

    #[test]
    fn test_humantime_fields() {
        let config: StoreConfig = serde_yaml::from_str(
            r#"
directory: /tmp/templates
sync:
  enabled: true
  address: http://localhost:8080
  interval: 5m
  timeout: 2s
"#,
        )
        .unwrap();

        assert_eq!(config.directory, PathBuf::from("/tmp/templates"));
        assert_eq!(config.sync.interval, Duration::from_secs(300));
        assert_eq!(config.sync.timeout, Duration::from_secs(2));
        assert_eq!(config.sync.index, "index.list");
        assert!(config.watch);
    }
}
