//! CLI configuration file
//!
//! ```yaml
//! store:
//!   directory: /data/templates
//!   sync:
//!     enabled: true
//!     address: https://templates.example.com/repo
//! controller:
//!   concurrency: 3
//!   clusterName: prod-eu
//! ```

use corral_kube::ControllerConfig;
use corral_store::StoreConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CliError, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CorralConfig {
    pub store: StoreConfig,
    pub controller: ControllerConfig,
}

impl CorralConfig {
    /// Load `path`, or the default location when `None`.
    ///
    /// A missing default file means all defaults; an explicit path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from(path);
        }
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load from specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CliError::Config {
            message: format!("cannot read {}: {}", path.display(), e),
            help: None,
        })?;
        serde_yaml::from_str(&content).map_err(|e| CliError::Config {
            message: format!("invalid config {}: {}", path.display(), e),
            help: None,
        })
    }

    /// Save to specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self).map_err(CliError::other)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get default config path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            CliError::config_with_help(
                "Could not determine config directory",
                "Pass --config <file> explicitly",
            )
        })?;
        Ok(config_dir.join("corral").join("config.yaml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.yaml");

        let mut config = CorralConfig::default();
        config.store.directory = PathBuf::from("/srv/templates");
        config.controller.concurrency = 5;
        config.save_to(&path).unwrap();

        let loaded = CorralConfig::load(Some(&path)).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(&path, "controller:\n  clusterName: prod-eu\n").unwrap();

        let config = CorralConfig::load_from(&path).unwrap();
        assert_eq!(config.controller.concurrency, 3);
        assert_eq!(config.controller.cluster_name.as_deref(), Some("prod-eu"));
        assert_eq!(config.store, StoreConfig::default());
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let err = CorralConfig::load(Some(&temp.path().join("nope.yaml"))).unwrap_err();
        assert!(matches!(err, CliError::Config { .. }));
    }
}
