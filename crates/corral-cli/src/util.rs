//! Shared helpers for CLI commands

use corral_core::LabelSchema;
use corral_engine::{AppHandler, AppsSpec, ClusterNameEnv};
use corral_store::CategoryStores;
use std::path::Path;

use crate::config::CorralConfig;
use crate::error::{CliError, Result};

/// Format a byte size as a human-readable string
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Read an apps file
pub fn load_apps(path: &Path) -> Result<AppsSpec> {
    let content = std::fs::read_to_string(path).map_err(|e| CliError::Spec {
        message: format!("cannot read {}: {}", path.display(), e),
        help: None,
    })?;
    serde_yaml::from_str(&content).map_err(|e| CliError::Spec {
        message: format!("invalid apps file {}: {}", path.display(), e),
        help: Some("Expected `name`, `namespace` and an `apps` map".to_string()),
    })
}

/// Open and load every template category
pub fn open_stores(config: &CorralConfig) -> Result<CategoryStores> {
    let stores = CategoryStores::new(&config.store)?;
    let loaded = stores.load_all()?;
    tracing::debug!(directory = %stores.root().display(), templates = loaded, "template store ready");
    Ok(stores)
}

/// App and capsule handlers over the loaded stores
pub fn handlers(
    stores: &CategoryStores,
    cluster_name: Option<&str>,
) -> Result<(AppHandler, AppHandler)> {
    let labels = LabelSchema::default();
    let mut apps = AppHandler::new(stores.apps()?, labels.clone());
    let capsules = AppHandler::new(stores.capsules()?, labels);

    if let Some(name) = cluster_name.filter(|n| !n.is_empty()) {
        apps = apps.with_decorator(ClusterNameEnv::new(name));
    }
    Ok((apps, capsules))
}
