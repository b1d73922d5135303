//! Reconciliation settings

use serde::{Deserialize, Serialize};

/// Default number of applications reconciled at once
pub const DEFAULT_CONCURRENCY: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ControllerConfig {
    /// Applications reconciled at once
    pub concurrency: usize,
    /// Name injected into containers; discovered from the cluster when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            cluster_name: None,
        }
    }
}
