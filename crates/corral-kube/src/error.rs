//! Error types for corral-kube

use thiserror::Error;

/// Result type for corral-kube operations
pub type Result<T> = std::result::Result<T, KubeError>;

/// Errors that can occur during cluster operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KubeError {
    /// The object does not exist
    #[error("{resource} not found")]
    NotFound { resource: String },

    /// The API server rejected the object as invalid or not acceptable
    #[error("{resource} rejected as invalid: {message}")]
    Invalid { resource: String, message: String },

    /// Version or existence conflict
    #[error("conflict on {resource}: {message}")]
    Conflict { resource: String, message: String },

    /// Kubernetes API error
    #[error("Kubernetes API error on {resource}: {source}")]
    Api {
        resource: String,
        #[source]
        source: kube::Error,
    },

    /// Client construction failed
    #[error("Kubernetes client error: {0}")]
    Client(#[from] kube::Error),

    /// Template build or customization failed
    #[error("manifest error: {0}")]
    Engine(#[from] corral_engine::EngineError),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A reconcile task panicked or was cancelled
    #[error("reconcile task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// The controller shut down before the task could start
    #[error("reconciliation cancelled")]
    Cancelled,
}

impl From<serde_json::Error> for KubeError {
    fn from(e: serde_json::Error) -> Self {
        KubeError::Serialization(e.to_string())
    }
}

impl KubeError {
    /// Classify an API error for `resource`
    pub fn from_api(resource: impl Into<String>, error: kube::Error) -> Self {
        let resource = resource.into();
        match error {
            kube::Error::Api(resp) if resp.code == 404 => KubeError::NotFound { resource },
            kube::Error::Api(resp) if resp.code == 422 || resp.code == 406 => {
                KubeError::Invalid {
                    resource,
                    message: resp.message,
                }
            }
            kube::Error::Api(resp) if resp.code == 409 => KubeError::Conflict {
                resource,
                message: resp.message,
            },
            source => KubeError::Api { resource, source },
        }
    }

    /// Check if this is a Kubernetes 404 Not Found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, KubeError::NotFound { .. })
    }

    /// Check if the update was refused as invalid (422) or not acceptable (406)
    pub fn is_invalid(&self) -> bool {
        matches!(self, KubeError::Invalid { .. })
    }

    /// Check if this is a conflict error (409)
    pub fn is_conflict(&self) -> bool {
        matches!(self, KubeError::Conflict { .. })
    }
}
