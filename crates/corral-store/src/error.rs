//! Error types for template store operations

use corral_core::CoreError;
use thiserror::Error;

/// Template store errors
#[derive(Debug, Error)]
pub enum StoreError {
    // ============ Configuration Errors ============
    #[error("Invalid store configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Invalid sync address: {address} - {reason}")]
    InvalidAddress { address: String, reason: String },

    // ============ Template Errors ============
    #[error("Failed to load template {path}: {source}")]
    Load {
        path: String,
        #[source]
        source: CoreError,
    },

    #[error("Unknown template category: {category}")]
    UnknownCategory { category: String },

    // ============ Watch Errors ============
    #[error("Watcher error: {0}")]
    Watch(#[from] notify::Error),

    // ============ Network Errors ============
    #[error("HTTP error: {status} - {url}")]
    HttpError { status: u16, url: String },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Request timeout: {url}")]
    Timeout { url: String },

    // ============ Index Errors ============
    #[error("Invalid index line {line}: {content:?}")]
    InvalidIndexLine { line: usize, content: String },

    // ============ IO Errors ============
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_yaml::Error),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    pub(crate) fn from_reqwest(url: &str, e: reqwest::Error) -> Self {
        if e.is_timeout() {
            StoreError::Timeout {
                url: url.to_string(),
            }
        } else if let Some(status) = e.status() {
            StoreError::HttpError {
                status: status.as_u16(),
                url: url.to_string(),
            }
        } else {
            StoreError::NetworkError {
                message: format!("{}: {}", url, e),
            }
        }
    }
}
