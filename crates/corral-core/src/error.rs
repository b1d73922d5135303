//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CoreError {
    #[error("Invalid package name '{file}': expected <name>_v<version>[-(alpha|beta)].(zip|tgz|tar.gz)")]
    InvalidPackageName { file: String },

    #[error("Unsupported package format: {path}")]
    UnsupportedFormat { path: String },

    #[error("Failed to unpack {path}: {message}")]
    Archive { path: String, message: String },

    #[error("Invalid capsule descriptor: {message}")]
    InvalidCapsule { message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Whether the error comes from a malformed package (name, layout or archive)
    pub fn is_package_format(&self) -> bool {
        matches!(
            self,
            CoreError::InvalidPackageName { .. }
                | CoreError::UnsupportedFormat { .. }
                | CoreError::Archive { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
