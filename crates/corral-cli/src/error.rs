//! CLI error types with exit code handling
//!
//! This module provides a unified error type for CLI operations that
//! maps errors to appropriate exit codes.

use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Apps file missing or malformed
    #[error("Spec error: {message}")]
    #[diagnostic(code(corral::cli::spec))]
    Spec {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Template resolution or build failed
    #[error("Template error: {message}")]
    #[diagnostic(code(corral::cli::template))]
    Template {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Some applications failed to reconcile
    #[error("{failed} of {total} app(s) failed to reconcile")]
    #[diagnostic(
        code(corral::cli::reconcile),
        help("Reconciliation is safe to re-run once the cause is fixed")
    )]
    Reconcile { failed: usize, total: usize },

    /// Configuration missing or invalid
    #[error("Configuration error: {message}")]
    #[diagnostic(code(corral::cli::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(corral::cli::io))]
    Io { message: String },

    /// Wrapped error for passthrough (stores the formatted message)
    #[error("{message}")]
    #[diagnostic(code(corral::cli::error))]
    Other { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Spec { .. } => exit_codes::SPEC_ERROR,
            CliError::Template { .. } => exit_codes::TEMPLATE_ERROR,
            CliError::Reconcile { .. } => exit_codes::RECONCILE_ERROR,
            CliError::Config { .. } => exit_codes::CONFIG_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Other { .. } => exit_codes::ERROR,
        }
    }

    /// Create a spec error
    pub fn spec(message: impl Into<String>) -> Self {
        Self::Spec {
            message: message.into(),
            help: None,
        }
    }

    /// Create a template error
    pub fn template(message: impl Into<String>) -> Self {
        Self::Template {
            message: message.into(),
            help: None,
        }
    }

    /// Create a config error with help text
    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create a passthrough error
    pub fn other(message: impl std::fmt::Display) -> Self {
        Self::Other {
            message: message.to_string(),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

impl From<corral_core::CoreError> for CliError {
    fn from(err: corral_core::CoreError) -> Self {
        match err {
            corral_core::CoreError::Io(e) => CliError::from(e),
            other => CliError::template(other.to_string()),
        }
    }
}

impl From<corral_engine::EngineError> for CliError {
    fn from(err: corral_engine::EngineError) -> Self {
        CliError::template(err.to_string())
    }
}

impl From<corral_store::StoreError> for CliError {
    fn from(err: corral_store::StoreError) -> Self {
        match err {
            corral_store::StoreError::Io(e) => CliError::from(e),
            corral_store::StoreError::InvalidConfig { message } => CliError::Config {
                message,
                help: None,
            },
            other => CliError::other(other),
        }
    }
}

impl From<corral_kube::KubeError> for CliError {
    fn from(err: corral_kube::KubeError) -> Self {
        CliError::other(err)
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
