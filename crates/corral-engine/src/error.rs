//! Engine error types

use corral_core::CoreError;
use miette::Diagnostic;
use thiserror::Error;

use crate::kind::ResourceKind;

/// Errors raised while building or customizing manifests
#[derive(Error, Debug, Diagnostic)]
#[non_exhaustive]
pub enum EngineError {
    /// A recognized template file does not decode into its kind
    #[error("template {template}: failed to decode {file} as {kind}: {message}")]
    #[diagnostic(
        code(corral::engine::decode),
        help("the whole template is unusable until the file is fixed")
    )]
    Decode {
        template: String,
        file: String,
        kind: ResourceKind,
        message: String,
    },

    /// A component declares more than one workload
    #[error("template {template}: component '{component}' declares both {existing} and {duplicate}")]
    #[diagnostic(code(corral::engine::duplicate_workload))]
    DuplicateWorkload {
        template: String,
        component: String,
        existing: ResourceKind,
        duplicate: ResourceKind,
    },

    /// Field or list merge failed
    #[error("failed to merge '{identity}': {message}")]
    #[diagnostic(code(corral::engine::merge))]
    Merge { identity: String, message: String },

    /// No template matches the requested name/version
    #[error("template {name}:{version} not found")]
    #[diagnostic(
        code(corral::engine::template_not_found),
        help("check the template store directory or run a sync")
    )]
    TemplateNotFound { name: String, version: String },

    /// Capsule descriptor could not be parsed or resolved
    #[error("template {template}: {source}")]
    #[diagnostic(code(corral::engine::capsule))]
    Capsule {
        template: String,
        #[source]
        source: CoreError,
    },

    #[error(transparent)]
    #[diagnostic(code(corral::engine::core))]
    Core(#[from] CoreError),
}

impl EngineError {
    pub(crate) fn merge(identity: impl Into<String>, err: impl std::fmt::Display) -> Self {
        EngineError::Merge {
            identity: identity.into(),
            message: err.to_string(),
        }
    }

    /// `latest` stands in for a missing version
    pub fn template_not_found(name: &str, version: Option<&str>) -> Self {
        let version = match version {
            Some(v) if !v.is_empty() => v.to_string(),
            _ => "latest".to_string(),
        };
        EngineError::TemplateNotFound {
            name: name.to_string(),
            version,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
