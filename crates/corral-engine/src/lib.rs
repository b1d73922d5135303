//! corral engine - templates to ready-to-apply Kubernetes manifests
//!
//! This crate provides:
//! - File recognition by name suffix and typed decoding of every supported kind
//! - `ManifestBuilder`: app and component manifest sets, `.capsule` bundling
//! - `Customizer`: override application with instance labels and synthesis
//! - Strategic list merge of containers and volumes by name
//! - Decorators for cluster name injection and image registry rewriting

pub mod builder;
pub mod customize;
pub mod decorate;
pub mod error;
pub mod handler;
pub mod kind;
pub mod list_merge;
pub mod manifest;
pub mod overlay;
pub mod spec;
mod workload;

pub use builder::ManifestBuilder;
pub use customize::Customizer;
pub use decorate::{CLUSTER_NAME_ENV, ClusterNameEnv, Decorator, ImageRegistry, update_image_registry};
pub use error::{EngineError, Result};
pub use handler::AppHandler;
pub use kind::{InvalidUpdate, KIND_TABLE, Recognized, Resource, ResourceKind, Scope, recognize};
pub use list_merge::{merge_containers, merge_patch_list, merge_volumes};
pub use manifest::{AppManifests, ComponentManifests, Manifests, Workload};
pub use spec::{AppSpec, AppsSpec, CapsuleSpec, ComponentSpec, TemplateRef};
