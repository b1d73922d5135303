//! corral core - template packages and the types shared by every layer
//!
//! This crate provides:
//! - `AppTemplate`: a loaded template with app-level and per-workload files
//! - `PackageName`: `<name>_v<version>[-(alpha|beta)].(zip|tgz|tar.gz)` parsing
//! - `load_template`: archive unpacking and template root detection
//! - `version`: the latest-version ordering used by template stores
//! - `LabelSchema`: label keys stamped on generated resources
//! - `CapsuleDescriptor`: `.capsule` files bundling template files into ConfigMaps/Secrets

pub mod archive;
pub mod capsule;
pub mod error;
pub mod labels;
pub mod loader;
pub mod package;
pub mod provider;
pub mod template;
pub mod version;

pub use capsule::{CAPSULE_FILE, CapsuleDescriptor, CapsuleEntry, CapsuleKind};
pub use error::{CoreError, Result};
pub use labels::{LabelSchema, Labels};
pub use loader::load_template;
pub use package::{ArchiveFormat, PackageName, Stage, is_package_path, template_key};
pub use provider::TemplateProvider;
pub use template::{AppTemplate, TemplateBase, TemplateFile, WorkloadTemplate};
