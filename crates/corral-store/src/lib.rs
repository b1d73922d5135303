//! Corral Template Store
//!
//! This crate keeps template packages loaded and current:
//!
//! - **Versioned store**: templates keyed by `<name>_<version>`, with a
//!   latest-version lookup per name
//! - **Categories**: one store per sub-directory (`apps`, `capsules`)
//! - **Directory watch**: packages are loaded and unloaded as files appear
//!   and disappear
//! - **Remote sync**: a plain-text index is mirrored into the store directory
//!
//! ## Example
//!
//! ```rust,no_run
//! use corral_store::{CategoryStores, StoreConfig};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let stores = CategoryStores::new(&StoreConfig::default())?;
//! stores.load_all()?;
//!
//! let apps = stores.apps()?;
//! if let Some(template) = apps.get_latest("web") {
//!     println!("{} has {} files", template.key(), template.file_count());
//! }
//! # Ok(())
//! # }
//! ```

pub mod category;
pub mod config;
pub mod error;
pub mod index;
pub mod store;
pub mod sync;
pub mod watch;

pub use category::CategoryStores;
pub use config::{APPS, CAPSULES, StoreConfig, SyncConfig};
pub use error::{Result, StoreError};
pub use index::{Index, IndexDiff, diff, parse_index};
pub use store::TemplateStore;
pub use sync::{SyncReport, Synchronizer};
pub use watch::{StoreChange, TemplateWatcher, changes_for, first_finished};
