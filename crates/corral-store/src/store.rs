//! In-memory template store backed by a package directory

use corral_core::{AppTemplate, PackageName, TemplateProvider, is_package_path, load_template, template_key, version};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{Result, StoreError};

/// Templates of one directory keyed by `<name>_<version>`
#[derive(Debug)]
pub struct TemplateStore {
    directory: PathBuf,
    templates: RwLock<HashMap<String, Arc<AppTemplate>>>,
}

impl TemplateStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            templates: RwLock::new(HashMap::new()),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Load every package directly in the directory. Subdirectories are not
    /// descended into.
    ///
    /// Packages that fail to load are logged and skipped. Returns the number
    /// of templates loaded.
    pub fn load_all(&self) -> Result<usize> {
        std::fs::create_dir_all(&self.directory)?;

        let mut loaded = 0;
        for entry in WalkDir::new(&self.directory).max_depth(1).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(directory = %self.directory.display(), error = %e, "failed to walk template directory");
                    continue;
                }
            };
            if !entry.file_type().is_file() || !is_package_path(entry.path()) {
                continue;
            }
            match self.load_one(entry.path()) {
                Ok(_) => loaded += 1,
                Err(e) => warn!(error = %e, "skipping template package"),
            }
        }

        info!(directory = %self.directory.display(), templates = loaded, "loaded templates");
        Ok(loaded)
    }

    /// Load (or reload) one package
    pub fn load_one(&self, path: &Path) -> Result<Arc<AppTemplate>> {
        let template = load_template(path).map_err(|source| StoreError::Load {
            path: path.display().to_string(),
            source,
        })?;
        let template = Arc::new(template);
        let key = template.key();

        let previous = self.write().insert(key.clone(), Arc::clone(&template));
        debug!(key = %key, reloaded = previous.is_some(), "template loaded");
        Ok(template)
    }

    /// Drop the template a package path maps to.
    ///
    /// Only the file name is looked at, the file may already be gone.
    pub fn unload_one(&self, path: &Path) -> Option<Arc<AppTemplate>> {
        let package = match PackageName::from_path(path) {
            Ok(package) => package,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "not a template package, nothing to unload");
                return None;
            }
        };
        let removed = self.write().remove(&package.key());
        if removed.is_some() {
            debug!(key = %package.key(), "template unloaded");
        }
        removed
    }

    /// Templates whose key contains `query`, sorted by key
    pub fn search(&self, query: &str) -> Vec<Arc<AppTemplate>> {
        let templates = self.read();
        let mut found: Vec<(&String, &Arc<AppTemplate>)> =
            templates.iter().filter(|(key, _)| key.contains(query)).collect();
        found.sort_by(|a, b| a.0.cmp(b.0));
        found.into_iter().map(|(_, t)| Arc::clone(t)).collect()
    }

    /// Every template, sorted by key
    pub fn list(&self) -> Vec<Arc<AppTemplate>> {
        self.search("")
    }

    pub fn get(&self, name: &str, version: &str) -> Option<Arc<AppTemplate>> {
        self.read().get(&template_key(name, version)).cloned()
    }

    /// Latest version by the store's segment-wise string ordering
    pub fn get_latest(&self, name: &str) -> Option<Arc<AppTemplate>> {
        let templates = self.read();
        let mut candidates: Vec<&Arc<AppTemplate>> =
            templates.values().filter(|t| t.name() == name).collect();
        // map iteration order is arbitrary, the fold is not symmetric on ties
        candidates.sort_by(|a, b| a.version().cmp(b.version()));

        let latest = version::latest(candidates.iter().map(|t| t.version()))?;
        candidates
            .into_iter()
            .find(|t| t.version() == latest)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<AppTemplate>>> {
        self.templates.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<AppTemplate>>> {
        self.templates.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TemplateProvider for TemplateStore {
    fn get_template(&self, name: &str, version: &str) -> Option<Arc<AppTemplate>> {
        self.get(name, version)
    }

    fn get_latest_template(&self, name: &str) -> Option<Arc<AppTemplate>> {
        self.get_latest(name)
    }
}
