//! One [`TemplateStore`] per category directory

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::error;

use crate::config::{APPS, CAPSULES, StoreConfig};
use crate::error::{Result, StoreError};
use crate::store::TemplateStore;
use crate::watch::TemplateWatcher;

/// Stores rooted at `<directory>/<category>`
#[derive(Debug)]
pub struct CategoryStores {
    root: PathBuf,
    stores: BTreeMap<String, Arc<TemplateStore>>,
}

impl CategoryStores {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        if config.categories.is_empty() {
            return Err(StoreError::InvalidConfig {
                message: "at least one template category is required".to_string(),
            });
        }

        let mut stores = BTreeMap::new();
        for category in &config.categories {
            if category.is_empty() || category.contains(['/', '\\']) || category == ".." {
                return Err(StoreError::InvalidConfig {
                    message: format!("invalid category name {:?}", category),
                });
            }
            let directory = config.directory.join(category);
            stores.insert(category.clone(), Arc::new(TemplateStore::new(directory)));
        }

        Ok(Self {
            root: config.directory.clone(),
            stores,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Load every category, returning the total number of templates
    pub fn load_all(&self) -> Result<usize> {
        let mut total = 0;
        for store in self.stores.values() {
            total += store.load_all()?;
        }
        Ok(total)
    }

    pub fn get(&self, category: &str) -> Result<Arc<TemplateStore>> {
        self.stores
            .get(category)
            .cloned()
            .ok_or_else(|| StoreError::UnknownCategory {
                category: category.to_string(),
            })
    }

    pub fn apps(&self) -> Result<Arc<TemplateStore>> {
        self.get(APPS)
    }

    pub fn capsules(&self) -> Result<Arc<TemplateStore>> {
        self.get(CAPSULES)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<TemplateStore>)> {
        self.stores.iter().map(|(name, store)| (name.as_str(), store))
    }

    /// Start a watcher per category. Fails if any category cannot be watched.
    pub fn watch_all(&self) -> Result<Vec<TemplateWatcher>> {
        self.stores
            .iter()
            .map(|(category, store)| {
                TemplateWatcher::start(Arc::clone(store)).inspect_err(|e| {
                    error!(category = %category, error = %e, "failed to watch template category");
                })
            })
            .collect()
    }
}
