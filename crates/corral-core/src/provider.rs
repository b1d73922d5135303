//! Template lookup seam between the store and the handlers

use std::sync::Arc;

use crate::template::AppTemplate;

/// Read access to loaded templates
pub trait TemplateProvider: Send + Sync {
    /// Exact lookup by name and version (a leading `v` is ignored)
    fn get_template(&self, name: &str, version: &str) -> Option<Arc<AppTemplate>>;

    /// Latest version of a template, see [`crate::version::latest`]
    fn get_latest_template(&self, name: &str) -> Option<Arc<AppTemplate>>;

    /// Exact lookup when a version is given, latest otherwise
    fn resolve(&self, name: &str, version: Option<&str>) -> Option<Arc<AppTemplate>> {
        match version {
            Some(version) if !version.is_empty() => self.get_template(name, version),
            _ => self.get_latest_template(name),
        }
    }
}
