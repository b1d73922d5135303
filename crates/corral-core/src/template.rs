//! Loaded template model

use std::collections::BTreeMap;

use crate::package::template_key;

/// A single file of a template, raw bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateFile {
    pub filename: String,
    pub content: Vec<u8>,
}

impl TemplateFile {
    pub fn new(filename: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
        }
    }
}

/// Named, versioned group of files
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateBase {
    pub name: String,
    pub version: String,
    pub files: Vec<TemplateFile>,
}

impl TemplateBase {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            files: Vec::new(),
        }
    }

    /// Find a file by exact name
    pub fn file(&self, filename: &str) -> Option<&TemplateFile> {
        self.files.iter().find(|f| f.filename == filename)
    }
}

/// Files of one component; keyed by the workload directory name
pub type WorkloadTemplate = TemplateBase;

/// A loaded application template
///
/// App-level files live in `base.files`; every first-level directory of the
/// package becomes one entry of `workloads`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppTemplate {
    pub base: TemplateBase,
    pub workloads: BTreeMap<String, WorkloadTemplate>,
}

impl AppTemplate {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            base: TemplateBase::new(name, version),
            workloads: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.base.name
    }

    pub fn version(&self) -> &str {
        &self.base.version
    }

    /// Store key `<name>_<version>`
    pub fn key(&self) -> String {
        template_key(&self.base.name, &self.base.version)
    }

    /// Add an app-level file
    pub fn with_file(mut self, filename: &str, content: impl Into<Vec<u8>>) -> Self {
        self.base.files.push(TemplateFile::new(filename, content));
        self
    }

    /// Add a file to a workload, creating the workload if needed
    pub fn with_workload_file(
        mut self,
        workload: &str,
        filename: &str,
        content: impl Into<Vec<u8>>,
    ) -> Self {
        let version = self.base.version.clone();
        self.workloads
            .entry(workload.to_string())
            .or_insert_with(|| TemplateBase::new(workload, version))
            .files
            .push(TemplateFile::new(filename, content));
        self
    }

    /// Total number of files across all levels
    pub fn file_count(&self) -> usize {
        self.base.files.len() + self.workloads.values().map(|w| w.files.len()).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_helpers() {
        let template = AppTemplate::new("demo", "1.0.0")
            .with_file("demo_cm.yaml", "a")
            .with_workload_file("worker", "worker_deploy.yaml", "b")
            .with_workload_file("worker", "worker_svc.yaml", "c");

        assert_eq!(template.key(), "demo_1.0.0");
        assert_eq!(template.file_count(), 3);
        assert_eq!(template.workloads["worker"].version, "1.0.0");
        assert!(template.workloads["worker"].file("worker_svc.yaml").is_some());
    }
}
