//! Capsule descriptors
//!
//! A `.capsule` file lists ConfigMaps and Secrets whose entries are taken
//! verbatim from sibling template files:
//!
//! ```yaml
//! - name: dashboards
//!   type: configmap
//!   items:
//!     overview.json: overview_dashboard.json
//!   dynamics: ".*_rules\\.yaml"
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{CoreError, Result};
use crate::template::TemplateFile;

/// File name of the descriptor
pub const CAPSULE_FILE: &str = ".capsule";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapsuleKind {
    #[serde(alias = "ConfigMap", alias = "cm")]
    Configmap,
    #[serde(alias = "Secret")]
    Secret,
}

/// One resource declared by a capsule descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapsuleEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: CapsuleKind,
    /// Entry key -> source file name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub items: BTreeMap<String, String>,
    /// Regex selecting extra source files, stored under their own names
    #[serde(default, rename = "dynamics", skip_serializing_if = "Option::is_none")]
    pub dynamic_items: Option<String>,
}

/// Parsed `.capsule` file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapsuleDescriptor {
    pub entries: Vec<CapsuleEntry>,
}

impl CapsuleDescriptor {
    pub fn parse(content: &[u8]) -> Result<Self> {
        let descriptor: Self = serde_yaml::from_slice(content)?;
        for entry in &descriptor.entries {
            if entry.name.is_empty() {
                return Err(CoreError::InvalidCapsule {
                    message: "entry without a name".to_string(),
                });
            }
        }
        Ok(descriptor)
    }
}

impl CapsuleEntry {
    /// Resolve the entry's data from the sibling files of its level.
    ///
    /// Dynamic matches go in first so explicit items win on key collisions.
    /// An explicit item pointing at a missing file is an error.
    pub fn resolve(&self, files: &[TemplateFile]) -> Result<BTreeMap<String, Vec<u8>>> {
        let mut data = BTreeMap::new();

        if let Some(pattern) = &self.dynamic_items {
            let regex = Regex::new(pattern).map_err(|e| CoreError::InvalidCapsule {
                message: format!("capsule '{}': invalid dynamics pattern: {}", self.name, e),
            })?;
            for file in files {
                if file.filename != CAPSULE_FILE && regex.is_match(&file.filename) {
                    data.insert(file.filename.clone(), file.content.clone());
                }
            }
        }

        for (key, source) in &self.items {
            let file = files
                .iter()
                .find(|f| &f.filename == source)
                .ok_or_else(|| CoreError::InvalidCapsule {
                    message: format!(
                        "capsule '{}': item '{}' refers to missing file '{}'",
                        self.name, key, source
                    ),
                })?;
            data.insert(key.clone(), file.content.clone());
        }

        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files() -> Vec<TemplateFile> {
        vec![
            TemplateFile::new(CAPSULE_FILE, "ignored"),
            TemplateFile::new("overview_dashboard.json", "{}"),
            TemplateFile::new("node_rules.yaml", "groups: []"),
            TemplateFile::new("pod_rules.yaml", "groups: [a]"),
        ]
    }

    #[test]
    fn test_parse_descriptor() {
        let descriptor = CapsuleDescriptor::parse(
            br#"
- name: dashboards
  type: configmap
  items:
    overview.json: overview_dashboard.json
- name: rules
  type: secret
  dynamics: ".*_rules\\.yaml"
"#,
        )
        .unwrap();

        assert_eq!(descriptor.entries.len(), 2);
        assert_eq!(descriptor.entries[0].kind, CapsuleKind::Configmap);
        assert_eq!(descriptor.entries[1].kind, CapsuleKind::Secret);
        assert_eq!(
            descriptor.entries[1].dynamic_items.as_deref(),
            Some(".*_rules\\.yaml")
        );
    }

    #[test]
    fn test_resolve_items_and_dynamics() {
        let entry = CapsuleEntry {
            name: "bundle".to_string(),
            kind: CapsuleKind::Configmap,
            items: BTreeMap::from([(
                "overview.json".to_string(),
                "overview_dashboard.json".to_string(),
            )]),
            dynamic_items: Some(r".*_rules\.yaml".to_string()),
        };

        let data = entry.resolve(&files()).unwrap();
        assert_eq!(
            data.keys().collect::<Vec<_>>(),
            vec!["node_rules.yaml", "overview.json", "pod_rules.yaml"]
        );
        assert_eq!(data["overview.json"], b"{}");
    }

    #[test]
    fn test_resolve_missing_item_fails() {
        let entry = CapsuleEntry {
            name: "bundle".to_string(),
            kind: CapsuleKind::Secret,
            items: BTreeMap::from([("a".to_string(), "nope.txt".to_string())]),
            dynamic_items: None,
        };

        assert!(matches!(
            entry.resolve(&files()),
            Err(CoreError::InvalidCapsule { .. })
        ));
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(CapsuleDescriptor::parse(b"name: [unclosed").is_err());
    }
}
