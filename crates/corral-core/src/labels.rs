//! Label keys stamped onto generated resources

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type Labels = BTreeMap<String, String>;

/// Label keys used by the builder and the customizer
///
/// Template labels (`app`, `component`) are applied when a template is built;
/// instance labels are merged in during customization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LabelSchema {
    pub template_app: String,
    pub template_component: String,
    pub name: String,
    pub instance: String,
    pub version: String,
    pub component: String,
    pub managed_by: String,
    pub managed_by_value: String,
}

impl Default for LabelSchema {
    fn default() -> Self {
        Self {
            template_app: "app".to_string(),
            template_component: "component".to_string(),
            name: "app.kubernetes.io/name".to_string(),
            instance: "app.kubernetes.io/instance".to_string(),
            version: "app.kubernetes.io/version".to_string(),
            component: "app.kubernetes.io/component".to_string(),
            managed_by: "app.kubernetes.io/managed-by".to_string(),
            managed_by_value: "corral".to_string(),
        }
    }
}

impl LabelSchema {
    /// `app=<template>`
    pub fn template_labels(&self, template: &str) -> Labels {
        Labels::from([(self.template_app.clone(), template.to_string())])
    }

    /// `app=<template>, component=<workload>`
    pub fn template_component_labels(&self, template: &str, workload: &str) -> Labels {
        let mut labels = self.template_labels(template);
        labels.insert(self.template_component.clone(), workload.to_string());
        labels
    }

    pub fn instance_labels(&self, instance: &str, template: &str, version: &str) -> Labels {
        Labels::from([
            (self.name.clone(), template.to_string()),
            (self.instance.clone(), instance.to_string()),
            (self.version.clone(), version.to_string()),
            (self.managed_by.clone(), self.managed_by_value.clone()),
        ])
    }

    pub fn component_instance_labels(
        &self,
        instance: &str,
        template: &str,
        version: &str,
        component: &str,
    ) -> Labels {
        let mut labels = self.instance_labels(instance, template, version);
        labels.insert(self.component.clone(), component.to_string());
        labels
    }

    /// Labels that must stay out of selectors: they change between releases
    /// and selectors are immutable on most workloads.
    pub fn ignored_in_selector(&self, key: &str) -> bool {
        key == self.version || key == self.managed_by
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_instance_labels() {
        let schema = LabelSchema::default();
        let labels = schema.component_instance_labels("prod", "demo", "1.0.0", "worker");

        assert_eq!(labels["app.kubernetes.io/name"], "demo");
        assert_eq!(labels["app.kubernetes.io/instance"], "prod");
        assert_eq!(labels["app.kubernetes.io/version"], "1.0.0");
        assert_eq!(labels["app.kubernetes.io/component"], "worker");
        assert_eq!(labels["app.kubernetes.io/managed-by"], "corral");
    }

    #[test]
    fn test_selector_exclusions() {
        let schema = LabelSchema::default();
        assert!(schema.ignored_in_selector("app.kubernetes.io/version"));
        assert!(schema.ignored_in_selector("app.kubernetes.io/managed-by"));
        assert!(!schema.ignored_in_selector("app.kubernetes.io/instance"));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let schema: LabelSchema = serde_yaml::from_str("managedByValue: platform\n").unwrap();
        assert_eq!(schema.managed_by_value, "platform");
        assert_eq!(schema.template_app, "app");
    }
}
