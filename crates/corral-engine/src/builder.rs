//! Template to manifest conversion

use corral_core::{
    AppTemplate, CapsuleDescriptor, CapsuleKind, LabelSchema, Labels, TemplateFile,
};
use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::kind::{Recognized, Resource, recognize};
use crate::manifest::{AppManifests, ComponentManifests, Workload};
use crate::overlay::add_missing;

/// Decodes template files into typed manifests.
///
/// Building is pure: the template is only read, and building the same
/// template twice yields equal manifests.
#[derive(Debug, Clone, Default)]
pub struct ManifestBuilder {
    labels: LabelSchema,
}

impl ManifestBuilder {
    pub fn new(labels: LabelSchema) -> Self {
        Self { labels }
    }

    pub fn build(&self, template: &AppTemplate) -> Result<AppManifests> {
        let name = template.name();
        let mut app = AppManifests {
            name: name.to_string(),
            version: template.version().to_string(),
            ..Default::default()
        };

        let labels = self.labels.template_labels(name);
        for resource in self.decode_level(name, &template.base.files, &labels)? {
            if let Some(rejected) = app.manifests.insert(resource) {
                warn!(
                    template = %name,
                    resource = %rejected.display_name(),
                    "workload resources are only valid inside a component, ignoring it"
                );
            }
        }

        for (workload_name, workload) in &template.workloads {
            let labels = self.labels.template_component_labels(name, workload_name);
            let mut component = ComponentManifests::new(workload_name.as_str());

            for resource in self.decode_level(name, &workload.files, &labels)? {
                place_in_component(name, &mut component, resource)?;
            }
            app.components.push(component);
        }

        debug!(
            template = %name,
            version = %app.version,
            components = app.components.len(),
            "built manifests"
        );
        Ok(app)
    }

    /// Decode every recognized file of one level, in file order
    fn decode_level(
        &self,
        template: &str,
        files: &[TemplateFile],
        labels: &Labels,
    ) -> Result<Vec<Resource>> {
        let mut resources = Vec::new();

        for file in files {
            match recognize(&file.filename) {
                Some(Recognized::Manifest { kind, .. }) => {
                    let mut resource = kind.decode(&file.content).map_err(|e| EngineError::Decode {
                        template: template.to_string(),
                        file: file.filename.clone(),
                        kind,
                        message: e.to_string(),
                    })?;
                    apply_labels(resource.metadata_mut(), labels);
                    resources.push(resource);
                }
                Some(Recognized::Capsule) => {
                    resources.extend(self.decode_capsule(template, file, files, labels)?);
                }
                None => {
                    debug!(template = %template, file = %file.filename, "skipping unrecognized file");
                }
            }
        }

        Ok(resources)
    }

    fn decode_capsule(
        &self,
        template: &str,
        descriptor: &TemplateFile,
        files: &[TemplateFile],
        labels: &Labels,
    ) -> Result<Vec<Resource>> {
        let capsule_error = |source| EngineError::Capsule {
            template: template.to_string(),
            source,
        };
        let descriptor = CapsuleDescriptor::parse(&descriptor.content).map_err(capsule_error)?;

        let mut resources = Vec::with_capacity(descriptor.entries.len());
        for entry in &descriptor.entries {
            let data = entry.resolve(files).map_err(capsule_error)?;
            let mut metadata = ObjectMeta {
                name: Some(entry.name.clone()),
                ..Default::default()
            };
            apply_labels(&mut metadata, labels);

            let data = data.into_iter().map(|(k, v)| (k, ByteString(v))).collect();
            let resource = match entry.kind {
                CapsuleKind::Configmap => Resource::from(ConfigMap {
                    metadata,
                    binary_data: Some(data),
                    ..Default::default()
                }),
                CapsuleKind::Secret => Resource::from(Secret {
                    metadata,
                    data: Some(data),
                    ..Default::default()
                }),
            };
            resources.push(resource);
        }

        Ok(resources)
    }
}

fn place_in_component(
    template: &str,
    component: &mut ComponentManifests,
    resource: Resource,
) -> Result<()> {
    let resource = match resource {
        Resource::HorizontalPodAutoscaler(hpa) => {
            if component.hpa.is_some() {
                warn!(template = %template, component = %component.name, "duplicate hpa, keeping the last one");
            }
            component.hpa = Some(hpa);
            return Ok(());
        }
        other => other,
    };

    let resource = match Workload::from_resource(resource) {
        Ok(workload) => {
            if let Some(existing) = &component.workload {
                return Err(EngineError::DuplicateWorkload {
                    template: template.to_string(),
                    component: component.name.clone(),
                    existing: existing.kind(),
                    duplicate: workload.kind(),
                });
            }
            component.workload = Some(workload);
            return Ok(());
        }
        Err(other) => other,
    };

    component.manifests.insert(resource);
    Ok(())
}

/// Labels declared in the file keep their values
fn apply_labels(metadata: &mut ObjectMeta, labels: &Labels) {
    add_missing(metadata.labels.get_or_insert_default(), labels);
}
