//! Override application
//!
//! Takes freshly built manifests and an [`AppSpec`] and produces the
//! manifests to apply: instance labels and namespace are stamped on every
//! resource, override fields replace template fields, and resources present
//! only in the override are synthesized.

use corral_core::{LabelSchema, Labels};
use k8s_openapi::api::autoscaling::v1::{
    CrossVersionObjectReference, HorizontalPodAutoscaler, HorizontalPodAutoscalerSpec,
};
use k8s_openapi::api::core::v1::{ConfigMap, Secret, Service};
use k8s_openapi::api::rbac::v1::Subject;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::error::Result;
use crate::manifest::{AppManifests, ComponentManifests, Manifests};
use crate::overlay::{add_missing, merge_object_meta, overlay, overlay_opt, selector_labels};
use crate::spec::{AppSpec, CommonSpec, ComponentSpec, HpaSpec};
use crate::workload::customize_workload;

/// Labels and naming for one customization level
pub(crate) struct Context<'a> {
    /// Name given to synthesized resources
    pub owner: &'a str,
    pub namespace: Option<&'a str>,
    pub labels: Labels,
    /// `labels` minus the keys excluded from selectors
    pub selector: Labels,
}

impl<'a> Context<'a> {
    pub(crate) fn new(
        owner: &'a str,
        namespace: Option<&'a str>,
        labels: Labels,
        schema: &LabelSchema,
    ) -> Self {
        let selector = selector_labels(&labels, |key| schema.ignored_in_selector(key));
        Self {
            owner,
            namespace,
            labels,
            selector,
        }
    }
}

/// Applies an [`AppSpec`] to built manifests
#[derive(Debug, Clone, Default)]
pub struct Customizer {
    labels: LabelSchema,
}

impl Customizer {
    pub fn new(labels: LabelSchema) -> Self {
        Self { labels }
    }

    /// Customize `manifests` in place.
    ///
    /// The version label carries the resolved template version, so it is
    /// read from the manifests rather than from `app.template`.
    pub fn customize(&self, manifests: &mut AppManifests, app: &AppSpec) -> Result<()> {
        let template = manifests.name.clone();
        let version = manifests.version.clone();

        let labels = self.labels.instance_labels(&app.name, &template, &version);
        let ctx = Context::new(&app.name, app.namespace(), labels, &self.labels);
        customize_common(&mut manifests.manifests, &app.common, &ctx)?;

        let empty = ComponentSpec::default();
        for component in &mut manifests.components {
            let spec = app.components.get(&component.name).unwrap_or(&empty);
            let owner = format!("{}-{}", app.name, component.name);
            let labels = self.labels.component_instance_labels(
                &app.name,
                &template,
                &version,
                &component.name,
            );
            let ctx = Context::new(&owner, app.namespace(), labels, &self.labels);
            customize_component(component, spec, &ctx)?;
        }

        for name in app.components.keys() {
            if manifests.component(name).is_none() {
                warn!(
                    app = %app.name,
                    template = %template,
                    component = %name,
                    "override for a component the template does not have, ignoring it"
                );
            }
        }

        Ok(())
    }
}

fn customize_component(
    component: &mut ComponentManifests,
    spec: &ComponentSpec,
    ctx: &Context<'_>,
) -> Result<()> {
    customize_common(&mut component.manifests, &spec.common, ctx)?;

    if let Some(workload) = component.workload.as_mut() {
        customize_workload(workload, &spec.workload, ctx)?;
    }

    customize_hpa(component, spec.hpa.as_ref(), ctx)
}

fn customize_hpa(
    component: &mut ComponentManifests,
    patch: Option<&HpaSpec>,
    ctx: &Context<'_>,
) -> Result<()> {
    if component.hpa.is_none() {
        let Some(patch) = patch else {
            return Ok(());
        };
        let scale_target_ref = match (&patch.scale_target_ref, &component.workload) {
            (Some(target), _) => target.clone(),
            (None, Some(workload)) => CrossVersionObjectReference {
                api_version: Some(workload.kind().api_version().to_string()),
                kind: workload.kind().to_string(),
                name: workload.name().to_string(),
            },
            (None, None) => {
                warn!(
                    component = ctx.owner,
                    "hpa override without a workload or scaleTargetRef, skipping it"
                );
                return Ok(());
            }
        };
        debug!(component = ctx.owner, "synthesizing hpa from override");
        component.hpa = Some(HorizontalPodAutoscaler {
            metadata: named(ctx.owner),
            spec: Some(HorizontalPodAutoscalerSpec {
                scale_target_ref,
                max_replicas: patch.max_replicas.unwrap_or(1),
                ..Default::default()
            }),
            ..Default::default()
        });
    }

    let Some(hpa) = component.hpa.as_mut() else {
        return Ok(());
    };
    merge_object_meta(&mut hpa.metadata, ctx.namespace, &ctx.labels);
    if let Some(patch) = patch {
        overlay_opt(&mut hpa.spec, patch, ctx.owner)?;
    }
    Ok(())
}

/// Customize the resources shared by apps and components
pub(crate) fn customize_common(
    manifests: &mut Manifests,
    spec: &CommonSpec,
    ctx: &Context<'_>,
) -> Result<()> {
    customize_config_maps(&mut manifests.config_maps, &spec.config_maps, ctx);
    customize_secrets(&mut manifests.secrets, &spec.secrets, ctx);
    customize_services(&mut manifests.services, &spec.services, ctx)?;

    customize_singleton(
        &mut manifests.service_account,
        spec.service_account.as_ref(),
        ctx,
        ctx.namespace,
    )?;
    customize_singleton(
        &mut manifests.cluster_role,
        spec.cluster_role.as_ref(),
        ctx,
        None,
    )?;
    customize_singleton(
        &mut manifests.cluster_role_binding,
        spec.cluster_role_binding.as_ref(),
        ctx,
        None,
    )?;
    customize_singleton(&mut manifests.role, spec.role.as_ref(), ctx, ctx.namespace)?;
    customize_singleton(
        &mut manifests.role_binding,
        spec.role_binding.as_ref(),
        ctx,
        ctx.namespace,
    )?;

    if let Some(binding) = manifests.cluster_role_binding.as_mut() {
        default_subject_namespace(binding.subjects.as_mut(), ctx.namespace);
    }
    if let Some(binding) = manifests.role_binding.as_mut() {
        default_subject_namespace(binding.subjects.as_mut(), ctx.namespace);
    }

    if manifests.ingress.is_none() && spec.ingress.is_some() {
        manifests.ingress = Some(Default::default());
    }
    if let Some(ingress) = manifests.ingress.as_mut() {
        if ingress.metadata.name.is_none() {
            ingress.metadata.name = Some(ctx.owner.to_string());
        }
        merge_object_meta(&mut ingress.metadata, ctx.namespace, &ctx.labels);
        if let Some(patch) = &spec.ingress {
            overlay_opt(&mut ingress.spec, patch, ctx.owner)?;
        }
    }

    Ok(())
}

/// Customize or synthesize a singleton whose override fields sit at the top
/// level of the resource.
fn customize_singleton<T, P>(
    slot: &mut Option<T>,
    patch: Option<&P>,
    ctx: &Context<'_>,
    namespace: Option<&str>,
) -> Result<()>
where
    T: k8s_openapi::Resource
        + k8s_openapi::Metadata<Ty = ObjectMeta>
        + Default
        + Serialize
        + DeserializeOwned,
    P: Serialize,
{
    if slot.is_none() && patch.is_some() {
        debug!(kind = T::KIND, name = ctx.owner, "synthesizing resource from override");
        let mut resource = T::default();
        *resource.metadata_mut() = named(ctx.owner);
        *slot = Some(resource);
    }

    let Some(resource) = slot.as_mut() else {
        return Ok(());
    };
    merge_object_meta(resource.metadata_mut(), namespace, &ctx.labels);
    if let Some(patch) = patch {
        overlay(resource, patch, ctx.owner)?;
    }
    Ok(())
}

/// ServiceAccount subjects without a namespace live in the app's namespace
fn default_subject_namespace(subjects: Option<&mut Vec<Subject>>, namespace: Option<&str>) {
    let (Some(subjects), Some(ns)) = (subjects, namespace) else {
        return;
    };
    for subject in subjects.iter_mut().filter(|s| s.kind == "ServiceAccount") {
        if subject.namespace.as_deref().is_none_or(str::is_empty) {
            subject.namespace = Some(ns.to_string());
        }
    }
}

fn customize_config_maps(
    config_maps: &mut Vec<ConfigMap>,
    patches: &BTreeMap<String, crate::spec::ConfigMapSpec>,
    ctx: &Context<'_>,
) {
    for config_map in config_maps.iter_mut() {
        merge_object_meta(&mut config_map.metadata, ctx.namespace, &ctx.labels);
        let Some(patch) = config_map.metadata.name.as_ref().and_then(|n| patches.get(n)) else {
            continue;
        };
        if config_map.immutable == Some(true) {
            debug!(name = ?config_map.metadata.name, "configmap is immutable, override ignored");
            continue;
        }
        if !patch.data.is_empty() {
            config_map.data = Some(patch.data.clone());
        }
    }

    for (name, patch) in patches {
        if config_maps.iter().any(|cm| cm.metadata.name.as_deref() == Some(name)) {
            continue;
        }
        debug!(name = %name, "synthesizing configmap from override");
        let mut metadata = named(name);
        merge_object_meta(&mut metadata, ctx.namespace, &ctx.labels);
        config_maps.push(ConfigMap {
            metadata,
            data: Some(patch.data.clone()),
            ..Default::default()
        });
    }
}

fn customize_secrets(
    secrets: &mut Vec<Secret>,
    patches: &BTreeMap<String, crate::spec::SecretSpec>,
    ctx: &Context<'_>,
) {
    for secret in secrets.iter_mut() {
        merge_object_meta(&mut secret.metadata, ctx.namespace, &ctx.labels);
        let Some(patch) = secret.metadata.name.as_ref().and_then(|n| patches.get(n)) else {
            continue;
        };
        if secret.immutable == Some(true) {
            debug!(name = ?secret.metadata.name, "secret is immutable, override ignored");
            continue;
        }
        if !patch.string_data.is_empty() {
            secret.string_data = Some(patch.string_data.clone());
        }
    }

    for (name, patch) in patches {
        if secrets.iter().any(|s| s.metadata.name.as_deref() == Some(name)) {
            continue;
        }
        debug!(name = %name, "synthesizing secret from override");
        let mut metadata = named(name);
        merge_object_meta(&mut metadata, ctx.namespace, &ctx.labels);
        secrets.push(Secret {
            metadata,
            string_data: Some(patch.string_data.clone()),
            ..Default::default()
        });
    }
}

fn customize_services(
    services: &mut Vec<Service>,
    patches: &BTreeMap<String, crate::spec::ServiceSpec>,
    ctx: &Context<'_>,
) -> Result<()> {
    for service in services.iter_mut() {
        merge_object_meta(&mut service.metadata, ctx.namespace, &ctx.labels);
        if let Some(selector) = service.spec.as_mut().and_then(|s| s.selector.as_mut()) {
            add_missing(selector, &ctx.selector);
        }
        if let Some(patch) = service.metadata.name.as_ref().and_then(|n| patches.get(n)) {
            let identity = format!("{}/{}", ctx.owner, service.metadata.name.as_deref().unwrap_or_default());
            overlay_opt(&mut service.spec, patch, &identity)?;
        }
    }

    for (name, patch) in patches {
        if services.iter().any(|s| s.metadata.name.as_deref() == Some(name)) {
            continue;
        }
        debug!(name = %name, "synthesizing service from override");
        let mut service = Service {
            metadata: named(name),
            ..Default::default()
        };
        merge_object_meta(&mut service.metadata, ctx.namespace, &ctx.labels);
        overlay_opt(&mut service.spec, patch, name)?;
        let spec = service.spec.get_or_insert_default();
        if spec.selector.is_none() {
            spec.selector = Some(ctx.selector.clone());
        }
        services.push(service);
    }

    Ok(())
}

fn named(name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        ..Default::default()
    }
}
