//! Post-customization decorators
//!
//! Decorators run last, after overrides have been applied, and only touch
//! component pod templates.

use k8s_openapi::api::core::v1::{Container, EnvVar, PodSpec};

use crate::manifest::AppManifests;

/// Env var carrying the cluster name
pub const CLUSTER_NAME_ENV: &str = "K8S_CLUSTER_NAME";

/// A final transformation of an app's manifests
pub trait Decorator: Send + Sync {
    fn decorate(&self, manifests: &mut AppManifests);
}

impl<F> Decorator for F
where
    F: Fn(&mut AppManifests) + Send + Sync,
{
    fn decorate(&self, manifests: &mut AppManifests) {
        self(manifests)
    }
}

fn for_each_container(manifests: &mut AppManifests, mut f: impl FnMut(&mut Container)) {
    for template in manifests.pod_templates_mut() {
        let Some(pod) = template.spec.as_mut() else {
            continue;
        };
        for_each_pod_container(pod, &mut f);
    }
}

fn for_each_pod_container(pod: &mut PodSpec, f: &mut impl FnMut(&mut Container)) {
    pod.containers.iter_mut().for_each(&mut *f);
    if let Some(init) = pod.init_containers.as_mut() {
        init.iter_mut().for_each(&mut *f);
    }
}

/// Adds `K8S_CLUSTER_NAME` to every container that does not set it
#[derive(Debug, Clone)]
pub struct ClusterNameEnv {
    cluster_name: String,
}

impl ClusterNameEnv {
    pub fn new(cluster_name: impl Into<String>) -> Self {
        Self {
            cluster_name: cluster_name.into(),
        }
    }
}

impl Decorator for ClusterNameEnv {
    fn decorate(&self, manifests: &mut AppManifests) {
        for_each_container(manifests, |container| {
            let env = container.env.get_or_insert_default();
            if env.iter().any(|e| e.name == CLUSTER_NAME_ENV) {
                return;
            }
            env.push(EnvVar {
                name: CLUSTER_NAME_ENV.to_string(),
                value: Some(self.cluster_name.clone()),
                ..Default::default()
            });
        });
    }
}

/// Rewrites every container image to pull from one registry
#[derive(Debug, Clone)]
pub struct ImageRegistry {
    registry: String,
}

impl ImageRegistry {
    pub fn new(registry: impl Into<String>) -> Self {
        Self {
            registry: registry.into(),
        }
    }
}

impl Decorator for ImageRegistry {
    fn decorate(&self, manifests: &mut AppManifests) {
        for_each_container(manifests, |container| {
            if let Some(image) = container.image.as_mut() {
                *image = update_image_registry(&self.registry, image);
            }
        });
    }
}

/// Point `image` at `registry`.
///
/// A first path segment that looks like a registry host (has a `.` or a `:`,
/// is a bracketed IPv6 address, or is `localhost`) is replaced; otherwise the
/// registry is prepended.
pub fn update_image_registry(registry: &str, image: &str) -> String {
    let registry = registry.trim_end_matches('/');
    if registry.is_empty() || image.is_empty() {
        return image.to_string();
    }

    match image.split_once('/') {
        Some((host, rest)) if is_registry_host(host) => format!("{registry}/{rest}"),
        _ => format!("{registry}/{image}"),
    }
}

fn is_registry_host(segment: &str) -> bool {
    segment.contains('.') || segment.contains(':') || segment.starts_with('[') || segment == "localhost"
}
