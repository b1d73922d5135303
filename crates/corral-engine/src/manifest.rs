//! Typed manifest sets produced by the builder

use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::autoscaling::v1::HorizontalPodAutoscaler;
use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::api::core::v1::{
    ConfigMap, PodTemplateSpec, Secret, Service, ServiceAccount,
};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use tracing::warn;

use crate::kind::{Resource, ResourceKind};

/// Resources shared by an app and each of its components
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifests {
    pub config_maps: Vec<ConfigMap>,
    pub secrets: Vec<Secret>,
    pub services: Vec<Service>,
    pub service_account: Option<ServiceAccount>,
    pub cluster_role: Option<ClusterRole>,
    pub cluster_role_binding: Option<ClusterRoleBinding>,
    pub role: Option<Role>,
    pub role_binding: Option<RoleBinding>,
    pub ingress: Option<Ingress>,
}

impl Manifests {
    /// Place a non-workload resource in its slot.
    ///
    /// Workloads and HPAs are handed back since they only exist on
    /// components. A second singleton replaces the first.
    pub fn insert(&mut self, resource: Resource) -> Option<Resource> {
        match resource {
            Resource::ConfigMap(cm) => self.config_maps.push(cm),
            Resource::Secret(secret) => self.secrets.push(secret),
            Resource::Service(svc) => self.services.push(svc),
            Resource::ServiceAccount(sa) => replace_singleton(&mut self.service_account, sa),
            Resource::ClusterRole(cr) => replace_singleton(&mut self.cluster_role, cr),
            Resource::ClusterRoleBinding(crb) => {
                replace_singleton(&mut self.cluster_role_binding, crb)
            }
            Resource::Role(role) => replace_singleton(&mut self.role, role),
            Resource::RoleBinding(rb) => replace_singleton(&mut self.role_binding, rb),
            Resource::Ingress(ingress) => replace_singleton(&mut self.ingress, ingress),
            other => return Some(other),
        }
        None
    }

    /// Resources in apply order: service account, cluster role, cluster role
    /// binding, role, role binding, ingress, secrets, config maps, services.
    pub fn resources(&self) -> Vec<Resource> {
        let mut resources = Vec::new();
        resources.extend(self.service_account.clone().map(Resource::from));
        resources.extend(self.cluster_role.clone().map(Resource::from));
        resources.extend(self.cluster_role_binding.clone().map(Resource::from));
        resources.extend(self.role.clone().map(Resource::from));
        resources.extend(self.role_binding.clone().map(Resource::from));
        resources.extend(self.ingress.clone().map(Resource::from));
        resources.extend(self.secrets.iter().cloned().map(Resource::from));
        resources.extend(self.config_maps.iter().cloned().map(Resource::from));
        resources.extend(self.services.iter().cloned().map(Resource::from));
        resources
    }

    pub fn len(&self) -> usize {
        self.config_maps.len()
            + self.secrets.len()
            + self.services.len()
            + usize::from(self.service_account.is_some())
            + usize::from(self.cluster_role.is_some())
            + usize::from(self.cluster_role_binding.is_some())
            + usize::from(self.role.is_some())
            + usize::from(self.role_binding.is_some())
            + usize::from(self.ingress.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn replace_singleton<T>(slot: &mut Option<T>, value: T)
where
    T: k8s_openapi::Resource + k8s_openapi::Metadata<Ty = ObjectMeta>,
{
    if let Some(previous) = slot.as_ref() {
        warn!(
            kind = T::KIND,
            previous = previous.metadata().name.as_deref().unwrap_or_default(),
            replacement = value.metadata().name.as_deref().unwrap_or_default(),
            "duplicate singleton resource, keeping the last one"
        );
    }
    *slot = Some(value);
}

/// The single workload of a component
#[derive(Debug, Clone, PartialEq)]
pub enum Workload {
    Deployment(Deployment),
    DaemonSet(DaemonSet),
    StatefulSet(StatefulSet),
    ReplicaSet(ReplicaSet),
    Job(Job),
    CronJob(CronJob),
}

impl Workload {
    /// Split workloads off a decoded resource
    pub fn from_resource(resource: Resource) -> Result<Self, Resource> {
        match resource {
            Resource::Deployment(w) => Ok(Workload::Deployment(w)),
            Resource::DaemonSet(w) => Ok(Workload::DaemonSet(w)),
            Resource::StatefulSet(w) => Ok(Workload::StatefulSet(w)),
            Resource::ReplicaSet(w) => Ok(Workload::ReplicaSet(w)),
            Resource::Job(w) => Ok(Workload::Job(w)),
            Resource::CronJob(w) => Ok(Workload::CronJob(w)),
            other => Err(other),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            Workload::Deployment(_) => ResourceKind::Deployment,
            Workload::DaemonSet(_) => ResourceKind::DaemonSet,
            Workload::StatefulSet(_) => ResourceKind::StatefulSet,
            Workload::ReplicaSet(_) => ResourceKind::ReplicaSet,
            Workload::Job(_) => ResourceKind::Job,
            Workload::CronJob(_) => ResourceKind::CronJob,
        }
    }

    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            Workload::Deployment(w) => &w.metadata,
            Workload::DaemonSet(w) => &w.metadata,
            Workload::StatefulSet(w) => &w.metadata,
            Workload::ReplicaSet(w) => &w.metadata,
            Workload::Job(w) => &w.metadata,
            Workload::CronJob(w) => &w.metadata,
        }
    }

    pub fn name(&self) -> &str {
        self.metadata().name.as_deref().unwrap_or_default()
    }

    /// Pod template of the workload, if its spec carries one
    pub fn pod_template_mut(&mut self) -> Option<&mut PodTemplateSpec> {
        match self {
            Workload::Deployment(w) => w.spec.as_mut().map(|s| &mut s.template),
            Workload::DaemonSet(w) => w.spec.as_mut().map(|s| &mut s.template),
            Workload::StatefulSet(w) => w.spec.as_mut().map(|s| &mut s.template),
            Workload::ReplicaSet(w) => w.spec.as_mut().and_then(|s| s.template.as_mut()),
            Workload::Job(w) => w.spec.as_mut().map(|s| &mut s.template),
            Workload::CronJob(w) => w
                .spec
                .as_mut()
                .and_then(|s| s.job_template.spec.as_mut())
                .map(|s| &mut s.template),
        }
    }

    pub fn pod_template(&self) -> Option<&PodTemplateSpec> {
        match self {
            Workload::Deployment(w) => w.spec.as_ref().map(|s| &s.template),
            Workload::DaemonSet(w) => w.spec.as_ref().map(|s| &s.template),
            Workload::StatefulSet(w) => w.spec.as_ref().map(|s| &s.template),
            Workload::ReplicaSet(w) => w.spec.as_ref().and_then(|s| s.template.as_ref()),
            Workload::Job(w) => w.spec.as_ref().map(|s| &s.template),
            Workload::CronJob(w) => w
                .spec
                .as_ref()
                .and_then(|s| s.job_template.spec.as_ref())
                .map(|s| &s.template),
        }
    }
}

impl From<Workload> for Resource {
    fn from(workload: Workload) -> Self {
        match workload {
            Workload::Deployment(w) => Resource::Deployment(w),
            Workload::DaemonSet(w) => Resource::DaemonSet(w),
            Workload::StatefulSet(w) => Resource::StatefulSet(w),
            Workload::ReplicaSet(w) => Resource::ReplicaSet(w),
            Workload::Job(w) => Resource::Job(w),
            Workload::CronJob(w) => Resource::CronJob(w),
        }
    }
}

/// Manifests of one template workload directory
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentManifests {
    /// Workload directory name
    pub name: String,
    pub manifests: Manifests,
    pub workload: Option<Workload>,
    pub hpa: Option<HorizontalPodAutoscaler>,
}

impl ComponentManifests {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Common resources, then the workload, then the HPA
    pub fn resources(&self) -> Vec<Resource> {
        let mut resources = self.manifests.resources();
        resources.extend(self.workload.clone().map(Resource::from));
        resources.extend(self.hpa.clone().map(Resource::from));
        resources
    }
}

/// Everything built from one template
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppManifests {
    /// Template name
    pub name: String,
    pub version: String,
    pub manifests: Manifests,
    /// Components in workload directory order
    pub components: Vec<ComponentManifests>,
}

impl AppManifests {
    pub fn component(&self, name: &str) -> Option<&ComponentManifests> {
        self.components.iter().find(|c| c.name == name)
    }

    pub fn component_mut(&mut self, name: &str) -> Option<&mut ComponentManifests> {
        self.components.iter_mut().find(|c| c.name == name)
    }

    /// App-level resources first, then each component in order
    pub fn resources(&self) -> Vec<Resource> {
        let mut resources = self.manifests.resources();
        for component in &self.components {
            resources.extend(component.resources());
        }
        resources
    }

    /// All pod templates of all component workloads
    pub fn pod_templates_mut(&mut self) -> impl Iterator<Item = &mut PodTemplateSpec> {
        self.components
            .iter_mut()
            .filter_map(|c| c.workload.as_mut())
            .filter_map(Workload::pod_template_mut)
    }

    /// Multi-document YAML of every resource in apply order
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        let mut out = String::new();
        for resource in self.resources() {
            out.push_str("---\n");
            out.push_str(&resource.to_yaml()?);
        }
        Ok(out)
    }
}
