//! Override schema for applications and capsules
//!
//! Every field is optional: a present value replaces the template's value, an
//! absent one keeps it. Containers and volumes are the exception and merge
//! element-wise by name, see [`crate::list_merge`].
//!
//! ```yaml
//! name: platform
//! namespace: prod
//! registry: registry.example.com
//! apps:
//!   web:
//!     template:
//!       name: demo
//!       version: 1.0.0
//!     components:
//!       worker:
//!         deployment:
//!           replicas: 3
//! ```

use k8s_openapi::api::apps::v1::{
    DaemonSetUpdateStrategy, DeploymentStrategy, StatefulSetOrdinals,
    StatefulSetPersistentVolumeClaimRetentionPolicy, StatefulSetUpdateStrategy,
};
use k8s_openapi::api::autoscaling::v1::CrossVersionObjectReference;
use k8s_openapi::api::batch::v1::PodFailurePolicy;
use k8s_openapi::api::core::v1::{
    Affinity, Container, HostAlias, LocalObjectReference, ObjectReference,
    PersistentVolumeClaim, PodSecurityContext, ServicePort, Toleration,
    TopologySpreadConstraint, Volume,
};
use k8s_openapi::api::networking::v1::{IngressBackend, IngressRule, IngressTLS};
use k8s_openapi::api::rbac::v1::{AggregationRule, PolicyRule, RoleRef, Subject};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Template reference; an empty version resolves to the latest one
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl TemplateRef {
    pub fn new(name: impl Into<String>, version: Option<&str>) -> Self {
        Self {
            name: name.into(),
            version: version.map(str::to_string),
        }
    }

    /// `name:version`, `name:latest` without a version
    pub fn display(&self) -> String {
        format!(
            "{}:{}",
            self.name,
            self.version.as_deref().filter(|v| !v.is_empty()).unwrap_or("latest")
        )
    }
}

/// A group of applications sharing namespace and registry defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppsSpec {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
    #[serde(default)]
    pub apps: BTreeMap<String, AppSpec>,
}

impl AppsSpec {
    /// Apps with their names, namespace and registry filled in.
    ///
    /// An app without a name takes its key; namespace and registry fall back
    /// to the group's values.
    pub fn normalized(&self) -> Vec<AppSpec> {
        self.apps
            .iter()
            .map(|(key, app)| {
                let mut app = app.clone();
                if app.name.is_empty() {
                    app.name = key.clone();
                }
                if is_unset(&app.namespace) {
                    app.namespace = self.namespace.clone();
                }
                if is_unset(&app.registry) {
                    app.registry = self.registry.clone();
                }
                app
            })
            .collect()
    }
}

fn is_unset(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(str::is_empty)
}

/// One application instance of a template
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSpec {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub template: TemplateRef,
    /// Capsules of a singleton app keep their own names
    #[serde(default)]
    pub singleton: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
    #[serde(flatten)]
    pub common: CommonSpec,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub components: BTreeMap<String, ComponentSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Dependencies>,
}

impl AppSpec {
    pub fn new(name: impl Into<String>, template: TemplateRef) -> Self {
        Self {
            name: name.into(),
            template,
            ..Default::default()
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref().filter(|ns| !ns.is_empty())
    }

    /// Capsule dependencies with names, namespaces and instance names resolved
    pub fn capsules(&self) -> Vec<CapsuleSpec> {
        let Some(deps) = &self.dependencies else {
            return Vec::new();
        };
        deps.capsules
            .iter()
            .map(|(key, capsule)| {
                let mut capsule = capsule.clone();
                if capsule.name.is_empty() {
                    capsule.name = key.clone();
                }
                if !self.singleton {
                    capsule.name = format!("{}-{}", self.name, capsule.name);
                }
                if is_unset(&capsule.namespace) {
                    capsule.namespace = self.namespace.clone();
                }
                capsule
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dependencies {
    #[serde(default)]
    pub capsules: BTreeMap<String, CapsuleSpec>,
}

/// A capsule template instance: only ConfigMaps and Secrets are customizable
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapsuleSpec {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub template: TemplateRef,
    #[serde(default, rename = "configmaps", skip_serializing_if = "BTreeMap::is_empty")]
    pub config_maps: BTreeMap<String, ConfigMapSpec>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub secrets: BTreeMap<String, SecretSpec>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub components: BTreeMap<String, CapsuleComponentSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CapsuleComponentSpec {
    #[serde(default, rename = "configmaps", skip_serializing_if = "BTreeMap::is_empty")]
    pub config_maps: BTreeMap<String, ConfigMapSpec>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub secrets: BTreeMap<String, SecretSpec>,
}

impl CapsuleSpec {
    /// View the capsule as an app carrying only ConfigMap and Secret overrides
    pub fn to_app_spec(&self) -> AppSpec {
        AppSpec {
            name: self.name.clone(),
            namespace: self.namespace.clone(),
            template: self.template.clone(),
            singleton: true,
            registry: None,
            common: CommonSpec {
                config_maps: self.config_maps.clone(),
                secrets: self.secrets.clone(),
                ..Default::default()
            },
            components: self
                .components
                .iter()
                .map(|(name, component)| {
                    let spec = ComponentSpec {
                        common: CommonSpec {
                            config_maps: component.config_maps.clone(),
                            secrets: component.secrets.clone(),
                            ..Default::default()
                        },
                        ..Default::default()
                    };
                    (name.clone(), spec)
                })
                .collect(),
            dependencies: None,
        }
    }
}

/// Overrides valid at app and component level
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommonSpec {
    #[serde(default, rename = "configmaps", skip_serializing_if = "BTreeMap::is_empty")]
    pub config_maps: BTreeMap<String, ConfigMapSpec>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub secrets: BTreeMap<String, SecretSpec>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub services: BTreeMap<String, ServiceSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account: Option<ServiceAccountSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_role: Option<ClusterRoleSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_role_binding: Option<RoleBindingSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<RoleSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_binding: Option<RoleBindingSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress: Option<IngressSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigMapSpec {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretSpec {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub string_data: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ports: Option<Vec<ServicePort>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<BTreeMap<String, String>>,
    #[serde(default, rename = "clusterIP", skip_serializing_if = "Option::is_none")]
    pub cluster_ip: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAccountSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secrets: Option<Vec<ObjectReference>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_pull_secrets: Option<Vec<LocalObjectReference>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automount_service_account_token: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRoleSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<PolicyRule>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation_rule: Option<AggregationRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoleSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<PolicyRule>>,
}

/// Shared by RoleBinding and ClusterRoleBinding
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleBindingSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subjects: Option<Vec<Subject>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_ref: Option<RoleRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress_class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_backend: Option<IngressBackend>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<Vec<IngressTLS>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<IngressRule>>,
}

/// Overrides of one template component
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentSpec {
    #[serde(flatten)]
    pub common: CommonSpec,
    #[serde(flatten)]
    pub workload: WorkloadSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hpa: Option<HpaSpec>,
}

/// Workload overrides; only the one matching the component's workload applies
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkloadSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment: Option<DeploymentSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daemonset: Option<DaemonSetSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statefulset: Option<StatefulSetSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicaset: Option<ReplicaSetSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job: Option<JobSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cronjob: Option<CronJobSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HpaSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_target_ref: Option<CrossVersionObjectReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_replicas: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_replicas: Option<i32>,
    #[serde(
        default,
        rename = "targetCPUUtilizationPercentage",
        skip_serializing_if = "Option::is_none"
    )]
    pub target_cpu_utilization_percentage: Option<i32>,
}

/// Pod template override; `metadata` labels and annotations are added
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodTemplateSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ObjectMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<PodSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    /// Merged by container name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub containers: Option<Vec<Container>>,
    /// Merged by container name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_containers: Option<Vec<Container>>,
    /// Merged by volume name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volumes: Option<Vec<Volume>>,
    #[serde(flatten)]
    pub fields: PodSpecFields,
}

/// Pod spec fields replaced wholesale
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSpecFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns_policy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_context: Option<PodSecurityContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_pull_secrets: Option<Vec<LocalObjectReference>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affinity: Option<Affinity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerations: Option<Vec<Toleration>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_aliases: Option<Vec<HostAlias>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topology_spread_constraints: Option<Vec<TopologySpreadConstraint>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub termination_grace_period_seconds: Option<i64>,
}

macro_rules! workload_spec {
    (
        $(#[$meta:meta])*
        $name:ident / $fields:ident {
            $($(#[$field_meta:meta])* $field:ident: $ty:ty,)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        pub struct $name {
            #[serde(default, skip_serializing_if = "Option::is_none")]
            pub template: Option<PodTemplateSpec>,
            #[serde(flatten)]
            pub fields: $fields,
        }

        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        #[serde(rename_all = "camelCase")]
        pub struct $fields {
            $(
                $(#[$field_meta])*
                #[serde(default, skip_serializing_if = "Option::is_none")]
                pub $field: Option<$ty>,
            )*
        }
    };
}

workload_spec! {
    DeploymentSpec / DeploymentFields {
        replicas: i32,
        selector: LabelSelector,
        strategy: DeploymentStrategy,
        min_ready_seconds: i32,
        revision_history_limit: i32,
        progress_deadline_seconds: i32,
        paused: bool,
    }
}

workload_spec! {
    DaemonSetSpec / DaemonSetFields {
        selector: LabelSelector,
        update_strategy: DaemonSetUpdateStrategy,
        min_ready_seconds: i32,
        revision_history_limit: i32,
    }
}

workload_spec! {
    StatefulSetSpec / StatefulSetFields {
        replicas: i32,
        selector: LabelSelector,
        volume_claim_templates: Vec<PersistentVolumeClaim>,
        service_name: String,
        pod_management_policy: String,
        update_strategy: StatefulSetUpdateStrategy,
        revision_history_limit: i32,
        min_ready_seconds: i32,
        persistent_volume_claim_retention_policy: StatefulSetPersistentVolumeClaimRetentionPolicy,
        ordinals: StatefulSetOrdinals,
    }
}

workload_spec! {
    ReplicaSetSpec / ReplicaSetFields {
        replicas: i32,
        min_ready_seconds: i32,
        selector: LabelSelector,
    }
}

workload_spec! {
    JobSpec / JobFields {
        parallelism: i32,
        completions: i32,
        active_deadline_seconds: i64,
        pod_failure_policy: PodFailurePolicy,
        backoff_limit: i32,
        selector: LabelSelector,
        manual_selector: bool,
        ttl_seconds_after_finished: i32,
        completion_mode: String,
        suspend: bool,
    }
}

/// Job template nested in a CronJob
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobTemplateSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ObjectMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<JobSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronJobSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_template: Option<JobTemplateSpec>,
    #[serde(flatten)]
    pub fields: CronJobFields,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronJobFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starting_deadline_seconds: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency_policy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suspend: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub successful_jobs_history_limit: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_jobs_history_limit: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const APPS: &str = r#"
name: platform
namespace: prod
registry: registry.example.com
apps:
  web:
    template:
      name: demo
      version: 1.0.0
    configmaps:
      demo-config:
        data:
          mode: fast
    components:
      worker:
        deployment:
          replicas: 3
          template:
            spec:
              containers:
                - name: worker
                  image: demo:2
        hpa:
          maxReplicas: 5
    dependencies:
      capsules:
        monitoring:
          template:
            name: dashboards
  batch:
    name: nightly
    namespace: jobs
    singleton: true
    template:
      name: etl
    dependencies:
      capsules:
        monitoring:
          template:
            name: dashboards
"#;

    #[test]
    fn test_parse_apps() {
        let apps: AppsSpec = serde_yaml::from_str(APPS).unwrap();
        let web = &apps.apps["web"];

        assert_eq!(web.template.display(), "demo:1.0.0");
        assert_eq!(web.common.config_maps["demo-config"].data["mode"], "fast");

        let worker = &web.components["worker"];
        let deployment = worker.workload.deployment.as_ref().unwrap();
        assert_eq!(deployment.fields.replicas, Some(3));
        let containers = deployment
            .template
            .as_ref()
            .and_then(|t| t.spec.as_ref())
            .and_then(|s| s.containers.as_ref())
            .unwrap();
        assert_eq!(containers[0].image.as_deref(), Some("demo:2"));
        assert_eq!(worker.hpa.as_ref().unwrap().max_replicas, Some(5));
    }

    #[test]
    fn test_normalized_inherits_defaults() {
        let apps: AppsSpec = serde_yaml::from_str(APPS).unwrap();
        let normalized = apps.normalized();

        let web = normalized.iter().find(|a| a.name == "web").unwrap();
        assert_eq!(web.namespace(), Some("prod"));
        assert_eq!(web.registry.as_deref(), Some("registry.example.com"));

        let nightly = normalized.iter().find(|a| a.name == "nightly").unwrap();
        assert_eq!(nightly.namespace(), Some("jobs"));
    }

    #[test]
    fn test_capsule_names() {
        let apps: AppsSpec = serde_yaml::from_str(APPS).unwrap();
        let normalized = apps.normalized();

        let web = normalized.iter().find(|a| a.name == "web").unwrap();
        let capsules = web.capsules();
        assert_eq!(capsules[0].name, "web-monitoring");
        assert_eq!(capsules[0].namespace.as_deref(), Some("prod"));
        assert_eq!(capsules[0].template.display(), "dashboards:latest");

        let nightly = normalized.iter().find(|a| a.name == "nightly").unwrap();
        assert_eq!(nightly.capsules()[0].name, "monitoring");
    }

    #[test]
    fn test_unset_fields_not_serialized() {
        let fields = DeploymentFields {
            replicas: Some(2),
            ..Default::default()
        };
        let value = serde_json::to_value(&fields).unwrap();
        assert_eq!(value, serde_json::json!({ "replicas": 2 }));
    }

    #[test]
    fn test_capsule_as_app() {
        let capsule = CapsuleSpec {
            name: "web-monitoring".to_string(),
            template: TemplateRef::new("dashboards", None),
            components: BTreeMap::from([(
                "grafana".to_string(),
                CapsuleComponentSpec {
                    config_maps: BTreeMap::from([(
                        "dash".to_string(),
                        ConfigMapSpec {
                            data: BTreeMap::from([("a".to_string(), "b".to_string())]),
                        },
                    )]),
                    ..Default::default()
                },
            )]),
            ..Default::default()
        };

        let app = capsule.to_app_spec();
        assert!(app.singleton);
        assert!(app.components["grafana"].common.config_maps.contains_key("dash"));
        assert!(app.components["grafana"].workload.deployment.is_none());
    }
}
