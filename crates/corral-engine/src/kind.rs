//! Supported resource kinds and template file recognition
//!
//! Every supported kind is declared once in [`resource_kinds!`]. The macro
//! expands to the [`ResourceKind`] tag, the [`Resource`] value enum and the
//! [`KIND_TABLE`] driving file name recognition and apply policy.

use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::autoscaling::v1::HorizontalPodAutoscaler;
use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::api::core::v1::{ConfigMap, Secret, Service, ServiceAccount};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Serialize, Serializer};
use std::fmt;

use corral_core::CAPSULE_FILE;

/// Whether a kind lives in a namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Namespaced,
    Cluster,
}

/// What the reconciler does when an update is rejected as invalid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidUpdate {
    /// Surface the error
    Fail,
    /// Delete with the given grace period (seconds) and create again
    Recreate { grace_period: Option<u32> },
}

/// One row of the kind table
#[derive(Debug, Clone, Copy)]
pub struct KindSpec {
    pub kind: ResourceKind,
    /// File name suffix pattern, anchored when compiled
    pub pattern: &'static str,
    pub scope: Scope,
    pub on_invalid: InvalidUpdate,
}

macro_rules! resource_kinds {
    ($(
        $variant:ident($ty:ty) {
            pattern: $pattern:literal,
            scope: $scope:ident,
            on_invalid: $on_invalid:expr $(,)?
        }
    )+) => {
        /// Kind tag of a supported resource
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum ResourceKind {
            $($variant,)+
        }

        /// A decoded resource of one of the supported kinds
        #[derive(Debug, Clone, PartialEq)]
        pub enum Resource {
            $($variant($ty),)+
        }

        /// Supported kinds in recognition order
        pub static KIND_TABLE: &[KindSpec] = &[
            $(KindSpec {
                kind: ResourceKind::$variant,
                pattern: $pattern,
                scope: Scope::$scope,
                on_invalid: $on_invalid,
            },)+
        ];

        impl ResourceKind {
            /// Kubernetes `kind` string
            pub fn as_str(self) -> &'static str {
                match self {
                    $(ResourceKind::$variant => <$ty as k8s_openapi::Resource>::KIND,)+
                }
            }

            pub fn api_version(self) -> &'static str {
                match self {
                    $(ResourceKind::$variant => <$ty as k8s_openapi::Resource>::API_VERSION,)+
                }
            }

            /// API group, empty for the core group
            pub fn group(self) -> &'static str {
                match self {
                    $(ResourceKind::$variant => <$ty as k8s_openapi::Resource>::GROUP,)+
                }
            }

            pub fn version(self) -> &'static str {
                match self {
                    $(ResourceKind::$variant => <$ty as k8s_openapi::Resource>::VERSION,)+
                }
            }

            /// Lowercase plural used in API paths
            pub fn plural(self) -> &'static str {
                match self {
                    $(ResourceKind::$variant => <$ty as k8s_openapi::Resource>::URL_PATH_SEGMENT,)+
                }
            }

            /// Decode YAML into this kind
            pub fn decode(self, content: &[u8]) -> Result<Resource, serde_yaml::Error> {
                match self {
                    $(ResourceKind::$variant => {
                        serde_yaml::from_slice::<$ty>(content).map(Resource::$variant)
                    })+
                }
            }

            /// Decode a JSON value into this kind
            pub fn from_value(self, value: serde_json::Value) -> Result<Resource, serde_json::Error> {
                match self {
                    $(ResourceKind::$variant => {
                        serde_json::from_value::<$ty>(value).map(Resource::$variant)
                    })+
                }
            }

            /// Look a kind up by its Kubernetes `kind` string
            pub fn from_kind(kind: &str) -> Option<Self> {
                match kind {
                    $(k if k == <$ty as k8s_openapi::Resource>::KIND => Some(ResourceKind::$variant),)+
                    _ => None,
                }
            }
        }

        impl Resource {
            pub fn kind(&self) -> ResourceKind {
                match self {
                    $(Resource::$variant(_) => ResourceKind::$variant,)+
                }
            }

            pub fn metadata(&self) -> &ObjectMeta {
                match self {
                    $(Resource::$variant(r) => &r.metadata,)+
                }
            }

            pub fn metadata_mut(&mut self) -> &mut ObjectMeta {
                match self {
                    $(Resource::$variant(r) => &mut r.metadata,)+
                }
            }

            pub fn to_value(&self) -> Result<serde_json::Value, serde_json::Error> {
                match self {
                    $(Resource::$variant(r) => serde_json::to_value(r),)+
                }
            }
        }

        impl Serialize for Resource {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                match self {
                    $(Resource::$variant(r) => r.serialize(serializer),)+
                }
            }
        }

        $(
            impl From<$ty> for Resource {
                fn from(resource: $ty) -> Self {
                    Resource::$variant(resource)
                }
            }
        )+
    };
}

resource_kinds! {
    ConfigMap(ConfigMap) {
        pattern: r"([^/]+)[-_](configmap|cm|config)\.ya?ml",
        scope: Namespaced,
        on_invalid: InvalidUpdate::Fail,
    }
    Secret(Secret) {
        pattern: r"([^/]+)[-_]secret\.ya?ml",
        scope: Namespaced,
        on_invalid: InvalidUpdate::Fail,
    }
    ServiceAccount(ServiceAccount) {
        pattern: r"([^/]+)[-_](sa|serviceaccount)\.ya?ml",
        scope: Namespaced,
        on_invalid: InvalidUpdate::Fail,
    }
    ClusterRole(ClusterRole) {
        pattern: r"([^/]+)[-_](cr|clusterrole)\.ya?ml",
        scope: Cluster,
        on_invalid: InvalidUpdate::Fail,
    }
    ClusterRoleBinding(ClusterRoleBinding) {
        pattern: r"([^/]+)[-_](crb|clusterrolebinding)\.ya?ml",
        scope: Cluster,
        on_invalid: InvalidUpdate::Fail,
    }
    Role(Role) {
        pattern: r"([^/]+)[-_]role\.ya?ml",
        scope: Namespaced,
        on_invalid: InvalidUpdate::Fail,
    }
    RoleBinding(RoleBinding) {
        pattern: r"([^/]+)[-_](rb|rolebinding)\.ya?ml",
        scope: Namespaced,
        on_invalid: InvalidUpdate::Fail,
    }
    Ingress(Ingress) {
        pattern: r"([^/]+)[-_]ingress\.ya?ml",
        scope: Namespaced,
        on_invalid: InvalidUpdate::Fail,
    }
    Service(Service) {
        pattern: r"([^/]+)[-_](svc|service)\.ya?ml",
        scope: Namespaced,
        on_invalid: InvalidUpdate::Fail,
    }
    Deployment(Deployment) {
        pattern: r"([^/]+)[-_](dep|deploy|deployment)\.ya?ml",
        scope: Namespaced,
        on_invalid: InvalidUpdate::Recreate { grace_period: None },
    }
    DaemonSet(DaemonSet) {
        pattern: r"([^/]+)[-_](ds|daemonset)\.ya?ml",
        scope: Namespaced,
        on_invalid: InvalidUpdate::Recreate { grace_period: None },
    }
    StatefulSet(StatefulSet) {
        pattern: r"([^/]+)[-_](sts|statefulset)\.ya?ml",
        scope: Namespaced,
        on_invalid: InvalidUpdate::Recreate { grace_period: Some(5) },
    }
    ReplicaSet(ReplicaSet) {
        pattern: r"([^/]+)[-_](rs|replicaset)\.ya?ml",
        scope: Namespaced,
        on_invalid: InvalidUpdate::Recreate { grace_period: None },
    }
    Job(Job) {
        pattern: r"([^/]+)[-_]job\.ya?ml",
        scope: Namespaced,
        on_invalid: InvalidUpdate::Recreate { grace_period: None },
    }
    CronJob(CronJob) {
        pattern: r"([^/]+)[-_]cronjob\.ya?ml",
        scope: Namespaced,
        on_invalid: InvalidUpdate::Recreate { grace_period: None },
    }
    HorizontalPodAutoscaler(HorizontalPodAutoscaler) {
        pattern: r"([^/]+)[-_](hpa|horizontalpodautoscaler)\.ya?ml",
        scope: Namespaced,
        on_invalid: InvalidUpdate::Fail,
    }
}

static PATTERNS: Lazy<Vec<(ResourceKind, Regex)>> = Lazy::new(|| {
    KIND_TABLE
        .iter()
        .map(|spec| {
            let regex = Regex::new(&format!("^{}$", spec.pattern)).expect("valid kind pattern");
            (spec.kind, regex)
        })
        .collect()
});

impl ResourceKind {
    pub fn spec(self) -> &'static KindSpec {
        // the table is generated with one row per variant, in declaration order
        &KIND_TABLE[self as usize]
    }

    pub fn scope(self) -> Scope {
        self.spec().scope
    }

    pub fn is_namespaced(self) -> bool {
        self.scope() == Scope::Namespaced
    }

    pub fn on_invalid(self) -> InvalidUpdate {
        self.spec().on_invalid
    }

    /// Deployment, DaemonSet, StatefulSet, ReplicaSet, Job or CronJob
    pub fn is_workload(self) -> bool {
        matches!(
            self,
            ResourceKind::Deployment
                | ResourceKind::DaemonSet
                | ResourceKind::StatefulSet
                | ResourceKind::ReplicaSet
                | ResourceKind::Job
                | ResourceKind::CronJob
        )
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Resource {
    /// `metadata.name`, empty when unset
    pub fn name(&self) -> &str {
        self.metadata().name.as_deref().unwrap_or_default()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.metadata().namespace.as_deref()
    }

    /// Human readable `Kind/namespace/name`
    pub fn display_name(&self) -> String {
        match self.namespace() {
            Some(ns) if !ns.is_empty() => format!("{}/{}/{}", self.kind(), ns, self.name()),
            _ => format!("{}/{}", self.kind(), self.name()),
        }
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

/// What a template file name was recognized as
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recognized {
    /// A manifest of `kind`; `base` is the part before the kind suffix
    Manifest { kind: ResourceKind, base: String },
    /// A `.capsule` descriptor
    Capsule,
}

/// Recognize a template file by name.
///
/// The first matching row of [`KIND_TABLE`] wins. Unrecognized files are
/// ignored by the builder.
pub fn recognize(filename: &str) -> Option<Recognized> {
    if filename == CAPSULE_FILE {
        return Some(Recognized::Capsule);
    }

    PATTERNS.iter().find_map(|(kind, regex)| {
        regex.captures(filename).map(|caps| Recognized::Manifest {
            kind: *kind,
            base: caps
                .get(1)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
        })
    })
}
