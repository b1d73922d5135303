//! Cluster access used by the reconciler

use async_trait::async_trait;
use corral_engine::{Resource, ResourceKind};
use std::fmt;

use crate::error::Result;

/// Identity of an object in the cluster
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub kind: ResourceKind,
    /// `None` for cluster-scoped kinds
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    pub fn new(kind: ResourceKind, namespace: Option<&str>, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: namespace
                .filter(|ns| kind.is_namespaced() && !ns.is_empty())
                .map(str::to_string),
            name: name.into(),
        }
    }

    pub fn of(resource: &Resource) -> Self {
        Self::new(resource.kind(), resource.namespace(), resource.name())
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}/{}", self.kind, ns, self.name),
            None => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}

/// Get/create/update/delete on typed resources
///
/// Implementations must be Send + Sync for use across async tasks.
/// Errors are classified: an update refused because of an immutable field
/// must surface as [`KubeError::Invalid`](crate::KubeError::Invalid).
#[async_trait]
pub trait Cluster: Send + Sync {
    /// Fetch an object, `None` when it does not exist
    async fn get(&self, key: &ObjectKey) -> Result<Option<Resource>>;

    /// Create an object; its resource version must be unset
    async fn create(&self, resource: &Resource) -> Result<Resource>;

    /// Replace an object carrying the live resource version
    async fn update(&self, resource: &Resource) -> Result<Resource>;

    /// Delete an object; an absent object is not an error
    async fn delete(&self, key: &ObjectKey, grace_period: Option<u32>) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::rbac::v1::ClusterRole;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    #[test]
    fn test_cluster_scoped_key_drops_namespace() {
        let role = Resource::ClusterRole(ClusterRole {
            metadata: ObjectMeta {
                name: Some("reader".to_string()),
                namespace: Some("prod".to_string()),
                ..Default::default()
            },
            ..Default::default()
        });

        let key = ObjectKey::of(&role);
        assert_eq!(key.namespace, None);
        assert_eq!(key.to_string(), "ClusterRole/reader");
    }

    #[test]
    fn test_namespaced_key() {
        let key = ObjectKey::new(ResourceKind::Deployment, Some("prod"), "web");
        assert_eq!(key.to_string(), "Deployment/prod/web");
        assert_eq!(
            ObjectKey::new(ResourceKind::Deployment, Some(""), "web").namespace,
            None
        );
    }
}
