//! [`Cluster`] backed by a Kubernetes API server
//!
//! Objects go through `DynamicObject` so one code path serves every kind in
//! the kind table; the API resource comes from the kind's group, version and
//! plural instead of discovery.

use async_trait::async_trait;
use corral_engine::{Resource, ResourceKind};
use k8s_openapi::api::core::v1::ConfigMap;
use kube::{
    Client,
    api::{Api, DeleteParams, DynamicObject, PostParams},
    core::GroupVersionKind,
    discovery::ApiResource,
};
use tracing::{debug, warn};

use crate::cluster::{Cluster, ObjectKey};
use crate::error::{KubeError, Result};

/// Environment variable consulted when no cluster name is configured
pub const KUBERNETES_CLUSTER_NAME_ENV: &str = "KUBERNETES_CLUSTER_NAME";

const KUBEADM_NAMESPACE: &str = "kube-system";
const KUBEADM_CONFIG: &str = "kubeadm-config";
const KUBEADM_CLUSTER_CONFIGURATION: &str = "ClusterConfiguration";

/// A live cluster
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    /// Connect using the current kube context or in-cluster configuration
    pub async fn try_default() -> Result<Self> {
        Ok(Self::new(Client::try_default().await?))
    }

    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn api(&self, key: &ObjectKey) -> Api<DynamicObject> {
        let resource = api_resource(key.kind);
        match key.namespace.as_deref() {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &resource),
            None if key.kind.is_namespaced() => {
                Api::default_namespaced_with(self.client.clone(), &resource)
            }
            None => Api::all_with(self.client.clone(), &resource),
        }
    }

    /// Resolve the cluster name.
    ///
    /// Order: the configured value, then [`KUBERNETES_CLUSTER_NAME_ENV`], then
    /// `clusterName` of the kubeadm ClusterConfiguration.
    pub async fn cluster_name(&self, configured: Option<&str>) -> Option<String> {
        if let Some(name) = configured.filter(|n| !n.is_empty()) {
            return Some(name.to_string());
        }
        if let Some(name) = std::env::var(KUBERNETES_CLUSTER_NAME_ENV).ok().filter(|n| !n.is_empty()) {
            return Some(name);
        }

        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), KUBEADM_NAMESPACE);
        match api.get_opt(KUBEADM_CONFIG).await {
            Ok(Some(config)) => config
                .data
                .as_ref()
                .and_then(|data| data.get(KUBEADM_CLUSTER_CONFIGURATION))
                .and_then(|raw| cluster_name_from_kubeadm(raw)),
            Ok(None) => {
                debug!("no kubeadm-config, cluster name unknown");
                None
            }
            Err(e) => {
                warn!(error = %e, "failed to read kubeadm-config");
                None
            }
        }
    }
}

impl std::fmt::Debug for KubeCluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeCluster").finish_non_exhaustive()
    }
}

#[async_trait]
impl Cluster for KubeCluster {
    async fn get(&self, key: &ObjectKey) -> Result<Option<Resource>> {
        let object = self
            .api(key)
            .get_opt(&key.name)
            .await
            .map_err(|e| KubeError::from_api(key.to_string(), e))?;
        object.map(|o| from_dynamic(key.kind, o)).transpose()
    }

    async fn create(&self, resource: &Resource) -> Result<Resource> {
        let key = ObjectKey::of(resource);
        let created = self
            .api(&key)
            .create(&PostParams::default(), &to_dynamic(resource)?)
            .await
            .map_err(|e| KubeError::from_api(key.to_string(), e))?;
        from_dynamic(key.kind, created)
    }

    async fn update(&self, resource: &Resource) -> Result<Resource> {
        let key = ObjectKey::of(resource);
        let updated = self
            .api(&key)
            .replace(&key.name, &PostParams::default(), &to_dynamic(resource)?)
            .await
            .map_err(|e| KubeError::from_api(key.to_string(), e))?;
        from_dynamic(key.kind, updated)
    }

    async fn delete(&self, key: &ObjectKey, grace_period: Option<u32>) -> Result<()> {
        let params = DeleteParams {
            grace_period_seconds: grace_period,
            ..Default::default()
        };
        match self.api(key).delete(&key.name, &params).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(resp)) if resp.code == 404 => Ok(()),
            Err(e) => Err(KubeError::from_api(key.to_string(), e)),
        }
    }
}

/// API resource for a kind from its static type information
pub fn api_resource(kind: ResourceKind) -> ApiResource {
    let gvk = GroupVersionKind::gvk(kind.group(), kind.version(), kind.as_str());
    ApiResource::from_gvk_with_plural(&gvk, kind.plural())
}

fn to_dynamic(resource: &Resource) -> Result<DynamicObject> {
    Ok(serde_json::from_value(resource.to_value()?)?)
}

fn from_dynamic(kind: ResourceKind, object: DynamicObject) -> Result<Resource> {
    Ok(kind.from_value(serde_json::to_value(object)?)?)
}

/// `clusterName` of a kubeadm ClusterConfiguration document
pub fn cluster_name_from_kubeadm(raw: &str) -> Option<String> {
    let config: serde_yaml::Value = serde_yaml::from_str(raw).ok()?;
    config
        .get("clusterName")
        .and_then(serde_yaml::Value::as_str)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}
