//! In-memory cluster for testing
//!
//! Objects are stored by [`ObjectKey`] with a monotonically increasing
//! resource version. Updates must carry the stored resource version and
//! creates must carry none, like the API server.

use async_trait::async_trait;
use corral_engine::Resource;
use kube::error::ErrorResponse;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::cluster::{Cluster, ObjectKey};
use crate::error::{KubeError, Result};

/// Counts of operations performed for testing assertions
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OperationCounts {
    pub gets: usize,
    pub creates: usize,
    pub updates: usize,
    pub deletes: usize,
}

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<ObjectKey, Resource>,
    counts: OperationCounts,
    next_version: u64,
    /// Names whose updates are refused as invalid
    invalid_updates: HashSet<String>,
    /// Names whose every operation fails
    failing: HashSet<String>,
    /// Namespaces whose every operation fails
    failing_namespaces: HashSet<String>,
    /// Deletions with their grace period, in order
    deletions: Vec<(ObjectKey, Option<u32>)>,
}

/// In-memory [`Cluster`]
#[derive(Debug, Clone, Default)]
pub struct MockCluster {
    state: Arc<Mutex<State>>,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    latency: Option<Duration>,
}

impl MockCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every call for `latency` so concurrent callers overlap
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Refuse updates of objects named `name` as invalid
    pub fn reject_updates(&self, name: &str) {
        self.lock().invalid_updates.insert(name.to_string());
    }

    /// Fail every operation on objects named `name`
    pub fn fail_on(&self, name: &str) {
        self.lock().failing.insert(name.to_string());
    }

    /// Fail every operation in namespace `namespace`
    pub fn fail_namespace(&self, namespace: &str) {
        self.lock().failing_namespaces.insert(namespace.to_string());
    }

    /// Store an object as if it already existed
    pub fn insert(&self, mut resource: Resource) -> Resource {
        let mut state = self.lock();
        state.stamp(&mut resource);
        state.objects.insert(ObjectKey::of(&resource), resource.clone());
        resource
    }

    pub fn object(&self, key: &ObjectKey) -> Option<Resource> {
        self.lock().objects.get(key).cloned()
    }

    pub fn objects(&self) -> Vec<Resource> {
        self.lock().objects.values().cloned().collect()
    }

    /// Get operation counts for assertions
    pub fn operation_counts(&self) -> OperationCounts {
        self.lock().counts.clone()
    }

    /// Reset operation counts
    pub fn reset_counts(&self) {
        self.lock().counts = OperationCounts::default();
    }

    pub fn deletions(&self) -> Vec<(ObjectKey, Option<u32>)> {
        self.lock().deletions.clone()
    }

    /// Highest number of calls that were in progress at once
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn enter(&self) -> InFlight {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(current, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        InFlight(Arc::clone(&self.in_flight))
    }
}

struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl State {
    fn stamp(&mut self, resource: &mut Resource) {
        self.next_version += 1;
        resource.metadata_mut().resource_version = Some(self.next_version.to_string());
    }

    fn check_failing(&self, key: &ObjectKey) -> Result<()> {
        let in_failing_namespace = key
            .namespace
            .as_ref()
            .is_some_and(|ns| self.failing_namespaces.contains(ns));
        if self.failing.contains(&key.name) || in_failing_namespace {
            let error = kube::Error::Api(ErrorResponse {
                status: "Failure".to_string(),
                message: "injected failure".to_string(),
                reason: "InternalError".to_string(),
                code: 500,
            });
            return Err(KubeError::from_api(key.to_string(), error));
        }
        Ok(())
    }
}

#[async_trait]
impl Cluster for MockCluster {
    async fn get(&self, key: &ObjectKey) -> Result<Option<Resource>> {
        let _guard = self.enter().await;
        let mut state = self.lock();
        state.counts.gets += 1;
        state.check_failing(key)?;
        Ok(state.objects.get(key).cloned())
    }

    async fn create(&self, resource: &Resource) -> Result<Resource> {
        let _guard = self.enter().await;
        let key = ObjectKey::of(resource);
        let mut state = self.lock();
        state.counts.creates += 1;
        state.check_failing(&key)?;

        if resource.metadata().resource_version.is_some() {
            return Err(KubeError::Invalid {
                resource: key.to_string(),
                message: "resourceVersion should not be set on objects to be created".to_string(),
            });
        }
        if state.objects.contains_key(&key) {
            return Err(KubeError::Conflict {
                resource: key.to_string(),
                message: "already exists".to_string(),
            });
        }

        let mut created = resource.clone();
        state.stamp(&mut created);
        state.objects.insert(key, created.clone());
        Ok(created)
    }

    async fn update(&self, resource: &Resource) -> Result<Resource> {
        let _guard = self.enter().await;
        let key = ObjectKey::of(resource);
        let mut state = self.lock();
        state.counts.updates += 1;
        state.check_failing(&key)?;

        let Some(live) = state.objects.get(&key) else {
            return Err(KubeError::NotFound {
                resource: key.to_string(),
            });
        };
        if live.metadata().resource_version != resource.metadata().resource_version {
            return Err(KubeError::Conflict {
                resource: key.to_string(),
                message: "the object has been modified".to_string(),
            });
        }
        if state.invalid_updates.contains(&key.name) {
            return Err(KubeError::Invalid {
                resource: key.to_string(),
                message: "field is immutable".to_string(),
            });
        }

        let mut updated = resource.clone();
        state.stamp(&mut updated);
        state.objects.insert(key, updated.clone());
        Ok(updated)
    }

    async fn delete(&self, key: &ObjectKey, grace_period: Option<u32>) -> Result<()> {
        let _guard = self.enter().await;
        let mut state = self.lock();
        state.counts.deletes += 1;
        state.check_failing(key)?;
        state.deletions.push((key.clone(), grace_period));
        state.objects.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corral_engine::ResourceKind;
    use k8s_openapi::api::core::v1::ConfigMap;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn config_map(name: &str) -> Resource {
        Resource::ConfigMap(ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_create_get_update() {
        let cluster = MockCluster::new();
        let created = cluster.create(&config_map("settings")).await.unwrap();
        assert_eq!(created.metadata().resource_version.as_deref(), Some("1"));

        let key = ObjectKey::new(ResourceKind::ConfigMap, Some("default"), "settings");
        let live = cluster.get(&key).await.unwrap().unwrap();
        let updated = cluster.update(&live).await.unwrap();
        assert_eq!(updated.metadata().resource_version.as_deref(), Some("2"));

        // stale version
        assert!(cluster.update(&live).await.unwrap_err().is_conflict());
        // existing object
        assert!(cluster.create(&config_map("settings")).await.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn test_create_refuses_resource_version() {
        let cluster = MockCluster::new();
        let mut resource = config_map("settings");
        resource.metadata_mut().resource_version = Some("7".to_string());
        assert!(cluster.create(&resource).await.unwrap_err().is_invalid());
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let cluster = MockCluster::new();
        let live = cluster.insert(config_map("locked"));

        cluster.reject_updates("locked");
        assert!(cluster.update(&live).await.unwrap_err().is_invalid());

        cluster.fail_on("broken");
        let key = ObjectKey::new(ResourceKind::ConfigMap, Some("default"), "broken");
        assert!(cluster.get(&key).await.is_err());
        assert_eq!(cluster.operation_counts().gets, 1);
    }
}
