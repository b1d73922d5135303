//! Get-then-create-or-update reconciliation of manifest sets
//!
//! Per resource:
//! 1. get by namespace and name
//! 2. missing: create
//! 3. present: carry the live resource version, keep live owner references
//!    and append desired ones with a new UID, merge labels and annotations with desired values winning, update
//! 4. update refused as invalid on a workload kind: delete (with the kind's
//!    grace period) and create again
//! 5. any other error aborts the manifest set
//!
//! Nothing is rolled back on failure; reconciliation is retried from scratch.

use corral_engine::{AppManifests, InvalidUpdate, Resource};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::cluster::{Cluster, ObjectKey};
use crate::error::Result;

/// What happened to one resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Updated,
    /// Deleted and created again after an invalid update
    Recreated,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Outcome::Created => "created",
            Outcome::Updated => "updated",
            Outcome::Recreated => "recreated",
        })
    }
}

/// Outcomes of one manifest set, in apply order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub resources: Vec<(ObjectKey, Outcome)>,
}

impl ReconcileReport {
    pub fn count(&self, outcome: Outcome) -> usize {
        self.resources.iter().filter(|(_, o)| *o == outcome).count()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn extend(&mut self, other: ReconcileReport) {
        self.resources.extend(other.resources);
    }

    /// Format as human-readable summary
    pub fn summary(&self) -> String {
        let parts: Vec<String> = [Outcome::Created, Outcome::Updated, Outcome::Recreated]
            .into_iter()
            .map(|o| (o, self.count(o)))
            .filter(|(_, n)| *n > 0)
            .map(|(o, n)| format!("{} {}", n, o))
            .collect();
        if parts.is_empty() {
            "No resources processed".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Applies manifest sets to a [`Cluster`]
#[derive(Clone)]
pub struct Reconciler {
    cluster: Arc<dyn Cluster>,
    owner: Option<OwnerReference>,
}

impl Reconciler {
    pub fn new(cluster: Arc<dyn Cluster>) -> Self {
        Self {
            cluster,
            owner: None,
        }
    }

    /// Attach `owner` to every reconciled resource
    pub fn with_owner(mut self, owner: OwnerReference) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Reconcile every resource of `manifests` in apply order.
    ///
    /// Stops at the first error.
    pub async fn reconcile(&self, manifests: &AppManifests) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();
        for resource in manifests.resources() {
            let key = ObjectKey::of(&resource);
            let outcome = self.reconcile_resource(resource).await?;
            debug!(resource = %key, outcome = %outcome, "resource reconciled");
            report.resources.push((key, outcome));
        }

        info!(
            template = %manifests.name,
            version = %manifests.version,
            summary = %report.summary(),
            "manifests reconciled"
        );
        Ok(report)
    }

    /// Reconcile one resource
    pub async fn reconcile_resource(&self, mut desired: Resource) -> Result<Outcome> {
        if let Some(owner) = &self.owner {
            merge_owner_references(desired.metadata_mut(), std::slice::from_ref(owner));
        }

        let key = ObjectKey::of(&desired);
        let Some(live) = self.cluster.get(&key).await? else {
            self.cluster.create(&desired).await?;
            return Ok(Outcome::Created);
        };

        merge_live_metadata(desired.metadata_mut(), live.metadata());
        match self.cluster.update(&desired).await {
            Ok(_) => Ok(Outcome::Updated),
            Err(e) if e.is_invalid() => match key.kind.on_invalid() {
                InvalidUpdate::Recreate { grace_period } => {
                    debug!(resource = %key, error = %e, "update refused, recreating");
                    desired.metadata_mut().resource_version = None;
                    self.cluster.delete(&key, grace_period).await?;
                    self.cluster.create(&desired).await?;
                    Ok(Outcome::Recreated)
                }
                InvalidUpdate::Fail => Err(e),
            },
            Err(e) => Err(e),
        }
    }
}

impl fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler")
            .field("owner", &self.owner.as_ref().map(|o| &o.name))
            .finish_non_exhaustive()
    }
}

/// Prepare desired metadata for an update of `live`
fn merge_live_metadata(desired: &mut ObjectMeta, live: &ObjectMeta) {
    desired.resource_version = live.resource_version.clone();
    let wanted = desired.owner_references.take().unwrap_or_default();
    desired.owner_references = live.owner_references.clone();
    merge_owner_references(desired, &wanted);
    desired.labels = merge_maps(live.labels.as_ref(), desired.labels.take());
    desired.annotations = merge_maps(live.annotations.as_ref(), desired.annotations.take());
}

/// Add `owners` whose UID is not referenced yet
fn merge_owner_references(meta: &mut ObjectMeta, owners: &[OwnerReference]) {
    if owners.is_empty() {
        return;
    }
    let references = meta.owner_references.get_or_insert_with(Vec::new);
    for owner in owners {
        if !references.iter().any(|r| r.uid == owner.uid) {
            references.push(owner.clone());
        }
    }
}

/// Live entries overlaid by desired ones
fn merge_maps(
    live: Option<&BTreeMap<String, String>>,
    desired: Option<BTreeMap<String, String>>,
) -> Option<BTreeMap<String, String>> {
    match (live, desired) {
        (None, desired) => desired,
        (Some(live), None) => Some(live.clone()),
        (Some(live), Some(desired)) => {
            let mut merged = live.clone();
            merged.extend(desired);
            Some(merged)
        }
    }
}
