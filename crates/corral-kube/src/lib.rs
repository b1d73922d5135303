//! Corral Kube - Kubernetes integration for corral
//!
//! This crate provides:
//! - **Cluster access**: the [`Cluster`] trait, a live implementation over
//!   kube-rs and an in-memory [`MockCluster`] for tests
//! - **Reconciler**: get, then create or update each resource; workloads
//!   whose update is refused as invalid are deleted and created again
//! - **Controller**: applications of a group reconciled concurrently under a
//!   semaphore, capsule dependencies first, failures isolated per application

pub mod cluster;
pub mod config;
pub mod controller;
pub mod error;
pub mod live;
pub mod mock;
pub mod reconcile;

pub use cluster::{Cluster, ObjectKey};
pub use config::{ControllerConfig, DEFAULT_CONCURRENCY};
pub use controller::{AppsController, ControllerReport};
pub use error::{KubeError, Result};
pub use live::{KUBERNETES_CLUSTER_NAME_ENV, KubeCluster, api_resource, cluster_name_from_kubeadm};
pub use mock::{MockCluster, OperationCounts};
pub use reconcile::{Outcome, ReconcileReport, Reconciler};
