//! Bounded-concurrency reconciliation of application groups
//!
//! Each application of an [`AppsSpec`] runs as its own task; a semaphore caps
//! how many run at once. A failing application is logged and reported, its
//! siblings carry on.

use corral_engine::{AppHandler, AppSpec, AppsSpec};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::config::DEFAULT_CONCURRENCY;
use crate::error::{KubeError, Result};
use crate::reconcile::{ReconcileReport, Reconciler};

/// Result of one [`AppsController::reconcile`] call
#[derive(Debug, Clone, Default)]
pub struct ControllerReport {
    /// Reconciled applications, sorted by name
    pub succeeded: Vec<(String, ReconcileReport)>,
    /// Failed applications with their error, sorted by name
    pub failed: Vec<(String, String)>,
}

impl ControllerReport {
    /// Check if all applications succeeded
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Format as human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "{} app(s) reconciled, {} failed",
            self.succeeded.len(),
            self.failed.len()
        )
    }
}

/// Reconciles every application of an [`AppsSpec`]
#[derive(Debug, Clone)]
pub struct AppsController {
    apps: AppHandler,
    capsules: AppHandler,
    reconciler: Reconciler,
    concurrency: usize,
}

impl AppsController {
    /// `apps` resolves application templates, `capsules` capsule templates
    pub fn new(apps: AppHandler, capsules: AppHandler, reconciler: Reconciler) -> Self {
        Self {
            apps,
            capsules,
            reconciler,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Cap on concurrently reconciled applications, at least one
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Reconcile every application and wait for all of them.
    ///
    /// Never fails as a whole; per-application errors are in the report.
    pub async fn reconcile(&self, spec: &AppsSpec) -> ControllerReport {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for app in spec.normalized() {
            let semaphore = Arc::clone(&semaphore);
            let controller = self.clone();
            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (app.name, Err(KubeError::Cancelled));
                };
                let result = controller.reconcile_app(&app).await;
                (app.name, result)
            });
        }

        let mut report = ControllerReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, Ok(applied))) => report.succeeded.push((name, applied)),
                Ok((name, Err(e))) => {
                    error!(app = %name, error = %e, "app reconciliation failed");
                    report.failed.push((name, e.to_string()));
                }
                Err(e) => {
                    error!(error = %e, "app reconciliation task failed");
                    report.failed.push((String::new(), KubeError::from(e).to_string()));
                }
            }
        }

        report.succeeded.sort_by(|a, b| a.0.cmp(&b.0));
        report.failed.sort_by(|a, b| a.0.cmp(&b.0));
        info!(group = %spec.name, summary = %report.summary(), "apps reconciled");
        report
    }

    /// Reconcile one application: its capsules first, then its own manifests
    pub async fn reconcile_app(&self, app: &AppSpec) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();

        for capsule in app.capsules() {
            let manifests = self.capsules.handle_capsule(&capsule)?;
            debug!(app = %app.name, capsule = %capsule.name, "reconciling capsule");
            report.extend(self.reconciler.reconcile(&manifests).await?);
        }

        let manifests = self.apps.handle(app)?;
        report.extend(self.reconciler.reconcile(&manifests).await?);

        info!(app = %app.name, summary = %report.summary(), "app reconciled");
        Ok(report)
    }
}
