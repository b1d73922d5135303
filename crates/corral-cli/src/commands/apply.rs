//! Apply command - reconcile an apps file against the current cluster

use std::path::Path;
use std::sync::Arc;

use console::style;
use corral_kube::{AppsController, ControllerReport, KubeCluster, Reconciler};

use crate::config::CorralConfig;
use crate::display::print_controller_report;
use crate::error::{CliError, Result};
use crate::util::{handlers, load_apps, open_stores};

/// Build an [`AppsController`] for the live cluster
pub async fn controller(
    config: &CorralConfig,
    stores: &corral_store::CategoryStores,
    concurrency: Option<usize>,
) -> Result<AppsController> {
    let cluster = KubeCluster::try_default().await?;
    let cluster_name = cluster
        .cluster_name(config.controller.cluster_name.as_deref())
        .await;
    match &cluster_name {
        Some(name) => tracing::info!(cluster = %name, "cluster name resolved"),
        None => tracing::warn!("cluster name unknown, containers will not receive it"),
    }

    let (apps, capsules) = handlers(stores, cluster_name.as_deref())?;
    let reconciler = Reconciler::new(Arc::new(cluster));
    Ok(AppsController::new(apps, capsules, reconciler)
        .with_concurrency(concurrency.unwrap_or(config.controller.concurrency)))
}

/// Turn a report with failures into an error
pub fn check(report: &ControllerReport) -> Result<()> {
    if report.is_success() {
        Ok(())
    } else {
        Err(CliError::Reconcile {
            failed: report.failed.len(),
            total: report.failed.len() + report.succeeded.len(),
        })
    }
}

pub async fn run(
    config: &CorralConfig,
    apps_file: &Path,
    concurrency: Option<usize>,
    verbose: bool,
) -> Result<()> {
    let spec = load_apps(apps_file)?;
    let stores = open_stores(config)?;
    let controller = controller(config, &stores, concurrency).await?;

    println!(
        "{} Reconciling {} app(s) of {} ({} at a time)",
        style("→").blue().bold(),
        spec.apps.len(),
        style(&spec.name).cyan(),
        controller.concurrency()
    );

    let report = controller.reconcile(&spec).await;
    print_controller_report(&report, verbose);
    check(&report)
}
