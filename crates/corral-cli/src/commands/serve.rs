//! Serve command - keep templates and cluster in sync until interrupted

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use console::style;
use corral_kube::AppsController;
use corral_store::{TemplateWatcher, first_finished};
use tracing::{error, info, warn};

use crate::commands::apply::controller;
use crate::commands::sync::synchronizer;
use crate::config::CorralConfig;
use crate::display::print_controller_report;
use crate::error::{CliError, Result};
use crate::util::{load_apps, open_stores};

/// Reconcile `apps_file` every `interval`.
///
/// Template watching and remote sync run alongside when enabled in the
/// config. The apps file is re-read each pass; a pass that cannot read it is
/// skipped. A template watcher that stops ends the command with an error.
pub async fn run(
    config: &CorralConfig,
    apps_file: &Path,
    interval: Duration,
    concurrency: Option<usize>,
) -> Result<()> {
    // Fail fast on an unreadable apps file before anything starts
    load_apps(apps_file)?;

    let stores = open_stores(config)?;
    let mut watchers = if config.store.watch {
        stores.watch_all()?
    } else {
        Vec::new()
    };

    let sync_task = if config.store.sync.enabled {
        let synchronizer = Arc::new(synchronizer(config, &stores)?);
        let every = config.store.sync.interval;
        Some(tokio::spawn(async move { synchronizer.run(every).await }))
    } else {
        None
    };

    let controller = controller(config, &stores, concurrency).await?;
    println!(
        "{} Serving {} every {}s (ctrl-c to stop)",
        style("→").blue().bold(),
        apps_file.display(),
        interval.as_secs()
    );

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        info!("interrupted, shutting down");
    };
    let result = serve_loop(&controller, apps_file, interval, &mut watchers, shutdown).await;

    if let Some(task) = sync_task {
        task.abort();
    }
    result
}

/// Reconcile on every tick until `shutdown` resolves or a watcher stops
pub async fn serve_loop(
    controller: &AppsController,
    apps_file: &Path,
    interval: Duration,
    watchers: &mut [TemplateWatcher],
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    tokio::pin!(shutdown);
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match load_apps(apps_file) {
                    Ok(spec) => {
                        let report = controller.reconcile(&spec).await;
                        print_controller_report(&report, false);
                    }
                    Err(e) => warn!(error = %e, "skipping pass, apps file unreadable"),
                }
            }
            stopped = first_finished(watchers) => {
                let reason = match stopped {
                    Ok(()) => "event stream closed".to_string(),
                    Err(e) => e.to_string(),
                };
                error!(reason = %reason, "template watcher stopped");
                return Err(CliError::other(format!("template watcher stopped: {}", reason)));
            }
            _ = &mut shutdown => return Ok(()),
        }
    }
}
