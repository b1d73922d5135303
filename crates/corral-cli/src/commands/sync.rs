//! Sync command - mirror the remote template index once

use console::style;
use corral_store::{CategoryStores, Synchronizer};

use crate::config::CorralConfig;
use crate::display::print_sync_report;
use crate::error::{CliError, Result};

/// Synchronizer for the configured address, a config error when there is none
pub fn synchronizer(config: &CorralConfig, stores: &CategoryStores) -> Result<Synchronizer> {
    if config.store.sync.address.trim().is_empty() {
        return Err(CliError::config_with_help(
            "no template sync address configured",
            "Set store.sync.address in the config file",
        ));
    }
    Ok(Synchronizer::new(&config.store.sync, stores.root())?)
}

pub async fn run(config: &CorralConfig) -> Result<()> {
    let stores = CategoryStores::new(&config.store)?;
    let synchronizer = synchronizer(config, &stores)?;

    println!(
        "{} Syncing templates from {}",
        style("→").blue().bold(),
        style(&config.store.sync.address).cyan()
    );
    let report = synchronizer.sync_once().await?;
    print_sync_report(&report);

    if report.is_clean() {
        Ok(())
    } else {
        Err(CliError::other(format!(
            "{} template(s) failed to sync",
            report.failed.len()
        )))
    }
}
