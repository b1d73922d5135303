//! Render command - build manifests locally without touching a cluster

use std::io::Write;
use std::path::Path;

use corral_engine::AppManifests;

use crate::config::CorralConfig;
use crate::error::{CliError, Result};
use crate::util::{handlers, load_apps, open_stores};

/// Print the manifests of every app in `apps_file`, or only of `only`.
///
/// Capsules of an app come before the app itself, the order they are applied in.
pub fn run(config: &CorralConfig, apps_file: &Path, only: Option<&str>) -> Result<()> {
    let spec = load_apps(apps_file)?;
    let stores = open_stores(config)?;
    let (apps, capsules) = handlers(&stores, config.controller.cluster_name.as_deref())?;

    let selected: Vec<_> = spec
        .normalized()
        .into_iter()
        .filter(|app| only.is_none_or(|name| app.name == name))
        .collect();

    if let Some(name) = only
        && selected.is_empty()
    {
        return Err(CliError::Spec {
            message: format!("app '{}' not found in {}", name, apps_file.display()),
            help: None,
        });
    }

    let mut stdout = std::io::stdout().lock();
    for app in &selected {
        for capsule in app.capsules() {
            write_manifests(&mut stdout, &capsules.handle_capsule(&capsule)?)?;
        }
        write_manifests(&mut stdout, &apps.handle(app)?)?;
    }
    Ok(())
}

fn write_manifests(out: &mut impl Write, manifests: &AppManifests) -> Result<()> {
    let yaml = manifests.to_yaml().map_err(CliError::other)?;
    out.write_all(yaml.as_bytes())?;
    Ok(())
}
