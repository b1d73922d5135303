//! Template package loader
//!
//! Unpacks a package into a scratch directory, locates the template root and
//! splits its content into app-level files and per-workload file groups.

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::archive::extract_archive;
use crate::error::{CoreError, Result};
use crate::package::PackageName;
use crate::template::{AppTemplate, TemplateBase, TemplateFile};

/// Load a template package from disk
///
/// Fails on a malformed name, a corrupt archive or an unreadable entry.
/// Zero-length files are skipped.
pub fn load_template(path: &Path) -> Result<AppTemplate> {
    let package = PackageName::from_path(path)?;

    let scratch = TempDir::with_prefix("template-")?;
    extract_archive(path, package.format, scratch.path()).inspect_err(|e| {
        warn!(path = %path.display(), error = %e, "failed to unpack template package");
    })?;

    let root = locate_root(scratch.path(), &package)?;
    debug!(
        path = %path.display(),
        root = %root.display(),
        "unpacked template package"
    );

    load_from_dir(&root, &package.name, &package.version)
}

/// Build an [`AppTemplate`] from an already unpacked template root
pub fn load_from_dir(root: &Path, name: &str, version: &str) -> Result<AppTemplate> {
    let mut template = AppTemplate::new(name, version);

    for entry in WalkDir::new(root).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| CoreError::Io(e.into()))?;
        let file_name = entry.file_name().to_string_lossy().to_string();

        if entry.file_type().is_dir() {
            let workload = load_workload(entry.path(), &file_name, version)?;
            template.workloads.insert(file_name, workload);
        } else if let Some(file) = read_template_file(entry.path(), &file_name)? {
            template.base.files.push(file);
        }
    }

    Ok(template)
}

fn load_workload(dir: &Path, name: &str, version: &str) -> Result<TemplateBase> {
    let mut workload = TemplateBase::new(name, version);

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| CoreError::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().to_string();
        if let Some(file) = read_template_file(entry.path(), &file_name)? {
            workload.files.push(file);
        }
    }

    Ok(workload)
}

fn read_template_file(path: &Path, file_name: &str) -> Result<Option<TemplateFile>> {
    let content = std::fs::read(path)?;
    if content.is_empty() {
        return Ok(None);
    }
    Ok(Some(TemplateFile::new(file_name, content)))
}

/// Pick the template root inside an unpacked package.
///
/// A directory named like the package stem, `<name>_<version>` or `<name>` is
/// used when it is the only top-level entry; otherwise the archive root is.
fn locate_root(unpacked: &Path, package: &PackageName) -> Result<PathBuf> {
    let candidates = [
        package.stem.clone(),
        package.key(),
        package.name.clone(),
    ];
    for candidate in candidates {
        if has_only_sub_directory(unpacked, &candidate)? {
            return Ok(unpacked.join(candidate));
        }
    }
    Ok(unpacked.to_path_buf())
}

/// True only when `parent` holds exactly one entry, a directory called `name`
pub fn has_only_sub_directory(parent: &Path, name: &str) -> Result<bool> {
    let mut entries = std::fs::read_dir(parent)?;
    let Some(first) = entries.next() else {
        return Ok(false);
    };
    if entries.next().is_some() {
        return Ok(false);
    }
    let first = first?;
    Ok(first.file_type()?.is_dir() && first.file_name().to_string_lossy() == name)
}
