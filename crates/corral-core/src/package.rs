//! Package file names
//!
//! A template package is named `<name>_v<version>[-(alpha|beta)].<ext>` where
//! `<ext>` is one of `zip`, `tgz` or `tar.gz`.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::path::Path;

use crate::error::{CoreError, Result};

static STEM_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([a-zA-Z0-9-]+)_v([0-9.]+)(?:-(alpha|beta))?$").expect("valid package pattern")
});

/// Archive container format, derived from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
    Zip,
    TarGz,
}

impl ArchiveFormat {
    /// Detect the format and split off the extension.
    ///
    /// `.zip` is matched case-insensitively, the gzip variants are not.
    pub fn split(file_name: &str) -> Option<(&str, ArchiveFormat)> {
        let lower = file_name.to_ascii_lowercase();
        if lower.ends_with(".zip") {
            return Some((&file_name[..file_name.len() - 4], ArchiveFormat::Zip));
        }
        if let Some(stem) = file_name.strip_suffix(".tar.gz") {
            return Some((stem, ArchiveFormat::TarGz));
        }
        if let Some(stem) = file_name.strip_suffix(".tgz") {
            return Some((stem, ArchiveFormat::TarGz));
        }
        None
    }
}

/// Pre-release stage suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Alpha,
    Beta,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Alpha => f.write_str("alpha"),
            Stage::Beta => f.write_str("beta"),
        }
    }
}

/// Parsed package file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageName {
    /// Template name
    pub name: String,
    /// Version without the leading `v`, stage suffix included
    pub version: String,
    pub stage: Option<Stage>,
    pub format: ArchiveFormat,
    /// File name without extension, e.g. `demo_v1.0.0`
    pub stem: String,
}

impl PackageName {
    /// Parse a package file name (not a full path)
    pub fn parse(file_name: &str) -> Result<Self> {
        let (stem, format) =
            ArchiveFormat::split(file_name).ok_or_else(|| CoreError::UnsupportedFormat {
                path: file_name.to_string(),
            })?;

        let caps = STEM_PATTERN
            .captures(stem)
            .ok_or_else(|| CoreError::InvalidPackageName {
                file: file_name.to_string(),
            })?;

        let stage = match caps.get(3).map(|m| m.as_str()) {
            Some("alpha") => Some(Stage::Alpha),
            Some("beta") => Some(Stage::Beta),
            _ => None,
        };
        let mut version = caps[2].to_string();
        if let Some(stage) = stage {
            version = format!("{}-{}", version, stage);
        }

        Ok(Self {
            name: caps[1].to_string(),
            version,
            stage,
            format,
            stem: stem.to_string(),
        })
    }

    /// Parse the file name component of a path
    pub fn from_path(path: &Path) -> Result<Self> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| CoreError::InvalidPackageName {
                file: path.display().to_string(),
            })?;
        Self::parse(&file_name)
    }

    /// Store key `<name>_<version>`
    pub fn key(&self) -> String {
        template_key(&self.name, &self.version)
    }
}

/// Whether a path looks like a template package (by extension only)
pub fn is_package_path(path: &Path) -> bool {
    path.file_name()
        .map(|n| ArchiveFormat::split(&n.to_string_lossy()).is_some())
        .unwrap_or(false)
}

/// Build the store key for a template, ignoring a leading `v` on the version
pub fn template_key(name: &str, version: &str) -> String {
    format!("{}_{}", name, normalize_version(version))
}

/// Strip a leading `v`/`V` from a version string
pub fn normalize_version(version: &str) -> &str {
    version
        .strip_prefix('v')
        .or_else(|| version.strip_prefix('V'))
        .unwrap_or(version)
}
