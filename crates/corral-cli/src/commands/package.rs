//! Package command - build a template archive from a directory

use std::path::Path;

use console::style;
use corral_core::archive::create_archive_from_dir;
use corral_core::{ArchiveFormat, PackageName, load_template};

use crate::error::{CliError, Result};
use crate::util::format_size;

/// Archive file name for a template, e.g. `demo_v1.0.0.tgz`
pub fn archive_name(name: &str, version: &str, format: ArchiveFormat) -> String {
    let version = corral_core::package::normalize_version(version);
    let ext = match format {
        ArchiveFormat::Zip => "zip",
        ArchiveFormat::TarGz => "tgz",
    };
    format!("{}_v{}.{}", name, version, ext)
}

pub fn run(
    dir: &Path,
    name: &str,
    version: &str,
    format: ArchiveFormat,
    output: Option<&Path>,
) -> Result<()> {
    if !dir.is_dir() {
        return Err(CliError::Io {
            message: format!("{} is not a directory", dir.display()),
        });
    }

    let file_name = archive_name(name, version, format);
    let package = PackageName::parse(&file_name).map_err(|e| CliError::Template {
        message: e.to_string(),
        help: Some("Names use [a-zA-Z0-9-]; versions look like 1.2.3 or 1.2.3-beta".to_string()),
    })?;

    let output_dir = output.unwrap_or(Path::new("."));
    std::fs::create_dir_all(output_dir)?;
    let output_path = output_dir.join(&file_name);

    println!(
        "{} {} v{}",
        style("Packaging").cyan().bold(),
        package.name,
        package.version
    );

    create_archive_from_dir(dir, &package.stem, format, &output_path)?;

    // Load it back so a broken layout fails here and not in the store
    let template = load_template(&output_path)?;
    let size = std::fs::metadata(&output_path)?.len();

    println!("  {} {}", style("Created").green().bold(), output_path.display());
    println!("  {} {}", style("Size").dim(), format_size(size));
    println!(
        "  {} {} app file(s), {} component(s)",
        style("Contents").dim(),
        template.base.files.len(),
        template.workloads.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archive_name() {
        assert_eq!(archive_name("demo", "1.0.0", ArchiveFormat::TarGz), "demo_v1.0.0.tgz");
        assert_eq!(archive_name("demo", "v2.1.0-beta", ArchiveFormat::Zip), "demo_v2.1.0-beta.zip");
    }

    #[test]
    fn test_package_round_trips_through_loader() {
        let temp = tempfile::TempDir::new().unwrap();
        let src = temp.path().join("src");
        std::fs::create_dir_all(src.join("worker")).unwrap();
        std::fs::write(src.join("demo_cm.yaml"), "kind: ConfigMap\n").unwrap();
        std::fs::write(src.join("worker").join("worker_deploy.yaml"), "kind: Deployment\n").unwrap();

        let out = temp.path().join("out");
        run(&src, "demo", "1.0.0", ArchiveFormat::TarGz, Some(&out)).unwrap();

        let template = load_template(&out.join("demo_v1.0.0.tgz")).unwrap();
        assert_eq!(template.version(), "1.0.0");
        assert!(template.base.file("demo_cm.yaml").is_some());
        assert!(template.workloads.contains_key("worker"));
    }

    #[test]
    fn test_invalid_name_is_a_template_error() {
        let temp = tempfile::TempDir::new().unwrap();
        let err = run(temp.path(), "bad_name", "1.0.0", ArchiveFormat::Zip, Some(temp.path()))
            .unwrap_err();
        assert!(matches!(err, CliError::Template { .. }));
    }
}
