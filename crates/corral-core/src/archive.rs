//! Archive creation and extraction for template packages
//!
//! Packages are either zip files or gzip-compressed tarballs (`.tgz`/`.tar.gz`).

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};
use tar::{Archive, Builder, Header};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::error::{CoreError, Result};
use crate::package::ArchiveFormat;

/// Extract a package archive into a destination directory
pub fn extract_archive(archive_path: &Path, format: ArchiveFormat, dest: &Path) -> Result<()> {
    std::fs::create_dir_all(dest)?;
    let file = File::open(archive_path)?;

    match format {
        ArchiveFormat::TarGz => {
            let decoder = GzDecoder::new(file);
            let mut archive = Archive::new(decoder);
            archive.unpack(dest).map_err(|e| archive_error(archive_path, e))?;
        }
        ArchiveFormat::Zip => {
            let mut archive = ZipArchive::new(file).map_err(|e| archive_error(archive_path, e))?;
            archive.extract(dest).map_err(|e| archive_error(archive_path, e))?;
        }
    }

    Ok(())
}

/// Create a package archive from in-memory entries
///
/// Entries are `(relative path, content)` pairs; parent directories are implied.
pub fn create_archive(
    entries: &[(&str, &[u8])],
    format: ArchiveFormat,
    output: &Path,
) -> Result<PathBuf> {
    let file = File::create(output)?;

    match format {
        ArchiveFormat::TarGz => {
            let encoder = GzEncoder::new(file, Compression::default());
            let mut builder = Builder::new(encoder);
            for (path, content) in entries {
                add_bytes_to_tar(&mut builder, path, content)?;
            }
            let encoder = builder.into_inner()?;
            encoder.finish()?;
        }
        ArchiveFormat::Zip => {
            let mut writer = ZipWriter::new(file);
            for (path, content) in entries {
                add_bytes_to_zip(&mut writer, path, content)?;
            }
            writer.finish().map_err(|e| archive_error(output, e))?;
        }
    }

    Ok(output.to_path_buf())
}

/// Package every file below `dir` into an archive, rooted at `root_name`
pub fn create_archive_from_dir(
    dir: &Path,
    root_name: &str,
    format: ArchiveFormat,
    output: &Path,
) -> Result<PathBuf> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| CoreError::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel_path = entry
            .path()
            .strip_prefix(dir)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");
        let content = std::fs::read(entry.path())?;
        files.push((format!("{}/{}", root_name, rel_path), content));
    }

    let entries: Vec<(&str, &[u8])> = files
        .iter()
        .map(|(path, content)| (path.as_str(), content.as_slice()))
        .collect();
    create_archive(&entries, format, output)
}

fn add_bytes_to_tar<W: Write>(builder: &mut Builder<W>, archive_path: &str, content: &[u8]) -> Result<()> {
    let mut header = Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(0);
    header.set_cksum();

    builder.append_data(&mut header, archive_path, content)?;

    Ok(())
}

fn add_bytes_to_zip<W: Write + Seek>(writer: &mut ZipWriter<W>, archive_path: &str, content: &[u8]) -> Result<()> {
    let options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .unix_permissions(0o644);
    writer
        .start_file(archive_path, options)
        .map_err(|e| CoreError::Archive {
            path: archive_path.to_string(),
            message: e.to_string(),
        })?;
    writer.write_all(content)?;
    Ok(())
}

fn archive_error(path: &Path, err: impl std::fmt::Display) -> CoreError {
    CoreError::Archive {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_entries() -> Vec<(&'static str, &'static [u8])> {
        vec![
            ("demo/demo_cm.yaml", b"kind: ConfigMap\n".as_slice()),
            ("demo/worker/worker_deploy.yaml", b"kind: Deployment\n".as_slice()),
        ]
    }

    #[test]
    fn test_tar_gz_round_trip() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("demo_v1.0.0.tgz");
        create_archive(&sample_entries(), ArchiveFormat::TarGz, &archive).unwrap();

        let dest = temp.path().join("out");
        extract_archive(&archive, ArchiveFormat::TarGz, &dest).unwrap();

        assert!(dest.join("demo/demo_cm.yaml").exists());
        assert_eq!(
            std::fs::read_to_string(dest.join("demo/worker/worker_deploy.yaml")).unwrap(),
            "kind: Deployment\n"
        );
    }

    #[test]
    fn test_zip_round_trip() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("demo_v1.0.0.zip");
        create_archive(&sample_entries(), ArchiveFormat::Zip, &archive).unwrap();

        let dest = temp.path().join("out");
        extract_archive(&archive, ArchiveFormat::Zip, &dest).unwrap();

        assert!(dest.join("demo/worker/worker_deploy.yaml").exists());
    }

    #[test]
    fn test_corrupt_archive_fails() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("broken_v1.0.0.zip");
        std::fs::write(&archive, b"definitely not a zip").unwrap();

        let result = extract_archive(&archive, ArchiveFormat::Zip, &temp.path().join("out"));
        assert!(matches!(result, Err(CoreError::Archive { .. })));
    }

    #[test]
    fn test_create_from_dir() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        std::fs::create_dir_all(src.join("worker")).unwrap();
        std::fs::write(src.join("demo_cm.yaml"), "a: b\n").unwrap();
        std::fs::write(src.join("worker/worker_deploy.yaml"), "c: d\n").unwrap();

        let archive = temp.path().join("demo_v1.0.0.tar.gz");
        create_archive_from_dir(&src, "demo_v1.0.0", ArchiveFormat::TarGz, &archive).unwrap();

        let dest = temp.path().join("out");
        extract_archive(&archive, ArchiveFormat::TarGz, &dest).unwrap();
        assert!(dest.join("demo_v1.0.0/worker/worker_deploy.yaml").exists());
    }
}
