//! ZIP extraction for source bundles.
//!
//! Entries are validated before they are written so that no entry can land
//! outside the destination directory (zip-slip).

use log::debug;
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path};

/// Trait for extracting source bundles, enabling test mocking.
#[cfg_attr(test, mockall::automock)]
pub trait ArchiveExtractor {
    /// Extract the archive at `archive_path` into `dest_dir`.
    ///
    /// Returns the number of files written.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::PathTraversal`] if any entry attempts to
    /// escape the destination directory, [`ExtractionError::EmptyArchive`] if
    /// the archive holds no files, and [`ExtractionError::Zip`] if it is not a
    /// readable ZIP archive.
    fn extract(&self, archive_path: &Path, dest_dir: &Path) -> Result<usize, ExtractionError>;
}

/// Errors arising from bundle extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// I/O error during extraction.
    #[error("extraction I/O error")]
    Io(#[from] io::Error),

    /// The archive is malformed.
    #[error("invalid ZIP archive")]
    Zip(#[from] zip::result::ZipError),

    /// A path in the archive attempts to traverse outside the destination.
    #[error("path traversal detected: {path}")]
    PathTraversal {
        /// The offending entry name.
        path: String,
    },

    /// The archive contains no files.
    #[error("source bundle contains no files")]
    EmptyArchive,
}

/// Extractor for ZIP bundles.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipExtractor;

impl ArchiveExtractor for ZipExtractor {
    fn extract(&self, archive_path: &Path, dest_dir: &Path) -> Result<usize, ExtractionError> {
        let mut archive = zip::ZipArchive::new(File::open(archive_path)?)?;
        let mut written = 0;

        for index in 0..archive.len() {
            let mut entry = archive.by_index(index)?;
            let name = entry.name().to_owned();
            validate_entry_path(Path::new(&name))?;
            let Some(relative) = entry.enclosed_name() else {
                return Err(ExtractionError::PathTraversal { path: name });
            };

            let dest_path = dest_dir.join(relative);
            if entry.is_dir() {
                fs::create_dir_all(&dest_path)?;
                continue;
            }
            if let Some(parent) = dest_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = File::create(&dest_path)?;
            io::copy(&mut entry, &mut out)?;
            written += 1;
        }

        if written == 0 {
            return Err(ExtractionError::EmptyArchive);
        }
        debug!("extracted {written} files into {}", dest_dir.display());
        Ok(written)
    }
}

/// Validate that an entry name does not escape the destination directory
/// via `..` components or absolute paths.
fn validate_entry_path(path: &Path) -> Result<(), ExtractionError> {
    let escapes = path.components().any(|component| {
        matches!(
            component,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if escapes {
        return Err(ExtractionError::PathTraversal {
            path: path.display().to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).expect("create archive");
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        for (name, body) in entries {
            if name.ends_with('/') {
                writer.add_directory(*name, options).expect("add dir");
            } else {
                writer.start_file(*name, options).expect("start file");
                writer.write_all(body).expect("write entry");
            }
        }
        writer.finish().expect("finish archive");
    }

    #[test]
    fn extracts_nested_entries() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let archive = temp_dir.path().join("source.zip");
        let dest = temp_dir.path().join("out");
        write_zip(
            &archive,
            &[
                ("config.toml", b"title = 'x'"),
                ("content/", b""),
                ("content/posts/hello.md", b"# hello"),
            ],
        );

        let written = ZipExtractor.extract(&archive, &dest).expect("extracts");

        assert_eq!(written, 2);
        let body = fs::read_to_string(dest.join("content/posts/hello.md")).expect("read");
        assert_eq!(body, "# hello");
    }

    #[test]
    fn archive_with_only_directories_is_empty() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let archive = temp_dir.path().join("source.zip");
        write_zip(&archive, &[("content/", b"")]);

        let err = ZipExtractor
            .extract(&archive, &temp_dir.path().join("out"))
            .expect_err("empty archive");
        assert!(matches!(err, ExtractionError::EmptyArchive));
    }

    #[test]
    fn traversal_entry_is_rejected_before_writing() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let archive = temp_dir.path().join("source.zip");
        let dest = temp_dir.path().join("out");
        write_zip(&archive, &[("../escape.txt", b"nope")]);

        let err = ZipExtractor.extract(&archive, &dest).expect_err("traversal");
        assert!(matches!(err, ExtractionError::PathTraversal { .. }));
        assert!(!temp_dir.path().join("escape.txt").exists());
    }

    #[test]
    fn non_zip_input_is_malformed() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let archive = temp_dir.path().join("source.zip");
        fs::write(&archive, b"definitely not a zip").expect("write");

        let err = ZipExtractor
            .extract(&archive, &temp_dir.path().join("out"))
            .expect_err("malformed");
        assert!(matches!(err, ExtractionError::Zip(_)));
    }

    #[rstest]
    #[case::parent("../etc/passwd")]
    #[case::nested_parent("foo/../../etc/passwd")]
    #[case::absolute("/etc/passwd")]
    fn validate_rejects_escaping_paths(#[case] path: &str) {
        assert!(matches!(
            validate_entry_path(Path::new(path)),
            Err(ExtractionError::PathTraversal { .. })
        ));
    }

    #[rstest]
    #[case::simple("index.md")]
    #[case::nested("content/posts/a.md")]
    #[case::current_dir("./static/logo.png")]
    fn validate_accepts_contained_paths(#[case] path: &str) {
        assert!(validate_entry_path(Path::new(path)).is_ok());
    }
}
