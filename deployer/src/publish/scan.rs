//! Output tree scanning.

use camino::{Utf8Path, Utf8PathBuf};
use publish_policy::RenderedAsset;
use std::path::PathBuf;
use walkdir::WalkDir;

/// Errors arising while walking the rendered output.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// A directory entry could not be read.
    #[error("failed to walk output tree {root}")]
    Walk {
        /// The tree being walked.
        root: Utf8PathBuf,
        /// The underlying walk failure.
        #[source]
        source: walkdir::Error,
    },

    /// A rendered file's path is not valid UTF-8 and cannot become an object
    /// key.
    #[error("output path is not UTF-8: {}", path.display())]
    NonUtf8Path {
        /// The offending path.
        path: PathBuf,
    },
}

/// Collect every regular file below `root` as a [`RenderedAsset`], sorted by
/// key.
///
/// Symbolic links are not followed.
///
/// # Errors
///
/// Returns [`ScanError`] if the tree cannot be walked or holds a non-UTF-8
/// path.
pub fn scan_output(root: &Utf8Path) -> Result<Vec<RenderedAsset>, ScanError> {
    let mut assets = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|source| ScanError::Walk {
            root: root.to_owned(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .ok()
            .and_then(Utf8Path::from_path)
            .ok_or_else(|| ScanError::NonUtf8Path {
                path: entry.path().to_path_buf(),
            })?;
        if let Some(asset) = RenderedAsset::from_relative_path(relative) {
            assets.push(asset);
        }
    }
    assets.sort_by(|a, b| a.key().cmp(b.key()));
    Ok(assets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn collects_nested_files_with_forward_slash_keys() {
        let dir = tempfile::tempdir().expect("temp dir");
        let root = Utf8Path::from_path(dir.path()).expect("utf-8 path");
        fs::create_dir_all(root.join("posts/hello")).expect("mkdir");
        fs::create_dir_all(root.join("empty")).expect("mkdir");
        fs::write(root.join("index.html"), "").expect("write");
        fs::write(root.join("posts/hello/index.html"), "").expect("write");
        fs::write(root.join("CNAME"), "").expect("write");

        let assets = scan_output(root).expect("scan succeeds");
        let keys: Vec<&str> = assets.iter().map(RenderedAsset::key).collect();

        assert_eq!(keys, vec!["CNAME", "index.html", "posts/hello/index.html"]);
        assert!(assets.iter().any(|asset| asset.extension().is_none()));
    }

    #[test]
    fn missing_root_is_a_walk_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let root = Utf8Path::from_path(dir.path()).expect("utf-8 path").join("absent");
        assert!(matches!(scan_output(&root), Err(ScanError::Walk { .. })));
    }
}
