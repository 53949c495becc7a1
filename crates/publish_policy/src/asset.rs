//! Files produced by the site generator.

use crate::extension::Extension;
use camino::{Utf8Component, Utf8Path};
use std::fmt;

/// One rendered file, identified by its path relative to the output root.
///
/// The key always uses `/` separators and never starts with one, so it is
/// also the object key the file is published under.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RenderedAsset {
    key: String,
    extension: Option<Extension>,
}

impl RenderedAsset {
    /// Build an asset from a `/`-separated relative key.
    ///
    /// Leading separators are stripped.
    ///
    /// # Examples
    ///
    /// ```
    /// use publish_policy::RenderedAsset;
    ///
    /// let asset = RenderedAsset::new("/css/site.css");
    /// assert_eq!(asset.key(), "css/site.css");
    /// assert_eq!(asset.extension().map(|e| e.as_str()), Some("css"));
    /// ```
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        let raw: String = key.into();
        let key = raw.trim_start_matches('/').to_owned();
        let extension = Extension::of_key(&key);
        Self { key, extension }
    }

    /// Build an asset from a path relative to the output root.
    ///
    /// Returns `None` if the path is absolute or contains `..`, `.` or a
    /// platform prefix; such paths never come out of a directory walk
    /// rooted at the output tree.
    #[must_use]
    pub fn from_relative_path(path: &Utf8Path) -> Option<Self> {
        let mut segments = Vec::new();
        for component in path.components() {
            match component {
                Utf8Component::Normal(segment) => segments.push(segment),
                _ => return None,
            }
        }
        if segments.is_empty() {
            return None;
        }
        Some(Self::new(segments.join("/")))
    }

    /// The object key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The extension carried by the key, if any.
    #[must_use]
    pub fn extension(&self) -> Option<&Extension> {
        self.extension.as_ref()
    }
}

impl fmt::Display for RenderedAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::flat("index.html", Some("index.html"))]
    #[case::nested("posts/2024/hello/index.html", Some("posts/2024/hello/index.html"))]
    #[case::parent("../secret", None)]
    #[case::current("./index.html", None)]
    #[case::absolute("/etc/passwd", None)]
    #[case::empty("", None)]
    fn from_relative_path_normalises_to_slash_keys(
        #[case] path: &str,
        #[case] expected: Option<&str>,
    ) {
        let asset = RenderedAsset::from_relative_path(Utf8Path::new(path));
        assert_eq!(asset.as_ref().map(RenderedAsset::key), expected);
    }

    #[test]
    fn extension_is_derived_from_key() {
        let asset = RenderedAsset::new("fonts/inter.woff2");
        assert_eq!(asset.extension().map(Extension::as_str), Some("woff2"));
    }

    #[test]
    fn extensionless_asset_has_no_extension() {
        assert!(RenderedAsset::new("CNAME").extension().is_none());
    }
}
