//! Include/exclude selectors over asset extensions.
//!
//! A filter is the scope of one mirroring sync. It applies equally to the
//! local rendered tree (which files to upload) and to the destination
//! listing (which stale objects to prune).

use crate::extension::Extension;
use std::collections::BTreeSet;

/// The include half of a filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncludeSet {
    /// Every key, including keys without an extension.
    All,
    /// Only keys carrying one of these extensions.
    Extensions(BTreeSet<Extension>),
}

/// Selects the keys one rule is responsible for.
///
/// A key matches when the include set admits it and its extension is not
/// in the exclude set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetFilter {
    include: IncludeSet,
    exclude: BTreeSet<Extension>,
}

impl AssetFilter {
    /// Match only keys carrying one of `extensions`.
    #[must_use]
    pub fn extensions(extensions: impl IntoIterator<Item = Extension>) -> Self {
        Self {
            include: IncludeSet::Extensions(extensions.into_iter().collect()),
            exclude: BTreeSet::new(),
        }
    }

    /// Match every key except those carrying one of `excluded`.
    #[must_use]
    pub fn all_except(excluded: impl IntoIterator<Item = Extension>) -> Self {
        Self {
            include: IncludeSet::All,
            exclude: excluded.into_iter().collect(),
        }
    }

    /// The include half.
    #[must_use]
    pub fn include(&self) -> &IncludeSet {
        &self.include
    }

    /// The excluded extensions.
    #[must_use]
    pub fn exclude(&self) -> &BTreeSet<Extension> {
        &self.exclude
    }

    /// Whether this filter admits every extension it does not exclude.
    #[must_use]
    pub fn is_catch_all(&self) -> bool {
        matches!(self.include, IncludeSet::All)
    }

    /// Whether a key with the given extension falls within this filter.
    #[must_use]
    pub fn admits(&self, extension: Option<&Extension>) -> bool {
        let included = match (&self.include, extension) {
            (IncludeSet::All, _) => true,
            (IncludeSet::Extensions(set), Some(ext)) => set.contains(ext),
            (IncludeSet::Extensions(_), None) => false,
        };
        included && extension.is_none_or(|ext| !self.exclude.contains(ext))
    }

    /// Whether a relative object key falls within this filter.
    ///
    /// # Examples
    ///
    /// ```
    /// use publish_policy::{AssetFilter, Extension};
    ///
    /// let images = AssetFilter::extensions([Extension::new("png")?]);
    /// assert!(images.matches_key("img/logo.png"));
    /// assert!(!images.matches_key("index.html"));
    /// # Ok::<(), publish_policy::ExtensionError>(())
    /// ```
    #[must_use]
    pub fn matches_key(&self, key: &str) -> bool {
        self.admits(Extension::of_key(key).as_ref())
    }

    /// The extensions admitted by both filters, if the overlap is finite.
    ///
    /// Returns `None` when both filters are catch-alls, whose overlap is
    /// unbounded. An empty set means the filters are disjoint.
    #[must_use]
    pub fn shared_extensions(&self, other: &Self) -> Option<BTreeSet<Extension>> {
        let finite = match (&self.include, &other.include) {
            (IncludeSet::All, IncludeSet::All) => return None,
            (IncludeSet::Extensions(set), _) | (IncludeSet::All, IncludeSet::Extensions(set)) => {
                set
            }
        };
        Some(
            finite
                .iter()
                .filter(|ext| self.admits(Some(*ext)) && other.admits(Some(*ext)))
                .cloned()
                .collect(),
        )
    }

    /// Render the include half as glob patterns (`*` for a catch-all).
    #[must_use]
    pub fn include_patterns(&self) -> Vec<String> {
        match &self.include {
            IncludeSet::All => vec!["*".to_owned()],
            IncludeSet::Extensions(set) => set.iter().map(Extension::glob).collect(),
        }
    }

    /// Render the exclude half as glob patterns.
    #[must_use]
    pub fn exclude_patterns(&self) -> Vec<String> {
        self.exclude.iter().map(Extension::glob).collect()
    }
}
