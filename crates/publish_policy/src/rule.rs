//! A single classification rule.

use crate::asset::RenderedAsset;
use crate::filter::AssetFilter;
use crate::metadata::{CacheControl, ContentType, ObjectMetadata};

/// Binds an asset filter to the metadata stamped on every object it uploads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSpec {
    name: String,
    filter: AssetFilter,
    content_type: Option<ContentType>,
    cache_control: CacheControl,
}

impl RuleSpec {
    /// Create a rule that leaves the content type to inference.
    ///
    /// # Examples
    ///
    /// ```
    /// use publish_policy::{AssetFilter, CacheControl, ContentType, Extension, RuleSpec};
    ///
    /// let rule = RuleSpec::new(
    ///     "stylesheets",
    ///     AssetFilter::extensions([Extension::new("css")?]),
    ///     CacheControl::max_age_secs(600),
    /// )
    /// .with_content_type(ContentType::new("text/css"));
    /// assert_eq!(rule.name(), "stylesheets");
    /// # Ok::<(), publish_policy::ExtensionError>(())
    /// ```
    #[must_use]
    pub fn new(name: impl Into<String>, filter: AssetFilter, cache_control: CacheControl) -> Self {
        Self {
            name: name.into(),
            filter,
            content_type: None,
            cache_control,
        }
    }

    /// Override the content type instead of inferring it.
    #[must_use]
    pub fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = Some(content_type);
        self
    }

    /// Human-readable rule name used in logs and errors.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The keys this rule mirrors.
    #[must_use]
    pub fn filter(&self) -> &AssetFilter {
        &self.filter
    }

    /// The content-type override, if any.
    #[must_use]
    pub fn content_type(&self) -> Option<&ContentType> {
        self.content_type.as_ref()
    }

    /// The cache directive applied to every upload.
    #[must_use]
    pub fn cache_control(&self) -> CacheControl {
        self.cache_control
    }

    /// Whether `asset` falls within this rule's filter.
    #[must_use]
    pub fn matches(&self, asset: &RenderedAsset) -> bool {
        self.filter.admits(asset.extension())
    }

    /// The metadata this rule writes when it uploads `asset`.
    #[must_use]
    pub fn metadata_for(&self, asset: &RenderedAsset) -> ObjectMetadata {
        let content_type = self
            .content_type
            .clone()
            .unwrap_or_else(|| ContentType::infer(asset.extension()));
        ObjectMetadata {
            content_type,
            cache_control: self.cache_control,
        }
    }
}
