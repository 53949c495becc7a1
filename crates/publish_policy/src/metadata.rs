//! Object metadata stamped onto published assets.

use crate::extension::Extension;
use std::fmt;
use std::time::Duration;

/// Content type the object store falls back to when nothing better is known.
pub const DEFAULT_CONTENT_TYPE: &str = "binary/octet-stream";

/// A MIME content type such as `text/css`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentType(String);

impl ContentType {
    /// Wrap a MIME type literal.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The MIME type as a header value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Infer a content type from a key's extension.
    ///
    /// Used for rules that carry no override. The lookup ignores case.
    /// Unknown or missing extensions get [`DEFAULT_CONTENT_TYPE`], matching
    /// the store's own default.
    ///
    /// # Examples
    ///
    /// ```
    /// use publish_policy::{ContentType, Extension};
    ///
    /// let png = Extension::new("png")?;
    /// assert_eq!(ContentType::infer(Some(&png)).as_str(), "image/png");
    /// assert_eq!(ContentType::infer(None).as_str(), "binary/octet-stream");
    /// # Ok::<(), publish_policy::ExtensionError>(())
    /// ```
    #[must_use]
    pub fn infer(extension: Option<&Extension>) -> Self {
        let mime = extension
            .and_then(|ext| known_mime_type(&ext.as_str().to_ascii_lowercase()))
            .unwrap_or(DEFAULT_CONTENT_TYPE);
        Self::new(mime)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn known_mime_type(ext: &str) -> Option<&'static str> {
    let mime = match ext {
        "js" | "mjs" => "application/javascript",
        "css" => "text/css",
        "html" | "htm" => "text/html",
        "xml" => "text/xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "ico" => "image/vnd.microsoft.icon",
        "svg" => "image/svg+xml",
        "otf" => "font/otf",
        "ttf" => "font/ttf",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "eot" => "application/vnd.ms-fontobject",
        "json" | "map" => "application/json",
        "webmanifest" => "application/manifest+json",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "pdf" => "application/pdf",
        "wasm" => "application/wasm",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        _ => return None,
    };
    Some(mime)
}

/// A `Cache-Control` directive granting a fixed freshness lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheControl {
    max_age: Duration,
}

impl CacheControl {
    /// Build a `max-age` directive from a number of seconds.
    #[must_use]
    pub const fn max_age_secs(secs: u64) -> Self {
        Self {
            max_age: Duration::from_secs(secs),
        }
    }

    /// The freshness lifetime.
    #[must_use]
    pub const fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Render the directive as a header value, e.g. `max-age=600`.
    #[must_use]
    pub fn header_value(&self) -> String {
        format!("max-age={}", self.max_age.as_secs())
    }
}

impl fmt::Display for CacheControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "max-age={}", self.max_age.as_secs())
    }
}

/// The metadata one upload applies to one object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectMetadata {
    /// Value for the `Content-Type` header.
    pub content_type: ContentType,
    /// Value for the `Cache-Control` header.
    pub cache_control: CacheControl,
}
