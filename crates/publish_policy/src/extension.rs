//! Filename extensions used to classify rendered assets.
//!
//! Matching follows shell-glob `*.ext` semantics as applied to a relative
//! object key: a key carries extension `ext` when it ends with `.ext`.
//! Comparison is case-sensitive, so `logo.PNG` does not carry `png`.

use std::fmt;

/// A single filename extension without its leading dot.
///
/// Extensions are validated on construction: they are non-empty and contain
/// no dots, separators, or glob metacharacters, which keeps "ends with
/// `.ext`" equivalent to "the last extension equals `ext`".
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Extension(String);

/// Errors raised when an extension literal is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtensionError {
    /// The extension was empty.
    #[error("extension must not be empty")]
    Empty,

    /// The extension contained a character that cannot appear in one.
    #[error("extension {value:?} contains forbidden character {found:?}")]
    ForbiddenCharacter {
        /// The rejected literal.
        value: String,
        /// The first offending character.
        found: char,
    },
}

const FORBIDDEN: &[char] = &['.', '/', '\\', '*', '?', '[', ']'];

impl Extension {
    /// Validate and wrap an extension literal such as `"woff2"`.
    ///
    /// A single leading dot is accepted and stripped, so `".css"` and
    /// `"css"` are the same extension.
    ///
    /// # Errors
    ///
    /// Returns [`ExtensionError`] when the literal is empty or contains a
    /// dot, path separator, or glob metacharacter.
    ///
    /// # Examples
    ///
    /// ```
    /// use publish_policy::Extension;
    ///
    /// let ext = Extension::new(".css")?;
    /// assert_eq!(ext.as_str(), "css");
    /// assert!(Extension::new("tar.gz").is_err());
    /// # Ok::<(), publish_policy::ExtensionError>(())
    /// ```
    pub fn new(value: impl Into<String>) -> Result<Self, ExtensionError> {
        let raw = value.into();
        let trimmed = raw.strip_prefix('.').unwrap_or(&raw);
        if trimmed.is_empty() {
            return Err(ExtensionError::Empty);
        }
        if let Some(found) = trimmed.chars().find(|c| FORBIDDEN.contains(c)) {
            return Err(ExtensionError::ForbiddenCharacter {
                value: raw.clone(),
                found,
            });
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Wrap a literal already known to be valid.
    pub(crate) fn from_static(value: &'static str) -> Self {
        debug_assert!(Self::new(value).is_ok(), "invalid extension literal {value:?}");
        Self(value.to_owned())
    }

    /// Derive the extension carried by a relative object key.
    ///
    /// Returns `None` for keys whose final segment has no dot or ends in
    /// one (`CNAME`, `archive.`).
    #[must_use]
    pub fn of_key(key: &str) -> Option<Self> {
        let file_name = key.rsplit('/').next().unwrap_or(key);
        let (_, ext) = file_name.rsplit_once('.')?;
        if ext.is_empty() || ext.contains('\\') {
            return None;
        }
        Some(Self(ext.to_owned()))
    }

    /// The extension without its leading dot.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Render the extension as the equivalent `*.ext` glob.
    #[must_use]
    pub fn glob(&self) -> String {
        format!("*.{}", self.0)
    }
}

impl fmt::Display for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<&str> for Extension {
    type Error = ExtensionError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::plain("index.html", Some("html"))]
    #[case::nested("assets/js/app.min.js", Some("js"))]
    #[case::no_extension("CNAME", None)]
    #[case::trailing_dot("notes.", None)]
    #[case::dotted_directory("v1.2/README", None)]
    #[case::hidden_file(".well-known/.js", Some("js"))]
    #[case::upper_case("img/LOGO.PNG", Some("PNG"))]
    fn of_key_takes_last_extension_of_final_segment(
        #[case] key: &str,
        #[case] expected: Option<&str>,
    ) {
        let ext = Extension::of_key(key);
        assert_eq!(ext.as_ref().map(Extension::as_str), expected);
    }

    #[rstest]
    #[case::empty("")]
    #[case::only_dot(".")]
    fn new_rejects_empty(#[case] literal: &str) {
        assert_eq!(Extension::new(literal), Err(ExtensionError::Empty));
    }

    #[rstest]
    #[case::compound("tar.gz", '.')]
    #[case::glob("*", '*')]
    #[case::separator("a/b", '/')]
    fn new_rejects_forbidden_characters(#[case] literal: &str, #[case] expected: char) {
        let err = Extension::new(literal).expect_err("literal should be rejected");
        assert!(
            matches!(err, ExtensionError::ForbiddenCharacter { found, .. } if found == expected),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn glob_renders_star_dot_extension() {
        let ext = Extension::new("woff2").expect("valid extension");
        assert_eq!(ext.glob(), "*.woff2");
    }
}
