//! The ordered rule table and its validation.
//!
//! Rules run in declaration order and every run is a full overwrite, so on
//! overlapping filters the later rule decides the metadata an object keeps.
//! A table states which behaviour it relies on through [`Precedence`] and is
//! checked against it when built.

use crate::asset::RenderedAsset;
use crate::extension::Extension;
use crate::filter::{AssetFilter, IncludeSet};
use crate::metadata::{CacheControl, ContentType};
use crate::rule::RuleSpec;
use std::sync::OnceLock;
use thiserror::Error;

/// How a table treats files admitted by more than one rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precedence {
    /// No two rules may admit the same extension.
    #[default]
    Disjoint,
    /// Overlap is permitted; the later rule overwrites the earlier one.
    LastWins,
}

/// Errors raised when a rule table is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleTableError {
    /// The table has no rules.
    #[error("rule table is empty")]
    Empty,

    /// The final rule is not a catch-all.
    #[error("rule table must end with a catch-all rule")]
    MissingCatchAll,

    /// A catch-all appears before the end of the table.
    #[error("catch-all rule {name:?} at position {position} must be last")]
    CatchAllNotLast {
        /// Name of the misplaced rule.
        name: String,
        /// One-based position of the rule.
        position: usize,
    },

    /// A specific rule lists no extensions and would never match.
    #[error("rule {name:?} includes no extensions")]
    EmptyInclude {
        /// Name of the offending rule.
        name: String,
    },

    /// The catch-all excludes an extension that no other rule claims.
    #[error("catch-all rule {name:?} excludes {extension} but no rule includes it")]
    UnclaimedExclusion {
        /// Name of the catch-all rule.
        name: String,
        /// The extension nothing would publish.
        extension: Extension,
    },

    /// Two rules admit the same extensions under [`Precedence::Disjoint`].
    #[error("rules {earlier:?} and {later:?} both match {extensions}")]
    Overlap {
        /// Name of the earlier rule.
        earlier: String,
        /// Name of the later rule.
        later: String,
        /// The shared extensions as globs.
        extensions: String,
    },
}

/// An ordered, validated sequence of rules.
///
/// Every valid table ends with exactly one catch-all, so every key falls
/// under at least one rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleTable {
    rules: Vec<RuleSpec>,
    precedence: Precedence,
}

impl RuleTable {
    /// Validate and build a rule table.
    ///
    /// # Errors
    ///
    /// Returns [`RuleTableError`] when the table is empty, does not end with
    /// its only catch-all, has a specific rule with no extensions, leaves an
    /// excluded extension unclaimed, or (under [`Precedence::Disjoint`])
    /// contains two rules admitting the same extension.
    pub fn new(rules: Vec<RuleSpec>, precedence: Precedence) -> Result<Self, RuleTableError> {
        let Some((last, specific)) = rules.split_last() else {
            return Err(RuleTableError::Empty);
        };
        if !last.filter().is_catch_all() {
            return Err(RuleTableError::MissingCatchAll);
        }
        for (index, rule) in specific.iter().enumerate() {
            match rule.filter().include() {
                IncludeSet::All => {
                    return Err(RuleTableError::CatchAllNotLast {
                        name: rule.name().to_owned(),
                        position: index + 1,
                    });
                }
                IncludeSet::Extensions(set) if set.is_empty() => {
                    return Err(RuleTableError::EmptyInclude {
                        name: rule.name().to_owned(),
                    });
                }
                IncludeSet::Extensions(_) => {}
            }
        }
        check_exclusions_claimed(last, specific)?;
        if precedence == Precedence::Disjoint {
            check_disjoint(&rules)?;
        }
        Ok(Self { rules, precedence })
    }

    fn unchecked(rules: Vec<RuleSpec>, precedence: Precedence) -> Self {
        Self { rules, precedence }
    }

    /// The rules in execution order.
    #[must_use]
    pub fn rules(&self) -> &[RuleSpec] {
        &self.rules
    }

    /// Iterate over the rules in execution order.
    pub fn iter(&self) -> std::slice::Iter<'_, RuleSpec> {
        self.rules.iter()
    }

    /// Number of rules, which is also the number of syncs a run issues.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Always `false` for a validated table.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// The overlap policy the table was validated against.
    #[must_use]
    pub fn precedence(&self) -> Precedence {
        self.precedence
    }

    /// Every rule that admits `asset`, with one-based ordinals, in order.
    pub fn matching_rules<'a, 'b>(
        &'a self,
        asset: &'b RenderedAsset,
    ) -> impl Iterator<Item = (usize, &'a RuleSpec)> + use<'a, 'b> {
        self.rules
            .iter()
            .enumerate()
            .filter(move |(_, rule)| rule.matches(asset))
            .map(|(index, rule)| (index + 1, rule))
    }

    /// The rule whose metadata `asset` keeps once every sync has run.
    ///
    /// This is the last matching rule. It is always `Some` for a validated
    /// table.
    ///
    /// # Examples
    ///
    /// ```
    /// use publish_policy::{RenderedAsset, standard_rules};
    ///
    /// let (ordinal, rule) = standard_rules()
    ///     .effective_rule(&RenderedAsset::new("data.json"))
    ///     .expect("catch-all matches");
    /// assert_eq!(ordinal, 7);
    /// assert_eq!(rule.cache_control().header_value(), "max-age=7200");
    /// ```
    #[must_use]
    pub fn effective_rule(&self, asset: &RenderedAsset) -> Option<(usize, &RuleSpec)> {
        self.matching_rules(asset).last()
    }
}

impl<'a> IntoIterator for &'a RuleTable {
    type Item = &'a RuleSpec;
    type IntoIter = std::slice::Iter<'a, RuleSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

fn check_exclusions_claimed(
    catch_all: &RuleSpec,
    specific: &[RuleSpec],
) -> Result<(), RuleTableError> {
    let unclaimed = catch_all
        .filter()
        .exclude()
        .iter()
        .find(|ext| !specific.iter().any(|rule| rule.filter().admits(Some(*ext))));
    match unclaimed {
        Some(extension) => Err(RuleTableError::UnclaimedExclusion {
            name: catch_all.name().to_owned(),
            extension: extension.clone(),
        }),
        None => Ok(()),
    }
}

fn check_disjoint(rules: &[RuleSpec]) -> Result<(), RuleTableError> {
    for (index, earlier) in rules.iter().enumerate() {
        for later in &rules[index + 1..] {
            let shared = earlier
                .filter()
                .shared_extensions(later.filter())
                .unwrap_or_default();
            if !shared.is_empty() {
                let globs: Vec<String> = shared.iter().map(Extension::glob).collect();
                return Err(RuleTableError::Overlap {
                    earlier: earlier.name().to_owned(),
                    later: later.name().to_owned(),
                    extensions: globs.join(" "),
                });
            }
        }
    }
    Ok(())
}

const LONG_LIVED: CacheControl = CacheControl::max_age_secs(7_776_000);

/// The standard publication rules for a rendered static site.
///
/// Built once per process. Scripts, stylesheets and media are cached for
/// ninety days, pages for ten minutes, feeds and sitemaps for four hours and
/// everything else for two hours.
#[must_use]
pub fn standard_rules() -> &'static RuleTable {
    static TABLE: OnceLock<RuleTable> = OnceLock::new();
    TABLE.get_or_init(build_standard_rules)
}

fn build_standard_rules() -> RuleTable {
    let specific = |name: &str, exts: &[&'static str], cache: CacheControl| {
        RuleSpec::new(
            name,
            AssetFilter::extensions(exts.iter().copied().map(Extension::from_static)),
            cache,
        )
    };
    let rules = vec![
        specific("scripts", &["js"], LONG_LIVED)
            .with_content_type(ContentType::new("application/javascript")),
        specific("stylesheets", &["css"], LONG_LIVED)
            .with_content_type(ContentType::new("text/css")),
        specific("pages", &["html"], CacheControl::max_age_secs(600))
            .with_content_type(ContentType::new("text/html")),
        specific("feeds", &["xml"], CacheControl::max_age_secs(14_400))
            .with_content_type(ContentType::new("text/xml")),
        specific("images", &["png", "jpg", "jpeg"], LONG_LIVED),
        specific(
            "fonts",
            &["otf", "eot", "svg", "ttf", "woff", "woff2"],
            LONG_LIVED,
        ),
        RuleSpec::new(
            "everything-else",
            AssetFilter::all_except(
                [
                    "js", "css", "html", "xml", "png", "jpg", "jpeg", "svg", "otf", "eot", "ttf",
                    "woff", "woff2",
                ]
                .map(Extension::from_static),
            ),
            CacheControl::max_age_secs(7_200),
        ),
    ];
    RuleTable::unchecked(rules, Precedence::Disjoint)
}
