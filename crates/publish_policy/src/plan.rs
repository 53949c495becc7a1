//! Per-rule publication jobs.
//!
//! Planning is a pure function of the rendered assets and the rule table.
//! It yields one job per rule, in table order, even when a rule matches
//! nothing locally: its sync still prunes stale objects from the
//! destination.

use crate::asset::RenderedAsset;
use crate::metadata::ObjectMetadata;
use crate::rule::RuleSpec;
use crate::table::RuleTable;
use std::collections::BTreeMap;

/// One mirroring sync scoped to a single rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicationJob<'a> {
    /// One-based position of the rule in the table.
    pub ordinal: usize,
    /// The rule this job applies.
    pub rule: &'a RuleSpec,
    /// Local assets the rule uploads, in key order.
    pub uploads: Vec<&'a RenderedAsset>,
}

/// The ordered jobs for one publication run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicationPlan<'a> {
    jobs: Vec<PublicationJob<'a>>,
}

impl<'a> PublicationPlan<'a> {
    /// Jobs in execution order.
    #[must_use]
    pub fn jobs(&self) -> &[PublicationJob<'a>] {
        &self.jobs
    }

    /// Number of syncs the plan issues.
    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Whether the plan issues no syncs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Total uploads across every job, counting overlapping uploads twice.
    #[must_use]
    pub fn upload_count(&self) -> usize {
        self.jobs.iter().map(|job| job.uploads.len()).sum()
    }

    /// Metadata each key holds once every job has run in order.
    ///
    /// Later jobs overwrite earlier ones, so this is the metadata of the last
    /// rule that uploads the key.
    #[must_use]
    pub fn final_metadata(&self) -> BTreeMap<&'a str, ObjectMetadata> {
        let mut applied = BTreeMap::new();
        for job in &self.jobs {
            for &asset in &job.uploads {
                applied.insert(asset.key(), job.rule.metadata_for(asset));
            }
        }
        applied
    }
}

/// Build the publication plan for `assets` under `table`.
///
/// # Examples
///
/// ```
/// use publish_policy::{RenderedAsset, plan, standard_rules};
///
/// let assets = vec![RenderedAsset::new("index.html"), RenderedAsset::new("app.js")];
/// let plan = plan(standard_rules(), &assets);
/// assert_eq!(plan.len(), 7);
/// assert_eq!(plan.jobs()[0].uploads[0].key(), "app.js");
/// ```
#[must_use]
pub fn plan<'a>(table: &'a RuleTable, assets: &'a [RenderedAsset]) -> PublicationPlan<'a> {
    let mut ordered: Vec<&RenderedAsset> = assets.iter().collect();
    ordered.sort_by(|a, b| a.key().cmp(b.key()));
    ordered.dedup_by(|a, b| a.key() == b.key());

    let jobs = table
        .iter()
        .enumerate()
        .map(|(index, rule)| PublicationJob {
            ordinal: index + 1,
            rule,
            uploads: ordered
                .iter()
                .copied()
                .filter(|asset| rule.matches(asset))
                .collect(),
        })
        .collect();
    PublicationPlan { jobs }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::standard_rules;
    use rstest::rstest;

    fn assets(keys: &[&str]) -> Vec<RenderedAsset> {
        keys.iter().map(|key| RenderedAsset::new(*key)).collect()
    }

    #[test]
    fn every_rule_yields_a_job_even_without_uploads() {
        let rendered = assets(&["index.html"]);
        let plan = plan(standard_rules(), &rendered);
        let ordinals: Vec<usize> = plan.jobs().iter().map(|job| job.ordinal).collect();
        assert_eq!(ordinals, vec![1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(plan.upload_count(), 1);
    }

    #[test]
    fn duplicate_keys_are_uploaded_once() {
        let rendered = assets(&["app.js", "/app.js"]);
        let plan = plan(standard_rules(), &rendered);
        assert_eq!(plan.jobs()[0].uploads.len(), 1);
    }

    #[rstest]
    #[case::script("app.js", "application/javascript", "max-age=7776000")]
    #[case::stylesheet("style.css", "text/css", "max-age=7776000")]
    #[case::page("index.html", "text/html", "max-age=600")]
    #[case::sitemap("sitemap.xml", "text/xml", "max-age=14400")]
    #[case::image("logo.png", "image/png", "max-age=7776000")]
    #[case::font("font.woff2", "font/woff2", "max-age=7776000")]
    #[case::data("data.json", "application/json", "max-age=7200")]
    fn final_metadata_follows_standard_table(
        #[case] key: &str,
        #[case] content_type: &str,
        #[case] cache: &str,
    ) {
        let rendered = assets(&[
            "app.js",
            "style.css",
            "index.html",
            "sitemap.xml",
            "logo.png",
            "font.woff2",
            "data.json",
        ]);
        let plan = plan(standard_rules(), &rendered);
        let metadata = plan.final_metadata();
        let applied = metadata.get(key).expect("key published");
        assert_eq!(applied.content_type.as_str(), content_type);
        assert_eq!(applied.cache_control.header_value(), cache);
    }
}
