//! Upload and delete sets for one mirroring sync.
//!
//! A mirror makes the destination objects matching a filter equal to the
//! local files matching the same filter. Every local match is uploaded
//! whether or not it changed, so the rule's metadata always lands.

use crate::asset::RenderedAsset;
use crate::metadata::ObjectMetadata;
use crate::plan::PublicationJob;
use std::collections::BTreeSet;

/// What one sync must do to the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorDiff<'a> {
    /// Local assets to upload with the metadata the rule assigns.
    pub uploads: Vec<(&'a RenderedAsset, ObjectMetadata)>,
    /// Relative keys present remotely, within the filter, but absent locally.
    pub deletions: Vec<String>,
}

impl MirrorDiff<'_> {
    /// Whether the sync would leave the destination untouched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.uploads.is_empty() && self.deletions.is_empty()
    }
}

/// Compute the uploads and deletions for `job` against a destination listing.
///
/// `remote_keys` are relative to the destination prefix. Keys outside the
/// job's filter are never deleted, whatever else is missing locally.
///
/// # Examples
///
/// ```
/// use publish_policy::{RenderedAsset, mirror_diff, plan, standard_rules};
///
/// let assets = vec![RenderedAsset::new("app.js")];
/// let plan = plan(standard_rules(), &assets);
/// let remote = vec!["old.js".to_owned(), "index.html".to_owned()];
/// let diff = mirror_diff(&plan.jobs()[0], &remote);
/// assert_eq!(diff.uploads.len(), 1);
/// assert_eq!(diff.deletions, vec!["old.js"]);
/// ```
#[must_use]
pub fn mirror_diff<'a>(job: &PublicationJob<'a>, remote_keys: &[String]) -> MirrorDiff<'a> {
    let uploads = job
        .uploads
        .iter()
        .map(|&asset| (asset, job.rule.metadata_for(asset)))
        .collect();

    let local: BTreeSet<&str> = job.uploads.iter().map(|asset| asset.key()).collect();
    let deletions = remote_keys
        .iter()
        .filter(|key| job.rule.filter().matches_key(key))
        .filter(|key| !local.contains(key.as_str()))
        .cloned()
        .collect::<BTreeSet<String>>()
        .into_iter()
        .collect();

    MirrorDiff { uploads, deletions }
}
