//! Sequential execution of a publication plan.

use super::scan::{ScanError, scan_output};
use super::sync::{BucketSync, CannedAcl, SyncError, SyncReport, SyncRequest};
use crate::job::Destination;
use camino::Utf8Path;
use log::info;
use publish_policy::{RuleTable, plan};

/// Errors arising from publication.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// The rendered output could not be scanned.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// A sync failed; earlier syncs stay applied and later ones never ran.
    #[error("sync {ordinal} ({rule}) failed")]
    Sync {
        /// One-based position of the failing rule.
        ordinal: usize,
        /// Name of the failing rule.
        rule: String,
        /// The sync failure.
        #[source]
        source: Box<SyncError>,
    },
}

/// Outcome of one rule's sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleOutcome {
    /// One-based position of the rule.
    pub ordinal: usize,
    /// Rule name.
    pub rule: String,
    /// What the sync changed.
    pub report: SyncReport,
}

/// Outcome of a full publication.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Files found in the output tree.
    pub files: usize,
    /// Per-rule outcomes in execution order.
    pub syncs: Vec<RuleOutcome>,
}

impl PublishReport {
    /// Total uploads across all syncs.
    #[must_use]
    pub fn uploaded(&self) -> usize {
        self.syncs.iter().map(|sync| sync.report.uploaded).sum()
    }

    /// Total deletions across all syncs.
    #[must_use]
    pub fn deleted(&self) -> usize {
        self.syncs.iter().map(|sync| sync.report.deleted).sum()
    }
}

/// Publishes a rendered tree rule by rule.
pub struct Publisher<'a> {
    table: &'a RuleTable,
    sync: &'a dyn BucketSync,
    acl: CannedAcl,
}

impl<'a> Publisher<'a> {
    /// Create a publisher applying `table` through `sync` with a
    /// `public-read` ACL.
    #[must_use]
    pub fn new(table: &'a RuleTable, sync: &'a dyn BucketSync) -> Self {
        Self {
            table,
            sync,
            acl: CannedAcl::PublicRead,
        }
    }

    /// Use `acl` for uploads instead of `public-read`.
    #[must_use]
    pub const fn with_acl(mut self, acl: CannedAcl) -> Self {
        self.acl = acl;
        self
    }

    /// Publish every file under `source_dir` to `destination`.
    ///
    /// One sync runs per rule, in table order, never concurrently. The first
    /// failure stops the run.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Scan`] if the output cannot be walked and
    /// [`PublishError::Sync`] naming the first rule whose sync failed.
    pub fn publish(
        &self,
        source_dir: &Utf8Path,
        destination: &Destination,
    ) -> Result<PublishReport, PublishError> {
        let assets = scan_output(source_dir)?;
        let plan = plan(self.table, &assets);
        info!(
            "publishing {} files to {destination} in {} syncs",
            assets.len(),
            plan.len()
        );

        let mut report = PublishReport {
            files: assets.len(),
            syncs: Vec::with_capacity(plan.len()),
        };
        for job in plan.jobs() {
            let rule = job.rule.name();
            let request = SyncRequest {
                job,
                source_dir,
                destination,
                acl: self.acl,
            };
            let outcome = self
                .sync
                .sync(&request)
                .map_err(|source| PublishError::Sync {
                    ordinal: job.ordinal,
                    rule: rule.to_owned(),
                    source: Box::new(source),
                })?;
            info!(
                "sync {}/{} ({rule}): {} uploaded, {} deleted",
                job.ordinal,
                plan.len(),
                outcome.uploaded,
                outcome.deleted
            );
            report.syncs.push(RuleOutcome {
                ordinal: job.ordinal,
                rule: rule.to_owned(),
                report: outcome,
            });
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::sync::StoreError;
    use camino::Utf8PathBuf;
    use publish_policy::standard_rules;
    use std::cell::RefCell;

    /// Records each request's ordinal and fails at a chosen one.
    struct ScriptedSync {
        fail_at: Option<usize>,
        seen: RefCell<Vec<(usize, usize)>>,
    }

    impl BucketSync for ScriptedSync {
        fn sync(&self, request: &SyncRequest<'_>) -> Result<SyncReport, SyncError> {
            let ordinal = request.job.ordinal;
            self.seen
                .borrow_mut()
                .push((ordinal, request.job.uploads.len()));
            if self.fail_at == Some(ordinal) {
                return Err(SyncError::Upload {
                    key: "x".to_owned(),
                    source: StoreError::Rejected {
                        operation: "put",
                        key: "x".to_owned(),
                        reason: "denied".to_owned(),
                    },
                });
            }
            Ok(SyncReport {
                uploaded: request.job.uploads.len(),
                deleted: 0,
            })
        }
    }

    fn output_tree() -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 path");
        for file in [
            "app.js",
            "style.css",
            "index.html",
            "sitemap.xml",
            "logo.png",
            "font.woff2",
            "data.json",
        ] {
            std::fs::write(root.join(file), file).expect("write");
        }
        (dir, root)
    }

    #[test]
    fn runs_one_sync_per_rule_in_order() {
        let (_guard, root) = output_tree();
        let sync = ScriptedSync {
            fail_at: None,
            seen: RefCell::new(Vec::new()),
        };
        let destination = Destination::parse("site").expect("valid destination");

        let report = Publisher::new(standard_rules(), &sync)
            .publish(&root, &destination)
            .expect("publish succeeds");

        assert_eq!(report.files, 7);
        assert_eq!(report.uploaded(), 7);
        assert_eq!(
            sync.seen.into_inner(),
            vec![(1, 1), (2, 1), (3, 1), (4, 1), (5, 1), (6, 1), (7, 1)]
        );
    }

    #[test]
    fn failing_sync_stops_later_rules() {
        let (_guard, root) = output_tree();
        let sync = ScriptedSync {
            fail_at: Some(4),
            seen: RefCell::new(Vec::new()),
        };
        let destination = Destination::parse("site").expect("valid destination");

        let err = Publisher::new(standard_rules(), &sync)
            .publish(&root, &destination)
            .expect_err("publish fails");

        assert!(matches!(
            err,
            PublishError::Sync { ordinal: 4, ref rule, .. } if rule == "feeds"
        ));
        let ordinals: Vec<usize> = sync.seen.into_inner().into_iter().map(|(o, _)| o).collect();
        assert_eq!(ordinals, vec![1, 2, 3, 4]);
    }
}
