//! The per-job deployment sequence.
//!
//! A job is staged into a fresh working directory, published rule by rule,
//! and reported to the pipeline exactly once. The working directory is
//! removed before the report is sent, whatever the outcome.

use crate::artefact::download::SourceFetcher;
use crate::artefact::extraction::ArchiveExtractor;
use crate::artefact::generator::SiteGenerator;
use crate::artefact::stager::{Stager, Workspace};
use crate::error::{DeployError, Result};
use crate::job::{JobError, PipelineJob, job_id_of};
use crate::notifier::{JobOutcome, PipelineNotifier};
use crate::publish::{BucketSync, PublishReport, Publisher};
use camino::Utf8Path;
use log::{debug, error, info, warn};
use publish_policy::RuleTable;

/// Value returned to the invoker once a job has been handled.
pub const COMPLETE: &str = "complete";

/// The collaborators a job is handled with.
pub struct Handler<'a> {
    /// Fetches the source bundle.
    pub fetcher: &'a dyn SourceFetcher,
    /// Unpacks the source bundle.
    pub extractor: &'a dyn ArchiveExtractor,
    /// Renders the site.
    pub generator: &'a dyn SiteGenerator,
    /// Mirrors one rule's files into the destination.
    pub sync: &'a dyn BucketSync,
    /// Reports the outcome.
    pub notifier: &'a dyn PipelineNotifier,
    /// Classification rules, applied in order.
    pub table: &'a RuleTable,
    /// Parent for working directories; the system temporary directory when
    /// `None`.
    pub work_root: Option<&'a Utf8Path>,
}

impl Handler<'_> {
    /// Handle one job event.
    ///
    /// Every failure after the job id is known is reported to the pipeline
    /// rather than returned, so the invoker sees [`COMPLETE`].
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::InvalidJob`] only when the event is unusable
    /// and carries no job id, leaving nothing to report to.
    pub fn handle(&self, event: &str) -> Result<&'static str> {
        let job = match PipelineJob::from_event(event) {
            Ok(job) => job,
            Err(err) => return self.reject(event, err),
        };
        info!(
            "handling job {}: {} (revision {}) to {}",
            job.id,
            job.source,
            job.revision.as_deref().unwrap_or("unknown"),
            job.destination
        );

        let outcome = match self.deploy(&job) {
            Ok(report) => {
                info!(
                    "job {} published {} files ({} uploads, {} deletions)",
                    job.id,
                    report.files,
                    report.uploaded(),
                    report.deleted()
                );
                JobOutcome::Succeeded
            }
            Err(err) => failure(&job.id, &err),
        };
        self.report(&job.id, &outcome);
        Ok(COMPLETE)
    }

    fn deploy(&self, job: &PipelineJob) -> Result<PublishReport> {
        let workspace =
            Workspace::create(self.work_root).map_err(|source| DeployError::Workspace { source })?;
        debug!("working directory {}", workspace.root());

        let result = Stager::new(self.fetcher, self.extractor, self.generator)
            .stage(job, &workspace)
            .and_then(|output| {
                Publisher::new(self.table, self.sync)
                    .publish(&output, &job.destination)
                    .map_err(DeployError::from)
            });

        let root = workspace.root().to_owned();
        if let Err(err) = workspace.close() {
            warn!("failed to remove working directory {root}: {err}");
        }
        result
    }

    fn reject(&self, event: &str, err: JobError) -> Result<&'static str> {
        let err = DeployError::from(err);
        match job_id_of(event) {
            Some(job_id) => {
                let outcome = failure(&job_id, &err);
                self.report(&job_id, &outcome);
                Ok(COMPLETE)
            }
            None => {
                error!("{}", err.chain());
                Err(err)
            }
        }
    }

    fn report(&self, job_id: &str, outcome: &JobOutcome) {
        if let Err(err) = self.notifier.notify(job_id, outcome) {
            let err = DeployError::from(err);
            error!("could not report job {job_id}: {}", err.chain());
        }
    }
}

fn failure(job_id: &str, err: &DeployError) -> JobOutcome {
    let message = err.chain();
    error!("job {job_id} failed: {message}");
    debug!("{err:?}");
    JobOutcome::job_failed(message)
}
