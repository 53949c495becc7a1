//! Job outcome reporting.

use crate::aws::AwsError;
use crate::aws::codepipeline::{CodePipelineClient, FailureDetails, FailureType};
use log::info;

/// How a job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// The site was published.
    Succeeded,
    /// The job failed.
    Failed {
        /// Failure category.
        kind: FailureType,
        /// Description of the failure, including its causes.
        message: String,
    },
}

impl JobOutcome {
    /// A `JobFailed` outcome.
    #[must_use]
    pub fn job_failed(message: impl Into<String>) -> Self {
        Self::Failed {
            kind: FailureType::JobFailed,
            message: message.into(),
        }
    }

    /// Whether the outcome reports success.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// Errors raised while reporting an outcome.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The pipeline call failed.
    #[error("pipeline callback failed")]
    Aws(#[from] AwsError),

    /// The notifier refused the outcome.
    #[error("pipeline callback rejected: {reason}")]
    Rejected {
        /// Why it was refused.
        reason: String,
    },
}

/// Trait for reporting a job's outcome, enabling test mocking.
#[cfg_attr(test, mockall::automock)]
pub trait PipelineNotifier {
    /// Report `outcome` for `job_id`.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError`] if the report could not be delivered.
    fn notify(&self, job_id: &str, outcome: &JobOutcome) -> Result<(), NotifyError>;
}

/// Reports outcomes through the CodePipeline API.
#[derive(Debug, Clone)]
pub struct CodePipelineNotifier {
    client: CodePipelineClient,
}

impl CodePipelineNotifier {
    /// Wrap a client.
    #[must_use]
    pub const fn new(client: CodePipelineClient) -> Self {
        Self { client }
    }
}

impl PipelineNotifier for CodePipelineNotifier {
    fn notify(&self, job_id: &str, outcome: &JobOutcome) -> Result<(), NotifyError> {
        match outcome {
            JobOutcome::Succeeded => self.client.put_job_success_result(job_id)?,
            JobOutcome::Failed { kind, message } => {
                let details = FailureDetails::new(*kind, message);
                self.client.put_job_failure_result(job_id, &details)?;
            }
        }
        info!("reported {} for job {job_id}", describe(outcome));
        Ok(())
    }
}

fn describe(outcome: &JobOutcome) -> &'static str {
    match outcome {
        JobOutcome::Succeeded => "success",
        JobOutcome::Failed { kind, .. } => kind.as_str(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_failed_outcome_uses_job_failed_type() {
        let outcome = JobOutcome::job_failed("boom");
        assert!(!outcome.is_success());
        assert_eq!(describe(&outcome), "JobFailed");
        assert_eq!(describe(&JobOutcome::Succeeded), "success");
    }
}
