//! Error types for the deployment handler.
//!
//! Each stage raises its own error; [`DeployError`] folds them together so
//! the handler can report any of them as a single pipeline failure.

use crate::artefact::download::DownloadError;
use crate::artefact::extraction::ExtractionError;
use crate::artefact::generator::GenerationError;
use crate::aws::AwsError;
use crate::job::JobError;
use crate::notifier::NotifyError;
use crate::publish::PublishError;
use crate::runtime::RuntimeError;
use std::error::Error as _;
use thiserror::Error;

/// Errors that can occur while handling a job.
#[derive(Debug, Error)]
pub enum DeployError {
    /// The job event could not be interpreted.
    #[error("invalid job")]
    InvalidJob(#[from] JobError),

    /// The working directory could not be prepared.
    #[error("failed to prepare working directory")]
    Workspace {
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The source bundle could not be retrieved.
    #[error("retrieval failed")]
    Retrieval(#[from] DownloadError),

    /// The source bundle could not be extracted.
    #[error("extraction failed")]
    Extraction(#[from] ExtractionError),

    /// The site generator failed.
    #[error("generation failed")]
    Generation(#[from] GenerationError),

    /// Publishing to the destination failed.
    #[error("publication failed")]
    Publication(#[from] PublishError),

    /// The outcome could not be reported.
    #[error("notification failed")]
    Notification(#[from] NotifyError),

    /// The handler's own credentials are not in the environment.
    #[error("handler credentials missing: set AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY")]
    MissingCredentials,

    /// A configured service endpoint is unusable.
    #[error("invalid service endpoint")]
    Endpoint(#[from] AwsError),

    /// The job event could not be read.
    #[error("failed to read job event from {source_name}")]
    EventInput {
        /// Where the event was read from.
        source_name: String,
        /// The read failure.
        #[source]
        source: std::io::Error,
    },

    /// The function runtime API failed.
    #[error("runtime API failure")]
    Runtime(#[from] RuntimeError),

    /// An I/O operation failed.
    #[error("I/O error")]
    Io(#[from] std::io::Error),
}

impl DeployError {
    /// Short name of the failure class, reported as the runtime error type.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidJob(_) => "InvalidJob",
            Self::Workspace { .. } => "WorkspaceError",
            Self::Retrieval(_) => "RetrievalError",
            Self::Extraction(_) => "ExtractionError",
            Self::Generation(_) => "GenerationError",
            Self::Publication(_) => "PublicationError",
            Self::Notification(_) => "NotificationError",
            Self::MissingCredentials | Self::Endpoint(_) => "ConfigurationError",
            Self::EventInput { .. } | Self::Io(_) => "IoError",
            Self::Runtime(_) => "RuntimeError",
        }
    }

    /// Render the error and every cause as one line, outermost first.
    ///
    /// # Examples
    ///
    /// ```
    /// use site_deployer::artefact::extraction::ExtractionError;
    /// use site_deployer::error::DeployError;
    ///
    /// let err = DeployError::from(ExtractionError::EmptyArchive);
    /// assert_eq!(err.chain(), "extraction failed: source bundle contains no files");
    /// ```
    #[must_use]
    pub fn chain(&self) -> String {
        let mut rendered = self.to_string();
        let mut cause = self.source();
        while let Some(err) = cause {
            rendered.push_str(": ");
            rendered.push_str(&err.to_string());
            cause = err.source();
        }
        rendered
    }
}

/// A specialised `Result` type for handler operations.
pub type Result<T> = std::result::Result<T, DeployError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::{StoreError, SyncError};

    #[test]
    fn chain_includes_every_cause() {
        let err = DeployError::from(PublishError::Sync {
            ordinal: 4,
            rule: "feeds".to_owned(),
            source: Box::new(SyncError::Upload {
                key: "sitemap.xml".to_owned(),
                source: StoreError::Rejected {
                    operation: "put",
                    key: "sitemap.xml".to_owned(),
                    reason: "AccessDenied".to_owned(),
                },
            }),
        });
        assert_eq!(
            err.chain(),
            "publication failed: sync 4 (feeds) failed: failed to upload sitemap.xml: \
             put sitemap.xml rejected: AccessDenied"
        );
    }

    #[test]
    fn kind_names_the_failed_stage() {
        assert_eq!(
            DeployError::from(ExtractionError::EmptyArchive).kind(),
            "ExtractionError"
        );
        assert_eq!(DeployError::MissingCredentials.kind(), "ConfigurationError");
    }

    #[test]
    fn io_error_chain_shows_reason_once() {
        let err = DeployError::from(std::io::Error::other("disk full"));
        assert_eq!(err.chain(), "I/O error: disk full");
    }
}
