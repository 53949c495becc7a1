//! Source bundle download.
//!
//! The bundle is read with the temporary credentials the pipeline hands to
//! the job, not the handler's own.

use crate::aws::s3::{S3Client, S3Endpoint};
use crate::aws::{AwsError, Credentials};
use crate::job::SourceLocation;
use log::debug;
use std::path::Path;

/// Trait for fetching the source bundle, enabling test mocking.
#[cfg_attr(test, mockall::automock)]
pub trait SourceFetcher {
    /// Download `source` into the file at `dest`, returning its size.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::NotFound`] if the object does not exist,
    /// [`DownloadError::Fetch`] for any other service or transport failure.
    fn fetch(
        &self,
        source: &SourceLocation,
        credentials: &Credentials,
        dest: &Path,
    ) -> Result<u64, DownloadError>;
}

/// Errors arising from source bundle retrieval.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// The bundle does not exist.
    #[error("source bundle not found: {location}")]
    NotFound {
        /// The bundle location.
        location: String,
    },

    /// The bundle could not be fetched.
    #[error("failed to fetch source bundle {location}")]
    Fetch {
        /// The bundle location.
        location: String,
        /// The underlying client failure.
        #[source]
        source: AwsError,
    },

    /// I/O error writing the bundle.
    #[error("I/O error writing source bundle")]
    Io(#[from] std::io::Error),
}

/// Fetches bundles from S3.
#[derive(Debug, Clone)]
pub struct S3Fetcher {
    endpoint: S3Endpoint,
    region: String,
}

impl S3Fetcher {
    /// Create a fetcher for buckets in `region`.
    #[must_use]
    pub fn new(endpoint: S3Endpoint, region: impl Into<String>) -> Self {
        Self {
            endpoint,
            region: region.into(),
        }
    }
}

impl SourceFetcher for S3Fetcher {
    fn fetch(
        &self,
        source: &SourceLocation,
        credentials: &Credentials,
        dest: &Path,
    ) -> Result<u64, DownloadError> {
        let client = S3Client::new(self.endpoint.clone(), &self.region, credentials.clone());
        debug!("fetching {source}");
        client
            .get_object_to_file(&source.bucket, &source.key, dest)
            .map_err(|err| classify(source, err))
    }
}

fn classify(source: &SourceLocation, err: AwsError) -> DownloadError {
    match err {
        err if err.is_not_found() => DownloadError::NotFound {
            location: source.to_string(),
        },
        AwsError::Io(io) => DownloadError::Io(io),
        err => DownloadError::Fetch {
            location: source.to_string(),
            source: err,
        },
    }
}
