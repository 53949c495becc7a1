//! Pipeline job events.
//!
//! The pipeline invokes the handler with a JSON event whose
//! `CodePipeline.job` member names the job, its source artefact, the
//! temporary credentials for reading that artefact, and the destination
//! bucket in the action's `UserParameters`.

use crate::aws::Credentials;
use crate::aws::s3::validate_bucket_name;
use serde::Deserialize;
use std::fmt;

/// Errors raised while interpreting a job event.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// The event is not valid JSON or lacks a required field.
    #[error("malformed job event")]
    Malformed(#[from] serde_json::Error),

    /// The job lists no input artefact.
    #[error("job {job_id} has no input artefact")]
    MissingArtifact {
        /// The job whose artefact list was empty.
        job_id: String,
    },

    /// `UserParameters` is absent or empty.
    #[error("job {job_id} does not name a destination bucket in UserParameters")]
    MissingDestination {
        /// The job lacking a destination.
        job_id: String,
    },

    /// `UserParameters` does not name a usable bucket.
    #[error("invalid destination {value:?}: {reason}")]
    InvalidDestination {
        /// The rejected parameter value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Where the source bundle lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    /// Artefact bucket.
    pub bucket: String,
    /// Object key of the ZIP bundle.
    pub key: String,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// The bucket, and optional key prefix, the site is published to.
///
/// # Examples
///
/// ```
/// use site_deployer::job::Destination;
///
/// let destination = Destination::parse("s3://www.example.com/blog/").expect("valid");
/// assert_eq!(destination.bucket(), "www.example.com");
/// assert_eq!(destination.key_for("index.html"), "blog/index.html");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    bucket: String,
    prefix: String,
}

impl Destination {
    /// Parse a destination from `UserParameters`.
    ///
    /// Accepts a bare bucket name or an `s3://bucket/prefix` URL. A non-empty
    /// prefix is normalised to end in `/`.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::InvalidDestination`] if the bucket name is not
    /// valid for S3.
    pub fn parse(value: &str) -> Result<Self, JobError> {
        let trimmed = value.trim();
        let location = trimmed.strip_prefix("s3://").unwrap_or(trimmed);
        let (bucket, prefix) = location.split_once('/').unwrap_or((location, ""));
        validate_bucket_name(bucket).map_err(|e| JobError::InvalidDestination {
            value: value.to_owned(),
            reason: e.to_string(),
        })?;
        let prefix = prefix.trim_matches('/');
        Ok(Self {
            bucket: bucket.to_owned(),
            prefix: if prefix.is_empty() {
                String::new()
            } else {
                format!("{prefix}/")
            },
        })
    }

    /// The destination bucket.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// The key prefix, empty or ending in `/`.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The object key for a path relative to the output tree.
    #[must_use]
    pub fn key_for(&self, relative: &str) -> String {
        format!("{}{relative}", self.prefix)
    }

    /// The path relative to the output tree for an object key, if the key
    /// lies under the prefix.
    #[must_use]
    pub fn relative_key<'a>(&self, key: &'a str) -> Option<&'a str> {
        key.strip_prefix(self.prefix.as_str())
            .filter(|relative| !relative.is_empty())
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.prefix)
    }
}

/// A deployment job handed over by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineJob {
    /// Job identifier used for the result callback.
    pub id: String,
    /// The source bundle.
    pub source: SourceLocation,
    /// Source revision, when the pipeline reports one.
    pub revision: Option<String>,
    /// Where rendered output is published.
    pub destination: Destination,
    /// Temporary credentials for reading the source bundle.
    pub artifact_credentials: Credentials,
}

#[derive(Deserialize)]
struct Event {
    #[serde(rename = "CodePipeline.job")]
    job: RawJob,
}

#[derive(Deserialize)]
struct RawJob {
    id: String,
    data: RawJobData,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawJobData {
    action_configuration: ActionConfiguration,
    input_artifacts: Vec<InputArtifact>,
    artifact_credentials: Credentials,
}

#[derive(Deserialize)]
struct ActionConfiguration {
    #[serde(default)]
    configuration: ActionParameters,
}

#[derive(Deserialize, Default)]
struct ActionParameters {
    #[serde(rename = "UserParameters", default)]
    user_parameters: Option<String>,
}

#[derive(Deserialize)]
struct InputArtifact {
    location: ArtifactLocation,
    #[serde(default)]
    revision: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArtifactLocation {
    s3_location: S3Location,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct S3Location {
    bucket_name: String,
    object_key: String,
}

#[derive(Deserialize)]
struct IdOnly {
    #[serde(rename = "CodePipeline.job")]
    job: IdOnlyJob,
}

#[derive(Deserialize)]
struct IdOnlyJob {
    id: String,
}

impl PipelineJob {
    /// Parse a job from the raw event JSON.
    ///
    /// Only the first input artefact is used.
    ///
    /// # Errors
    ///
    /// Returns [`JobError`] if the event is malformed, lists no input
    /// artefact, or names no valid destination bucket.
    pub fn from_event(event: &str) -> Result<Self, JobError> {
        let Event { job } = serde_json::from_str(event)?;
        let RawJob { id, data } = job;

        let Some(artifact) = data.input_artifacts.into_iter().next() else {
            return Err(JobError::MissingArtifact { job_id: id });
        };
        let parameters = data
            .action_configuration
            .configuration
            .user_parameters
            .filter(|value| !value.trim().is_empty());
        let Some(parameters) = parameters else {
            return Err(JobError::MissingDestination { job_id: id });
        };
        let destination = Destination::parse(&parameters)?;

        Ok(Self {
            id,
            source: SourceLocation {
                bucket: artifact.location.s3_location.bucket_name,
                key: artifact.location.s3_location.object_key,
            },
            revision: artifact.revision,
            destination,
            artifact_credentials: data.artifact_credentials,
        })
    }
}

/// Recover the job id from an event that failed full parsing.
///
/// Lets the handler report a failure for a job whose other fields are
/// unusable.
#[must_use]
pub fn job_id_of(event: &str) -> Option<String> {
    serde_json::from_str::<IdOnly>(event)
        .ok()
        .map(|parsed| parsed.job.id)
        .filter(|id| !id.is_empty())
}
