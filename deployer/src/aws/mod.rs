//! Minimal AWS clients for the operations the handler performs.
//!
//! Requests are blocking `ureq` calls signed with Signature Version 4.
//!
//! # Sub-modules
//!
//! - [`codepipeline`] - Job success and failure callbacks.
//! - [`credentials`] - Access keys and their environment lookup.
//! - [`http`] - Shared agents and response helpers.
//! - [`s3`] - Object get, put, list and delete.
//! - [`sigv4`] - Request signing.

pub mod codepipeline;
pub mod credentials;
pub mod http;
pub mod s3;
pub mod sigv4;

pub use credentials::Credentials;

/// Errors raised by the AWS clients.
#[derive(Debug, thiserror::Error)]
pub enum AwsError {
    /// The request never produced an HTTP response.
    #[error("request to {url} failed: {reason}")]
    Transport {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// The service answered with a non-success status.
    #[error("HTTP {status} {code}: {message}")]
    Service {
        /// The HTTP status code.
        status: u16,
        /// The service error code, e.g. `NoSuchKey`.
        code: String,
        /// The service error message.
        message: String,
    },

    /// A success response could not be understood.
    #[error("malformed response: {reason}")]
    MalformedResponse {
        /// What was wrong with the response.
        reason: String,
    },

    /// A bucket name is not valid for S3.
    #[error("invalid bucket name {name:?}: {reason}")]
    InvalidBucket {
        /// The rejected bucket name.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Request signing failed.
    #[error("request signing failed: {reason}")]
    Signing {
        /// Description of the failure.
        reason: String,
    },

    /// A request body could not be serialised.
    #[error("cannot encode request body")]
    Encode(#[from] serde_json::Error),

    /// Local I/O failed while streaming a body.
    #[error("I/O error")]
    Io(#[from] std::io::Error),
}

impl AwsError {
    /// Whether the service reported that the target does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Service { status: 404, .. })
    }
}
