//! CodePipeline job result callbacks.

use super::AwsError;
use super::credentials::Credentials;
use super::http::{agent, endpoint_parts, is_success, json_service_error, read_body, transport_error};
use super::sigv4::{SigningRequest, SigningScope, hex_sha256, sign};
use log::debug;
use serde::Serialize;

const SERVICE: &str = "codepipeline";
const TARGET_PREFIX: &str = "CodePipeline_20150709";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// Longest failure message the service accepts.
pub const MAX_FAILURE_MESSAGE_CHARS: usize = 5000;

/// Category reported with a failed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureType {
    /// The job itself failed.
    JobFailed,
    /// The job's configuration was invalid.
    ConfigurationError,
    /// The action lacked permission.
    PermissionError,
}

impl FailureType {
    /// Wire name of the failure type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::JobFailed => "JobFailed",
            Self::ConfigurationError => "ConfigurationError",
            Self::PermissionError => "PermissionError",
        }
    }
}

/// Failure report attached to `PutJobFailureResult`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureDetails {
    /// Failure category.
    #[serde(rename = "type")]
    pub kind: FailureType,
    /// Human-readable description, at most [`MAX_FAILURE_MESSAGE_CHARS`].
    pub message: String,
}

impl FailureDetails {
    /// Build failure details, truncating `message` to the service limit.
    #[must_use]
    pub fn new(kind: FailureType, message: &str) -> Self {
        Self {
            kind,
            message: truncate_chars(message, MAX_FAILURE_MESSAGE_CHARS),
        }
    }
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SuccessRequest<'a> {
    job_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FailureRequest<'a> {
    job_id: &'a str,
    failure_details: &'a FailureDetails,
}

/// A signing CodePipeline client.
#[derive(Debug, Clone)]
pub struct CodePipelineClient {
    base: String,
    host: String,
    region: String,
    credentials: Credentials,
}

impl CodePipelineClient {
    /// Create a client for the regional endpoint.
    #[must_use]
    pub fn new(region: impl Into<String>, credentials: Credentials) -> Self {
        let region = region.into();
        let host = format!("codepipeline.{region}.amazonaws.com");
        Self {
            base: format!("https://{host}"),
            host,
            region,
            credentials,
        }
    }

    /// Create a client for a custom endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`AwsError::Transport`] if `endpoint` is not an `http` or
    /// `https` URL.
    pub fn with_endpoint(
        endpoint: &str,
        region: impl Into<String>,
        credentials: Credentials,
    ) -> Result<Self, AwsError> {
        let (base, host) = endpoint_parts(endpoint)?;
        Ok(Self {
            base,
            host,
            region: region.into(),
            credentials,
        })
    }

    /// Report that `job_id` succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`AwsError`] if the call fails or is rejected.
    pub fn put_job_success_result(&self, job_id: &str) -> Result<(), AwsError> {
        let body = encode(&SuccessRequest { job_id })?;
        self.call("PutJobSuccessResult", &body)
    }

    /// Report that `job_id` failed.
    ///
    /// # Errors
    ///
    /// Returns [`AwsError`] if the call fails or is rejected.
    pub fn put_job_failure_result(
        &self,
        job_id: &str,
        details: &FailureDetails,
    ) -> Result<(), AwsError> {
        let body = encode(&FailureRequest {
            job_id,
            failure_details: details,
        })?;
        self.call("PutJobFailureResult", &body)
    }

    fn call(&self, operation: &str, body: &[u8]) -> Result<(), AwsError> {
        let payload_sha256 = hex_sha256(body);
        let headers = [
            ("content-type", CONTENT_TYPE.to_owned()),
            ("x-amz-target", format!("{TARGET_PREFIX}.{operation}")),
        ];
        let request = SigningRequest {
            method: "POST",
            host: &self.host,
            path: "/",
            query: &[],
            headers: &headers,
            payload_sha256: &payload_sha256,
        };
        let scope = SigningScope {
            region: &self.region,
            service: SERVICE,
        };
        let added = sign(&request, scope, &self.credentials)?;

        let url = format!("{}/", self.base);
        let mut builder = agent().post(&url);
        for (name, value) in &headers {
            builder = builder.header(*name, value.as_str());
        }
        for (name, value) in &added {
            builder = builder.header(name.as_str(), value.as_str());
        }
        debug!("POST {url} ({operation})");
        let response = builder.send(body).map_err(|e| transport_error(&url, &e))?;
        let status = response.status().as_u16();
        if is_success(status) {
            return Ok(());
        }
        let text = read_body(response).unwrap_or_default();
        Err(json_service_error(status, &text))
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, AwsError> {
    Ok(serde_json::to_vec(value)?)
}
