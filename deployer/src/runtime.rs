//! Function runtime API client.
//!
//! In function mode the handler long-polls the runtime for the next
//! invocation, handles it, and posts the response before polling again.

use crate::aws::http::{agent, is_success, long_poll_agent};
use crate::handler::Handler;
use log::{debug, error, info};
use serde::Serialize;

const API_VERSION: &str = "2018-06-01";
const REQUEST_ID_HEADER: &str = "lambda-runtime-aws-request-id";
const ERROR_TYPE_HEADER: &str = "lambda-runtime-function-error-type";

/// Errors raised while talking to the runtime API.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The request never produced a response.
    #[error("runtime request to {url} failed: {reason}")]
    Transport {
        /// The URL that was requested.
        url: String,
        /// Description of the failure.
        reason: String,
    },

    /// The runtime answered with a non-success status.
    #[error("runtime request to {url} returned HTTP {status}")]
    Status {
        /// The URL that was requested.
        url: String,
        /// The status code.
        status: u16,
    },

    /// An invocation arrived without a request id.
    #[error("invocation is missing its request id")]
    MissingRequestId,

    /// An invocation body could not be read.
    #[error("failed to read invocation body: {reason}")]
    Body {
        /// Description of the failure.
        reason: String,
    },

    /// A payload could not be serialised.
    #[error("failed to encode runtime payload")]
    Encode(#[from] serde_json::Error),
}

/// One invocation received from the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Identifier used to answer the invocation.
    pub request_id: String,
    /// The raw event JSON.
    pub event: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorPayload<'a> {
    error_message: &'a str,
    error_type: &'a str,
}

/// Client for the runtime API at a given authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeApi {
    base: String,
}

impl RuntimeApi {
    /// Create a client for `authority`, e.g. `127.0.0.1:9001`.
    #[must_use]
    pub fn new(authority: &str) -> Self {
        Self {
            base: format!("http://{}/{API_VERSION}", authority.trim_end_matches('/')),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base)
    }

    /// Block until the runtime hands over the next invocation.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError`] if the poll fails or the invocation has no
    /// request id.
    pub fn next_invocation(&self) -> Result<Invocation, RuntimeError> {
        let url = self.url("runtime/invocation/next");
        let response = long_poll_agent()
            .get(&url)
            .call()
            .map_err(|e| transport(&url, &e))?;
        let status = response.status().as_u16();
        if !is_success(status) {
            return Err(RuntimeError::Status { url, status });
        }
        let request_id = response
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .map(str::to_owned)
            .ok_or(RuntimeError::MissingRequestId)?;
        let event = response
            .into_body()
            .read_to_string()
            .map_err(|e| RuntimeError::Body {
                reason: e.to_string(),
            })?;
        debug!("received invocation {request_id}");
        Ok(Invocation { request_id, event })
    }

    /// Post the handler's result for `request_id`.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError`] if the post fails or is rejected.
    pub fn respond(&self, request_id: &str, result: &str) -> Result<(), RuntimeError> {
        let body = serde_json::to_vec(result)?;
        let url = self.url(&format!("runtime/invocation/{request_id}/response"));
        post(&url, &body, None)
    }

    /// Report that the invocation `request_id` failed.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError`] if the post fails or is rejected.
    pub fn report_error(
        &self,
        request_id: &str,
        error_type: &str,
        message: &str,
    ) -> Result<(), RuntimeError> {
        let body = error_body(error_type, message)?;
        let url = self.url(&format!("runtime/invocation/{request_id}/error"));
        post(&url, &body, Some(error_type))
    }

    /// Report that the handler could not initialise.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError`] if the post fails or is rejected.
    pub fn report_init_error(&self, error_type: &str, message: &str) -> Result<(), RuntimeError> {
        let body = error_body(error_type, message)?;
        let url = self.url("runtime/init/error");
        post(&url, &body, Some(error_type))
    }
}

/// Serve invocations until the runtime API fails.
///
/// Handler failures are posted as invocation errors; they never stop the
/// loop.
///
/// # Errors
///
/// Returns [`RuntimeError`] when the runtime API itself cannot be reached.
pub fn serve(api: &RuntimeApi, handler: &Handler<'_>) -> Result<(), RuntimeError> {
    info!("serving invocations from the function runtime");
    loop {
        let invocation = api.next_invocation()?;
        match handler.handle(&invocation.event) {
            Ok(result) => api.respond(&invocation.request_id, result)?,
            Err(err) => api.report_error(&invocation.request_id, err.kind(), &err.chain())?,
        }
    }
}

fn post(url: &str, body: &[u8], error_type: Option<&str>) -> Result<(), RuntimeError> {
    let mut request = agent()
        .post(url)
        .header("content-type", "application/json");
    if let Some(error_type) = error_type {
        request = request.header(ERROR_TYPE_HEADER, error_type);
    }
    let response = request.send(body).map_err(|e| transport(url, &e))?;
    let status = response.status().as_u16();
    if !is_success(status) {
        error!("runtime rejected {url} with HTTP {status}");
        return Err(RuntimeError::Status {
            url: url.to_owned(),
            status,
        });
    }
    Ok(())
}

fn error_body(error_type: &str, message: &str) -> Result<Vec<u8>, RuntimeError> {
    Ok(serde_json::to_vec(&ErrorPayload {
        error_message: message,
        error_type,
    })?)
}

fn transport(url: &str, err: &ureq::Error) -> RuntimeError {
    RuntimeError::Transport {
        url: url.to_owned(),
        reason: err.to_string(),
    }
}
