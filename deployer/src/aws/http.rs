//! Shared HTTP agents and response helpers.

use super::AwsError;
use quick_xml::Reader;
use quick_xml::escape::unescape;
use quick_xml::events::Event;
use serde::Deserialize;
use std::sync::OnceLock;
use std::time::Duration;

/// Network timeout for a single AWS request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Shared agent for AWS calls.
///
/// Non-success statuses are returned as responses so the service error body
/// can be read.
pub fn agent() -> &'static ureq::Agent {
    static AGENT: OnceLock<ureq::Agent> = OnceLock::new();
    AGENT.get_or_init(|| {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(REQUEST_TIMEOUT))
            .http_status_as_error(false)
            .build();
        ureq::Agent::new_with_config(config)
    })
}

/// Agent without a global timeout, for long-polling endpoints.
pub fn long_poll_agent() -> &'static ureq::Agent {
    static AGENT: OnceLock<ureq::Agent> = OnceLock::new();
    AGENT.get_or_init(|| {
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build();
        ureq::Agent::new_with_config(config)
    })
}

/// Map a `ureq` transport failure to an [`AwsError`].
pub fn transport_error(url: &str, err: &ureq::Error) -> AwsError {
    AwsError::Transport {
        url: url.to_owned(),
        reason: err.to_string(),
    }
}

/// Whether a status code denotes success.
#[must_use]
pub fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

/// Read a response body, mapping failures to [`AwsError::MalformedResponse`].
pub fn read_body(response: ureq::http::Response<ureq::Body>) -> Result<String, AwsError> {
    response
        .into_body()
        .read_to_string()
        .map_err(|e| AwsError::MalformedResponse {
            reason: e.to_string(),
        })
}

/// Build a service error from an S3 XML error document.
///
/// Falls back to the status text when the body carries no code.
#[must_use]
pub fn s3_service_error(status: u16, body: &str) -> AwsError {
    let mut code = None;
    let mut message = None;
    let mut reader = Reader::from_str(body);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let slot = match e.name().as_ref() {
                    b"Code" => &mut code,
                    b"Message" => &mut message,
                    _ => continue,
                };
                if let Ok(raw) = reader.read_text(e.name()) {
                    let text = unescape(&raw)
                        .map(|text| text.trim().to_owned())
                        .unwrap_or_else(|_| raw.trim().to_owned());
                    *slot = Some(text);
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
    }
    AwsError::Service {
        status,
        code: code.unwrap_or_else(|| fallback_code(status)),
        message: message.unwrap_or_default(),
    }
}

#[derive(Deserialize)]
struct JsonErrorBody {
    #[serde(rename = "__type", default)]
    kind: Option<String>,
    #[serde(alias = "Message", default)]
    message: Option<String>,
}

/// Build a service error from an AWS JSON 1.1 error body.
///
/// The `__type` field may carry a namespace prefix ending in `#`, which is
/// stripped.
#[must_use]
pub fn json_service_error(status: u16, body: &str) -> AwsError {
    let parsed: Option<JsonErrorBody> = serde_json::from_str(body).ok();
    let (kind, message) = parsed
        .map(|b| (b.kind, b.message))
        .unwrap_or_default();
    let code = kind
        .map(|k| k.rsplit('#').next().unwrap_or_default().to_owned())
        .filter(|k| !k.is_empty())
        .unwrap_or_else(|| fallback_code(status));
    AwsError::Service {
        status,
        code,
        message: message.unwrap_or_default(),
    }
}

fn fallback_code(status: u16) -> String {
    ureq::http::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown")
        .to_owned()
}

/// Split a configured endpoint URL into its scheme-and-authority base and host.
///
/// # Errors
///
/// Returns [`AwsError::Transport`] if the URL has no `http` or `https`
/// scheme or no host.
pub fn endpoint_parts(endpoint: &str) -> Result<(String, String), AwsError> {
    let trimmed = endpoint.trim_end_matches('/');
    let (scheme, rest) = trimmed
        .split_once("://")
        .filter(|(scheme, _)| matches!(*scheme, "http" | "https"))
        .ok_or_else(|| AwsError::Transport {
            url: endpoint.to_owned(),
            reason: "endpoint must start with http:// or https://".to_owned(),
        })?;
    let host = rest.split('/').next().unwrap_or_default();
    if host.is_empty() {
        return Err(AwsError::Transport {
            url: endpoint.to_owned(),
            reason: "endpoint has no host".to_owned(),
        });
    }
    Ok((format!("{scheme}://{host}"), host.to_owned()))
}
