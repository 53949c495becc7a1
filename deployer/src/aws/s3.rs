//! S3 object operations over signed HTTP.
//!
//! Only the calls the handler needs are implemented: download to a file,
//! upload with metadata, paginated listing and deletion.

use super::AwsError;
use super::credentials::Credentials;
use super::http::{agent, endpoint_parts, is_success, read_body, s3_service_error, transport_error};
use super::sigv4::{SigningRequest, SigningScope, canonical_query, encode_path, hex_sha256, sign};
use log::debug;
use percent_encoding::percent_decode_str;
use quick_xml::Reader;
use quick_xml::escape::unescape;
use quick_xml::events::Event;
use std::path::Path;

const SERVICE: &str = "s3";

/// Where S3 requests are sent.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum S3Endpoint {
    /// The regional AWS endpoint.
    ///
    /// Buckets are addressed virtual-host style unless their name contains a
    /// dot, which would break certificate matching.
    #[default]
    Aws,
    /// A custom endpoint, addressed path style.
    Custom {
        /// Scheme and authority, e.g. `http://localhost:9000`.
        base: String,
        /// Authority used for the `host` header.
        host: String,
    },
}

impl S3Endpoint {
    /// Build an endpoint from an optional override URL.
    ///
    /// # Errors
    ///
    /// Returns [`AwsError::Transport`] if the override is not an `http` or
    /// `https` URL.
    pub fn from_override(endpoint: Option<&str>) -> Result<Self, AwsError> {
        match endpoint {
            None => Ok(Self::Aws),
            Some(url) => {
                let (base, host) = endpoint_parts(url)?;
                Ok(Self::Custom { base, host })
            }
        }
    }
}

/// Headers stamped onto an uploaded object.
#[derive(Debug, Clone, Copy)]
pub struct PutOptions<'a> {
    /// `Content-Type` header value.
    pub content_type: &'a str,
    /// `Cache-Control` header value.
    pub cache_control: &'a str,
    /// Canned ACL for `x-amz-acl`, if any.
    pub acl: Option<&'a str>,
}

#[derive(Debug, PartialEq, Eq)]
struct Target {
    base: String,
    host: String,
    path: String,
}

/// A signing S3 client.
#[derive(Debug, Clone)]
pub struct S3Client {
    endpoint: S3Endpoint,
    region: String,
    credentials: Credentials,
}

impl S3Client {
    /// Create a client for `region` signing with `credentials`.
    #[must_use]
    pub fn new(endpoint: S3Endpoint, region: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            endpoint,
            region: region.into(),
            credentials,
        }
    }

    /// Download an object into `dest`, returning the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns [`AwsError`] on transport, service or local I/O failure.
    pub fn get_object_to_file(&self, bucket: &str, key: &str, dest: &Path) -> Result<u64, AwsError> {
        let target = self.target(bucket, key)?;
        let response = self.execute("GET", &target, &[], &[], None)?;
        let status = response.status().as_u16();
        if !is_success(status) {
            let body = read_body(response).unwrap_or_default();
            return Err(s3_service_error(status, &body));
        }
        let mut file = std::fs::File::create(dest)?;
        let written = std::io::copy(&mut response.into_body().into_reader(), &mut file)?;
        debug!("downloaded s3://{bucket}/{key} ({written} bytes)");
        Ok(written)
    }

    /// Upload `body` as `key`, replacing any existing object.
    ///
    /// # Errors
    ///
    /// Returns [`AwsError`] on transport or service failure.
    pub fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: &[u8],
        options: PutOptions<'_>,
    ) -> Result<(), AwsError> {
        let target = self.target(bucket, key)?;
        let mut headers = vec![
            ("cache-control", options.cache_control.to_owned()),
            ("content-type", options.content_type.to_owned()),
        ];
        if let Some(acl) = options.acl {
            headers.push(("x-amz-acl", acl.to_owned()));
        }
        let response = self.execute("PUT", &target, &[], &headers, Some(body))?;
        expect_success(response)
    }

    /// List every key under `prefix`, following continuation tokens.
    ///
    /// # Errors
    ///
    /// Returns [`AwsError`] on transport or service failure, or if a page
    /// cannot be parsed.
    pub fn list_keys(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, AwsError> {
        let target = self.target(bucket, "")?;
        let mut keys = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let mut query = vec![
                ("list-type", "2".to_owned()),
                ("encoding-type", "url".to_owned()),
            ];
            if !prefix.is_empty() {
                query.push(("prefix", prefix.to_owned()));
            }
            if let Some(token) = &token {
                query.push(("continuation-token", token.clone()));
            }
            let response = self.execute("GET", &target, &query, &[], None)?;
            let status = response.status().as_u16();
            let body = read_body(response)?;
            if !is_success(status) {
                return Err(s3_service_error(status, &body));
            }
            let page = parse_list_page(&body)?;
            keys.extend(page.keys);
            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        debug!("listed {} keys under s3://{bucket}/{prefix}", keys.len());
        Ok(keys)
    }

    /// Delete `key`. Deleting a missing key succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`AwsError`] on transport or service failure.
    pub fn delete_object(&self, bucket: &str, key: &str) -> Result<(), AwsError> {
        let target = self.target(bucket, key)?;
        let response = self.execute("DELETE", &target, &[], &[], None)?;
        expect_success(response)
    }

    fn target(&self, bucket: &str, key: &str) -> Result<Target, AwsError> {
        validate_bucket_name(bucket)?;
        let encoded_key = encode_path(key);
        let target = match &self.endpoint {
            S3Endpoint::Custom { base, host } => Target {
                base: base.clone(),
                host: host.clone(),
                path: format!("/{bucket}/{encoded_key}"),
            },
            S3Endpoint::Aws if bucket.contains('.') => {
                let host = format!("s3.{}.amazonaws.com", self.region);
                Target {
                    base: format!("https://{host}"),
                    host,
                    path: format!("/{bucket}/{encoded_key}"),
                }
            }
            S3Endpoint::Aws => {
                let host = format!("{bucket}.s3.{}.amazonaws.com", self.region);
                Target {
                    base: format!("https://{host}"),
                    host,
                    path: format!("/{encoded_key}"),
                }
            }
        };
        Ok(target)
    }

    fn execute(
        &self,
        method: &str,
        target: &Target,
        query: &[(&str, String)],
        headers: &[(&str, String)],
        body: Option<&[u8]>,
    ) -> Result<ureq::http::Response<ureq::Body>, AwsError> {
        let payload_sha256 = hex_sha256(body.unwrap_or_default());
        let mut signed: Vec<(&str, String)> = headers.to_vec();
        signed.push(("x-amz-content-sha256", payload_sha256.clone()));

        let request = SigningRequest {
            method,
            host: &target.host,
            path: &target.path,
            query,
            headers: &signed,
            payload_sha256: &payload_sha256,
        };
        let scope = SigningScope {
            region: &self.region,
            service: SERVICE,
        };
        let added = sign(&request, scope, &self.credentials)?;

        let query_string = canonical_query(query);
        let url = if query_string.is_empty() {
            format!("{}{}", target.base, target.path)
        } else {
            format!("{}{}?{query_string}", target.base, target.path)
        };
        let all_headers: Vec<(String, String)> = signed
            .into_iter()
            .map(|(name, value)| (name.to_owned(), value))
            .chain(added)
            .collect();

        debug!("{method} {url}");
        let result = match method {
            "PUT" => with_headers(agent().put(&url), &all_headers).send(body.unwrap_or_default()),
            "DELETE" => with_headers(agent().delete(&url), &all_headers).call(),
            _ => with_headers(agent().get(&url), &all_headers).call(),
        };
        result.map_err(|e| transport_error(&url, &e))
    }
}

fn with_headers<B>(
    mut request: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        request = request.header(name.as_str(), value.as_str());
    }
    request
}

fn expect_success(response: ureq::http::Response<ureq::Body>) -> Result<(), AwsError> {
    let status = response.status().as_u16();
    if is_success(status) {
        return Ok(());
    }
    let body = read_body(response).unwrap_or_default();
    Err(s3_service_error(status, &body))
}

/// Check a bucket name against the S3 naming rules.
///
/// # Errors
///
/// Returns [`AwsError::InvalidBucket`] describing the first rule broken.
pub fn validate_bucket_name(name: &str) -> Result<(), AwsError> {
    let reject = |reason| {
        Err(AwsError::InvalidBucket {
            name: name.to_owned(),
            reason,
        })
    };
    if !(3..=63).contains(&name.len()) {
        return reject("must be between 3 and 63 characters long");
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'.' || b == b'-')
    {
        return reject("may only contain lowercase letters, digits, dots and hyphens");
    }
    let edge_ok = |b: Option<u8>| b.is_some_and(|b| b.is_ascii_lowercase() || b.is_ascii_digit());
    if !edge_ok(name.bytes().next()) || !edge_ok(name.bytes().last()) {
        return reject("must begin and end with a letter or digit");
    }
    if name.contains("..") {
        return reject("must not contain adjacent dots");
    }
    Ok(())
}

#[derive(Debug, Default, PartialEq, Eq)]
struct ListPage {
    keys: Vec<String>,
    next_token: Option<String>,
}

fn malformed(reason: impl std::fmt::Display) -> AwsError {
    AwsError::MalformedResponse {
        reason: reason.to_string(),
    }
}

fn parse_list_page(xml: &str) -> Result<ListPage, AwsError> {
    let mut page = ListPage::default();
    let mut truncated = false;
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event().map_err(malformed)? {
            Event::Start(e) => {
                let name = e.name();
                let field = name.as_ref();
                if !matches!(field, b"Key" | b"IsTruncated" | b"NextContinuationToken") {
                    continue;
                }
                let raw = reader.read_text(name).map_err(malformed)?;
                let text = unescape(&raw).map_err(malformed)?;
                match field {
                    b"Key" => page.keys.push(decode_listed_key(&text)?),
                    b"IsTruncated" => truncated = text.trim() == "true",
                    _ => page.next_token = Some(text.into_owned()),
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    if !truncated {
        page.next_token = None;
    } else if page.next_token.is_none() {
        return Err(malformed("truncated listing without a continuation token"));
    }
    Ok(page)
}

/// Decode a key returned with `encoding-type=url`.
fn decode_listed_key(encoded: &str) -> Result<String, AwsError> {
    let spaced = encoded.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(std::borrow::Cow::into_owned)
        .map_err(malformed)
}
