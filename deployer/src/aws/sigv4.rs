//! AWS Signature Version 4 header signing.
//!
//! The signer produces the headers a request must carry (`x-amz-date`,
//! `x-amz-security-token` and `authorization`). Callers send exactly the path,
//! query and headers they passed in, plus those.

use super::AwsError;
use super::credentials::Credentials;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use sha2::{Digest, Sha256};

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// SHA-256 of an empty body, used for requests without a payload.
pub const EMPTY_PAYLOAD_SHA256: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// Characters left unescaped in query names and values.
const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Characters left unescaped in an object key used as a URI path.
const PATH: &AsciiSet = &UNRESERVED.remove(b'/');

/// Percent-encode a query component the way SigV4 canonicalises it.
#[must_use]
pub fn encode_query_component(value: &str) -> String {
    utf8_percent_encode(value, UNRESERVED).to_string()
}

/// Percent-encode an object key for use in a request path.
#[must_use]
pub fn encode_path(key: &str) -> String {
    utf8_percent_encode(key, PATH).to_string()
}

/// Hex-encoded SHA-256 of `data`.
#[must_use]
pub fn hex_sha256(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// The parts of a request that take part in its signature.
#[derive(Debug, Clone)]
pub struct SigningRequest<'a> {
    /// HTTP method, e.g. `PUT`.
    pub method: &'a str,
    /// Host header value, including any non-default port.
    pub host: &'a str,
    /// Already-encoded absolute path, e.g. `/bucket/a%20b.html`.
    pub path: &'a str,
    /// Unencoded query parameters.
    pub query: &'a [(&'a str, String)],
    /// Additional headers to sign, with lower-case names.
    pub headers: &'a [(&'a str, String)],
    /// Hex SHA-256 of the body.
    pub payload_sha256: &'a str,
}

/// The scope a signature is valid for.
#[derive(Debug, Clone, Copy)]
pub struct SigningScope<'a> {
    /// AWS region, e.g. `eu-west-1`.
    pub region: &'a str,
    /// Service signing name, e.g. `s3`.
    pub service: &'a str,
}

/// Sign `request` at the current time.
///
/// # Errors
///
/// Returns [`AwsError::Signing`] if the signing key cannot be derived.
pub fn sign(
    request: &SigningRequest<'_>,
    scope: SigningScope<'_>,
    credentials: &Credentials,
) -> Result<Vec<(String, String)>, AwsError> {
    sign_at(request, scope, credentials, Utc::now())
}

/// Sign `request` as of `now`.
///
/// Returns the headers to add to the request, in addition to those in
/// `request.headers`.
///
/// # Errors
///
/// Returns [`AwsError::Signing`] if the signing key cannot be derived.
pub fn sign_at(
    request: &SigningRequest<'_>,
    scope: SigningScope<'_>,
    credentials: &Credentials,
    now: DateTime<Utc>,
) -> Result<Vec<(String, String)>, AwsError> {
    let date = now.format("%Y%m%d").to_string();
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();

    let mut added = vec![("x-amz-date".to_owned(), amz_date.clone())];
    if let Some(token) = &credentials.session_token {
        added.push(("x-amz-security-token".to_owned(), token.clone()));
    }

    let mut headers: Vec<(String, String)> = request
        .headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.trim().to_owned()))
        .chain(std::iter::once(("host".to_owned(), request.host.to_owned())))
        .chain(added.iter().cloned())
        .collect();
    headers.sort();

    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect();
    let signed_headers = headers
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(";");

    let canonical_request = format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        request.method,
        request.path,
        canonical_query(request.query),
        canonical_headers,
        signed_headers,
        request.payload_sha256,
    );

    let credential_scope = format!(
        "{date}/{}/{}/aws4_request",
        scope.region, scope.service
    );
    let string_to_sign = format!(
        "{ALGORITHM}\n{amz_date}\n{credential_scope}\n{}",
        hex_sha256(canonical_request.as_bytes())
    );
    let signature = hex::encode(hmac_sha256(
        &signing_key(&credentials.secret_access_key, &date, scope)?,
        string_to_sign.as_bytes(),
    )?);

    added.push((
        "authorization".to_owned(),
        format!(
            "{ALGORITHM} Credential={}/{credential_scope}, SignedHeaders={signed_headers}, Signature={signature}",
            credentials.access_key_id
        ),
    ));
    Ok(added)
}

/// Encode and sort query parameters into their canonical form.
#[must_use]
pub fn canonical_query(query: &[(&str, String)]) -> String {
    let mut pairs: Vec<(String, String)> = query
        .iter()
        .map(|(name, value)| (encode_query_component(name), encode_query_component(value)))
        .collect();
    pairs.sort();
    pairs
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("&")
}

fn signing_key(secret: &str, date: &str, scope: SigningScope<'_>) -> Result<Vec<u8>, AwsError> {
    let k_date = hmac_sha256(format!("AWS4{secret}").as_bytes(), date.as_bytes())?;
    let k_region = hmac_sha256(&k_date, scope.region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, scope.service.as_bytes())?;
    hmac_sha256(&k_service, b"aws4_request")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, AwsError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key).map_err(|e| AwsError::Signing {
        reason: e.to_string(),
    })?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn example_credentials() -> Credentials {
        Credentials::new(
            "AKIDEXAMPLE",
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
        )
    }

    fn example_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0)
            .single()
            .expect("valid timestamp")
    }

    fn header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
        headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn signing_key_matches_published_example() {
        let scope = SigningScope {
            region: "us-east-1",
            service: "iam",
        };
        let key = signing_key("wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY", "20150830", scope)
            .expect("key derives");
        assert_eq!(
            hex::encode(key),
            "c4afb1cc5771d871763a393e44b703571b55cc28424d1a5e86da6ed3c154a4b9"
        );
    }

    #[test]
    fn signs_published_example_request() {
        let query = [
            ("Action", "ListUsers".to_owned()),
            ("Version", "2010-05-08".to_owned()),
        ];
        let headers = [(
            "content-type",
            "application/x-www-form-urlencoded; charset=utf-8".to_owned(),
        )];
        let request = SigningRequest {
            method: "GET",
            host: "iam.amazonaws.com",
            path: "/",
            query: &query,
            headers: &headers,
            payload_sha256: EMPTY_PAYLOAD_SHA256,
        };
        let scope = SigningScope {
            region: "us-east-1",
            service: "iam",
        };
        let added = sign_at(&request, scope, &example_credentials(), example_time())
            .expect("request signs");
        assert_eq!(header(&added, "x-amz-date"), Some("20150830T123600Z"));
        assert_eq!(
            header(&added, "authorization"),
            Some(
                "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/iam/aws4_request, \
                 SignedHeaders=content-type;host;x-amz-date, \
                 Signature=5d672d79c15b13162d9279b0855cfba6789a8edb4c82c400e06b5924a6f2b5d7"
            )
        );
    }

    #[test]
    fn session_token_is_signed_and_returned() {
        let credentials = example_credentials().with_session_token("session");
        let request = SigningRequest {
            method: "GET",
            host: "bucket.s3.us-east-1.amazonaws.com",
            path: "/index.html",
            query: &[],
            headers: &[],
            payload_sha256: EMPTY_PAYLOAD_SHA256,
        };
        let scope = SigningScope {
            region: "us-east-1",
            service: "s3",
        };
        let added = sign_at(&request, scope, &credentials, example_time()).expect("signs");
        assert_eq!(header(&added, "x-amz-security-token"), Some("session"));
        let authorization = header(&added, "authorization").expect("authorization header");
        assert!(authorization.contains("SignedHeaders=host;x-amz-date;x-amz-security-token"));
    }

    #[rstest]
    #[case::plain("index.html", "index.html")]
    #[case::nested("posts/a b/index.html", "posts/a%20b/index.html")]
    #[case::reserved("c++/notes?.md", "c%2B%2B/notes%3F.md")]
    #[case::unicode("café.html", "caf%C3%A9.html")]
    fn encode_path_keeps_separators(#[case] key: &str, #[case] expected: &str) {
        assert_eq!(encode_path(key), expected);
    }

    #[test]
    fn canonical_query_sorts_and_encodes() {
        let query = [
            ("prefix", "site/a b".to_owned()),
            ("list-type", "2".to_owned()),
        ];
        assert_eq!(canonical_query(&query), "list-type=2&prefix=site%2Fa%20b");
    }
}
