//! Request signing (OAuth 1.0a, HMAC-SHA1).
//!
//! Every outgoing call, including the two anonymous handshake legs, goes
//! through [`RequestSigner`]. Signing follows the OAuth 1.0a recipe:
//!
//! ```text
//! params    = caller params + oauth_{nonce,timestamp,consumer_key,signature_method,version[,token]}
//! canonical = sort(enc(k)=enc(v)) joined by '&'
//! base      = "GET&" + enc(base_url) + "&" + enc(canonical)
//! key       = enc(consumer_secret) + "&" + enc(token_secret)     // token_secret may be ""
//! signature = base64(hmac_sha1(key, base))
//! ```
//!
//! `enc` is RFC 3986 percent-encoding: everything except `A-Z a-z 0-9 - . _ ~`
//! is escaped, including spaces (`%20`, never `+`).

use super::signature::{self, SignError};
use super::{ConsumerKey, TokenPair};
use rand::Rng;
use rand::rngs::OsRng;

pub const SIGNATURE_METHOD: &str = "HMAC-SHA1";
pub const OAUTH_VERSION: &str = "1.0";

/// Parameter names the signer owns. Caller-supplied values under these
/// names are discarded.
const SIGNER_PARAMS: [&str; 7] = [
    "oauth_nonce",
    "oauth_timestamp",
    "oauth_consumer_key",
    "oauth_signature_method",
    "oauth_version",
    "oauth_token",
    "oauth_signature",
];

/// Per-request nonce and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stamp {
    pub nonce: String,
    pub timestamp: i64,
}

impl Stamp {
    /// A 128-bit nonce from the OS random source and the current Unix time.
    pub fn fresh() -> Self {
        let nonce: u128 = OsRng.r#gen();
        Self {
            nonce: format!("{nonce:032x}"),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// A fully signed GET request. Built once per call and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    base_url: String,
    params: Vec<(String, String)>,
}

impl SignedRequest {
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn signature(&self) -> &str {
        self.param("oauth_signature").unwrap_or_default()
    }

    /// The request URL with every parameter, signature included, in the query.
    pub fn url(&self) -> String {
        format!("{}?{}", self.base_url, canonical_query(&self.params))
    }
}

#[derive(Debug, Clone)]
pub struct RequestSigner {
    consumer: ConsumerKey,
}

impl RequestSigner {
    pub fn new(consumer: ConsumerKey) -> Self {
        Self { consumer }
    }

    pub fn consumer_key(&self) -> &str {
        &self.consumer.key
    }

    /// Sign a call with a fresh nonce and timestamp and return its URL.
    ///
    /// `token` is `None` for the first handshake leg; the signing key then
    /// ends in a bare `&`.
    pub fn build_signed_url(
        &self,
        base_url: &str,
        method: &str,
        params: &[(String, String)],
        token: Option<&TokenPair>,
    ) -> Result<String, SignError> {
        self.sign_request(base_url, method, params, token, &Stamp::fresh())
            .map(|request| request.url())
    }

    /// Sign with an explicit stamp. Identical inputs give identical signatures.
    pub fn sign_request(
        &self,
        base_url: &str,
        method: &str,
        params: &[(String, String)],
        token: Option<&TokenPair>,
        stamp: &Stamp,
    ) -> Result<SignedRequest, SignError> {
        if !method.eq_ignore_ascii_case("GET") {
            return Err(SignError::Encoding(format!(
                "unsupported HTTP method {method:?}, only GET is signed"
            )));
        }
        validate_base_url(base_url)?;

        let mut all: Vec<(String, String)> = params
            .iter()
            .filter(|(k, _)| !SIGNER_PARAMS.contains(&k.as_str()))
            .cloned()
            .collect();
        all.push(("oauth_nonce".into(), stamp.nonce.clone()));
        all.push(("oauth_timestamp".into(), stamp.timestamp.to_string()));
        all.push(("oauth_consumer_key".into(), self.consumer.key.clone()));
        all.push(("oauth_signature_method".into(), SIGNATURE_METHOD.into()));
        all.push(("oauth_version".into(), OAUTH_VERSION.into()));
        if let Some(token) = token {
            all.push(("oauth_token".into(), token.token.clone()));
        }

        let base = base_string(base_url, &all);
        tracing::trace!(base_string = %base, "oauth base string");

        let key = signing_key(&self.consumer.secret, token.map(|t| t.secret.as_str()));
        let signature = signature::sign(key.as_bytes(), &base)?;
        all.push(("oauth_signature".into(), signature));

        Ok(SignedRequest {
            base_url: base_url.to_string(),
            params: all,
        })
    }
}

/// RFC 3986 percent-encoding of a single key or value.
pub fn percent_encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Encode each pair, sort by encoded key then value, join with `&`.
pub fn canonical_query(params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    encoded.sort();
    encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// `GET&enc(base_url)&enc(canonical_query)`.
pub fn base_string(base_url: &str, params: &[(String, String)]) -> String {
    format!(
        "GET&{}&{}",
        percent_encode(base_url),
        percent_encode(&canonical_query(params))
    )
}

fn signing_key(consumer_secret: &str, token_secret: Option<&str>) -> String {
    format!(
        "{}&{}",
        percent_encode(consumer_secret),
        percent_encode(token_secret.unwrap_or_default())
    )
}

/// Parse an `application/x-www-form-urlencoded` string (a query string or
/// an OAuth endpoint response body) into ordered pairs.
pub fn decode_query(query: &str) -> Result<Vec<(String, String)>, SignError> {
    query
        .trim()
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            Ok((decode_component(k)?, decode_component(v)?))
        })
        .collect()
}

fn decode_component(raw: &str) -> Result<String, SignError> {
    // A literal '+' is a form-encoded space; RFC 3986 output never has one.
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .map_err(|e| SignError::Encoding(format!("invalid percent-encoding in {raw:?}: {e}")))
}

fn validate_base_url(base_url: &str) -> Result<(), SignError> {
    let url = reqwest::Url::parse(base_url)
        .map_err(|e| SignError::Encoding(format!("invalid base URL {base_url:?}: {e}")))?;
    if url.query().is_some() || url.fragment().is_some() {
        return Err(SignError::Encoding(format!(
            "base URL {base_url:?} must not carry a query or fragment"
        )));
    }
    Ok(())
}
