//! Request signing and verification
//!
//! The orchestrator signs inbound requests as
//! `HMAC-SHA256(body_bytes ∥ timestamp_ascii, normalized_key)` and carries
//! the result in `X-Inngest-Signature: t={unix_seconds}&s={hex_lower}`.
//! Verification always runs over the raw wire bytes, before any
//! decompression. The same key material derives the bearer token used for
//! outbound registration.

pub mod body;

use crate::SignatureError;
use crate::constants;
use hmac::{Hmac, Mac};
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

static SIGNKEY_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^signkey-\w+-").expect("static regex"));

/// Parsed `t=…&s=…` signature header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    /// Unix seconds at signing time
    pub timestamp: i64,

    /// Hex-lowercase HMAC digest
    pub signature: String,
}

/// Strip the `signkey-{env}-` prefix from a signing key
///
/// Idempotent: normalizing an already-normalized key is a no-op.
pub fn normalize_key(key: &str) -> &str {
    match SIGNKEY_PREFIX.find(key) {
        Some(m) => &key[m.end()..],
        None => key,
    }
}

/// The `signkey-{env}` prefix of a key, when present
pub fn key_prefix(key: &str) -> Option<&str> {
    SIGNKEY_PREFIX
        .find(key)
        .map(|m| m.as_str().trim_end_matches('-'))
}

/// Sign body bytes with a timestamp, returning the hex digest
pub fn sign(body: &[u8], timestamp: i64, key: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(normalize_key(key).as_bytes())
        .expect("hmac accepts keys of any length");
    mac.update(body);
    mac.update(timestamp.to_string().as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Parse an `X-Inngest-Signature` header value
pub fn parse_header(value: &str) -> Result<SignatureHeader, SignatureError> {
    let mut timestamp = None;
    let mut signature = None;

    for pair in value.split('&') {
        let Some((k, v)) = pair.split_once('=') else {
            return Err(SignatureError::MalformedHeader(value.to_string()));
        };
        match k {
            "t" => {
                timestamp = Some(
                    v.parse::<i64>()
                        .map_err(|_| SignatureError::MalformedHeader(value.to_string()))?,
                )
            }
            "s" => signature = Some(v.to_string()),
            _ => {}
        }
    }

    match (timestamp, signature) {
        (Some(timestamp), Some(signature)) => Ok(SignatureHeader {
            timestamp,
            signature,
        }),
        _ => Err(SignatureError::MalformedHeader(value.to_string())),
    }
}

/// Verify a signature header against raw body bytes
///
/// Checks the replay window, then the primary key, then the fallback.
/// Comparison is constant-time.
pub fn verify(
    header: &str,
    body: &[u8],
    signing_key: &str,
    fallback_key: Option<&str>,
    now: i64,
) -> Result<(), SignatureError> {
    let parsed = parse_header(header)?;

    if (now - parsed.timestamp).abs() > constants::SIGNATURE_REPLAY_WINDOW_SECS {
        return Err(SignatureError::Expired);
    }

    if matches(body, parsed.timestamp, signing_key, &parsed.signature) {
        return Ok(());
    }
    if let Some(fallback) = fallback_key
        && matches(body, parsed.timestamp, fallback, &parsed.signature)
    {
        return Ok(());
    }

    Err(SignatureError::Mismatch)
}

fn matches(body: &[u8], timestamp: i64, key: &str, signature: &str) -> bool {
    let expected = sign(body, timestamp, key);
    expected.as_bytes().ct_eq(signature.as_bytes()).into()
}

/// Sign an SDK response body (in-band sync)
///
/// The response digest covers the timestamp concatenated with the body,
/// keyed with the hex-decoded normalized signing key.
pub fn sign_response(body: &[u8], timestamp: i64, key: &str) -> Result<String, SignatureError> {
    let raw_key = hex::decode(normalize_key(key))
        .map_err(|e| SignatureError::InvalidKey(e.to_string()))?;
    let mut mac =
        HmacSha256::new_from_slice(&raw_key).expect("hmac accepts keys of any length");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(body);
    let digest = hex::encode(mac.finalize().into_bytes());
    Ok(format!("t={}&s={}", timestamp, digest))
}

/// Bearer token for outbound registration:
/// `{prefix}-{hex(sha256(unhex(normalized_key)))}`
pub fn bearer_token(key: &str) -> Result<String, SignatureError> {
    let normalized = normalize_key(key);
    let raw = hex::decode(normalized).map_err(|e| SignatureError::InvalidKey(e.to_string()))?;
    let hashed = hex::encode(Sha256::digest(&raw));
    match key_prefix(key) {
        Some(prefix) => Ok(format!("{}-{}", prefix, hashed)),
        None => Ok(hashed),
    }
}

/// Hex-lowercase SHA-256 of a configured key, for redacted introspection
/// output
pub fn hashed_key(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

#[cfg(test)]
mod body_test;
#[cfg(test)]
mod signature_test;
