use super::*;
use crate::SignatureError;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;

const KEY: &str = "signkey-test-12345678901234567890123456789012";

fn now() -> i64 {
    1700000000
}

fn header_for(body: &[u8], ts: i64, key: &str) -> String {
    format!("t={}&s={}", ts, sign(body, ts, key))
}

#[test]
fn test_normalize_strips_prefix() {
    assert_eq!(
        normalize_key("signkey-prod-abc"),
        "abc",
        "env prefix is stripped"
    );
    assert_eq!(normalize_key("signkey-test-00ff"), "00ff");
    assert_eq!(normalize_key("00ff"), "00ff");
}

#[test]
fn test_normalize_is_idempotent() {
    let once = normalize_key(KEY);
    assert_eq!(normalize_key(once), once);
}

#[test]
fn test_key_prefix() {
    assert_eq!(key_prefix("signkey-prod-abc"), Some("signkey-prod"));
    assert_eq!(key_prefix("abc"), None);
}

#[test]
fn test_sign_uses_normalized_key() {
    let body = br#"{"event":{}}"#;
    assert_eq!(sign(body, now(), KEY), sign(body, now(), normalize_key(KEY)));
}

#[test]
fn test_verify_roundtrip() {
    let body = br#"{"event":{"name":"t/e"}}"#;
    let header = header_for(body, now(), KEY);
    verify(&header, body, KEY, None, now()).unwrap();
}

#[test]
fn test_verify_rejects_altered_body() {
    let body = br#"{"event":{"name":"t/e"}}"#;
    let header = header_for(body, now(), KEY);

    let mut altered = body.to_vec();
    altered[0] ^= 0x01;
    assert!(matches!(
        verify(&header, &altered, KEY, None, now()),
        Err(SignatureError::Mismatch)
    ));
}

#[test]
fn test_verify_rejects_altered_timestamp_and_key() {
    let body = b"payload";
    let header = header_for(body, now(), KEY);

    let forged = format!("t={}&s={}", now() + 1, sign(body, now(), KEY));
    assert!(verify(&forged, body, KEY, None, now()).is_err());

    assert!(matches!(
        verify(&header, body, "signkey-test-deadbeef", None, now()),
        Err(SignatureError::Mismatch)
    ));
}

#[test]
fn test_verify_tries_fallback_key() {
    let body = b"payload";
    let old_key = "signkey-test-cafecafe";
    let header = header_for(body, now(), old_key);

    assert!(verify(&header, body, KEY, None, now()).is_err());
    verify(&header, body, KEY, Some(old_key), now()).unwrap();
}

#[test]
fn test_verify_enforces_replay_window() {
    let body = b"payload";

    let stale = header_for(body, now() - 301, KEY);
    assert!(matches!(
        verify(&stale, body, KEY, None, now()),
        Err(SignatureError::Expired)
    ));

    // The window is symmetric around "now".
    let future = header_for(body, now() + 301, KEY);
    assert!(matches!(
        verify(&future, body, KEY, None, now()),
        Err(SignatureError::Expired)
    ));

    let fresh = header_for(body, now() - 299, KEY);
    verify(&fresh, body, KEY, None, now()).unwrap();
}

#[test]
fn test_malformed_headers_rejected() {
    for header in ["", "t=abc&s=00", "s=00", "t=123", "nonsense"] {
        assert!(
            matches!(
                parse_header(header),
                Err(SignatureError::MalformedHeader(_))
            ),
            "{:?}",
            header
        );
    }
}

#[test]
fn test_signature_over_gzip_covers_wire_bytes() {
    let plain = br#"{"event":{"name":"t/e"}}"#;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(plain).unwrap();
    let compressed = encoder.finish().unwrap();

    let header = header_for(&compressed, now(), "signkey-prod-abc");

    // Verification over the raw (compressed) bytes succeeds; the same
    // signature over the decompressed body does not.
    verify(&header, &compressed, "signkey-prod-abc", None, now()).unwrap();
    assert!(verify(&header, plain, "signkey-prod-abc", None, now()).is_err());
    assert_ne!(
        sign(&compressed, now(), "abc"),
        sign(plain, now(), "abc")
    );
}

#[test]
fn test_bearer_token_derivation() {
    use sha2::{Digest, Sha256};

    let token = bearer_token("signkey-prod-00ff").unwrap();
    let expected = format!(
        "signkey-prod-{}",
        hex::encode(Sha256::digest(hex::decode("00ff").unwrap()))
    );
    assert_eq!(token, expected);

    assert!(matches!(
        bearer_token("signkey-prod-nothex"),
        Err(SignatureError::InvalidKey(_))
    ));
}

#[test]
fn test_sign_response_uses_hex_decoded_key() {
    let signed = sign_response(b"{}", now(), "signkey-test-00ff").unwrap();
    assert!(signed.starts_with(&format!("t={}&s=", now())));

    assert!(sign_response(b"{}", now(), "signkey-test-zz").is_err());
}

#[test]
fn test_hashed_key_is_hex_lowercase_sha256() {
    let hash = hashed_key("secret");
    assert_eq!(hash.len(), 64);
    assert_eq!(hash, hash.to_lowercase());
    assert_eq!(
        hash,
        "2bb80d537b1da3e38bd30361aa855686bde0eacd7162fef6a25fe97bf527a25b"
    );
}
