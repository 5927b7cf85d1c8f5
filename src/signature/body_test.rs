use super::body::decode_body;
use axum::http::{HeaderMap, HeaderValue, header};
use bytes::Bytes;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;

fn gzip(data: &[u8]) -> Bytes {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    Bytes::from(encoder.finish().unwrap())
}

#[test]
fn test_plain_body_passes_through() {
    let headers = HeaderMap::new();
    let raw = Bytes::from_static(br#"{"ok":true}"#);
    assert_eq!(decode_body(&headers, &raw).unwrap(), raw.to_vec());
}

#[test]
fn test_gzip_body_is_decompressed() {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));

    let plain = br#"{"event":{"name":"t/e"}}"#;
    let decoded = decode_body(&headers, &gzip(plain)).unwrap();
    assert_eq!(decoded, plain.to_vec());
}

#[test]
fn test_content_encoding_is_case_insensitive() {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static("GZIP"));

    let plain = b"payload";
    assert_eq!(decode_body(&headers, &gzip(plain)).unwrap(), plain.to_vec());
}

#[test]
fn test_invalid_gzip_is_bad_request() {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));

    let err = decode_body(&headers, &Bytes::from_static(b"not gzip")).unwrap_err();
    assert!(matches!(err, crate::InngestError::BadRequest(_)));
}
