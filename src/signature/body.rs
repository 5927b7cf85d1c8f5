//! Gzip-aware request body decoding
//!
//! The orchestrator signs the wire payload, so signature verification must
//! see the body exactly as transmitted. Handlers therefore receive the raw
//! bytes first and only gunzip afterwards, when `Content-Encoding` says so.
//! Decompression never runs ahead of verification.

use crate::{InngestError, Result};
use axum::http::{HeaderMap, header};
use bytes::Bytes;
use flate2::read::GzDecoder;
use std::io::Read;

/// Decode raw wire bytes into the JSON payload bytes
///
/// Gunzips when the request carries `Content-Encoding: gzip`; passes the
/// bytes through untouched otherwise.
pub fn decode_body(headers: &HeaderMap, raw: &Bytes) -> Result<Vec<u8>> {
    if !is_gzip(headers) {
        return Ok(raw.to_vec());
    }

    let mut decoder = GzDecoder::new(raw.as_ref());
    let mut decoded = Vec::new();
    decoder
        .read_to_end(&mut decoded)
        .map_err(|e| InngestError::bad_request(format!("invalid gzip body: {}", e)))?;
    Ok(decoded)
}

fn is_gzip(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_ascii_lowercase().contains("gzip"))
        .unwrap_or(false)
}
