//! GET: introspection probe
//!
//! Always answers with redacted counts and mode; a verified signature
//! unlocks origin and identity metadata plus key hashes (never plaintext
//! key material).

use super::AppState;
use crate::signature;
use crate::{SignatureError, constants};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use chrono::Utc;
use serde::Serialize;

/// Introspection payload; authenticated fields are `None` unless a valid
/// signature was presented
#[derive(Debug, Serialize)]
pub(crate) struct Introspection {
    pub function_count: usize,
    pub has_event_key: bool,
    pub has_signing_key: bool,
    pub has_signing_key_fallback: bool,
    pub mode: String,
    pub schema_version: String,

    /// `None` when no signature was presented at all
    pub authentication_succeeded: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_origin: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_api_origin: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdk_language: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdk_version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub serve_origin: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub serve_path: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub signing_key_hash: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub signing_key_fallback_hash: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_key_hash: Option<String>,
}

/// Build the introspection payload
///
/// `authentication_succeeded` of `Some(true)` unlocks the identity and
/// key-hash fields.
pub(crate) fn inspection(state: &AppState, authentication_succeeded: Option<bool>) -> Introspection {
    let config = &state.config;
    let mut payload = Introspection {
        function_count: state.registry.len(),
        has_event_key: config.event_key.is_some(),
        has_signing_key: config.signing_key.is_some(),
        has_signing_key_fallback: config.signing_key_fallback.is_some(),
        mode: config.mode().to_string(),
        schema_version: constants::SCHEMA_VERSION.to_string(),
        authentication_succeeded,
        api_origin: None,
        event_api_origin: None,
        app_id: None,
        env: None,
        framework: None,
        sdk_language: None,
        sdk_version: None,
        serve_origin: None,
        serve_path: None,
        signing_key_hash: None,
        signing_key_fallback_hash: None,
        event_key_hash: None,
    };

    if authentication_succeeded == Some(true) {
        payload.api_origin = Some(config.api_origin());
        payload.event_api_origin = Some(config.event_api_origin());
        payload.app_id = Some(state.registry.app_id().to_string());
        payload.env = Some(config.environment.clone());
        payload.framework = Some(constants::SDK_FRAMEWORK.to_string());
        payload.sdk_language = Some(constants::SDK_LANGUAGE.to_string());
        payload.sdk_version = Some(env!("CARGO_PKG_VERSION").to_string());
        payload.serve_origin = config.serve_origin.clone();
        payload.serve_path = Some(config.serve_path());
        payload.signing_key_hash = config.signing_key.as_deref().map(signature::hashed_key);
        payload.signing_key_fallback_hash = config
            .signing_key_fallback
            .as_deref()
            .map(signature::hashed_key);
        payload.event_key_hash = config.event_key.as_deref().map(signature::hashed_key);
    }

    payload
}

pub(crate) async fn handle(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let authentication_succeeded = match headers
        .get(constants::HEADER_SIGNATURE)
        .and_then(|v| v.to_str().ok())
    {
        None => None,
        Some(header) => Some(verify_probe(&state, header, &body).is_ok()),
    };

    Json(inspection(&state, authentication_succeeded)).into_response()
}

fn verify_probe(state: &AppState, header: &str, body: &Bytes) -> Result<(), SignatureError> {
    let Some(key) = &state.config.signing_key else {
        return Err(SignatureError::NoSigningKey);
    };
    signature::verify(
        header,
        body,
        key,
        state.config.signing_key_fallback.as_deref(),
        Utc::now().timestamp(),
    )
}
