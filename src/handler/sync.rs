//! PUT: sync the function catalog with the orchestrator
//!
//! Two flavors selected by the `X-Inngest-Sync-Kind: inband` header. In-band
//! returns the registration document directly (signed outside dev mode);
//! out-of-band pushes it to the orchestrator's `/fn/register` endpoint with
//! the derived bearer token.

use super::{AppError, AppState, introspect};
use crate::config::ServeMode;
use crate::function::{RegisteredFunction, Trigger};
use crate::function::options::{
    BatchEvents, Cancellation, Concurrency, Debounce, Idempotency, Priority, RateLimit, Throttle,
    Timeouts,
};
use crate::signature;
use crate::{InngestError, Result, constants};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::Json;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SyncQuery {
    #[serde(rename = "deployId")]
    pub(crate) deploy_id: Option<String>,
}

/// One function entry in the registration document
#[derive(Debug, Serialize)]
pub(crate) struct FunctionDocument {
    id: String,
    name: String,
    triggers: Vec<Trigger>,
    steps: BTreeMap<String, StepStub>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    concurrency: Vec<Concurrency>,

    #[serde(skip_serializing_if = "Option::is_none", rename = "rateLimit")]
    rate_limit: Option<RateLimit>,

    #[serde(skip_serializing_if = "Option::is_none")]
    throttle: Option<Throttle>,

    #[serde(skip_serializing_if = "Option::is_none")]
    debounce: Option<Debounce>,

    #[serde(skip_serializing_if = "Option::is_none", rename = "batchEvents")]
    batch_events: Option<BatchEvents>,

    #[serde(skip_serializing_if = "Option::is_none")]
    priority: Option<Priority>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    cancel: Vec<Cancellation>,

    #[serde(skip_serializing_if = "Option::is_none")]
    idempotency: Option<Idempotency>,

    #[serde(skip_serializing_if = "Option::is_none")]
    retries: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    timeouts: Option<Timeouts>,
}

/// Per-step stub telling the orchestrator how to reach a step over HTTP
#[derive(Debug, Serialize)]
struct StepStub {
    id: String,
    name: String,
    runtime: StepRuntime,
    retries: StepRetries,
}

#[derive(Debug, Serialize)]
struct StepRuntime {
    #[serde(rename = "type")]
    kind: String,
    url: String,
}

#[derive(Debug, Serialize)]
struct StepRetries {
    attempts: u32,
}

/// In-band registration response body
#[derive(Debug, Serialize)]
struct AppDocument {
    app_id: String,
    env: String,
    framework: String,
    functions: Vec<FunctionDocument>,
    inspection: introspect::Introspection,
    platform: String,
    sdk_author: String,
    sdk_language: String,
    sdk_version: String,
    url: String,
}

/// Out-of-band registration request body
#[derive(Debug, Serialize)]
struct RegisterRequest {
    url: String,
    deploy_type: String,
    framework: String,
    app_name: String,
    functions: Vec<FunctionDocument>,
    sdk: String,
    v: String,
}

#[derive(Debug, Default, Deserialize)]
struct RegisterResponse {
    #[serde(default)]
    modified: bool,
}

pub(crate) async fn handle(
    State(state): State<AppState>,
    Query(query): Query<SyncQuery>,
    headers: HeaderMap,
) -> Response {
    let in_band = headers
        .get(constants::HEADER_SYNC_KIND)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case(constants::SYNC_KIND_IN_BAND))
        .unwrap_or(false);

    let serve_url = serve_url(&state, &headers);
    let functions = function_documents(&state, &serve_url);

    if in_band {
        in_band_response(&state, serve_url, functions)
    } else {
        match out_of_band(&state, &headers, &query, serve_url, functions).await {
            Ok(response) => response,
            Err(e) => AppError(e).into_response(),
        }
    }
}

/// The URL the orchestrator should use to reach this service
///
/// Configured serve origin wins; otherwise the request's own scheme and
/// host, preferring `http` in dev to avoid TLS surprises.
fn serve_url(state: &AppState, headers: &HeaderMap) -> String {
    let path = state.config.serve_path();

    if let Some(origin) = &state.config.serve_origin {
        return format!("{}{}", origin.trim_end_matches('/'), path);
    }

    let host = headers
        .get(axum::http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");

    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| match state.config.mode() {
            ServeMode::Dev => "http".to_string(),
            ServeMode::Cloud => "https".to_string(),
        });

    format!("{}://{}{}", scheme, host, path)
}

/// Render every registered function, excluding cron-only functions in dev
/// when cron-in-dev is disabled
fn function_documents(state: &AppState, serve_url: &str) -> Vec<FunctionDocument> {
    let exclude_cron =
        state.config.mode() == ServeMode::Dev && state.config.disable_cron_triggers_in_dev;

    state
        .registry
        .list()
        .iter()
        .filter(|f| !(exclude_cron && f.is_cron_only()))
        .map(|f| function_document(f, serve_url))
        .collect()
}

fn function_document(function: &RegisteredFunction, serve_url: &str) -> FunctionDocument {
    let step_url = format!(
        "{}?{}={}&{}={}",
        serve_url,
        constants::QUERY_FN_ID,
        urlencoding::encode(&function.wire_id),
        constants::QUERY_STEP_ID,
        constants::DEFAULT_STEP_ID,
    );

    let mut steps = BTreeMap::new();
    steps.insert(
        constants::DEFAULT_STEP_ID.to_string(),
        StepStub {
            id: constants::DEFAULT_STEP_ID.to_string(),
            name: constants::DEFAULT_STEP_ID.to_string(),
            runtime: StepRuntime {
                kind: "http".to_string(),
                url: step_url,
            },
            retries: StepRetries {
                attempts: function.options.max_attempts(),
            },
        },
    );

    let options = &function.options;
    FunctionDocument {
        id: function.wire_id.clone(),
        name: function.name.clone(),
        triggers: function.triggers.clone(),
        steps,
        concurrency: options.concurrency.clone(),
        rate_limit: options.rate_limit.clone(),
        throttle: options.throttle.clone(),
        debounce: options.debounce.clone(),
        batch_events: options.batch_events.clone(),
        priority: options.priority.clone(),
        cancel: options.cancel_on.clone(),
        idempotency: options.idempotency.clone(),
        retries: options.retries,
        timeouts: options.timeouts.clone(),
    }
}

/// Respond with the registration document directly, signed outside dev mode
fn in_band_response(
    state: &AppState,
    serve_url: String,
    functions: Vec<FunctionDocument>,
) -> Response {
    let document = AppDocument {
        app_id: state.registry.app_id().to_string(),
        env: state.config.environment.clone(),
        framework: constants::SDK_FRAMEWORK.to_string(),
        functions,
        inspection: introspect::inspection(state, Some(true)),
        platform: String::new(),
        sdk_author: constants::SDK_AUTHOR.to_string(),
        sdk_language: constants::SDK_LANGUAGE.to_string(),
        sdk_version: env!("CARGO_PKG_VERSION").to_string(),
        url: serve_url,
    };

    let body = match serde_json::to_vec(&document) {
        Ok(body) => body,
        Err(e) => return AppError(e.into()).into_response(),
    };

    let mut response = (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        )],
        body.clone(),
    )
        .into_response();

    response.headers_mut().insert(
        constants::HEADER_SYNC_KIND,
        HeaderValue::from_static(constants::SYNC_KIND_IN_BAND),
    );

    // Sign the response so the orchestrator can authenticate the catalog.
    if state.config.mode() == ServeMode::Cloud
        && let Some(key) = &state.config.signing_key
    {
        match signature::sign_response(&body, Utc::now().timestamp(), key) {
            Ok(signed) => {
                if let Ok(value) = HeaderValue::from_str(&signed) {
                    response
                        .headers_mut()
                        .insert(constants::HEADER_SIGNATURE, value);
                }
            }
            Err(e) => tracing::warn!("failed to sign sync response: {}", e),
        }
    }

    response
}

/// Push the registration document to the orchestrator's API
async fn out_of_band(
    state: &AppState,
    headers: &HeaderMap,
    query: &SyncQuery,
    serve_url: String,
    functions: Vec<FunctionDocument>,
) -> Result<Response> {
    let document = RegisterRequest {
        url: serve_url,
        deploy_type: "ping".to_string(),
        framework: constants::SDK_FRAMEWORK.to_string(),
        app_name: state.registry.app_id().to_string(),
        functions,
        sdk: constants::sdk_label(),
        v: "0.1".to_string(),
    };

    let mut url = format!("{}{}", state.config.api_origin(), constants::REGISTER_PATH);
    if let Some(deploy_id) = &query.deploy_id {
        url = format!(
            "{}?{}={}",
            url,
            constants::QUERY_DEPLOY_ID,
            urlencoding::encode(deploy_id)
        );
    }

    let mut request = state.http.post(&url).json(&document);
    if let Some(key) = &state.config.signing_key {
        request = request.bearer_auth(signature::bearer_token(key)?);
    }
    if let Some(kind) = headers
        .get(constants::HEADER_SERVER_KIND)
        .and_then(|v| v.to_str().ok())
    {
        request = request.header(constants::HEADER_EXPECTED_SERVER_KIND, kind);
    }

    tracing::debug!(url = %url, "registering functions out-of-band");
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(InngestError::handler(format!(
            "registration failed: {} {}",
            status, body
        )));
    }

    let parsed: RegisterResponse = response.json().await.unwrap_or_default();
    Ok(Json(serde_json::json!({
        "message": "Successfully registered",
        "modified": parsed.modified,
    }))
    .into_response())
}
