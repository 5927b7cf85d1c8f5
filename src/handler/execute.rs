//! POST: execute an invocation
//!
//! Verifies the signature over the raw wire bytes, reconstructs the memo
//! table, resolves the target function, runs the user handler, and maps
//! the outcome onto the protocol's status/header table.

use super::AppState;
use crate::config::ServeMode;
use crate::event::Event;
use crate::function::{HandlerArgs, RunContext};
use crate::signature::{self, body::decode_body};
use crate::step::StepTool;
use crate::{InngestError, Result, constants};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ExecuteQuery {
    #[serde(rename = "fnId")]
    pub(crate) fn_id: Option<String>,

    // Accepted for wire compatibility; execution is driven by the memo
    // table, not the step id.
    #[serde(rename = "stepId")]
    #[allow(dead_code)]
    pub(crate) step_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ExecuteCtx {
    #[serde(default)]
    pub(crate) run_id: String,

    #[serde(default)]
    pub(crate) attempt: u32,

    pub(crate) fn_id: Option<String>,

    #[serde(default)]
    #[allow(dead_code)]
    pub(crate) disable_immediate_execution: bool,

    /// The body is a stub; refetch the batch and memo table from the API.
    #[serde(default)]
    pub(crate) use_api: bool,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ExecuteRequest {
    pub(crate) event: Option<Event>,

    #[serde(default)]
    pub(crate) events: Vec<Event>,

    #[serde(default)]
    pub(crate) steps: HashMap<String, Value>,

    #[serde(default)]
    pub(crate) ctx: ExecuteCtx,
}

pub(crate) async fn handle(
    State(state): State<AppState>,
    Query(query): Query<ExecuteQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    // Verification failures are retriable server errors on this verb:
    // invoking user code without a valid signature is never an option.
    if state.config.mode() == ServeMode::Cloud
        && let Err(e) = verify_request(&state, &headers, &body)
    {
        tracing::warn!("rejecting execution request: {}", e);
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(e.to_detail())).into_response();
    }

    match run(state, query, headers, body).await {
        Ok(response) => response,
        Err(e) => outcome_response(Err(e)),
    }
}

fn verify_request(state: &AppState, headers: &HeaderMap, body: &Bytes) -> Result<()> {
    let Some(key) = &state.config.signing_key else {
        return Err(crate::SignatureError::NoSigningKey.into());
    };
    let header = headers
        .get(constants::HEADER_SIGNATURE)
        .and_then(|v| v.to_str().ok())
        .ok_or(crate::SignatureError::MissingHeader)?;

    signature::verify(
        header,
        body,
        key,
        state.config.signing_key_fallback.as_deref(),
        Utc::now().timestamp(),
    )
    .map_err(InngestError::from)
}

async fn run(
    state: AppState,
    query: ExecuteQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let payload = decode_body(&headers, &body)?;
    let request: ExecuteRequest = serde_json::from_slice(&payload)
        .map_err(|e| InngestError::bad_request(format!("invalid request body: {}", e)))?;

    let fn_id = query
        .fn_id
        .or_else(|| request.ctx.fn_id.clone())
        .ok_or_else(|| InngestError::bad_request("missing fnId"))?;

    let function = state
        .registry
        .lookup(&fn_id)
        .or_else(|| {
            // Accept an app-local id as a fallback.
            state
                .registry
                .lookup(&format!("{}-{}", state.registry.app_id(), fn_id))
        })
        .ok_or_else(|| InngestError::UnknownFunction(fn_id.clone()))?;

    let (mut events, steps) = if request.ctx.use_api {
        fetch_run_state(&state, &request.ctx.run_id).await?
    } else {
        (request.events, request.steps)
    };

    let event = request
        .event
        .or_else(|| events.first().cloned())
        .ok_or_else(|| InngestError::bad_request("missing event"))?;
    if events.is_empty() {
        events.push(event.clone());
    }

    let ctx = RunContext {
        run_id: request.ctx.run_id,
        function_id: function.wire_id.clone(),
        attempt: request.ctx.attempt,
        max_attempts: function.options.max_attempts(),
        is_replay: !steps.is_empty(),
    };

    tracing::debug!(
        function = %function.wire_id,
        run = %ctx.run_id,
        attempt = ctx.attempt,
        memoized = steps.len(),
        "executing function"
    );

    let step = StepTool::new(steps, state.events.clone());
    let result = (function.handler)(HandlerArgs {
        event,
        events,
        step,
        ctx,
    })
    .await;

    Ok(outcome_response(result))
}

/// Map a handler outcome onto the protocol response table
fn outcome_response(result: Result<Value>) -> Response {
    match result {
        Ok(value) => (StatusCode::OK, Json(value)).into_response(),

        Err(InngestError::Interrupt(op)) => {
            (StatusCode::PARTIAL_CONTENT, Json(vec![*op])).into_response()
        }

        Err(e @ InngestError::UnknownFunction(_)) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),

        Err(e @ InngestError::BadRequest(_)) => {
            (StatusCode::BAD_REQUEST, Json(e.to_detail())).into_response()
        }

        Err(e @ InngestError::NonRetriable { .. }) => (
            StatusCode::BAD_REQUEST,
            [(constants::HEADER_NO_RETRY, "true")],
            Json(e.to_detail()),
        )
            .into_response(),

        Err(InngestError::RetryAfter {
            name,
            message,
            delay,
        }) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [
                (constants::HEADER_NO_RETRY, "false".to_string()),
                (constants::HEADER_RETRY_AFTER, delay.as_secs().to_string()),
            ],
            Json(crate::step::ErrorDetail {
                name,
                message,
                stack: None,
            }),
        )
            .into_response(),

        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(constants::HEADER_NO_RETRY, "false")],
            Json(e.to_detail()),
        )
            .into_response(),
    }
}

/// Refetch the event batch and memo table from the orchestrator's REST API
/// when the request body is a stub (`ctx.use_api`)
async fn fetch_run_state(
    state: &AppState,
    run_id: &str,
) -> Result<(Vec<Event>, HashMap<String, Value>)> {
    let origin = state.config.api_origin();

    let batch_url = format!("{}/v0/runs/{}/batch", origin, run_id);
    let actions_url = format!("{}/v0/runs/{}/actions", origin, run_id);

    let events: Vec<Event> = fetch_json(state, &batch_url).await?;
    let steps: HashMap<String, Value> = fetch_json(state, &actions_url).await?;

    Ok((events, steps))
}

async fn fetch_json<T: serde::de::DeserializeOwned>(state: &AppState, url: &str) -> Result<T> {
    let mut request = state.http.get(url);
    if let Some(key) = &state.config.signing_key {
        request = request.bearer_auth(signature::bearer_token(key)?);
    }

    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(InngestError::handler(format!(
            "run state fetch failed: {} {}",
            status, url
        )));
    }
    response.json::<T>().await.map_err(InngestError::from)
}
