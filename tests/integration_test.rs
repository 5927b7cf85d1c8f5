//! End-to-end protocol tests
//!
//! Drives the invocation endpoint the way the orchestrator does: repeated
//! POSTs with a growing memo table until the function completes, plus the
//! registration and signature flows around it.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use flate2::Compression;
use flate2::write::GzEncoder;
use inngest::{
    Concurrency, Config, FunctionInput, FunctionOptions, FunctionRegistry, InngestError, Trigger,
    create_function,
};
use serde_json::{Value, json};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn step_registry() -> FunctionRegistry {
    let mut registry = FunctionRegistry::new("app");

    registry
        .register(create_function(
            FunctionOptions::new("stepfn").trigger(Trigger::event("t/e")),
            |input: FunctionInput<Value>| async move {
                let a: String = input
                    .step
                    .run("s1", || async { Ok("step 1 result".to_string()) })
                    .await?;
                let b: String = input
                    .step
                    .run("s2", || async move { Ok(format!("combined: {}", a)) })
                    .await?;
                Ok(json!({ "final": b }))
            },
        ))
        .unwrap();

    registry
        .register(create_function(
            FunctionOptions::new("rejects"),
            |input: FunctionInput<Value>| async move {
                let _: Value = input
                    .step
                    .run("validate", || async {
                        Err(InngestError::non_retriable("order is malformed"))
                    })
                    .await?;
                Ok(Value::Null)
            },
        ))
        .unwrap();

    registry
        .register(create_function(
            FunctionOptions::new("backs-off"),
            |input: FunctionInput<Value>| async move {
                let _: Value = input
                    .step
                    .run("call-upstream", || async {
                        Err(InngestError::retry_after(
                            "upstream rate limit",
                            Duration::from_secs(60),
                        ))
                    })
                    .await?;
                Ok(Value::Null)
            },
        ))
        .unwrap();

    registry
        .register(create_function(
            FunctionOptions::new("renders")
                .concurrency(Concurrency::keyed(1, "event.data.paymentId"))
                .concurrency(Concurrency::limit(5)),
            |_input: FunctionInput<Value>| async move { Ok(Value::Null) },
        ))
        .unwrap();

    registry
}

fn app(config: Config) -> Router {
    inngest::handler::router(Arc::new(config), Arc::new(step_registry()))
}

fn post(fn_id: &str, steps: Value) -> Request<Body> {
    let body = json!({
        "ctx": { "fn_id": fn_id, "run_id": "r1", "attempt": 0, "step_id": "step" },
        "event": { "name": "t/e", "data": { "value": "test" } },
        "events": [{ "name": "t/e", "data": { "value": "test" } }],
        "steps": steps,
    });
    Request::builder()
        .method("POST")
        .uri(format!("/api/inngest?fnId={}", fn_id))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn first_call_with_empty_memo_announces_s1() {
    let response = app(Config::default())
        .oneshot(post("app-stepfn", json!({})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        body_json(response).await,
        json!([{ "id": "s1", "op": "StepRun", "data": "step 1 result" }])
    );
}

#[tokio::test]
async fn second_call_with_s1_memoized_announces_s2() {
    let response = app(Config::default())
        .oneshot(post("app-stepfn", json!({ "s1": "step 1 result" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        body_json(response).await,
        json!([{ "id": "s2", "op": "StepRun", "data": "combined: step 1 result" }])
    );
}

#[tokio::test]
async fn final_call_with_both_memoized_completes() {
    let response = app(Config::default())
        .oneshot(post(
            "app-stepfn",
            json!({ "s1": "step 1 result", "s2": "combined: step 1 result" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({ "final": "combined: step 1 result" })
    );
}

#[tokio::test]
async fn a_full_run_drives_to_completion() {
    // Replay the orchestrator loop: execute, record the announced op,
    // re-invoke with the augmented memo table.
    let mut steps = serde_json::Map::new();

    loop {
        let response = app(Config::default())
            .oneshot(post("app-stepfn", Value::Object(steps.clone())))
            .await
            .unwrap();

        match response.status() {
            StatusCode::PARTIAL_CONTENT => {
                let ops = body_json(response).await;
                let op = &ops.as_array().unwrap()[0];
                let id = op["id"].as_str().unwrap().to_string();
                assert!(
                    !steps.contains_key(&id),
                    "step id announced twice: {}",
                    id
                );
                steps.insert(id, op["data"].clone());
            }
            StatusCode::OK => {
                assert_eq!(
                    body_json(response).await,
                    json!({ "final": "combined: step 1 result" })
                );
                break;
            }
            other => panic!("unexpected status {}", other),
        }

        assert!(steps.len() <= 2, "run did not converge");
    }
}

#[tokio::test]
async fn non_retriable_step_error_is_400_no_retry() {
    let response = app(Config::default())
        .oneshot(post("app-rejects", json!({})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.headers().get("x-inngest-no-retry").unwrap(), "true");
    let body = body_json(response).await;
    assert_eq!(body["name"], "NonRetriableError");
    assert_eq!(body["message"], "order is malformed");
}

#[tokio::test]
async fn retry_after_step_error_is_500_with_delay() {
    let response = app(Config::default())
        .oneshot(post("app-backs-off", json!({})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.headers().get("x-inngest-no-retry").unwrap(),
        "false"
    );
    assert_eq!(response.headers().get("retry-after").unwrap(), "60");
}

#[tokio::test]
async fn gzip_bodies_verify_over_wire_bytes() {
    let key = "signkey-prod-abc";
    let config = Config {
        is_dev: Some(false),
        signing_key: Some(key.to_string()),
        ..Config::default()
    };

    let plain = json!({
        "ctx": { "fn_id": "app-stepfn", "run_id": "r1" },
        "event": { "name": "t/e", "data": { "value": "test" } },
        "steps": {},
    })
    .to_string();

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(plain.as_bytes()).unwrap();
    let compressed = encoder.finish().unwrap();

    let ts = chrono::Utc::now().timestamp();

    // Signed over the compressed wire bytes: accepted and decompressed.
    let header = format!(
        "t={}&s={}",
        ts,
        inngest::signature::sign(&compressed, ts, key)
    );
    let request = Request::builder()
        .method("POST")
        .uri("/api/inngest?fnId=app-stepfn")
        .header("content-type", "application/json")
        .header("content-encoding", "gzip")
        .header("x-inngest-signature", header)
        .body(Body::from(compressed.clone()))
        .unwrap();
    let response = app(config.clone()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);

    // Signed over the decompressed body: rejected before user code runs.
    let wrong = format!(
        "t={}&s={}",
        ts,
        inngest::signature::sign(plain.as_bytes(), ts, key)
    );
    let request = Request::builder()
        .method("POST")
        .uri("/api/inngest?fnId=app-stepfn")
        .header("content-type", "application/json")
        .header("content-encoding", "gzip")
        .header("x-inngest-signature", wrong)
        .body(Body::from(compressed))
        .unwrap();
    let response = app(config).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn registration_renders_concurrency_in_declared_order() {
    let request = Request::builder()
        .method("PUT")
        .uri("/api/inngest")
        .header("host", "fns.example.com")
        .header("x-inngest-sync-kind", "inband")
        .body(Body::empty())
        .unwrap();

    let response = app(Config::default()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let renders = body["functions"]
        .as_array()
        .unwrap()
        .iter()
        .find(|f| f["id"] == "app-renders")
        .expect("renders function registered");

    assert_eq!(
        renders["concurrency"],
        json!([{ "limit": 1, "key": "event.data.paymentId" }, { "limit": 5 }])
    );
}

#[tokio::test]
async fn introspection_reports_function_count() {
    let request = Request::builder()
        .method("GET")
        .uri("/api/inngest")
        .body(Body::empty())
        .unwrap();

    let response = app(Config::default()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["function_count"], 4);
    assert_eq!(body["mode"], "dev");
    assert_eq!(body["authentication_succeeded"], Value::Null);
}
