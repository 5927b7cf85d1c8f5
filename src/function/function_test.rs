use super::*;
use crate::step::StepTool;
use serde_json::json;
use std::collections::HashMap;

#[derive(Debug, serde::Deserialize)]
struct SignupData {
    user_id: String,
}

impl EventPayload for SignupData {
    const EVENT_NAME: Option<&'static str> = Some("user/signed.up");
}

fn args(event: Event) -> HandlerArgs {
    HandlerArgs {
        events: vec![event.clone()],
        event,
        step: StepTool::new(HashMap::new(), None),
        ctx: RunContext {
            run_id: "r1".to_string(),
            function_id: "app-f".to_string(),
            attempt: 0,
            max_attempts: 4,
            is_replay: false,
        },
    }
}

#[tokio::test]
async fn test_handler_receives_typed_payload() {
    let function = create_function(
        FunctionOptions::new("welcome"),
        |input: FunctionInput<SignupData>| async move {
            Ok(json!({ "greeting": format!("hello {}", input.data.user_id) }))
        },
    );

    let event = Event::new("user/signed.up", json!({ "user_id": "u1" }));
    let out = (function.handler)(args(event)).await.unwrap();
    assert_eq!(out["greeting"], "hello u1");
}

#[tokio::test]
async fn test_handler_decode_failure_is_bad_request() {
    let function = create_function(
        FunctionOptions::new("welcome"),
        |_input: FunctionInput<SignupData>| async move { Ok(Value::Null) },
    );

    let event = Event::new("user/signed.up", json!({ "wrong": true }));
    let err = (function.handler)(args(event)).await.unwrap_err();
    assert!(matches!(err, InngestError::BadRequest(_)));
}

#[test]
fn test_payload_event_name_is_captured() {
    let typed = create_function(
        FunctionOptions::new("welcome"),
        |_input: FunctionInput<SignupData>| async move { Ok(Value::Null) },
    );
    assert_eq!(typed.payload_event_name, Some("user/signed.up"));

    let untyped = create_function(
        FunctionOptions::new("anything"),
        |_input: FunctionInput<Value>| async move { Ok(Value::Null) },
    );
    assert_eq!(untyped.payload_event_name, None);
}

#[tokio::test]
async fn test_failure_handler_decodes_failure_event() {
    let function = create_function_with_failure(
        FunctionOptions::new("fragile"),
        |_input: FunctionInput<Value>| async move { Ok(Value::Null) },
        |failure: FailureInput| async move {
            Ok(json!({
                "failed_function": failure.function_id,
                "failed_run": failure.run_id,
                "reason": failure.error.message,
                "original": failure.event.name,
            }))
        },
    );

    let failed_event = Event::new(
        crate::constants::FN_FAILED_EVENT,
        json!({
            "function_id": "app-fragile",
            "run_id": "r9",
            "error": { "name": "Error", "message": "exhausted" },
            "event": { "name": "t/e", "data": { "n": 1 } },
        }),
    );

    let handler = function.failure_handler.as_ref().unwrap();
    let out = handler(args(failed_event)).await.unwrap();
    assert_eq!(out["failed_function"], "app-fragile");
    assert_eq!(out["failed_run"], "r9");
    assert_eq!(out["reason"], "exhausted");
    assert_eq!(out["original"], "t/e");
}

#[test]
fn test_is_final_attempt() {
    let ctx = |attempt, max_attempts| RunContext {
        run_id: "r".to_string(),
        function_id: "f".to_string(),
        attempt,
        max_attempts,
        is_replay: false,
    };

    assert!(!ctx(0, 4).is_final_attempt());
    assert!(!ctx(2, 4).is_final_attempt());
    assert!(ctx(3, 4).is_final_attempt());
    assert!(ctx(0, 1).is_final_attempt());
}

#[test]
fn test_default_max_attempts() {
    assert_eq!(FunctionOptions::new("f").max_attempts(), 4);
    assert_eq!(FunctionOptions::new("f").retries(10).max_attempts(), 10);
}
