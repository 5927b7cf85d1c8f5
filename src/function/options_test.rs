use super::options::*;
use serde_json::json;

#[test]
fn test_idempotency_without_period_is_a_bare_string() {
    let idempotency = Idempotency::key("event.data.orderId");
    let wire = serde_json::to_value(&idempotency).unwrap();
    assert_eq!(wire, json!("event.data.orderId"));
}

#[test]
fn test_idempotency_with_period_is_key_ttl() {
    let idempotency = Idempotency::with_period("event.data.orderId", "24h");
    let wire = serde_json::to_value(&idempotency).unwrap();
    assert_eq!(wire, json!({ "key": "event.data.orderId", "ttl": "24h" }));
}

#[test]
fn test_idempotency_deserializes_both_shapes() {
    let bare: Idempotency = serde_json::from_value(json!("k")).unwrap();
    assert_eq!(bare, Idempotency::key("k"));

    let object: Idempotency = serde_json::from_value(json!({ "key": "k", "ttl": "1h" })).unwrap();
    assert_eq!(object, Idempotency::with_period("k", "1h"));
}

#[test]
fn test_concurrency_skips_absent_fields() {
    let wire = serde_json::to_value(Concurrency::limit(5)).unwrap();
    assert_eq!(wire, json!({ "limit": 5 }));

    let wire = serde_json::to_value(Concurrency::keyed(1, "event.data.paymentId")).unwrap();
    assert_eq!(wire, json!({ "limit": 1, "key": "event.data.paymentId" }));
}

#[test]
fn test_concurrency_scope_wire_names() {
    let mut concurrency = Concurrency::limit(2);
    concurrency.scope = Some(ConcurrencyScope::Account);
    let wire = serde_json::to_value(&concurrency).unwrap();
    assert_eq!(wire["scope"], "account");

    assert_eq!(
        serde_json::to_value(ConcurrencyScope::Fn).unwrap(),
        json!("fn")
    );
    assert_eq!(
        serde_json::to_value(ConcurrencyScope::Env).unwrap(),
        json!("env")
    );
}

#[test]
fn test_batch_events_wire_names() {
    let batch = BatchEvents {
        max_size: 25,
        timeout: Some("10s".to_string()),
        key: None,
    };
    let wire = serde_json::to_value(&batch).unwrap();
    assert_eq!(wire, json!({ "maxSize": 25, "timeout": "10s" }));
}

#[test]
fn test_cancellation_if_wire_name() {
    let cancel = Cancellation {
        event: "order/cancelled".to_string(),
        if_: Some("event.data.orderId == async.data.orderId".to_string()),
        timeout: None,
    };
    let wire = serde_json::to_value(&cancel).unwrap();
    assert_eq!(wire["if"], "event.data.orderId == async.data.orderId");
    assert!(wire.get("if_").is_none());
}
