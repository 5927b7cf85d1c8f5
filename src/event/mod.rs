//! Event envelope and outbound event client
//!
//! Events are the unit of communication with the orchestrator: functions are
//! triggered by them, `wait_for_event` matches on them, and `send_event`
//! posts them back out.

pub mod client;

pub use client::EventClient;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Envelope shape sent to and received from the orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique id; generated at send time if absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Dotted/slashed identifier (REQUIRED, non-empty)
    pub name: String,

    /// Opaque payload
    #[serde(default)]
    pub data: Value,

    /// Unix millisecond timestamp; defaulted to "now" at send time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<i64>,

    /// Opaque user block
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<Value>,

    /// Deduplication key honored by the orchestrator
    #[serde(skip_serializing_if = "Option::is_none", rename = "idempotencyKey")]
    pub idempotency_key: Option<String>,

    /// Wire version tag; opaque
    #[serde(skip_serializing_if = "Option::is_none")]
    pub v: Option<String>,
}

impl Event {
    /// Create an event with the given name and data payload
    pub fn new(name: impl Into<String>, data: Value) -> Self {
        Self {
            id: None,
            name: name.into(),
            data,
            ts: None,
            user: None,
            idempotency_key: None,
            v: None,
        }
    }

    /// Fill `id` and `ts` if absent; both are set exactly once
    pub fn normalized(mut self) -> Self {
        if self.id.is_none() {
            self.id = Some(Uuid::new_v4().to_string());
        }
        if self.ts.is_none() {
            self.ts = Some(Utc::now().timestamp_millis());
        }
        self
    }
}

impl Default for Event {
    fn default() -> Self {
        Event::new("", Value::Null)
    }
}
