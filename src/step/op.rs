//! Step operation wire model
//!
//! Opcode-tagged descriptors emitted in 206 responses. The orchestrator
//! schedules the described work, records its result under the operation id,
//! and re-invokes the function with the augmented memo table.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opcode tag on an emitted step operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepOpCode {
    /// Reserved by the protocol; never emitted by this SDK.
    Step,

    /// A step ran (or must run) and produced data.
    StepRun,

    /// A step ran and failed; the orchestrator applies its retry policy.
    StepError,

    /// Pause for a duration or until an instant.
    Sleep,

    /// Pause until a matching event arrives or the timeout elapses.
    WaitForEvent,

    /// Invoke another registered function and wait for its result.
    InvokeFunction,
}

/// The `{name, message, stack?}` error triple reported on the wire
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// Operation descriptor the orchestrator must schedule next
///
/// A step id appears at most once per 206 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOperation {
    pub id: String,

    pub op: StepOpCode,

    #[serde(skip_serializing_if = "Option::is_none", rename = "displayName")]
    pub display_name: Option<String>,

    /// Wire marker for special step kinds; `"sendEvent"` on send-event ops.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Step result for `StepRun` ops.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Failure triple for `StepError` ops.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,

    /// Scheduling options for `Sleep`, `WaitForEvent`, and `InvokeFunction`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opts: Option<Value>,
}

impl StepOperation {
    fn new(id: &str, op: StepOpCode) -> Self {
        Self {
            id: id.to_string(),
            op,
            display_name: None,
            name: None,
            data: None,
            error: None,
            opts: None,
        }
    }

    /// A completed `StepRun` carrying its return value
    pub fn run(id: &str, data: Value) -> Self {
        Self {
            data: Some(data),
            ..Self::new(id, StepOpCode::StepRun)
        }
    }

    /// A failed step
    pub fn error(id: &str, error: ErrorDetail) -> Self {
        Self {
            error: Some(error),
            ..Self::new(id, StepOpCode::StepError)
        }
    }

    /// A sleep until the given duration string or instant
    pub fn sleep(id: &str, duration: String) -> Self {
        Self {
            opts: Some(serde_json::json!({ "duration": duration })),
            ..Self::new(id, StepOpCode::Sleep)
        }
    }

    /// A wait for a matching event
    pub fn wait_for_event(id: &str, opts: Value) -> Self {
        Self {
            opts: Some(opts),
            ..Self::new(id, StepOpCode::WaitForEvent)
        }
    }

    /// An invocation of another function
    pub fn invoke_function(id: &str, opts: Value) -> Self {
        Self {
            opts: Some(opts),
            ..Self::new(id, StepOpCode::InvokeFunction)
        }
    }

    /// Attach a display name
    pub fn with_display_name(mut self, name: Option<String>) -> Self {
        self.display_name = name;
        self
    }
}
