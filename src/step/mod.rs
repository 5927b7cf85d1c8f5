//! Step tools
//!
//! The per-invocation object that memoizes and exposes the step primitives.
//! Every primitive follows the same protocol: look the step id up in the
//! memo table supplied by the orchestrator; on a hit decode and return the
//! recorded result, on a miss run the step body (if any) and return the
//! [`InngestError::Interrupt`] sentinel carrying the operation descriptor.
//! The sentinel is flow control, not a failure, and must propagate out of
//! the user handler untouched (use `?`).
//!
//! Determinism contract: across invocations of one run, user code must
//! request the same step ids in the same order until the memo table is
//! exhausted. The SDK relies on this and does not enforce it; branching on
//! wall-clock time, random numbers, or other unmemoized effects is
//! undefined behavior at the protocol level.

pub mod duration;
pub mod op;

pub use op::{ErrorDetail, StepOpCode, StepOperation};

use crate::event::{Event, EventClient};
use crate::{InngestError, Result, constants};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Per-invocation step executor seeded from the request's memo table
#[derive(Clone)]
pub struct StepTool {
    memo: Arc<HashMap<String, Value>>,
    sender: Option<Arc<EventClient>>,
}

/// Options for [`StepTool::run_with_opts`]
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Human-readable name shown in the orchestrator UI
    pub display_name: Option<String>,

    /// Per-step total attempts override
    pub retries: Option<u32>,
}

/// Target of a [`StepTool::sleep`]: a duration, a duration string, or an
/// absolute instant
#[derive(Debug, Clone)]
pub enum SleepInput {
    Duration(Duration),
    Text(String),
    Until(DateTime<Utc>),
}

impl From<Duration> for SleepInput {
    fn from(d: Duration) -> Self {
        SleepInput::Duration(d)
    }
}

impl From<&str> for SleepInput {
    fn from(s: &str) -> Self {
        SleepInput::Text(s.to_string())
    }
}

impl From<String> for SleepInput {
    fn from(s: String) -> Self {
        SleepInput::Text(s)
    }
}

impl From<DateTime<Utc>> for SleepInput {
    fn from(t: DateTime<Utc>) -> Self {
        SleepInput::Until(t)
    }
}

/// Options for [`StepTool::wait_for_event`]
#[derive(Debug, Clone, Default)]
pub struct WaitForEventOpts {
    /// Name of the event to wait for
    pub event: String,

    /// How long to wait before the orchestrator records a timeout
    pub timeout: String,

    /// Filter expression; `match_` wins when both are set
    pub if_: Option<String>,

    /// Filter expression; equivalent to `if_` and preferred over it
    pub match_: Option<String>,
}

impl WaitForEventOpts {
    pub fn new(event: impl Into<String>, timeout: Duration) -> Self {
        Self {
            event: event.into(),
            timeout: duration::format_duration(timeout),
            ..Default::default()
        }
    }
}

/// Options for [`StepTool::invoke`]
#[derive(Debug, Clone, Default)]
pub struct InvokeFunctionOpts {
    /// Full wire id (`"{app_id}-{fn_id}"`) of the target function
    pub function_id: String,

    /// Payload handed to the invoked function as its event data
    pub data: Option<Value>,

    /// Opaque user block forwarded alongside the data
    pub user: Option<Value>,

    /// How long to wait for the child run before failing the step
    pub timeout: Option<String>,
}

impl StepTool {
    /// Build step tools over the memo table from the request body
    pub fn new(memo: HashMap<String, Value>, sender: Option<Arc<EventClient>>) -> Self {
        Self {
            memo: Arc::new(memo),
            sender,
        }
    }

    fn memoized(&self, id: &str) -> Option<&Value> {
        self.memo.get(id)
    }

    fn interrupt<T>(op: StepOperation) -> Result<T> {
        Err(InngestError::Interrupt(Box::new(op)))
    }

    /// Run a memoized block of side-effectful work
    ///
    /// On a memo hit the recorded result is decoded and the closure is never
    /// invoked. On a miss the closure runs; success interrupts with a
    /// `StepRun` op carrying the return value, failure interrupts with a
    /// `StepError` op carrying the error triple. NonRetriable and RetryAfter
    /// errors bypass capture and bubble to the invocation handler so they
    /// can be translated into retry-policy headers.
    pub async fn run<T, F, Fut>(&self, id: &str, f: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.run_with_opts(id, RunOptions::default(), f).await
    }

    /// [`StepTool::run`] with a display name or per-step retry override
    pub async fn run_with_opts<T, F, Fut>(&self, id: &str, opts: RunOptions, f: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(memo) = self.memoized(id) {
            let value = unwrap_data(memo);
            return serde_json::from_value(value).map_err(InngestError::from);
        }

        match f().await {
            Ok(out) => {
                let data = serde_json::to_value(&out)?;
                let mut op = StepOperation::run(id, data).with_display_name(opts.display_name);
                if let Some(retries) = opts.retries {
                    op.opts = Some(serde_json::json!({ "retries": retries }));
                }
                Self::interrupt(op)
            }
            Err(e) if e.bypasses_step_capture() => Err(e),
            Err(e) => {
                tracing::debug!(step = id, error = %e, "step failed; reporting StepError");
                let op =
                    StepOperation::error(id, e.to_detail()).with_display_name(opts.display_name);
                Self::interrupt(op)
            }
        }
    }

    /// Pause the run for a duration or until an absolute instant
    pub fn sleep(&self, id: &str, until: impl Into<SleepInput>) -> Result<()> {
        if self.memoized(id).is_some() {
            return Ok(());
        }

        let duration = match until.into() {
            SleepInput::Duration(d) => duration::format_duration(d),
            SleepInput::Text(s) => {
                // Validate the grammar before handing it to the orchestrator.
                duration::parse_duration(&s)?;
                s
            }
            SleepInput::Until(t) => duration::format_instant(t),
        };

        Self::interrupt(StepOperation::sleep(id, duration))
    }

    /// Pause the run until an absolute instant
    pub fn sleep_until(&self, id: &str, until: DateTime<Utc>) -> Result<()> {
        self.sleep(id, until)
    }

    /// Pause until a matching event arrives; `None` means the wait timed out
    pub fn wait_for_event<T>(&self, id: &str, opts: WaitForEventOpts) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        if let Some(memo) = self.memoized(id) {
            let value = unwrap_data(memo);
            if value.is_null() {
                return Ok(None);
            }
            return Ok(Some(serde_json::from_value(value)?));
        }

        let mut wire = serde_json::json!({
            "event": opts.event,
            "timeout": opts.timeout,
        });
        if let Some(expr) = opts.match_.or(opts.if_) {
            wire["if"] = Value::String(expr);
        }

        Self::interrupt(StepOperation::wait_for_event(id, wire))
    }

    /// Invoke another registered function and wait for its result
    ///
    /// `None` means the child run returned null.
    pub fn invoke<T>(&self, id: &str, opts: InvokeFunctionOpts) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        if let Some(memo) = self.memoized(id) {
            return decode_invoke_memo(memo);
        }

        let mut wire = serde_json::json!({
            "function_id": opts.function_id,
            "payload": {
                "data": opts.data.unwrap_or(Value::Null),
                "user": opts.user.unwrap_or(Value::Null),
            },
        });
        if let Some(timeout) = opts.timeout {
            wire["timeout"] = Value::String(timeout);
        }

        Self::interrupt(StepOperation::invoke_function(id, wire))
    }

    /// Send events through the configured event sender, exactly once per run
    ///
    /// On a miss the events leave the process before the interrupt is
    /// raised, so the memoized value becomes the assigned ids and the batch
    /// is never sent twice across retries.
    pub async fn send_event(&self, id: &str, events: Vec<Event>) -> Result<Vec<String>> {
        if let Some(memo) = self.memoized(id) {
            return decode_send_event_memo(memo);
        }

        let sender = self.sender.as_ref().ok_or_else(|| {
            InngestError::config("send_event requires an event key; none is configured")
        })?;

        let ids = sender.send(events).await?;

        let mut op = StepOperation::run(id, serde_json::json!({ "ids": ids }));
        op.name = Some(constants::OP_NAME_SEND_EVENT.to_string());
        Self::interrupt(op)
    }
}

/// Unwrap the `{type:"data", data}` envelope older executor versions emit;
/// raw values pass through unchanged.
fn unwrap_data(v: &Value) -> Value {
    if let Some(obj) = v.as_object()
        && obj.get("type").and_then(Value::as_str) == Some("data")
    {
        return obj.get("data").cloned().unwrap_or(Value::Null);
    }
    v.clone()
}

fn decode_invoke_memo<T: DeserializeOwned>(memo: &Value) -> Result<Option<T>> {
    if memo.is_null() {
        return Ok(None);
    }

    if let Some(obj) = memo.as_object() {
        if let Some(err) = obj.get("error") {
            let message = err
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| err.to_string());
            return Err(InngestError::InvokeFailure(message));
        }
        if let Some(data) = obj.get("data") {
            if data.is_null() {
                return Ok(None);
            }
            return Ok(Some(serde_json::from_value(data.clone())?));
        }
    }

    Ok(Some(serde_json::from_value(memo.clone())?))
}

fn decode_send_event_memo(memo: &Value) -> Result<Vec<String>> {
    let value = unwrap_data(memo);
    let ids = match value.get("ids") {
        Some(ids) => ids.clone(),
        None => value,
    };
    serde_json::from_value(ids).map_err(InngestError::from)
}
