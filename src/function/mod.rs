//! Durable function declarations
//!
//! A [`Function`] pairs declarative metadata (id, triggers, flow-control
//! constraints) with the erased runtime handler the invocation endpoint
//! calls. Typed event payloads are decoded through the [`EventPayload`]
//! trait; trigger derivation and registration live in [`registry`].

pub mod options;
pub mod registry;

pub use options::{
    BatchEvents, Cancellation, Concurrency, ConcurrencyScope, Debounce, Idempotency, Priority,
    RateLimit, Throttle, Timeouts,
};
pub use registry::{FunctionRegistry, RegisteredFunction};

use crate::constants;
use crate::event::Event;
use crate::step::{ErrorDetail, StepTool};
use crate::{InngestError, Result};
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// Condition under which the orchestrator schedules a function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Trigger {
    /// Schedule on a matching event, optionally filtered by an expression
    Event {
        event: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        expression: Option<String>,
    },

    /// Schedule on a cron expression
    Cron { cron: String },
}

impl Trigger {
    /// An event trigger with no filter
    pub fn event(name: impl Into<String>) -> Self {
        Trigger::Event {
            event: name.into(),
            expression: None,
        }
    }

    /// An event trigger filtered by an expression
    pub fn event_if(name: impl Into<String>, expression: impl Into<String>) -> Self {
        Trigger::Event {
            event: name.into(),
            expression: Some(expression.into()),
        }
    }

    /// A cron trigger
    pub fn cron(expression: impl Into<String>) -> Self {
        Trigger::Cron {
            cron: expression.into(),
        }
    }

    pub fn is_cron(&self) -> bool {
        matches!(self, Trigger::Cron { .. })
    }
}

/// Typed event payload carried in `event.data`
///
/// The explicit-values rendition of reflection-driven trigger derivation:
/// a payload type may advertise the event name it binds to, and a function
/// declared without triggers derives one event trigger from it.
pub trait EventPayload: DeserializeOwned + Send + Sync + 'static {
    /// Event name this payload type binds to, if any
    const EVENT_NAME: Option<&'static str> = None;
}

impl EventPayload for Value {}

/// Declarative description of a function
#[derive(Debug, Clone, Default)]
pub struct FunctionOptions {
    /// Unique id within the app; the wire id is `"{app_id}-{id}"`
    pub id: String,

    /// Human-readable display name; defaults to the id
    pub name: Option<String>,

    /// Explicit triggers; when empty one is derived (see [`registry`])
    pub triggers: Vec<Trigger>,

    /// Total attempts, first run included
    pub retries: Option<u32>,

    /// Concurrency caps, combined as logical AND
    pub concurrency: Vec<Concurrency>,

    pub rate_limit: Option<RateLimit>,
    pub throttle: Option<Throttle>,
    pub debounce: Option<Debounce>,
    pub batch_events: Option<BatchEvents>,
    pub priority: Option<Priority>,

    /// Cancellation triggers for in-flight runs
    pub cancel_on: Vec<Cancellation>,

    pub idempotency: Option<Idempotency>,
    pub timeouts: Option<Timeouts>,
}

impl FunctionOptions {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Set the display name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Add a trigger
    pub fn trigger(mut self, trigger: Trigger) -> Self {
        self.triggers.push(trigger);
        self
    }

    /// Set total attempts
    pub fn retries(mut self, attempts: u32) -> Self {
        self.retries = Some(attempts);
        self
    }

    /// Add a concurrency cap
    pub fn concurrency(mut self, concurrency: Concurrency) -> Self {
        self.concurrency.push(concurrency);
        self
    }

    /// Display name, falling back to the id
    pub fn display(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.id.clone())
    }

    /// Total attempts with the protocol default applied
    pub fn max_attempts(&self) -> u32 {
        self.retries.unwrap_or(constants::DEFAULT_MAX_ATTEMPTS)
    }
}

/// Per-invocation run metadata
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,

    /// Full wire id of the executing function
    pub function_id: String,

    /// Zero-indexed attempt counter
    pub attempt: u32,

    /// Total attempts allowed, first run included
    pub max_attempts: u32,

    /// True when earlier steps of this run are being replayed from the memo
    /// table
    pub is_replay: bool,
}

impl RunContext {
    /// True when no further retries remain after this attempt
    pub fn is_final_attempt(&self) -> bool {
        self.attempt + 1 >= self.max_attempts
    }
}

/// Input handed to a user handler
pub struct FunctionInput<T = Value> {
    /// The triggering event envelope
    pub event: Event,

    /// `event.data` decoded into the declared payload type
    pub data: T,

    /// Full batch for batched invocations; contains `event` otherwise
    pub events: Vec<Event>,

    /// Step tools seeded from this invocation's memo table
    pub step: StepTool,

    pub ctx: RunContext,
}

/// Input handed to a failure callback after all retries are exhausted
pub struct FailureInput {
    /// Full wire id of the failed function
    pub function_id: String,

    pub run_id: String,

    /// Terminal error reported by the orchestrator
    pub error: ErrorDetail,

    /// The event that originally triggered the failed run
    pub event: Event,

    pub step: StepTool,

    pub ctx: RunContext,
}

/// `event.data` shape of the orchestrator's function-failed event
#[derive(Debug, Deserialize)]
struct FailureEventData {
    function_id: String,
    run_id: String,
    #[serde(default)]
    error: ErrorDetail,
    event: Event,
}

pub(crate) struct HandlerArgs {
    pub event: Event,
    pub events: Vec<Event>,
    pub step: StepTool,
    pub ctx: RunContext,
}

pub(crate) type RuntimeHandler =
    Arc<dyn Fn(HandlerArgs) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// A declared function ready for registration
pub struct Function {
    pub(crate) options: FunctionOptions,
    pub(crate) payload_event_name: Option<&'static str>,
    pub(crate) handler: RuntimeHandler,
    pub(crate) failure_handler: Option<RuntimeHandler>,
}

impl Function {
    /// The app-local id
    pub fn id(&self) -> &str {
        &self.options.id
    }

    pub fn options(&self) -> &FunctionOptions {
        &self.options
    }
}

impl std::fmt::Debug for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Function")
            .field("id", &self.options.id)
            .field("triggers", &self.options.triggers)
            .field("has_failure_handler", &self.failure_handler.is_some())
            .finish()
    }
}

/// Create a function from declarative options and a typed handler
///
/// The handler receives `event.data` decoded into `T` and returns any
/// serializable value, which becomes the run's output.
pub fn create_function<T, O, F, Fut>(options: FunctionOptions, handler: F) -> Function
where
    T: EventPayload,
    O: Serialize + Send + 'static,
    F: Fn(FunctionInput<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O>> + Send + 'static,
{
    Function {
        payload_event_name: T::EVENT_NAME,
        handler: erase_handler(handler),
        failure_handler: None,
        options,
    }
}

/// [`create_function`] with a callback invoked after all retries are
/// exhausted
///
/// The registry publishes a companion registration for the callback,
/// triggered on the orchestrator's function-failed event filtered to this
/// function.
pub fn create_function_with_failure<T, O, F, Fut, FO, FF, FFut>(
    options: FunctionOptions,
    handler: F,
    on_failure: FF,
) -> Function
where
    T: EventPayload,
    O: Serialize + Send + 'static,
    F: Fn(FunctionInput<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O>> + Send + 'static,
    FO: Serialize + Send + 'static,
    FF: Fn(FailureInput) -> FFut + Send + Sync + 'static,
    FFut: Future<Output = Result<FO>> + Send + 'static,
{
    let failure: RuntimeHandler = Arc::new(move |args: HandlerArgs| {
        let decoded = serde_json::from_value::<FailureEventData>(args.event.data.clone());
        let failure = match decoded {
            Ok(d) => d,
            Err(e) => {
                let err = InngestError::bad_request(format!(
                    "failed to decode function-failed event data: {}",
                    e
                ));
                return Box::pin(async move { Err(err) });
            }
        };
        let fut = on_failure(FailureInput {
            function_id: failure.function_id,
            run_id: failure.run_id,
            error: failure.error,
            event: failure.event,
            step: args.step,
            ctx: args.ctx,
        });
        Box::pin(async move {
            let out = fut.await?;
            serde_json::to_value(out).map_err(InngestError::from)
        })
    });

    Function {
        payload_event_name: T::EVENT_NAME,
        handler: erase_handler(handler),
        failure_handler: Some(failure),
        options,
    }
}

fn erase_handler<T, O, F, Fut>(handler: F) -> RuntimeHandler
where
    T: EventPayload,
    O: Serialize + Send + 'static,
    F: Fn(FunctionInput<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O>> + Send + 'static,
{
    Arc::new(move |args: HandlerArgs| {
        let data = match serde_json::from_value::<T>(args.event.data.clone()) {
            Ok(d) => d,
            Err(e) => {
                let err =
                    InngestError::bad_request(format!("failed to decode event data: {}", e));
                return Box::pin(async move { Err(err) });
            }
        };
        let fut = handler(FunctionInput {
            event: args.event,
            data,
            events: args.events,
            step: args.step,
            ctx: args.ctx,
        });
        Box::pin(async move {
            let out = fut.await?;
            serde_json::to_value(out).map_err(InngestError::from)
        })
    })
}

#[cfg(test)]
mod function_test;
#[cfg(test)]
mod options_test;
