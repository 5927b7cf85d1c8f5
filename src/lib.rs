//! Inngest SDK - serve durable functions from any Rust HTTP app
//!
//! This library lets a host application expose durable functions to an
//! Inngest orchestrator. The orchestrator drives execution by repeatedly
//! invoking a single HTTP endpoint; on each invocation the SDK re-runs the
//! function body, short-circuits every step whose result is already in the
//! request's memo table, and surfaces the next pending step as an operation
//! descriptor for the orchestrator to schedule.
//!
//! # Architecture
//!
//! - Ordinary imperative handlers become resumable state machines through
//!   the step primitives on [`StepTool`]
//! - One axum endpoint serves the whole protocol: PUT registers the
//!   function catalog, POST executes, GET introspects
//! - Inbound requests are HMAC-verified over the raw wire bytes; outbound
//!   registration authenticates with a bearer derived from the same key
//! - The SDK holds no state across requests; all durable state lives with
//!   the orchestrator
//!
//! # Example
//!
//! ```rust,no_run
//! use inngest::{Config, FunctionInput, FunctionOptions, FunctionRegistry, Trigger};
//! use serde_json::{Value, json};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env();
//!
//!     let mut registry = FunctionRegistry::new(config.app_id.clone());
//!     registry.register(inngest::create_function(
//!         FunctionOptions::new("welcome").trigger(Trigger::event("user/signed.up")),
//!         |input: FunctionInput<Value>| async move {
//!             let greeting: String = input
//!                 .step
//!                 .run("greet", || async { Ok("hello".to_string()) })
//!                 .await?;
//!             Ok(json!({ "greeting": greeting }))
//!         },
//!     ))?;
//!
//!     inngest::handler::serve("127.0.0.1:3000", config, registry).await?;
//!     Ok(())
//! }
//! ```

// Core modules
pub mod constants;
pub mod error;

// Protocol components
pub mod event;
pub mod function;
pub mod step;

// Infrastructure
pub mod config;
pub mod handler;
pub mod signature;

// Re-exports for convenience
pub use config::{Config, ServeMode};
pub use error::{InngestError, Result, SignatureError};
pub use event::{Event, EventClient};
pub use function::{
    Concurrency, EventPayload, FailureInput, Function, FunctionInput, FunctionOptions,
    FunctionRegistry, RunContext, Trigger, create_function, create_function_with_failure,
};
pub use step::{
    ErrorDetail, InvokeFunctionOpts, RunOptions, SleepInput, StepOpCode, StepOperation, StepTool,
    WaitForEventOpts,
};

/// Initialize logging for the application
pub fn init_logging() {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "inngest=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
