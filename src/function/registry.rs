//! Function registry
//!
//! Catalog of registered functions, keyed by wire id
//! (`"{app_id}-{id}"`). Populated during startup, then shared read-only
//! behind an `Arc`; it carries no per-invocation state.

use super::{Function, FunctionOptions, RuntimeHandler, Trigger};
use crate::{InngestError, Result, constants};
use cron::Schedule;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

/// A function after registration: normalized metadata plus the runtime
/// handler
pub struct RegisteredFunction {
    /// Wire id: `"{app_id}-{id}"`
    pub wire_id: String,

    /// App-local id
    pub slug: String,

    /// Display name
    pub name: String,

    /// Resolved triggers, never empty
    pub triggers: Vec<Trigger>,

    /// Normalized flow-control options
    pub options: FunctionOptions,

    pub(crate) handler: RuntimeHandler,
}

impl RegisteredFunction {
    /// True when every trigger is a cron trigger
    pub fn is_cron_only(&self) -> bool {
        self.triggers.iter().all(Trigger::is_cron)
    }
}

/// Process-wide catalog of registered functions
pub struct FunctionRegistry {
    app_id: String,
    functions: Vec<Arc<RegisteredFunction>>,
    index: HashMap<String, usize>,
}

impl FunctionRegistry {
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            functions: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Register a declared function
    ///
    /// Validates id uniqueness, resolves triggers, normalizes concurrency
    /// constraints, and publishes a failure companion when a failure
    /// handler is declared.
    pub fn register(&mut self, function: Function) -> Result<()> {
        let Function {
            mut options,
            payload_event_name,
            handler,
            failure_handler,
        } = function;

        if options.id.is_empty() {
            return Err(InngestError::config("function id must not be empty"));
        }

        let wire_id = format!("{}-{}", self.app_id, options.id);
        if self.index.contains_key(&wire_id) {
            return Err(InngestError::config(format!(
                "duplicate function id: {}",
                options.id
            )));
        }

        let triggers = resolve_triggers(&options, payload_event_name)?;
        options.concurrency = normalize_concurrency(&options.id, options.concurrency)?;

        let name = options.display();
        let slug = options.id.clone();
        tracing::debug!(function = %wire_id, triggers = triggers.len(), "registering function");

        self.push(RegisteredFunction {
            wire_id: wire_id.clone(),
            slug: slug.clone(),
            name: name.clone(),
            triggers,
            options,
            handler,
        });

        if let Some(failure_handler) = failure_handler {
            self.push(failure_companion(&wire_id, &slug, &name, failure_handler));
        }

        Ok(())
    }

    /// Register every declaration in the iterator
    pub fn register_all(&mut self, functions: impl IntoIterator<Item = Function>) -> Result<()> {
        for function in functions {
            self.register(function)?;
        }
        Ok(())
    }

    /// Look up a registration by wire id
    pub fn lookup(&self, full_id: &str) -> Option<Arc<RegisteredFunction>> {
        self.index.get(full_id).map(|i| self.functions[*i].clone())
    }

    /// Enumerate registrations, stable by insertion order
    pub fn list(&self) -> &[Arc<RegisteredFunction>] {
        &self.functions
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    fn push(&mut self, function: RegisteredFunction) {
        self.index
            .insert(function.wire_id.clone(), self.functions.len());
        self.functions.push(Arc::new(function));
    }
}

/// Resolve the trigger list for a declaration
///
/// Explicit triggers win. Otherwise, a payload type advertising an event
/// name derives one event trigger; the final fallback is an event trigger
/// named after the function id.
fn resolve_triggers(
    options: &FunctionOptions,
    payload_event_name: Option<&'static str>,
) -> Result<Vec<Trigger>> {
    if !options.triggers.is_empty() {
        for trigger in &options.triggers {
            if let Trigger::Cron { cron } = trigger {
                validate_cron(&options.id, cron)?;
            }
        }
        return Ok(options.triggers.clone());
    }

    let event = payload_event_name
        .map(str::to_string)
        .unwrap_or_else(|| options.id.clone());
    Ok(vec![Trigger::event(event)])
}

/// Validate a cron trigger expression
///
/// Orchestrator crons are standard five-field expressions with an optional
/// `TZ=…` prefix; the parser wants a seconds field, so one is prepended.
fn validate_cron(id: &str, expression: &str) -> Result<()> {
    let mut fields = expression.trim();
    if fields.starts_with("TZ=") {
        fields = fields
            .split_once(' ')
            .map(|(_, tail)| tail.trim())
            .unwrap_or("");
    }

    let normalized = if fields.split_whitespace().count() == 5 {
        format!("0 {}", fields)
    } else {
        fields.to_string()
    };

    Schedule::from_str(&normalized).map_err(|e| {
        InngestError::config(format!(
            "invalid cron expression '{}' on function '{}': {}",
            expression, id, e
        ))
    })?;
    Ok(())
}

/// Sort keyed concurrency entries ahead of the global cap and reject
/// duplicate global caps; keyed duplicates compound, so they are allowed.
fn normalize_concurrency(
    id: &str,
    mut concurrency: Vec<super::Concurrency>,
) -> Result<Vec<super::Concurrency>> {
    let global_caps = concurrency.iter().filter(|c| c.key.is_none()).count();
    if global_caps > 1 {
        return Err(InngestError::config(format!(
            "function '{}' declares {} global concurrency caps; at most one is allowed",
            id, global_caps
        )));
    }
    concurrency.sort_by_key(|c| c.key.is_none());
    Ok(concurrency)
}

/// Build the synthetic registration invoked when the parent function
/// exhausts its retries
fn failure_companion(
    parent_wire_id: &str,
    parent_slug: &str,
    parent_name: &str,
    handler: RuntimeHandler,
) -> RegisteredFunction {
    let wire_id = format!("{}{}", parent_wire_id, constants::ON_FAILURE_SUFFIX);
    let slug = format!("{}{}", parent_slug, constants::ON_FAILURE_SUFFIX);
    let name = format!("{} (On Failure)", parent_name);
    let trigger = Trigger::event_if(
        constants::FN_FAILED_EVENT,
        format!("event.data.function_id == '{}'", parent_wire_id),
    );

    RegisteredFunction {
        wire_id,
        slug: slug.clone(),
        name: name.clone(),
        triggers: vec![trigger],
        options: FunctionOptions {
            id: slug,
            name: Some(name),
            ..Default::default()
        },
        handler,
    }
}
