//! Error types for the SDK
//!
//! This module provides the error hierarchy using thiserror. The
//! [`InngestError::Interrupt`] variant is flow control, not a failure: step
//! primitives return it when a step has no memoized result yet, and the
//! invocation handler translates it into a 206 response. User code is
//! expected to propagate it with `?` rather than catch it.

use crate::step::{ErrorDetail, StepOperation};
use std::time::Duration;
use thiserror::Error;

/// Main error type for SDK operations
#[derive(Error, Debug)]
pub enum InngestError {
    /// A step needs scheduling by the orchestrator. Carries the operation
    /// descriptor for the 206 response.
    #[error("step interrupt: {}", .0.id)]
    Interrupt(Box<StepOperation>),

    /// The user asserts the failure is permanent; no retries.
    #[error("{message}")]
    NonRetriable {
        name: String,
        message: String,
        stack: Option<String>,
    },

    /// The user asserts the failure is transient and names the delay.
    #[error("{message}")]
    RetryAfter {
        name: String,
        message: String,
        delay: Duration,
    },

    /// A memoized `invoke` step recorded a failed child run.
    #[error("function invocation failed: {0}")]
    InvokeFailure(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Signature error: {0}")]
    Signature(#[from] SignatureError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other failure raised by user code; retriable from the
    /// orchestrator's perspective.
    #[error("{message}")]
    Handler {
        name: String,
        message: String,
        stack: Option<String>,
    },
}

/// Signature verification failures
#[derive(Error, Debug)]
pub enum SignatureError {
    #[error("signature header missing")]
    MissingHeader,

    #[error("malformed signature header: {0}")]
    MalformedHeader(String),

    #[error("signature timestamp outside the replay window")]
    Expired,

    #[error("signature mismatch")]
    Mismatch,

    #[error("no signing key configured")]
    NoSigningKey,

    #[error("invalid signing key: {0}")]
    InvalidKey(String),
}

/// Convenient result type for SDK operations
pub type Result<T> = std::result::Result<T, InngestError>;

impl InngestError {
    /// Create a non-retriable error
    #[inline]
    pub fn non_retriable<S: Into<String>>(msg: S) -> Self {
        InngestError::NonRetriable {
            name: "NonRetriableError".to_string(),
            message: msg.into(),
            stack: None,
        }
    }

    /// Create a retry-after error with an explicit delay
    #[inline]
    pub fn retry_after<S: Into<String>>(msg: S, delay: Duration) -> Self {
        InngestError::RetryAfter {
            name: "RetryAfterError".to_string(),
            message: msg.into(),
            delay,
        }
    }

    /// Create a configuration error
    #[inline]
    pub fn config<S: Into<String>>(msg: S) -> Self {
        InngestError::Config(msg.into())
    }

    /// Create a bad request error
    #[inline]
    pub fn bad_request<S: Into<String>>(msg: S) -> Self {
        InngestError::BadRequest(msg.into())
    }

    /// Create a generic handler error
    #[inline]
    pub fn handler<S: Into<String>>(msg: S) -> Self {
        InngestError::Handler {
            name: "Error".to_string(),
            message: msg.into(),
            stack: None,
        }
    }

    /// True for errors that bypass step-level capture and bubble to the
    /// invocation handler unchanged.
    pub fn bypasses_step_capture(&self) -> bool {
        matches!(
            self,
            InngestError::Interrupt(_)
                | InngestError::NonRetriable { .. }
                | InngestError::RetryAfter { .. }
        )
    }

    /// The `{name, message, stack?}` triple reported on the wire.
    pub fn to_detail(&self) -> ErrorDetail {
        match self {
            InngestError::NonRetriable {
                name,
                message,
                stack,
            } => ErrorDetail {
                name: name.clone(),
                message: message.clone(),
                stack: stack.clone(),
            },
            InngestError::RetryAfter { name, message, .. } => ErrorDetail {
                name: name.clone(),
                message: message.clone(),
                stack: None,
            },
            InngestError::Handler {
                name,
                message,
                stack,
            } => ErrorDetail {
                name: name.clone(),
                message: message.clone(),
                stack: stack.clone(),
            },
            other => ErrorDetail {
                name: "Error".to_string(),
                message: other.to_string(),
                stack: None,
            },
        }
    }
}
