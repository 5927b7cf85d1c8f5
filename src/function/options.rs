//! Flow-control option records
//!
//! Declarative constraint descriptors attached to a function registration.
//! The SDK only declares these; enforcement lives in the orchestrator.
//! All records are immutable once the function is registered.

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scope of a concurrency constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConcurrencyScope {
    /// Per function (the default)
    Fn,
    /// Across the environment
    Env,
    /// Across the account
    Account,
}

/// A concurrency cap; multiple entries combine as logical AND
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Concurrency {
    pub limit: u32,

    /// Filter expression partitioning the cap; absent means a global cap
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<ConcurrencyScope>,
}

impl Concurrency {
    /// A global (keyless) cap
    pub fn limit(limit: u32) -> Self {
        Self {
            limit,
            key: None,
            scope: None,
        }
    }

    /// A cap partitioned by the given filter expression
    pub fn keyed(limit: u32, key: impl Into<String>) -> Self {
        Self {
            limit,
            key: Some(key.into()),
            scope: None,
        }
    }
}

/// Drop events beyond `limit` per `period`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimit {
    pub limit: u32,
    pub period: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// Queue events beyond `limit` per `period`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Throttle {
    pub limit: u32,
    pub period: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub burst: Option<u32>,
}

/// Delay execution until `period` has passed without a newer event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Debounce {
    pub period: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
}

/// Collect events into batches before invoking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchEvents {
    #[serde(rename = "maxSize")]
    pub max_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// Run-priority expression evaluated by the orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Priority {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run: Option<String>,
}

/// Cancel in-flight runs when a matching event arrives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cancellation {
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none", rename = "if")]
    pub if_: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
}

/// Deduplicate runs by key, optionally within a period
///
/// Serializes to a bare string when no period is set, and to
/// `{key, ttl}` when one is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Idempotency {
    pub key: String,
    pub period: Option<String>,
}

impl Idempotency {
    pub fn key(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            period: None,
        }
    }

    pub fn with_period(key: impl Into<String>, period: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            period: Some(period.into()),
        }
    }
}

impl Serialize for Idempotency {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.period {
            None => serializer.serialize_str(&self.key),
            Some(period) => {
                let mut state = serializer.serialize_struct("Idempotency", 2)?;
                state.serialize_field("key", &self.key)?;
                state.serialize_field("ttl", period)?;
                state.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Idempotency {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct IdempotencyVisitor;

        impl<'de> Visitor<'de> for IdempotencyVisitor {
            type Value = Idempotency;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a key string or a {key, ttl} object")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Idempotency, E> {
                Ok(Idempotency::key(v))
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Idempotency, A::Error> {
                let mut key = None;
                let mut ttl = None;
                while let Some(field) = map.next_key::<String>()? {
                    match field.as_str() {
                        "key" => key = Some(map.next_value::<String>()?),
                        "ttl" => ttl = Some(map.next_value::<String>()?),
                        _ => {
                            map.next_value::<serde::de::IgnoredAny>()?;
                        }
                    }
                }
                Ok(Idempotency {
                    key: key.ok_or_else(|| de::Error::missing_field("key"))?,
                    period: ttl,
                })
            }
        }

        deserializer.deserialize_any(IdempotencyVisitor)
    }
}

/// Start/finish deadlines for a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timeouts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish: Option<String>,
}
