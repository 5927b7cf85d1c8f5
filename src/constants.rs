//! Constants used throughout the SDK
//!
//! Wire headers, environment variable names, default origins, and the
//! protocol constants shared by the handler, signature, and event modules.

// ============================================================================
// HEADERS
// ============================================================================

/// Header: request signature (`t={unix_seconds}&s={hex}`)
pub const HEADER_SIGNATURE: &str = "x-inngest-signature";

/// Header: SDK identifier emitted on every response
pub const HEADER_SDK: &str = "x-inngest-sdk";

/// Header: request protocol version
pub const HEADER_REQ_VERSION: &str = "x-inngest-req-version";

/// Header: retry policy override (`true` suppresses retries)
pub const HEADER_NO_RETRY: &str = "x-inngest-no-retry";

/// Header: sync flavor selector (`inband`)
pub const HEADER_SYNC_KIND: &str = "x-inngest-sync-kind";

/// Header: server kind announced by the orchestrator
pub const HEADER_SERVER_KIND: &str = "x-inngest-server-kind";

/// Header: server kind echo on out-of-band registration
pub const HEADER_EXPECTED_SERVER_KIND: &str = "x-inngest-expected-server-kind";

/// Header: standard retry delay, seconds
pub const HEADER_RETRY_AFTER: &str = "retry-after";

/// Sync kind value for in-band registration
pub const SYNC_KIND_IN_BAND: &str = "inband";

/// Sync kind value for out-of-band registration
pub const SYNC_KIND_OUT_OF_BAND: &str = "out_of_band";

/// Protocol version carried in [`HEADER_REQ_VERSION`]
pub const REQ_VERSION: &str = "1";

// ============================================================================
// ENVIRONMENT VARIABLES
// ============================================================================

/// Environment variable: app id
pub const ENV_APP_ID: &str = "INNGEST_APP_ID";

/// Environment variable: event key
pub const ENV_EVENT_KEY: &str = "INNGEST_EVENT_KEY";

/// Environment variable: signing key
pub const ENV_SIGNING_KEY: &str = "INNGEST_SIGNING_KEY";

/// Environment variable: signing key fallback
pub const ENV_SIGNING_KEY_FALLBACK: &str = "INNGEST_SIGNING_KEY_FALLBACK";

/// Environment variable: API origin override
pub const ENV_API_ORIGIN: &str = "INNGEST_API_ORIGIN";

/// Environment variable: event API origin override
pub const ENV_EVENT_API_ORIGIN: &str = "INNGEST_EVENT_API_ORIGIN";

/// Environment variable: environment name
pub const ENV_ENVIRONMENT: &str = "INNGEST_ENV";

/// Environment variable: dev mode (`true`/`false`/`1`/`0`, or a dev server URL)
pub const ENV_DEV: &str = "INNGEST_DEV";

/// Environment variable: serve origin override
pub const ENV_SERVE_ORIGIN: &str = "INNGEST_SERVE_ORIGIN";

/// Environment variable: serve path override
pub const ENV_SERVE_PATH: &str = "INNGEST_SERVE_PATH";

/// Environment variable: exclude cron-only functions from dev registration
pub const ENV_DISABLE_CRON_TRIGGERS_IN_DEV: &str = "INNGEST_DISABLE_CRON_TRIGGERS_IN_DEV";

// ============================================================================
// ORIGINS & PATHS
// ============================================================================

/// Default dev server URL
pub const DEFAULT_DEV_SERVER_URL: &str = "http://localhost:8288";

/// Default cloud API origin
pub const DEFAULT_API_ORIGIN: &str = "https://api.inngest.com";

/// Default cloud event API origin
pub const DEFAULT_EVENT_API_ORIGIN: &str = "https://inn.gs";

/// Default serve path
pub const DEFAULT_SERVE_PATH: &str = "/api/inngest";

/// Registration endpoint on the API origin
pub const REGISTER_PATH: &str = "/fn/register";

/// Event key used in dev mode when none is configured
pub const DEV_EVENT_KEY: &str = "dev";

// ============================================================================
// QUERY PARAMETERS
// ============================================================================

/// Query parameter: target function id
pub const QUERY_FN_ID: &str = "fnId";

/// Query parameter: target step id
pub const QUERY_STEP_ID: &str = "stepId";

/// Query parameter: deploy id relayed to the registration endpoint
pub const QUERY_DEPLOY_ID: &str = "deployId";

// ============================================================================
// PROTOCOL
// ============================================================================

/// SDK language label reported during sync and introspection
pub const SDK_LANGUAGE: &str = "rust";

/// SDK author label reported during sync
pub const SDK_AUTHOR: &str = "inngest";

/// Framework label reported during sync
pub const SDK_FRAMEWORK: &str = "axum";

/// Introspection schema version
pub const SCHEMA_VERSION: &str = "2024-05-24";

/// Default step stub id emitted for each registered function
pub const DEFAULT_STEP_ID: &str = "step";

/// System event emitted by the orchestrator when all retries are exhausted
pub const FN_FAILED_EVENT: &str = "inngest/function.failed";

/// Suffix appended to the id of a synthesized failure-handler registration
pub const ON_FAILURE_SUFFIX: &str = ":on-failure";

/// Internal op name marking a send-event step on the wire
pub const OP_NAME_SEND_EVENT: &str = "sendEvent";

/// Default total attempts for a function (first run plus retries)
pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;

/// Signature replay window, seconds
pub const SIGNATURE_REPLAY_WINDOW_SECS: i64 = 300;

/// SDK identifier emitted in [`HEADER_SDK`]
pub fn sdk_label() -> String {
    format!("inngest-rs:v{}", env!("CARGO_PKG_VERSION"))
}
