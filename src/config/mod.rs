//! SDK configuration
//!
//! Every knob has an environment-variable fallback; an explicitly set value
//! always wins. `INNGEST_DEV` is tri-state: `true`/`false`/`1`/`0`, or a URL
//! which both implies dev mode and points at the dev server.

use crate::constants;
use serde::{Deserialize, Serialize};
use std::env;
use url::Url;

/// Serving mode, resolved from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServeMode {
    Dev,
    Cloud,
}

impl std::fmt::Display for ServeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServeMode::Dev => write!(f, "dev"),
            ServeMode::Cloud => write!(f, "cloud"),
        }
    }
}

/// SDK configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// App id; prefixes every wire function id
    pub app_id: String,

    /// Key for posting events to the orchestrator
    pub event_key: Option<String>,

    /// Key for verifying inbound signatures and deriving the outbound bearer
    pub signing_key: Option<String>,

    /// Secondary signing key tried when the primary does not match
    pub signing_key_fallback: Option<String>,

    /// Orchestrator API origin override
    pub api_origin: Option<String>,

    /// Orchestrator event API origin override
    pub event_api_origin: Option<String>,

    /// Environment name reported during sync
    pub environment: String,

    /// Explicit dev-mode override; `None` defers to the environment
    pub is_dev: Option<bool>,

    /// Dev server URL used for both origins in dev mode
    pub dev_server_url: String,

    /// Origin the orchestrator should use to reach this service
    pub serve_origin: Option<String>,

    /// Path the handler is mounted at
    pub serve_path: Option<String>,

    /// Exclude cron-only functions from dev registration
    pub disable_cron_triggers_in_dev: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_id: "app".to_string(),
            event_key: None,
            signing_key: None,
            signing_key_fallback: None,
            api_origin: None,
            event_api_origin: None,
            environment: "dev".to_string(),
            is_dev: None,
            dev_server_url: constants::DEFAULT_DEV_SERVER_URL.to_string(),
            serve_origin: None,
            serve_path: None,
            disable_cron_triggers_in_dev: false,
        }
    }
}

impl Config {
    /// Build a configuration for the given app id
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            ..Default::default()
        }
    }

    /// Build a configuration from the environment
    pub fn from_env() -> Self {
        let mut config = Config::default();

        if let Ok(app_id) = env::var(constants::ENV_APP_ID) {
            config.app_id = app_id;
        }
        config.event_key = env::var(constants::ENV_EVENT_KEY).ok().filter(not_empty);
        config.signing_key = env::var(constants::ENV_SIGNING_KEY).ok().filter(not_empty);
        config.signing_key_fallback = env::var(constants::ENV_SIGNING_KEY_FALLBACK)
            .ok()
            .filter(not_empty);
        config.api_origin = env::var(constants::ENV_API_ORIGIN).ok().filter(not_empty);
        config.event_api_origin = env::var(constants::ENV_EVENT_API_ORIGIN)
            .ok()
            .filter(not_empty);
        if let Ok(environment) = env::var(constants::ENV_ENVIRONMENT) {
            config.environment = environment;
        }
        if let Ok(dev) = env::var(constants::ENV_DEV) {
            config.apply_dev_value(&dev);
        }
        config.serve_origin = env::var(constants::ENV_SERVE_ORIGIN).ok().filter(not_empty);
        config.serve_path = env::var(constants::ENV_SERVE_PATH).ok().filter(not_empty);
        if let Ok(flag) = env::var(constants::ENV_DISABLE_CRON_TRIGGERS_IN_DEV) {
            config.disable_cron_triggers_in_dev = parse_bool(&flag).unwrap_or(false);
        }

        config
    }

    /// Interpret an `INNGEST_DEV` value: a boolean, or a URL that both
    /// implies dev and sets the dev server URL.
    pub(crate) fn apply_dev_value(&mut self, value: &str) {
        if let Some(flag) = parse_bool(value) {
            self.is_dev = Some(flag);
            return;
        }
        if let Ok(url) = Url::parse(value)
            && (url.scheme() == "http" || url.scheme() == "https")
        {
            self.is_dev = Some(true);
            self.dev_server_url = value.trim_end_matches('/').to_string();
        }
    }

    /// Resolved serving mode: explicit `is_dev` wins, then the environment
    /// name (`"dev"` is the default).
    pub fn mode(&self) -> ServeMode {
        match self.is_dev {
            Some(true) => ServeMode::Dev,
            Some(false) => ServeMode::Cloud,
            None => {
                if self.environment == "dev" {
                    ServeMode::Dev
                } else {
                    ServeMode::Cloud
                }
            }
        }
    }

    /// Orchestrator API origin for registration and run-state fetches
    pub fn api_origin(&self) -> String {
        if let Some(origin) = &self.api_origin {
            return origin.trim_end_matches('/').to_string();
        }
        match self.mode() {
            ServeMode::Dev => self.dev_server_url.clone(),
            ServeMode::Cloud => constants::DEFAULT_API_ORIGIN.to_string(),
        }
    }

    /// Orchestrator event API origin for event ingestion
    pub fn event_api_origin(&self) -> String {
        if let Some(origin) = &self.event_api_origin {
            return origin.trim_end_matches('/').to_string();
        }
        match self.mode() {
            ServeMode::Dev => self.dev_server_url.clone(),
            ServeMode::Cloud => constants::DEFAULT_EVENT_API_ORIGIN.to_string(),
        }
    }

    /// Path the invocation handler is mounted at
    pub fn serve_path(&self) -> String {
        self.serve_path
            .clone()
            .unwrap_or_else(|| constants::DEFAULT_SERVE_PATH.to_string())
    }
}

fn not_empty(s: &String) -> bool {
    !s.is_empty()
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}
