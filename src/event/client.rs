//! Outbound event client
//!
//! Posts event batches to the orchestrator's event endpoint
//! (`{event_api_origin}/e/{event_key}`). In dev mode without a configured
//! key the literal `"dev"` key is used.

use super::Event;
use crate::config::{Config, ServeMode};
use crate::{InngestError, Result, constants};
use reqwest::Client;
use serde::Deserialize;

/// HTTP client for the orchestrator's event ingestion endpoint
pub struct EventClient {
    client: Client,
    origin: String,
    key: String,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    ids: Vec<String>,
}

impl EventClient {
    /// Build a client from the configuration
    ///
    /// Fails in cloud mode when no event key is configured.
    pub fn new(config: &Config) -> Result<Self> {
        let key = match (&config.event_key, config.mode()) {
            (Some(key), _) => key.clone(),
            (None, ServeMode::Dev) => constants::DEV_EVENT_KEY.to_string(),
            (None, ServeMode::Cloud) => {
                return Err(InngestError::config(
                    "an event key is required outside dev mode",
                ));
            }
        };

        Ok(Self {
            client: Client::new(),
            origin: config.event_api_origin(),
            key,
        })
    }

    /// Send a single event; returns its assigned id
    pub async fn send_one(&self, event: Event) -> Result<String> {
        let mut ids = self.send(vec![event]).await?;
        ids.pop()
            .ok_or_else(|| InngestError::handler("event endpoint returned no ids"))
    }

    /// Send a batch of events; returns the assigned ids in order
    pub async fn send(&self, events: Vec<Event>) -> Result<Vec<String>> {
        if events.is_empty() {
            return Ok(Vec::new());
        }
        for event in &events {
            if event.name.is_empty() {
                return Err(InngestError::bad_request("event name must not be empty"));
            }
        }

        let events: Vec<Event> = events.into_iter().map(Event::normalized).collect();
        let local_ids: Vec<String> = events.iter().filter_map(|e| e.id.clone()).collect();

        let url = format!("{}/e/{}", self.origin, self.key);
        tracing::debug!(count = events.len(), "sending events");

        let response = self.client.post(&url).json(&events).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InngestError::handler(format!(
                "event send failed: {} {}",
                status, body
            )));
        }

        // The endpoint reports the ids it assigned; fall back to the ids we
        // stamped locally when the body is absent or unparseable.
        match response.json::<SendResponse>().await {
            Ok(parsed) if !parsed.ids.is_empty() => Ok(parsed.ids),
            _ => Ok(local_ids),
        }
    }
}
