//! Import submitter
//!
//! Issues the asynchronous import request to the remote indexing service.
//! The request carries the dump path, optional drop flags, and a callback
//! URL template whose `{status}`/`{error_msg}` placeholders the remote
//! service fills in when it calls back. Only a `{"state":"submitted"}`
//! acknowledgment leaves a completion signal pending; any other answer
//! means there is nothing to wait for.
//!
//! The signal is registered before the request goes out: the remote side
//! may invoke the callback before we have finished reading the ack.

use crate::config::{Task, UpdateConfig};
use crate::error::Result;
use crate::signal::{CompletionRegistry, CompletionSignal};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Synchronous acknowledgment returned by the import endpoint
#[derive(Debug, Deserialize)]
struct ImportAck {
    state: String,
}

/// Submits import requests to the indexing service
pub struct ImportClient {
    client: reqwest::Client,
    registry: CompletionRegistry,
    /// Base URL the remote service will call back on
    callback_base: String,
}

impl ImportClient {
    pub fn new(client: reqwest::Client, registry: CompletionRegistry, callback_base: String) -> Self {
        Self {
            client,
            registry,
            callback_base,
        }
    }

    /// Submit one import request. Returns the pending completion signal
    /// when the service acknowledged the submission, `None` otherwise.
    pub async fn submit(
        &self,
        task: &Task,
        config: &UpdateConfig,
    ) -> Result<Option<Arc<CompletionSignal>>> {
        let region = &task.region;
        let url = format!("{}/location/_import", config.gazetteer_api.url);

        // The placeholders stay literal; the remote service substitutes
        // them when it invokes the callback.
        let callback_url = format!(
            "{}?region={}&status={{status}}&error_msg={{error_msg}}",
            self.callback_base, region
        );

        let mut params: Vec<(&str, String)> = Vec::new();
        if task.drop {
            params.push(("drop", "true".to_string()));
            params.push(("osmdoc", "true".to_string()));
        }
        params.push(("source", config.dump_path(region).display().to_string()));
        params.push(("callback_url", callback_url));

        // Registered before sending so a callback racing the ack still
        // finds its signal.
        let signal = self.registry.register(region);

        let send_result = self
            .client
            .get(&url)
            .basic_auth(&config.gazetteer_api.user, Some(&config.gazetteer_api.pass))
            .query(&params)
            .send()
            .await;

        let body = match send_result {
            Ok(response) => match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    self.registry.remove(region);
                    return Err(e.into());
                },
            },
            Err(e) => {
                self.registry.remove(region);
                return Err(e.into());
            },
        };

        match serde_json::from_str::<ImportAck>(&body) {
            Ok(ack) if ack.state == "submitted" => {
                info!("Task submission state: {}", ack.state);
                info!("Region {} submitted", region);
                Ok(Some(signal))
            },
            Ok(ack) => {
                info!("Task submission state: {}", ack.state);
                warn!("Region {} submission failed. GW answered: {}", region, body);
                self.registry.remove(region);
                Ok(None)
            },
            Err(_) => {
                let answer = if body.is_empty() { "<empty>" } else { body.as_str() };
                warn!("Region {} submission failed. GW answered: {}", region, answer);
                self.registry.remove(region);
                Ok(None)
            },
        }
    }
}
