//! HTTP transport for the AgentBay OpenAPI.
//!
//! Every action is a `POST {base_url}/{Action}` with a JSON body and the
//! API key as a bearer token. The decoded JSON reply becomes the envelope
//! `body`; the status code travels alongside it.

use agentbay_core::{AgentBayError, RawEnvelope, Transport};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::config::Config;

/// Authenticated HTTP transport (one request per call, no retries).
pub struct HttpTransport {
    http: Client,
    base_url: String,
    api_key: String,
    region_id: String,
}

impl HttpTransport {
    pub fn new(config: &Config) -> Result<Self, AgentBayError> {
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AgentBayError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url(),
            api_key: config.api_key.clone(),
            region_id: config.region_id.clone(),
        })
    }

    fn action_url(&self, action: &str) -> String {
        format!("{}/{}", self.base_url, action)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self, params), level = "debug")]
    async fn call(&self, action: &str, params: Value) -> Result<RawEnvelope, AgentBayError> {
        let response = self
            .http
            .post(self.action_url(action))
            .bearer_auth(&self.api_key)
            .header("x-acs-region-id", &self.region_id)
            .json(&params)
            .send()
            .await
            .map_err(|e| AgentBayError::Transport(format!("{} request failed: {}", action, e)))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            AgentBayError::Transport(format!("Failed to read {} response: {}", action, e))
        })?;

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            match serde_json::from_str::<Value>(&text) {
                Ok(body) => body,
                Err(_) if !status.is_success() => {
                    return Err(AgentBayError::Transport(format!(
                        "{} returned {}: {}",
                        action, status, text
                    )));
                }
                // A 2xx reply without JSON is left for the parser to reject.
                Err(_) => Value::Null,
            }
        };

        debug!("{} -> HTTP {}", action, status);
        Ok(RawEnvelope::new(status.as_u16(), body))
    }
}
