//! etcd v2 keys API backend.
//!
//! Registration writes the server info as the value of a key:
//! `PUT {endpoint}/v2/keys{path}` with form body `value=<json>`, optionally
//! with a `ttl` so the key disappears when the server stops refreshing it.
//! Ping reads `GET {endpoint}/health`.

use crate::backend::Backend;
use crate::error::{Error, Result};
use serde::Deserialize;
use std::time::Duration;

/// etcd backend over HTTP.
pub struct EtcdBackend {
    /// HTTP agent for requests.
    agent: ureq::Agent,
    /// Base URL of the etcd member.
    endpoint: String,
    /// Lifetime of registered keys; `None` keeps them until deleted.
    ttl: Option<Duration>,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    health: String,
}

impl EtcdBackend {
    /// Create a backend for the etcd member at `endpoint`.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(10)))
            .build();
        Self {
            agent: config.into(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            ttl: None,
        }
    }

    /// Expire registered keys after `ttl`.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = (!ttl.is_zero()).then_some(ttl);
        self
    }

    /// Get the endpoint URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Build the keys API URL for a path.
    fn key_url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}/v2/keys{}", self.endpoint, path)
        } else {
            format!("{}/v2/keys/{}", self.endpoint, path)
        }
    }

    fn health_url(&self) -> String {
        format!("{}/health", self.endpoint)
    }
}

impl Backend for EtcdBackend {
    fn register(&self, path: &str, value: &str) -> Result<()> {
        let url = self.key_url(path);
        log::debug!("registering {} at {}", value, url);

        let mut request = self.agent.put(&url);
        if let Some(ttl) = self.ttl {
            request = request.query("ttl", ttl.as_secs().to_string());
        }
        request.send_form([("value", value)])?;
        Ok(())
    }

    fn ping(&self) -> Result<()> {
        let response: HealthResponse = self
            .agent
            .get(&self.health_url())
            .call()?
            .body_mut()
            .read_json()?;

        if response.health == "true" {
            Ok(())
        } else {
            Err(Error::Unhealthy(format!("health={}", response.health)))
        }
    }
}
