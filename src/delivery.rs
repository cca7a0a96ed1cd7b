//! Delivery of encrypted cookie payloads to the session backend.

use std::net::ToSocketAddrs;
use std::time::Duration;

use reqwest::{Client, ClientBuilder, StatusCode};
use serde_json::json;
use url::Url;

use crate::error::{RelayError, Result};

/// Header carrying the shared script secret.
const AUTH_HEADER: &str = "x-python-script-auth";

/// HTTP client for the session-management backend.
pub struct DeliveryClient {
    client: Client,
    endpoint: Url,
}

impl DeliveryClient {
    /// Build a client for `api_url`, substituting `gateway` for the host when
    /// it does not resolve in the current network namespace.
    pub fn new(api_url: &str, gateway: &str) -> Result<Self> {
        let endpoint = resolve_reachable(api_url, gateway)?;
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client, endpoint })
    }

    /// The endpoint after hostname fallback.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// POST the encrypted payload for `session_id`. Success is strictly
    /// HTTP 200; transport errors and other statuses are retryable failures
    /// reported as `false`. Retry policy lives in the orchestrator.
    pub async fn deliver(&self, session_id: &str, secret: &str, token: &str) -> bool {
        let url = format!(
            "{}/api/session/{}/cookies",
            self.endpoint.as_str().trim_end_matches('/'),
            session_id
        );
        let response = self
            .client
            .post(&url)
            .header(AUTH_HEADER, secret)
            .json(&json!({ "encryptedCookies": token }))
            .send()
            .await;
        match response {
            Ok(response) => {
                let status = response.status();
                log::info!("POST {} status: {}", url, status);
                status == StatusCode::OK
            }
            Err(e) => {
                log::warn!("Failed to post cookies to {}: {}", url, e);
                false
            }
        }
    }
}

/// Substitute `gateway` for the URL's host when a single resolution attempt
/// fails. Scheme, port, and path are preserved; no retries, no general DNS
/// client.
pub fn resolve_reachable(api_url: &str, gateway: &str) -> Result<Url> {
    let mut url = Url::parse(api_url)
        .map_err(|e| RelayError::Config(format!("Invalid URL '{}': {}", api_url, e)))?;
    let host = url
        .host_str()
        .ok_or_else(|| RelayError::Config(format!("URL '{}' has no host", api_url)))?
        .to_string();
    let port = url.port_or_known_default().unwrap_or(80);

    if (host.as_str(), port).to_socket_addrs().is_err() {
        log::warn!(
            "Host {} does not resolve, substituting gateway {}",
            host,
            gateway
        );
        url.set_host(Some(gateway))
            .map_err(|e| RelayError::Config(format!("Invalid gateway '{}': {}", gateway, e)))?;
    }
    Ok(url)
}
