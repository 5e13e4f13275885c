//! HTTP fetcher for type payloads and member sub-resources

use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::types::{RawPayload, ResourceKey};
use serde_json::Value;

/// Thin wrapper around a shared `reqwest::Client`
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Build a client with the configured per-request timeout
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("pokeapi-pipeline/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config {
                message: format!("failed to create HTTP client: {}", e),
                key: Some("api".to_string()),
            })?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// URL of the type payload for `key`
    pub fn type_url(&self, key: ResourceKey) -> String {
        format!("{}/type/{}", self.base_url, key)
    }

    /// Fetch the type payload for a raw key
    ///
    /// The key is validated first; an out-of-range key fails with
    /// [`Error::InvalidArgument`] without touching the network.
    pub async fn fetch_type(&self, raw_key: i64) -> Result<RawPayload> {
        let key = ResourceKey::new(raw_key)?;
        self.fetch_type_key(key).await
    }

    /// Fetch the type payload for an already validated key
    pub async fn fetch_type_key(&self, key: ResourceKey) -> Result<RawPayload> {
        let url = self.type_url(key);
        self.fetch_json(&url).await.map(RawPayload)
    }

    /// GET `url` and parse the body as JSON
    ///
    /// Any non-2xx status, transport failure, timeout, or body that is not valid
    /// JSON is reported as [`Error::RemoteFetch`].
    pub async fn fetch_json(&self, url: &str) -> Result<Value> {
        tracing::debug!(url = %url, "GET");

        let response = self.http.get(url).send().await.map_err(|e| {
            let message = if e.is_timeout() {
                "request timed out".to_string()
            } else if e.is_connect() {
                format!("connection failed: {}", e)
            } else {
                e.to_string()
            };
            Error::remote(url, e.status().map(|s| s.as_u16()), message)
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::remote(
                url,
                Some(status.as_u16()),
                format!(
                    "unexpected status {}",
                    status.canonical_reason().unwrap_or("unknown")
                ),
            ));
        }

        let body = response.bytes().await.map_err(|e| {
            Error::remote(
                url,
                Some(status.as_u16()),
                format!("failed to read response body: {}", e),
            )
        })?;

        serde_json::from_slice(&body).map_err(|e| {
            Error::remote(
                url,
                Some(status.as_u16()),
                format!("response body is not valid JSON: {}", e),
            )
        })
    }
}
