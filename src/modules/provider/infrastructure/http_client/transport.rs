//! HTTP seam of the provider client
//!
//! `RateLimitClient` only sees status, retry hint and body, which keeps the
//! retry and limiting logic testable with a scripted transport.

use super::retry_policy::RateLimitInfo;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

/// What the client needs from one HTTP exchange
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    /// Server-suggested wait before the next attempt, if any
    pub retry_after: Option<Duration>,
    pub body: String,
}

impl TransportResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            retry_after: None,
            body: body.into(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            retry_after: None,
            body: String::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Request never produced a response
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request timed out")]
    Timeout,
    #[error("{0}")]
    Other(String),
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// GET `path` (relative to the API root) with the given query parameters.
    async fn get(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<TransportResponse, TransportError>;
}

/// reqwest-backed transport against the TMDb v3 API
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
    api_key: String,
}

impl ReqwestTransport {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(20))
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(20)
            .user_agent("film-enricher/0.1")
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Build URL with API key and additional query parameters
    fn build_url(&self, path: &str, query: &[(String, String)]) -> String {
        let mut url = format!(
            "{}/{}?api_key={}",
            self.base_url,
            path.trim_start_matches('/'),
            urlencoding::encode(&self.api_key)
        );
        for (key, value) in query {
            if key != "api_key" {
                url.push_str(&format!("&{}={}", key, urlencoding::encode(value)));
            }
        }
        url
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<TransportResponse, TransportError> {
        let url = self.build_url(path, query);

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout
                } else if e.is_connect() {
                    TransportError::Connect(e.to_string())
                } else {
                    TransportError::Other(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        let retry_after = RateLimitInfo::from_headers(response.headers()).recommended_delay();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Other(format!("failed to read body: {}", e)))?;

        Ok(TransportResponse {
            status,
            retry_after,
            body,
        })
    }
}
