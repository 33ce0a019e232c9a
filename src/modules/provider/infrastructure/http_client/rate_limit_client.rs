//! Rate-limited, retrying HTTP client for TMDb
//!
//! Every attempt waits for the shared sliding-window limiter and a slot of
//! this client's semaphore. The limiter outlives the client: a replacement
//! built with a different concurrency keeps counting in the same window.

use super::retry_policy::RetryPolicy;
use super::transport::{HttpTransport, TransportError, TransportResponse};
use crate::log_warn;
use crate::shared::errors::ProviderError;
use crate::shared::utils::logger::LogContext;
use crate::shared::utils::RateLimiter;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::sleep;

pub struct RateLimitClient {
    transport: Arc<dyn HttpTransport>,
    rate_limiter: Arc<RateLimiter>,
    semaphore: Arc<Semaphore>,
    retry_policy: RetryPolicy,
    max_concurrency: usize,
    provider_name: String,
}

impl RateLimitClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        rate_limiter: Arc<RateLimiter>,
        retry_policy: RetryPolicy,
        max_concurrency: usize,
    ) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            transport,
            rate_limiter,
            semaphore: Arc::new(Semaphore::new(max_concurrency)),
            retry_policy,
            max_concurrency,
            provider_name: "TMDb".to_string(),
        }
    }

    /// Same transport, limiter and policy; a fresh semaphore of `max_concurrency`.
    pub fn with_concurrency(&self, max_concurrency: usize) -> Self {
        Self::new(
            Arc::clone(&self.transport),
            Arc::clone(&self.rate_limiter),
            self.retry_policy.clone(),
            max_concurrency,
        )
    }

    /// Stop scheduling new requests. Requests holding a slot finish normally.
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// GET and decode JSON
    pub async fn get_json<T>(&self, path: &str, query: &[(String, String)]) -> Result<T, ProviderError>
    where
        T: DeserializeOwned,
    {
        let body = self.get_text(path, query).await?;
        serde_json::from_str(&body).map_err(|e| ProviderError::Decode {
            message: format!(
                "{} for {}: {}",
                e,
                path,
                if body.len() > 200 {
                    format!("{}...", body.chars().take(200).collect::<String>())
                } else {
                    body.clone()
                }
            ),
        })
    }

    /// GET with limiter, semaphore and retries; returns the successful body
    pub async fn get_text(&self, path: &str, query: &[(String, String)]) -> Result<String, ProviderError> {
        let max_attempts = self.retry_policy.max_retries + 1;
        let mut attempt: u32 = 0;

        loop {
            let start = std::time::Instant::now();
            let outcome = self.attempt(path, query).await?;

            let (status, retry_after, reason) = match outcome {
                Ok(response) if response.is_success() => {
                    LogContext::api_call(
                        &self.provider_name,
                        path,
                        "200",
                        Some(start.elapsed().as_millis() as u64),
                    );
                    return Ok(response.body);
                }
                Ok(response) if response.status == 404 => {
                    return Err(ProviderError::NotFound {
                        resource: path.to_string(),
                    });
                }
                Ok(response) if RetryPolicy::is_retryable_status(response.status) => (
                    Some(response.status),
                    response.retry_after,
                    format!("{} error {}", self.provider_name, response.status),
                ),
                Ok(response) => {
                    return Err(ProviderError::Status {
                        status: response.status,
                        path: path.to_string(),
                    });
                }
                Err(e) => (None, None, e.to_string()),
            };

            if attempt >= self.retry_policy.max_retries {
                return Err(ProviderError::RetriesExhausted {
                    status,
                    reason,
                    attempts: max_attempts,
                });
            }

            let delay = self.retry_policy.calculate_delay(attempt, retry_after);
            log_warn!(
                "{} request {} failed ({}), retry {}/{} in {:?}",
                self.provider_name,
                path,
                reason,
                attempt + 1,
                self.retry_policy.max_retries,
                delay
            );
            sleep(delay).await;
            attempt += 1;
        }
    }

    /// One network attempt. The outer error means the client was closed.
    async fn attempt(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<Result<TransportResponse, TransportError>, ProviderError> {
        if self.semaphore.is_closed() {
            return Err(ProviderError::ClientClosed);
        }
        self.rate_limiter.await_slot().await;
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| ProviderError::ClientClosed)?;

        Ok(self.transport.get(path, query).await)
    }
}
