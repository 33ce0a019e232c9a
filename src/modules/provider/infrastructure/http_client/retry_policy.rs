//! Retry policy for TMDb requests
//!
//! Retryable failures walk a fixed delay ladder unless the server sent a
//! usable hint in its headers.

use std::time::Duration;

/// Configuration for HTTP retry behavior
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts after the first request
    pub max_retries: u32,
    /// Delay before retry `n` is `delays[n]`; the last entry repeats
    pub delays: Vec<Duration>,
    /// Maximum delay to wait, server hints included
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// TMDb: 0.5 s, 1 s, 2 s, 4 s, 8 s
    pub fn tmdb() -> Self {
        Self {
            max_retries: 5,
            delays: [500, 1_000, 2_000, 4_000, 8_000]
                .into_iter()
                .map(Duration::from_millis)
                .collect(),
            max_delay: Duration::from_secs(60),
        }
    }

    /// Same attempt count with no waiting (tests)
    pub fn immediate() -> Self {
        Self {
            max_retries: 5,
            delays: vec![Duration::ZERO],
            max_delay: Duration::ZERO,
        }
    }

    /// Calculate delay for next retry attempt (0-based)
    pub fn calculate_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        // If server provided a hint, respect it
        if let Some(server_delay) = retry_after {
            return server_delay.min(self.max_delay);
        }

        let index = (attempt as usize).min(self.delays.len().saturating_sub(1));
        self.delays
            .get(index)
            .copied()
            .unwrap_or_default()
            .min(self.max_delay)
    }

    pub fn is_retryable_status(status: u16) -> bool {
        status == 429 || (500..=599).contains(&status)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::tmdb()
    }
}

/// Information extracted from rate-limit related HTTP headers
#[derive(Debug, Clone)]
pub struct RateLimitInfo {
    /// How long to wait before next request (from Retry-After header)
    pub retry_after: Option<Duration>,
    /// When the rate limit resets (from X-RateLimit-Reset header)
    pub reset_time: Option<Duration>,
    /// Number of requests remaining (from X-RateLimit-Remaining header)
    pub remaining: Option<u32>,
    /// Total rate limit (from X-RateLimit-Limit header)
    pub limit: Option<u32>,
}

impl RateLimitInfo {
    /// Parse rate limit information from HTTP response headers
    pub fn from_headers(headers: &reqwest::header::HeaderMap) -> Self {
        // Retry-After may be fractional seconds
        let retry_after = headers
            .get("retry-after")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.trim().parse::<f64>().ok())
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(Duration::from_secs_f64);

        let reset_time = headers
            .get("x-ratelimit-reset")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(|timestamp| {
                let now = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_secs();
                Duration::from_secs(timestamp.saturating_sub(now))
            });

        let remaining = headers
            .get("x-ratelimit-remaining")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.trim().parse::<u32>().ok());

        let limit = headers
            .get("x-ratelimit-limit")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.trim().parse::<u32>().ok());

        Self {
            retry_after,
            reset_time,
            remaining,
            limit,
        }
    }

    /// Get the best delay recommendation from available information
    pub fn recommended_delay(&self) -> Option<Duration> {
        // Prioritize Retry-After header
        if let Some(delay) = self.retry_after {
            return Some(delay);
        }

        // The reset time only matters once the quota is used up
        match self.remaining {
            Some(0) => self.reset_time,
            _ => None,
        }
    }
}
