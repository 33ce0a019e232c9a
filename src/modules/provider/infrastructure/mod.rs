pub mod adapters;
pub mod http_client;

// Re-export commonly used types
pub use adapters::tmdb::TmdbMapper;
pub use http_client::{HttpTransport, RateLimitClient, ReqwestTransport, RetryPolicy};
