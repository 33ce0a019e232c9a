pub mod rate_limit_client;
pub mod retry_policy;
pub mod transport;

pub use rate_limit_client::RateLimitClient;
pub use retry_policy::{RateLimitInfo, RetryPolicy};
pub use transport::{HttpTransport, ReqwestTransport, TransportError, TransportResponse};
