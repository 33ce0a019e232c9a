use thiserror::Error;

/// Typed failure of one provider call, after the retry ladder has run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("TMDb request failed after {attempts} attempts: {reason}")]
    RetriesExhausted {
        status: Option<u16>,
        reason: String,
        attempts: u32,
    },

    #[error("TMDb returned HTTP {status} for {path}")]
    Status { status: u16, path: String },

    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    #[error("Invalid API response: {message}")]
    Decode { message: String },

    #[error("HTTP client was closed")]
    ClientClosed,
}
