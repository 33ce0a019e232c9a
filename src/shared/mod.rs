// Shared kernel: configuration, errors, storage and cross-cutting utilities

pub mod config;         // Environment-driven settings
pub mod errors;         // Shared error types
pub mod infrastructure; // Shared infrastructure (database)
pub mod utils;          // Logging and rate limiting

pub use config::EnrichmentConfig;
pub use infrastructure::database::Database;
