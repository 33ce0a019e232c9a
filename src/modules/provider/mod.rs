pub mod application;
pub mod domain;
pub mod infrastructure;

// Re-exports for easy external access
pub use application::{EnrichmentClient, FullBatch, RunMemos};
pub use domain::{ExtendedFields, MinimalFields};
