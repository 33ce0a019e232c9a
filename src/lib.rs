pub mod modules;
pub mod schema;
pub mod shared;

pub use modules::cache::PersistentCache;
pub use modules::jobs::{JobOutcome, JobRunner};
pub use modules::provider::EnrichmentClient;
pub use shared::errors::{AppError, AppResult};
pub use shared::{Database, EnrichmentConfig};
