pub mod entities;
pub mod services;

pub use entities::{EnrichedRecord, InputRow, JobProgress, JobStage, JobStatus, ABORT_MESSAGE};
