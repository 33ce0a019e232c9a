/// Enrichment job system module
///
/// Runs one enrichment job end to end:
/// - Domain: rows, records, progress, the memory governor and phase-2 selection
/// - Infrastructure: progress sinks (in-memory registry, progress files)
/// - Scheduler: two-phase batch pipeline over the enrichment client
/// - Worker: job lifecycle, terminal status and report output
pub mod domain;
pub mod infrastructure;
pub mod scheduler;
pub mod worker;

// Re-exports for easy access
pub use domain::{
    entities::{EnrichedRecord, InputRow, JobProgress, JobStage, JobStatus, ABORT_MESSAGE},
    services::{ConcurrencyGovernor, GovernorDecision, MemorySampler, MemoryThresholds, SysinfoSampler},
};
pub use infrastructure::{FileProgressSink, JobRegistry, ProgressReporter, ProgressSink};
pub use scheduler::{EnrichmentScheduler, SchedulerConfig};
pub use worker::{JobOutcome, JobRunner};
