/// Job runner for one enrichment job
///
/// Builds the governor and scheduler for the run, drives it to a terminal
/// status and writes the report. A job never leaves `processing` except through
/// `complete` or `fail`.
use crate::modules::cache::PersistentCache;
use crate::modules::jobs::domain::entities::{EnrichedRecord, InputRow, JobProgress, JobStage};
use crate::modules::jobs::domain::services::governor::{
    ConcurrencyGovernor, MemorySampler, MemoryThresholds, SysinfoSampler,
};
use crate::modules::jobs::infrastructure::progress_sink::{
    write_atomically, ProgressReporter, ProgressSink,
};
use crate::modules::jobs::scheduler::{EnrichmentScheduler, SchedulerConfig};
use crate::modules::provider::EnrichmentClient;
use crate::shared::config::EnrichmentConfig;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::RateLimiter;
use crate::{log_error, log_info, log_warn};
use std::path::PathBuf;
use std::sync::Arc;

pub const EMPTY_INPUT_MESSAGE: &str = "Input contains no movie records";

/// Final state of a job
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub progress: JobProgress,
    /// Empty when the job ended in error
    pub records: Vec<EnrichedRecord>,
}

pub struct JobRunner {
    config: EnrichmentConfig,
    cache: Arc<PersistentCache>,
    rate_limiter: Arc<RateLimiter>,
    sink: Arc<dyn ProgressSink>,
    sampler: Arc<dyn MemorySampler>,
    report_dir: Option<PathBuf>,
}

impl JobRunner {
    pub fn new(
        config: EnrichmentConfig,
        cache: Arc<PersistentCache>,
        rate_limiter: Arc<RateLimiter>,
        sink: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            config,
            cache,
            rate_limiter,
            sink,
            sampler: Arc::new(SysinfoSampler::new()),
            report_dir: None,
        }
    }

    pub fn with_sampler(mut self, sampler: Arc<dyn MemorySampler>) -> Self {
        self.sampler = sampler;
        self
    }

    /// Write `report_{job_id}.json` into `dir` on success
    pub fn with_report_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.report_dir = Some(dir.into());
        self
    }

    /// Run a job against the real API.
    pub async fn run(&self, job_id: &str, rows: Vec<InputRow>) -> JobOutcome {
        match EnrichmentClient::from_config(&self.config, Arc::clone(&self.cache), Arc::clone(&self.rate_limiter)) {
            Ok(client) => self.run_with_client(job_id, rows, client).await,
            Err(e) => {
                let mut reporter = ProgressReporter::new(job_id, Arc::clone(&self.sink));
                log_error!("Job {} could not start: {}", job_id, e);
                reporter.update(|p| p.fail(e.to_string())).await;
                JobOutcome {
                    progress: reporter.snapshot(),
                    records: Vec::new(),
                }
            }
        }
    }

    /// Run a job with a prepared client. The client is closed when the job ends.
    pub async fn run_with_client(
        &self,
        job_id: &str,
        rows: Vec<InputRow>,
        client: EnrichmentClient,
    ) -> JobOutcome {
        let mut reporter = ProgressReporter::new(job_id, Arc::clone(&self.sink));
        reporter.update(|_| {}).await;

        log_info!("Processing job {} ({} rows)", job_id, rows.len());

        match self.execute(job_id, rows, client, &mut reporter).await {
            Ok(records) => {
                log_info!("Job {} completed with {} records", job_id, records.len());
                JobOutcome {
                    progress: reporter.snapshot(),
                    records,
                }
            }
            Err(e) => {
                if e.is_resource_exhausted() {
                    log_warn!("Job {} stopped under memory pressure", job_id);
                } else {
                    log_error!("Job {} failed: {}", job_id, e);
                }
                reporter.update(|p| p.fail(e.to_string())).await;
                JobOutcome {
                    progress: reporter.snapshot(),
                    records: Vec::new(),
                }
            }
        }
    }

    async fn execute(
        &self,
        job_id: &str,
        rows: Vec<InputRow>,
        client: EnrichmentClient,
        reporter: &mut ProgressReporter,
    ) -> AppResult<Vec<EnrichedRecord>> {
        if rows.iter().all(InputRow::is_blank) {
            client.close();
            return Err(AppError::InvalidInput(EMPTY_INPUT_MESSAGE.to_string()));
        }

        let governor = ConcurrencyGovernor::new(
            Arc::clone(&self.sampler),
            self.thresholds(),
            client.max_concurrency(),
            self.config.batch_size,
        );
        let mut scheduler = EnrichmentScheduler::new(
            SchedulerConfig {
                batch_size: self.config.batch_size,
                top_k: self.config.phase2_top_k,
            },
            governor,
        );

        let records = scheduler.run(client, rows, reporter).await?;

        reporter.update(|p| p.enter_stage(JobStage::Finalizing)).await;
        let report_path = self.write_report(job_id, &records).await?;
        reporter.update(|p| p.complete(report_path)).await;

        Ok(records)
    }

    async fn write_report(&self, job_id: &str, records: &[EnrichedRecord]) -> AppResult<Option<String>> {
        let Some(dir) = &self.report_dir else {
            return Ok(None);
        };
        let path = dir.join(format!("report_{}.json", job_id));
        let bytes = serde_json::to_vec(records)?;
        write_atomically(&path, &bytes).await?;
        Ok(Some(path.to_string_lossy().into_owned()))
    }

    fn thresholds(&self) -> MemoryThresholds {
        MemoryThresholds {
            reduce_mb: self.config.memory_reduce_mb as f64,
            minimal_mb: self.config.memory_minimal_mb as f64,
            abort_mb: self.config.memory_abort_mb as f64,
        }
    }
}
