/// Two-phase enrichment pipeline
///
/// Phase 1 resolves every row and loads its minimal fields in sequential
/// batches; rows inside a batch run concurrently. Phase 2 picks the ranked
/// subsets worth the expensive credits/keywords request and merges those
/// fields back into every record sharing the id.
use crate::modules::jobs::domain::entities::{
    EnrichedRecord, InputRow, JobStage, ABORT_MESSAGE,
};
use crate::modules::jobs::domain::services::governor::{ConcurrencyGovernor, GovernorDecision};
use crate::modules::jobs::domain::services::selection::select_phase2;
use crate::modules::jobs::infrastructure::progress_sink::ProgressReporter;
use crate::modules::provider::EnrichmentClient;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::logger::{LogContext, TimedOperation};
use crate::{log_info, log_warn};
use futures::future::join_all;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub batch_size: usize,
    /// Entries per phase-2 view
    pub top_k: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            batch_size: 25,
            top_k: 200,
        }
    }
}

pub struct EnrichmentScheduler {
    config: SchedulerConfig,
    governor: ConcurrencyGovernor,
}

impl EnrichmentScheduler {
    pub fn new(config: SchedulerConfig, governor: ConcurrencyGovernor) -> Self {
        Self {
            config: SchedulerConfig {
                batch_size: config.batch_size.max(1),
                ..config
            },
            governor,
        }
    }

    pub fn governor(&self) -> &ConcurrencyGovernor {
        &self.governor
    }

    /// Run both phases. The client is closed before returning, on success or error.
    pub async fn run(
        &mut self,
        client: EnrichmentClient,
        rows: Vec<InputRow>,
        reporter: &mut ProgressReporter,
    ) -> AppResult<Vec<EnrichedRecord>> {
        let mut client = client;
        let result = self.run_phases(&mut client, &rows, reporter).await;
        client.close();
        result
    }

    async fn run_phases(
        &mut self,
        client: &mut EnrichmentClient,
        rows: &[InputRow],
        reporter: &mut ProgressReporter,
    ) -> AppResult<Vec<EnrichedRecord>> {
        let timer = TimedOperation::new("phase 1 (minimal fields)");
        let mut records = self.phase_one(client, rows, reporter).await?;
        timer.finish_with_info(&format!("{} records", records.len()));

        let timer = TimedOperation::new("phase 2 (credits and keywords)");
        self.phase_two(client, &mut records, rows.len(), reporter).await?;
        timer.finish();

        Ok(records)
    }

    async fn phase_one(
        &mut self,
        client: &mut EnrichmentClient,
        rows: &[InputRow],
        reporter: &mut ProgressReporter,
    ) -> AppResult<Vec<EnrichedRecord>> {
        let total = rows.len();
        reporter
            .update(|p| {
                p.enter_stage(JobStage::TmdbDetails);
                p.set_total(total);
            })
            .await;

        let mut records = Vec::with_capacity(total);
        let mut done = 0;

        for batch in rows.chunks(self.config.batch_size) {
            self.consult_governor(client, done)?;

            let current: &EnrichmentClient = client;
            let results = join_all(batch.iter().map(|row| enrich_row(current, row))).await;

            // every row of the batch has finished; the first failure ends the job
            for result in results {
                if let Some(record) = result? {
                    records.push(record);
                }
            }

            done += batch.len();
            reporter.update(|p| p.advance(done)).await;
            LogContext::job_progress(reporter.job_id(), done, total, "tmdb_details");
        }

        Ok(records)
    }

    async fn phase_two(
        &mut self,
        client: &mut EnrichmentClient,
        records: &mut [EnrichedRecord],
        rows_processed: usize,
        reporter: &mut ProgressReporter,
    ) -> AppResult<()> {
        let selection = select_phase2(records, self.config.top_k);
        let ids = selection.union_ids(records);

        log_info!(
            "Phase 2: {} ids (top rated {}, hidden gems {}, overrated {}, top external {})",
            ids.len(),
            selection.top_rated.len(),
            selection.hidden_gems.len(),
            selection.overrated.len(),
            selection.top_external.len()
        );

        if ids.is_empty() {
            return Ok(());
        }

        reporter.update(|p| p.enter_stage(JobStage::TmdbExtras)).await;

        let mut positions: HashMap<i64, Vec<usize>> = HashMap::new();
        for (index, record) in records.iter().enumerate() {
            if let Some(id) = record.tmdb_id {
                positions.entry(id).or_default().push(index);
            }
        }

        let mut fetched = 0;
        for chunk in ids.chunks(self.config.batch_size) {
            // one running count across both phases, blank rows included
            self.consult_governor(client, rows_processed + fetched)?;

            let batch = client.fetch_full_batch(chunk).await;
            for (id, error) in &batch.failed {
                log_warn!("Extended fields for {} unavailable: {}", id, error);
            }

            for (id, fields) in batch.fields {
                if let Some(indices) = positions.get(&id) {
                    for &index in indices {
                        records[index].extended = Some(fields.clone());
                    }
                }
            }

            fetched += chunk.len();
            let message = format!("{} ({}/{})", JobStage::TmdbExtras.message(), fetched, ids.len());
            reporter.update(|p| p.set_message(message)).await;
        }

        Ok(())
    }

    /// Apply the governor's decision before a batch.
    fn consult_governor(&mut self, client: &mut EnrichmentClient, processed: usize) -> AppResult<()> {
        match self.governor.observe(processed) {
            GovernorDecision::Continue => Ok(()),
            GovernorDecision::Reduce(concurrency) => {
                let replacement = client.with_concurrency(concurrency);
                client.close();
                *client = replacement;
                Ok(())
            }
            GovernorDecision::Abort { resident_mb } => {
                log_warn!(
                    "Stopping run after {} rows at {:.1} MB resident",
                    processed,
                    resident_mb
                );
                client.close();
                Err(AppError::ResourceExhausted(ABORT_MESSAGE.to_string()))
            }
        }
    }
}

/// Phase-1 work for one row; blank rows yield nothing
async fn enrich_row(client: &EnrichmentClient, row: &InputRow) -> AppResult<Option<EnrichedRecord>> {
    if row.is_blank() {
        return Ok(None);
    }
    let (tmdb_id, minimal) = client.get_enriched(&row.title, row.year).await?;
    Ok(Some(EnrichedRecord::from_row(row, tmdb_id, minimal)))
}
