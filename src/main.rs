//! film-enricher worker: runs one enrichment job from a JSON input file.
//!
//! Progress snapshots go to `<progress-dir>/progress_<job_id>.json` and the
//! enriched records to `<report-dir>/report_<job_id>.json`.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use film_enricher::modules::jobs::{FileProgressSink, InputRow, JobRunner, JobStatus};
use film_enricher::shared::utils::logger::init_logger;
use film_enricher::shared::utils::RateLimiter;
use film_enricher::{log_error, log_info};
use film_enricher::{Database, EnrichmentConfig, PersistentCache};

#[derive(Parser, Debug)]
#[command(name = "film-enricher", version, about = "Enrich a movie list with TMDb data")]
struct Cli {
    /// JSON array of `{title, year?, rating?, ...}` rows
    input: PathBuf,

    /// Job id; a random one is generated when omitted
    #[arg(long)]
    job_id: Option<String>,

    /// Directory for progress snapshots
    #[arg(long, env = "PROGRESS_DIR")]
    progress_dir: Option<PathBuf>,

    /// Directory for the final report
    #[arg(long, env = "REPORT_DIR", default_value = ".")]
    report_dir: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logger();
    let cli = Cli::parse();

    match run(cli).await {
        // a job error is recorded in the progress file, not in the exit code
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            log_error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<JobStatus> {
    let config = EnrichmentConfig::from_env().context("loading configuration")?;
    let rows = read_rows(&cli.input).await?;

    let db = Database::initialize(&config.cache_db_path).context("opening cache database")?;
    let cache = Arc::new(PersistentCache::open(Arc::new(db), config.cache_ttl_days)?);
    let limiter = Arc::new(RateLimiter::new(config.rate_limit));

    let job_id = cli
        .job_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let progress_dir = cli.progress_dir.unwrap_or_else(std::env::temp_dir);
    let sink = Arc::new(FileProgressSink::new(progress_dir));

    log_info!("Starting job {} with {} rows", job_id, rows.len());

    let runner = JobRunner::new(config, Arc::clone(&cache), limiter, sink).with_report_dir(cli.report_dir);
    let outcome = runner.run(&job_id, rows).await;

    cache.shutdown().await.context("flushing cache writes")?;

    log_info!(
        "Job {} finished: {} ({})",
        job_id,
        outcome.progress.status,
        outcome.progress.message
    );
    Ok(outcome.progress.status)
}

async fn read_rows(path: &Path) -> anyhow::Result<Vec<InputRow>> {
    let raw = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let rows: Vec<InputRow> =
        serde_json::from_slice(&raw).with_context(|| format!("parsing {}", path.display()))?;
    Ok(rows)
}
