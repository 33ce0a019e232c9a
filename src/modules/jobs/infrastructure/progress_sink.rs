/// Progress publication
///
/// The runner owns the live `JobProgress`; sinks only ever receive snapshots.
use crate::modules::jobs::domain::entities::JobProgress;
use crate::shared::errors::AppResult;
use crate::{log_debug, log_warn};
use async_trait::async_trait;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn publish(&self, job_id: &str, progress: &JobProgress) -> AppResult<()>;
}

/// In-process job table readable by collaborators
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: DashMap<String, JobProgress>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, job_id: &str) -> Option<JobProgress> {
        self.jobs.get(job_id).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, job_id: &str) -> Option<JobProgress> {
        self.jobs.remove(job_id).map(|(_, progress)| progress)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[async_trait]
impl ProgressSink for JobRegistry {
    async fn publish(&self, job_id: &str, progress: &JobProgress) -> AppResult<()> {
        self.jobs.insert(job_id.to_string(), progress.clone());
        Ok(())
    }
}

/// Writes `progress_{job_id}.json` into a directory, replacing it atomically
#[derive(Debug, Clone)]
pub struct FileProgressSink {
    dir: PathBuf,
}

impl FileProgressSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, job_id: &str) -> PathBuf {
        self.dir.join(format!("progress_{}.json", job_id))
    }
}

#[async_trait]
impl ProgressSink for FileProgressSink {
    async fn publish(&self, job_id: &str, progress: &JobProgress) -> AppResult<()> {
        let bytes = serde_json::to_vec(progress)?;
        write_atomically(&self.path_for(job_id), &bytes).await
    }
}

/// Write to a sibling temp file, then rename over the target.
pub async fn write_atomically(path: &Path, bytes: &[u8]) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Owns one job's progress and publishes a snapshot after every change
pub struct ProgressReporter {
    job_id: String,
    progress: JobProgress,
    sink: Arc<dyn ProgressSink>,
}

impl ProgressReporter {
    pub fn new(job_id: impl Into<String>, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            job_id: job_id.into(),
            progress: JobProgress::default(),
            sink,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn snapshot(&self) -> JobProgress {
        self.progress.clone()
    }

    /// Apply a change and publish the result. Publication failures are logged only.
    pub async fn update<F>(&mut self, change: F)
    where
        F: FnOnce(&mut JobProgress),
    {
        change(&mut self.progress);
        log_debug!(
            "Job {} progress: {} {:?} {}/{} ({}%)",
            self.job_id,
            self.progress.status,
            self.progress.stage,
            self.progress.done,
            self.progress.total,
            self.progress.percent
        );
        if let Err(e) = self.sink.publish(&self.job_id, &self.progress).await {
            log_warn!("Failed to publish progress for job {}: {}", self.job_id, e);
        }
    }
}
