//! Single cache writer
//!
//! Producers hand writes to a bounded queue; one dedicated thread owns the
//! only write connection, groups queued writes into batches and commits each
//! batch in one transaction.

use crate::modules::cache::domain::entities::{timestamp_now, PendingWrite};
use crate::modules::cache::infrastructure::models::{DetailCacheRow, SearchCacheRow};
use crate::schema::{detail_cache, search_cache};
use crate::shared::errors::{AppError, AppResult};
use crate::{log_debug, log_error, log_info, log_warn};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Failure of one batch commit
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SinkError {
    /// Another connection holds the lock; worth retrying
    #[error("database is busy: {0}")]
    Contention(String),

    #[error("cache write failed: {0}")]
    Fatal(String),
}

/// Destination of flushed batches. A batch is applied atomically or not at all.
pub trait BatchSink: Send + 'static {
    fn apply(&mut self, batch: &[PendingWrite]) -> Result<(), SinkError>;
}

/// Writes batches to the cache tables over the writer's own connection
pub struct SqliteSink {
    conn: SqliteConnection,
}

impl SqliteSink {
    pub fn new(conn: SqliteConnection) -> Self {
        Self { conn }
    }

    fn classify(err: diesel::result::Error) -> SinkError {
        let message = err.to_string();
        let lowered = message.to_lowercase();
        if lowered.contains("locked") || lowered.contains("busy") {
            SinkError::Contention(message)
        } else {
            SinkError::Fatal(message)
        }
    }
}

impl BatchSink for SqliteSink {
    fn apply(&mut self, batch: &[PendingWrite]) -> Result<(), SinkError> {
        let updated_at = timestamp_now();

        self.conn
            .immediate_transaction::<_, diesel::result::Error, _>(|conn| {
                for write in batch {
                    match write {
                        PendingWrite::Search { key, tmdb_id } => {
                            diesel::replace_into(search_cache::table)
                                .values(&SearchCacheRow {
                                    title: key.title.clone(),
                                    year: key.year,
                                    tmdb_id: *tmdb_id,
                                    updated_at: updated_at.clone(),
                                })
                                .execute(conn)?;
                        }
                        PendingWrite::Detail {
                            kind,
                            tmdb_id,
                            payload_json,
                        } => {
                            diesel::replace_into(detail_cache::table)
                                .values(&DetailCacheRow {
                                    kind: kind.as_str().to_string(),
                                    tmdb_id: *tmdb_id,
                                    payload_json: payload_json.clone(),
                                    updated_at: updated_at.clone(),
                                })
                                .execute(conn)?;
                        }
                    }
                }
                Ok(())
            })
            .map_err(Self::classify)
    }
}

/// Writer tuning
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Flush once this many writes are pending
    pub batch_size: usize,
    /// Flush at the latest this long after a flush window opens
    pub flush_interval: Duration,
    /// Writes waiting in the queue before producers block; a retained batch
    /// stops the writer from draining it
    pub queue_capacity: usize,
    pub max_flush_attempts: u32,
    /// Backoff after the n-th contended attempt is `n * backoff_step`
    pub backoff_step: Duration,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            flush_interval: Duration::from_secs(1),
            queue_capacity: 2000,
            max_flush_attempts: 5,
            backoff_step: Duration::from_millis(50),
        }
    }
}

#[derive(Debug)]
enum WriterMessage {
    Write(PendingWrite),
    Shutdown,
}

/// Counters maintained by the writer thread
#[derive(Debug, Default)]
pub struct WriterStats {
    committed_batches: AtomicU64,
    committed_writes: AtomicU64,
    failed_flushes: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterStatsSnapshot {
    pub committed_batches: u64,
    pub committed_writes: u64,
    pub failed_flushes: u64,
}

impl WriterStats {
    pub fn snapshot(&self) -> WriterStatsSnapshot {
        WriterStatsSnapshot {
            committed_batches: self.committed_batches.load(Ordering::Relaxed),
            committed_writes: self.committed_writes.load(Ordering::Relaxed),
            failed_flushes: self.failed_flushes.load(Ordering::Relaxed),
        }
    }
}

/// Handle to the writer thread. Cloned senders feed it; `shutdown` drains and joins.
pub struct CacheWriter {
    sender: SyncSender<WriterMessage>,
    handle: Mutex<Option<JoinHandle<()>>>,
    stats: Arc<WriterStats>,
    stopping: Arc<AtomicBool>,
}

impl CacheWriter {
    pub fn spawn<S: BatchSink>(sink: S, config: WriterConfig) -> AppResult<Self> {
        let (sender, receiver) = mpsc::sync_channel(config.queue_capacity.max(1));
        let stats = Arc::new(WriterStats::default());
        let stopping = Arc::new(AtomicBool::new(false));
        let thread_stats = Arc::clone(&stats);
        let thread_stopping = Arc::clone(&stopping);

        let handle = std::thread::Builder::new()
            .name("cache-writer".to_string())
            .spawn(move || run_writer(sink, receiver, config, thread_stats, thread_stopping))?;

        Ok(Self {
            sender,
            handle: Mutex::new(Some(handle)),
            stats,
            stopping,
        })
    }

    /// Queue a write. Returns at once unless the queue is full, then waits for room.
    pub async fn enqueue(&self, write: PendingWrite) {
        match self.sender.try_send(WriterMessage::Write(write)) {
            Ok(()) => {}
            Err(TrySendError::Full(message)) => {
                log_debug!("Cache writer queue full, waiting for room");
                let sender = self.sender.clone();
                let sent = tokio::task::spawn_blocking(move || sender.send(message)).await;
                if !matches!(sent, Ok(Ok(()))) {
                    log_warn!("Cache writer stopped; dropping write");
                }
            }
            Err(TrySendError::Disconnected(_)) => {
                log_warn!("Cache writer stopped; dropping write");
            }
        }
    }

    /// Blocking variant of `enqueue` for callers outside the async runtime.
    pub fn enqueue_blocking(&self, write: PendingWrite) {
        if self.sender.send(WriterMessage::Write(write)).is_err() {
            log_warn!("Cache writer stopped; dropping write");
        }
    }

    /// Flush what is queued and stop the thread. Blocks until the thread exits.
    pub fn shutdown(&self) -> AppResult<()> {
        let handle = match self.handle.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        let Some(handle) = handle else {
            return Ok(());
        };

        // A stalled writer is not reading the queue; the flag and unpark reach it anyway
        self.stopping.store(true, Ordering::SeqCst);
        handle.thread().unpark();
        let _ = self.sender.try_send(WriterMessage::Shutdown);
        handle
            .join()
            .map_err(|_| AppError::CacheError("Cache writer thread panicked".to_string()))
    }

    pub fn stats(&self) -> WriterStatsSnapshot {
        self.stats.snapshot()
    }
}

fn run_writer<S: BatchSink>(
    mut sink: S,
    receiver: Receiver<WriterMessage>,
    config: WriterConfig,
    stats: Arc<WriterStats>,
    stopping: Arc<AtomicBool>,
) {
    log_info!(
        "Cache writer started (batch {}, interval {:?})",
        config.batch_size,
        config.flush_interval
    );

    let batch_size = config.batch_size.max(1);
    let mut batch: Vec<PendingWrite> = Vec::with_capacity(batch_size);
    let mut retained = false;
    let mut window_opened = Instant::now();

    loop {
        if stopping.load(Ordering::SeqCst) {
            drain_pending(&receiver, &mut batch);
            flush(&mut sink, &mut batch, &config, &stats);
            break;
        }

        // Nothing leaves the queue until the retained batch commits
        if retained {
            std::thread::park_timeout(config.flush_interval);
            if !stopping.load(Ordering::SeqCst) {
                retained = !flush(&mut sink, &mut batch, &config, &stats);
            }
            window_opened = Instant::now();
            continue;
        }

        let deadline = window_opened + config.flush_interval;
        let wait = deadline.saturating_duration_since(Instant::now());

        match receiver.recv_timeout(wait) {
            Ok(WriterMessage::Write(write)) => {
                batch.push(write);
                if batch.len() >= batch_size {
                    retained = !flush(&mut sink, &mut batch, &config, &stats);
                    window_opened = Instant::now();
                }
            }
            Ok(WriterMessage::Shutdown) => {
                drain_pending(&receiver, &mut batch);
                flush(&mut sink, &mut batch, &config, &stats);
                break;
            }
            Err(RecvTimeoutError::Timeout) => {
                retained = !flush(&mut sink, &mut batch, &config, &stats);
                window_opened = Instant::now();
            }
            Err(RecvTimeoutError::Disconnected) => {
                flush(&mut sink, &mut batch, &config, &stats);
                break;
            }
        }
    }

    if !batch.is_empty() {
        log_error!(
            "Cache writer exiting with {} unflushed writes; they will be refetched by a later run",
            batch.len()
        );
    }
    log_info!("Cache writer stopped");
}

/// Pull whatever producers queued before the shutdown request.
fn drain_pending(receiver: &Receiver<WriterMessage>, batch: &mut Vec<PendingWrite>) {
    while let Ok(message) = receiver.try_recv() {
        if let WriterMessage::Write(write) = message {
            batch.push(write);
        }
    }
}

/// Commit the batch. On failure the writes stay in `batch` and `false` is returned.
fn flush<S: BatchSink>(
    sink: &mut S,
    batch: &mut Vec<PendingWrite>,
    config: &WriterConfig,
    stats: &WriterStats,
) -> bool {
    if batch.is_empty() {
        return true;
    }

    match flush_with_retry(sink, batch, config) {
        Ok(()) => {
            stats.committed_batches.fetch_add(1, Ordering::Relaxed);
            stats
                .committed_writes
                .fetch_add(batch.len() as u64, Ordering::Relaxed);
            log_debug!("Cache writer committed {} writes", batch.len());
            batch.clear();
            true
        }
        Err(e) => {
            stats.failed_flushes.fetch_add(1, Ordering::Relaxed);
            log_error!(
                "Cache flush of {} writes failed, holding the queue until it commits: {}",
                batch.len(),
                e
            );
            false
        }
    }
}

pub(crate) fn flush_with_retry<S: BatchSink>(
    sink: &mut S,
    batch: &[PendingWrite],
    config: &WriterConfig,
) -> Result<(), SinkError> {
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match sink.apply(batch) {
            Ok(()) => return Ok(()),
            Err(SinkError::Contention(reason)) if attempt < config.max_flush_attempts => {
                let delay = config.backoff_step * attempt;
                log_warn!(
                    "Cache flush contended (attempt {}/{}): {}. Retrying in {:?}",
                    attempt,
                    config.max_flush_attempts,
                    reason,
                    delay
                );
                std::thread::sleep(delay);
            }
            Err(e) => return Err(e),
        }
    }
}
