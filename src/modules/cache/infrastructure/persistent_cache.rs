/// Reader side of the cache plus the writer handle
///
/// Reads go straight to pooled WAL connections on the blocking pool and never
/// coordinate with the writer. Writes are queued and become visible once the
/// writer commits them.
use crate::modules::cache::domain::entities::{
    is_fresh, CacheLookup, DetailKind, PendingWrite, SearchKey,
};
use crate::modules::cache::infrastructure::models::{DetailCacheRow, SearchCacheRow};
use crate::modules::cache::infrastructure::writer::{
    CacheWriter, SqliteSink, WriterConfig, WriterStatsSnapshot,
};
use crate::schema::{detail_cache, search_cache};
use crate::shared::errors::AppResult;
use crate::shared::infrastructure::database::Database;
use crate::shared::utils::logger::LogContext;
use chrono::{Duration, Utc};
use diesel::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

/// Ids per `IN (...)` query, below SQLite's bound-parameter limit
const BATCH_READ_CHUNK: usize = 500;

pub struct PersistentCache {
    db: Arc<Database>,
    writer: CacheWriter,
    ttl: Duration,
}

impl PersistentCache {
    /// Attach to an initialized store and start the writer thread.
    pub fn open(db: Arc<Database>, ttl_days: i64) -> AppResult<Self> {
        Self::with_writer_config(db, ttl_days, WriterConfig::default())
    }

    pub fn with_writer_config(
        db: Arc<Database>,
        ttl_days: i64,
        config: WriterConfig,
    ) -> AppResult<Self> {
        let conn = db.open_writer_connection()?;
        let writer = CacheWriter::spawn(SqliteSink::new(conn), config)?;

        Ok(Self {
            db,
            writer,
            ttl: Duration::days(ttl_days),
        })
    }

    pub async fn get_search(&self, key: &SearchKey) -> AppResult<CacheLookup<i64>> {
        let db = Arc::clone(&self.db);
        let ttl = self.ttl;
        let (title, year) = (key.title.clone(), key.year);

        tokio::task::spawn_blocking(move || -> AppResult<CacheLookup<i64>> {
            let mut conn = db.get_connection()?;
            let row: Option<SearchCacheRow> = search_cache::table
                .find((title, year))
                .select(SearchCacheRow::as_select())
                .first(&mut conn)
                .optional()?;

            Ok(match row {
                Some(row) if is_fresh(&row.updated_at, ttl, Utc::now()) => match row.tmdb_id {
                    Some(id) => CacheLookup::Hit(id),
                    None => CacheLookup::NegativeHit,
                },
                _ => CacheLookup::Miss,
            })
        })
        .await?
    }

    pub async fn set_search(&self, key: SearchKey, tmdb_id: Option<i64>) {
        self.writer
            .enqueue(PendingWrite::Search { key, tmdb_id })
            .await;
    }

    pub async fn get_detail(&self, kind: DetailKind, tmdb_id: i64) -> AppResult<CacheLookup<String>> {
        let mut found = self.get_detail_batch(kind, &[tmdb_id]).await?;
        Ok(found.remove(&tmdb_id).unwrap_or(CacheLookup::Miss))
    }

    /// One read for many ids. Every requested id appears in the result.
    pub async fn get_detail_batch(
        &self,
        kind: DetailKind,
        ids: &[i64],
    ) -> AppResult<HashMap<i64, CacheLookup<String>>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let db = Arc::clone(&self.db);
        let ttl = self.ttl;
        let ids = ids.to_vec();

        tokio::task::spawn_blocking(move || -> AppResult<HashMap<i64, CacheLookup<String>>> {
            let start = std::time::Instant::now();
            let mut conn = db.get_connection()?;
            let now = Utc::now();
            let mut result: HashMap<i64, CacheLookup<String>> =
                ids.iter().map(|id| (*id, CacheLookup::Miss)).collect();

            for chunk in ids.chunks(BATCH_READ_CHUNK) {
                let rows: Vec<DetailCacheRow> = detail_cache::table
                    .filter(detail_cache::kind.eq(kind.as_str()))
                    .filter(detail_cache::tmdb_id.eq_any(chunk.to_vec()))
                    .select(DetailCacheRow::as_select())
                    .load(&mut conn)?;

                for row in rows {
                    if !is_fresh(&row.updated_at, ttl, now) {
                        continue;
                    }
                    let lookup = match row.payload_json {
                        Some(payload) => CacheLookup::Hit(payload),
                        None => CacheLookup::NegativeHit,
                    };
                    result.insert(row.tmdb_id, lookup);
                }
            }

            LogContext::db_operation(
                &format!("batch read {} x{}", kind, result.len()),
                "detail_cache",
                Some(start.elapsed().as_millis() as u64),
            );
            Ok(result)
        })
        .await?
    }

    pub async fn set_detail(&self, kind: DetailKind, tmdb_id: i64, payload_json: Option<String>) {
        self.writer
            .enqueue(PendingWrite::Detail {
                kind,
                tmdb_id,
                payload_json,
            })
            .await;
    }

    /// Flush queued writes and stop the writer thread.
    pub async fn shutdown(self: &Arc<Self>) -> AppResult<()> {
        let cache = Arc::clone(self);
        tokio::task::spawn_blocking(move || cache.writer.shutdown()).await?
    }

    pub fn writer_stats(&self) -> WriterStatsSnapshot {
        self.writer.stats()
    }
}
