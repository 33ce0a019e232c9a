/// Cache database test utilities
///
/// Every test gets its own SQLite file in a temp dir, so tests run in parallel
/// without sharing state.
use diesel::prelude::*;
use film_enricher::modules::cache::infrastructure::models::{DetailCacheRow, SearchCacheRow};
use film_enricher::modules::cache::{PersistentCache, WriterConfig};
use film_enricher::schema::{detail_cache, search_cache};
use film_enricher::shared::Database;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub struct TestCache {
    // dropped last: removes the database file
    pub dir: TempDir,
    pub db: Arc<Database>,
    pub cache: Arc<PersistentCache>,
}

/// Fresh database with a writer that flushes quickly
pub fn open_test_cache() -> TestCache {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db = Arc::new(
        Database::initialize(dir.path().join("tmdb_cache.sqlite"))
            .expect("Failed to initialize test database"),
    );
    let cache = Arc::new(
        PersistentCache::with_writer_config(
            Arc::clone(&db),
            30,
            WriterConfig {
                batch_size: 10,
                flush_interval: Duration::from_millis(20),
                ..WriterConfig::default()
            },
        )
        .expect("Failed to open cache"),
    );
    TestCache { dir, db, cache }
}

/// Insert a search row directly, bypassing the writer
pub fn insert_search_row(db: &Database, title: &str, year: i32, tmdb_id: Option<i64>, updated_at: &str) {
    let mut conn = db.get_connection().expect("Failed to get DB connection");
    diesel::replace_into(search_cache::table)
        .values(&SearchCacheRow {
            title: title.to_string(),
            year,
            tmdb_id,
            updated_at: updated_at.to_string(),
        })
        .execute(&mut conn)
        .expect("Failed to insert search row");
}

/// Insert a detail row directly, bypassing the writer
pub fn insert_detail_row(db: &Database, kind: &str, tmdb_id: i64, payload_json: Option<&str>, updated_at: &str) {
    let mut conn = db.get_connection().expect("Failed to get DB connection");
    diesel::replace_into(detail_cache::table)
        .values(&DetailCacheRow {
            kind: kind.to_string(),
            tmdb_id,
            payload_json: payload_json.map(str::to_string),
            updated_at: updated_at.to_string(),
        })
        .execute(&mut conn)
        .expect("Failed to insert detail row");
}

pub fn count_search_rows(db: &Database) -> i64 {
    let mut conn = db.get_connection().expect("Failed to get DB connection");
    search_cache::table
        .count()
        .get_result(&mut conn)
        .expect("Failed to count search rows")
}

pub fn count_detail_rows(db: &Database) -> i64 {
    let mut conn = db.get_connection().expect("Failed to get DB connection");
    detail_cache::table
        .count()
        .get_result(&mut conn)
        .expect("Failed to count detail rows")
}
