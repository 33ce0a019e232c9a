/// Diesel models for the cache tables
use crate::schema::{detail_cache, search_cache};
use diesel::prelude::*;

/// Row of `search_cache`; also used for insert-or-replace
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = search_cache)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SearchCacheRow {
    pub title: String,
    pub year: i32,
    pub tmdb_id: Option<i64>,
    pub updated_at: String,
}

/// Row of `detail_cache`; also used for insert-or-replace
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = detail_cache)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct DetailCacheRow {
    pub kind: String,
    pub tmdb_id: i64,
    pub payload_json: Option<String>,
    pub updated_at: String,
}
