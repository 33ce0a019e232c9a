/// Cache-aware TMDb client
///
/// Every lookup goes run memo → persistent cache → network. Clients rebuilt
/// with a lower concurrency share the memos, the cache and the rate limiter
/// of the client they replace.
use crate::modules::cache::{CacheLookup, DetailKind, PersistentCache, SearchKey};
use crate::modules::provider::application::run_memo::RunMemo;
use crate::modules::provider::domain::entities::{ExtendedFields, MinimalFields};
use crate::modules::provider::infrastructure::adapters::tmdb::models::{
    Credits, KeywordsResponse, MovieDetails, TmdbSearchResponse,
};
use crate::modules::provider::infrastructure::adapters::tmdb::TmdbMapper;
use crate::modules::provider::infrastructure::http_client::{
    RateLimitClient, ReqwestTransport, RetryPolicy,
};
use crate::shared::config::EnrichmentConfig;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::RateLimiter;
use crate::{log_debug, log_warn};
use futures::future::join_all;
use serde::de::DeserializeOwned;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Memos of one run, shared by every client built during it
#[derive(Default)]
pub struct RunMemos {
    pub search: RunMemo<SearchKey, Option<i64>>,
    pub minimal: RunMemo<i64, MinimalFields>,
    pub extended: RunMemo<i64, ExtendedFields>,
}

/// Result of a batch extended fetch. Ids that failed are reported, not fatal.
#[derive(Debug, Default)]
pub struct FullBatch {
    pub fields: HashMap<i64, ExtendedFields>,
    pub failed: Vec<(i64, AppError)>,
}

pub struct EnrichmentClient {
    http: RateLimitClient,
    cache: Arc<PersistentCache>,
    memos: Arc<RunMemos>,
    mapper: TmdbMapper,
}

impl EnrichmentClient {
    pub fn new(http: RateLimitClient, cache: Arc<PersistentCache>) -> Self {
        Self {
            http,
            cache,
            memos: Arc::new(RunMemos::default()),
            mapper: TmdbMapper::new(),
        }
    }

    /// Client for the real API, bound to a process-wide limiter
    pub fn from_config(
        config: &EnrichmentConfig,
        cache: Arc<PersistentCache>,
        rate_limiter: Arc<RateLimiter>,
    ) -> AppResult<Self> {
        let transport = ReqwestTransport::new(&config.base_url, &config.api_key)
            .map_err(|e| AppError::ConfigurationError(format!("HTTP client: {}", e)))?;
        let http = RateLimitClient::new(
            Arc::new(transport),
            rate_limiter,
            RetryPolicy::tmdb(),
            config.concurrency,
        );
        Ok(Self::new(http, cache))
    }

    /// Replacement client with a new semaphore of size `max_concurrency`.
    pub fn with_concurrency(&self, max_concurrency: usize) -> Self {
        Self {
            http: self.http.with_concurrency(max_concurrency),
            cache: Arc::clone(&self.cache),
            memos: Arc::clone(&self.memos),
            mapper: self.mapper.clone(),
        }
    }

    /// Stop scheduling new requests on this client.
    pub fn close(&self) {
        self.http.close();
    }

    pub fn max_concurrency(&self) -> usize {
        self.http.max_concurrency()
    }

    pub fn memos(&self) -> &RunMemos {
        &self.memos
    }

    /// Find the TMDb id for a title. `None` when the search has no results.
    pub async fn resolve(&self, title: &str, year: Option<i32>) -> AppResult<Option<i64>> {
        let key = SearchKey::new(title, year);
        self.memos
            .search
            .get_or_try_init(&key, || self.lookup_search(&key, title.trim()))
            .await
    }

    /// Fields from the plain movie payload
    pub async fn fetch_minimal(&self, tmdb_id: i64) -> AppResult<MinimalFields> {
        self.memos
            .minimal
            .get_or_try_init(&tmdb_id, || self.lookup_minimal(tmdb_id))
            .await
    }

    /// Credits and keywords via one combined request
    pub async fn fetch_full(&self, tmdb_id: i64) -> AppResult<ExtendedFields> {
        self.memos
            .extended
            .get_or_try_init(&tmdb_id, || self.lookup_full(tmdb_id))
            .await
    }

    /// Extended fields for many ids: one cache read per group, network only for
    /// ids missing a group. Failures are collected per id.
    pub async fn fetch_full_batch(&self, ids: &[i64]) -> FullBatch {
        let mut batch = FullBatch::default();
        let mut seen = HashSet::new();
        let mut pending: Vec<i64> = Vec::new();

        for &id in ids {
            if !seen.insert(id) {
                continue;
            }
            match self.memos.extended.get(&id) {
                Some(fields) => {
                    batch.fields.insert(id, fields);
                }
                None => pending.push(id),
            }
        }

        if pending.is_empty() {
            return batch;
        }

        let mut credits = self.read_detail_batch::<Credits>(DetailKind::Credits, &pending).await;
        let mut keywords = self
            .read_detail_batch::<KeywordsResponse>(DetailKind::Keywords, &pending)
            .await;

        let mut to_fetch = Vec::new();
        for id in pending {
            let c = credits.remove(&id).unwrap_or(CacheLookup::Miss);
            let k = keywords.remove(&id).unwrap_or(CacheLookup::Miss);
            match self.extended_from_cache(c, k) {
                Some(fields) => {
                    self.memos.extended.insert(&id, fields.clone());
                    batch.fields.insert(id, fields);
                }
                None => to_fetch.push(id),
            }
        }

        log_debug!(
            "Extended batch: {} from cache, {} to fetch",
            batch.fields.len(),
            to_fetch.len()
        );

        let results = join_all(to_fetch.iter().map(|&id| async move {
            (id, self.fetch_full(id).await)
        }))
        .await;

        for (id, result) in results {
            match result {
                Ok(fields) => {
                    batch.fields.insert(id, fields);
                }
                Err(e) => batch.failed.push((id, e)),
            }
        }

        batch
    }

    /// Resolve a title and load its minimal fields (empty when unresolved).
    pub async fn get_enriched(
        &self,
        title: &str,
        year: Option<i32>,
    ) -> AppResult<(Option<i64>, MinimalFields)> {
        match self.resolve(title, year).await? {
            Some(id) => Ok((Some(id), self.fetch_minimal(id).await?)),
            None => Ok((None, MinimalFields::default())),
        }
    }

    async fn lookup_search(&self, key: &SearchKey, query_title: &str) -> AppResult<Option<i64>> {
        match self.read_search(key).await {
            CacheLookup::Hit(id) => return Ok(Some(id)),
            CacheLookup::NegativeHit => return Ok(None),
            CacheLookup::Miss => {}
        }

        let mut query = vec![("query".to_string(), query_title.to_string())];
        if let Some(year) = key.year_filter() {
            query.push(("year".to_string(), year.to_string()));
        }

        let response: TmdbSearchResponse = self.http.get_json("search/movie", &query).await?;
        let tmdb_id = response.results.first().map(|r| r.id);

        log_debug!(
            "TMDB: '{}' ({}) resolved to {:?}",
            key.title,
            key.year,
            tmdb_id
        );
        self.cache.set_search(key.clone(), tmdb_id).await;
        Ok(tmdb_id)
    }

    async fn lookup_minimal(&self, tmdb_id: i64) -> AppResult<MinimalFields> {
        match self.read_detail::<MovieDetails>(DetailKind::Movie, tmdb_id).await {
            CacheLookup::Hit(movie) => return Ok(self.mapper.map_minimal(&movie)),
            CacheLookup::NegativeHit => return Ok(MinimalFields::default()),
            CacheLookup::Miss => {}
        }

        let movie: MovieDetails = self
            .http
            .get_json(&format!("movie/{}", tmdb_id), &[])
            .await?;
        self.store_detail(DetailKind::Movie, tmdb_id, &movie).await;
        Ok(self.mapper.map_minimal(&movie))
    }

    async fn lookup_full(&self, tmdb_id: i64) -> AppResult<ExtendedFields> {
        let credits = self.read_detail::<Credits>(DetailKind::Credits, tmdb_id).await;
        let keywords = self
            .read_detail::<KeywordsResponse>(DetailKind::Keywords, tmdb_id)
            .await;
        if let Some(fields) = self.extended_from_cache(credits, keywords) {
            return Ok(fields);
        }

        self.fetch_full_from_network(tmdb_id).await
    }

    async fn fetch_full_from_network(&self, tmdb_id: i64) -> AppResult<ExtendedFields> {
        let query = [(
            "append_to_response".to_string(),
            "credits,keywords".to_string(),
        )];
        let combined: MovieDetails = self
            .http
            .get_json(&format!("movie/{}", tmdb_id), &query)
            .await?;

        let (movie, credits, keywords) = combined.split_appended();
        let credits = credits.unwrap_or_default();
        let keywords = keywords.unwrap_or_default();

        self.store_detail(DetailKind::Movie, tmdb_id, &movie).await;
        self.store_detail(DetailKind::Credits, tmdb_id, &credits).await;
        self.store_detail(DetailKind::Keywords, tmdb_id, &keywords).await;

        self.memos
            .minimal
            .insert(&tmdb_id, self.mapper.map_minimal(&movie));

        Ok(self.mapper.map_extended(Some(&credits), Some(&keywords)))
    }

    /// Both groups fresh (or negative) in the cache
    fn extended_from_cache(
        &self,
        credits: CacheLookup<Credits>,
        keywords: CacheLookup<KeywordsResponse>,
    ) -> Option<ExtendedFields> {
        let credits = credits.into_found()?;
        let keywords = keywords.into_found()?;
        Some(self.mapper.map_extended(credits.as_ref(), keywords.as_ref()))
    }

    async fn read_search(&self, key: &SearchKey) -> CacheLookup<i64> {
        match self.cache.get_search(key).await {
            Ok(lookup) => lookup,
            Err(e) => {
                log_warn!("Search cache read failed, treating as miss: {}", e);
                CacheLookup::Miss
            }
        }
    }

    async fn read_detail<T: DeserializeOwned>(&self, kind: DetailKind, tmdb_id: i64) -> CacheLookup<T> {
        match self.cache.get_detail(kind, tmdb_id).await {
            Ok(lookup) => decode_lookup(kind, tmdb_id, lookup),
            Err(e) => {
                log_warn!("Detail cache read failed, treating as miss: {}", e);
                CacheLookup::Miss
            }
        }
    }

    async fn read_detail_batch<T: DeserializeOwned>(
        &self,
        kind: DetailKind,
        ids: &[i64],
    ) -> HashMap<i64, CacheLookup<T>> {
        match self.cache.get_detail_batch(kind, ids).await {
            Ok(found) => found
                .into_iter()
                .map(|(id, lookup)| (id, decode_lookup(kind, id, lookup)))
                .collect(),
            Err(e) => {
                log_warn!("Batch {} cache read failed, treating as misses: {}", kind, e);
                HashMap::new()
            }
        }
    }

    async fn store_detail<T: serde::Serialize>(&self, kind: DetailKind, tmdb_id: i64, value: &T) {
        match serde_json::to_string(value) {
            Ok(json) => self.cache.set_detail(kind, tmdb_id, Some(json)).await,
            Err(e) => log_warn!("Could not serialize {} {} for cache: {}", kind, tmdb_id, e),
        }
    }
}

/// Undecodable cached payloads count as misses
fn decode_lookup<T: DeserializeOwned>(
    kind: DetailKind,
    tmdb_id: i64,
    lookup: CacheLookup<String>,
) -> CacheLookup<T> {
    match lookup {
        CacheLookup::Hit(json) => match serde_json::from_str(&json) {
            Ok(value) => CacheLookup::Hit(value),
            Err(e) => {
                log_warn!("Discarding unreadable cached {} {}: {}", kind, tmdb_id, e);
                CacheLookup::Miss
            }
        },
        CacheLookup::NegativeHit => CacheLookup::NegativeHit,
        CacheLookup::Miss => CacheLookup::Miss,
    }
}
