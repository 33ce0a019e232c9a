/// Test doubles and service builders
///
/// `FakeTmdb` answers TMDb paths from an in-memory catalogue and counts every
/// request by route, so tests can assert on network traffic.
use async_trait::async_trait;
use film_enricher::modules::cache::PersistentCache;
use film_enricher::modules::jobs::MemorySampler;
use film_enricher::modules::provider::infrastructure::http_client::{
    HttpTransport, RateLimitClient, RetryPolicy, TransportError, TransportResponse,
};
use film_enricher::modules::provider::EnrichmentClient;
use film_enricher::shared::utils::RateLimiter;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::factories::{search_response, MovieFactory};

#[derive(Default)]
pub struct FakeTmdb {
    /// normalized query -> result ids
    searches: Mutex<HashMap<String, Vec<i64>>>,
    movies: Mutex<HashMap<i64, MovieFactory>>,
    failing: Mutex<HashSet<String>>,
    calls: Mutex<HashMap<String, usize>>,
    total: AtomicUsize,
}

impl FakeTmdb {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a movie reachable through a search for `title`
    pub fn with_movie(self: Arc<Self>, title: &str, movie: MovieFactory, id: i64) -> Arc<Self> {
        self.searches
            .lock()
            .unwrap()
            .entry(title.trim().to_lowercase())
            .or_default()
            .push(id);
        self.movies.lock().unwrap().insert(id, movie);
        self
    }

    /// Every request to this route answers HTTP 500
    pub fn failing(self: Arc<Self>, route: &str) -> Arc<Self> {
        self.failing.lock().unwrap().insert(route.to_string());
        self
    }

    /// Requests seen for a route: `search:<query>`, `movie:<id>` or `full:<id>`
    pub fn calls(&self, route: &str) -> usize {
        self.calls.lock().unwrap().get(route).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    fn route(path: &str, query: &[(String, String)]) -> String {
        let param = |name: &str| {
            query
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        };
        if path == "search/movie" {
            return format!("search:{}", param("query").unwrap_or_default().to_lowercase());
        }
        let id = path.trim_start_matches("movie/");
        if param("append_to_response").is_some() {
            format!("full:{}", id)
        } else {
            format!("movie:{}", id)
        }
    }

    fn movie_body(&self, id: &str, render: fn(&MovieFactory) -> Value) -> Option<Value> {
        let id: i64 = id.parse().ok()?;
        let movies = self.movies.lock().unwrap();
        let body = movies.get(&id).map(render);
        body
    }

    fn answer(&self, route: &str) -> TransportResponse {
        if self.failing.lock().unwrap().contains(route) {
            return TransportResponse::status(500);
        }

        let body: Option<Value> = if let Some(query) = route.strip_prefix("search:") {
            let ids = self.searches.lock().unwrap().get(query).cloned().unwrap_or_default();
            Some(search_response(&ids))
        } else if let Some(id) = route.strip_prefix("full:") {
            self.movie_body(id, MovieFactory::details_with_extras)
        } else if let Some(id) = route.strip_prefix("movie:") {
            self.movie_body(id, MovieFactory::details)
        } else {
            None
        };

        match body {
            Some(body) => TransportResponse::ok(body.to_string()),
            None => TransportResponse::status(404),
        }
    }
}

#[async_trait]
impl HttpTransport for FakeTmdb {
    async fn get(&self, path: &str, query: &[(String, String)]) -> Result<TransportResponse, TransportError> {
        let route = Self::route(path, query);
        self.total.fetch_add(1, Ordering::SeqCst);
        *self.calls.lock().unwrap().entry(route.clone()).or_default() += 1;
        // let concurrent requests interleave
        tokio::task::yield_now().await;
        Ok(self.answer(&route))
    }
}

/// Client over the fake transport with no retry delays and a generous limiter
pub fn build_client(transport: Arc<FakeTmdb>, cache: Arc<PersistentCache>, concurrency: usize) -> EnrichmentClient {
    let http = RateLimitClient::new(
        transport,
        Arc::new(RateLimiter::new(10_000)),
        RetryPolicy::immediate(),
        concurrency,
    );
    EnrichmentClient::new(http, cache)
}

/// Replays memory readings; the last one repeats once the script runs out
pub struct ScriptedSampler {
    readings: Mutex<VecDeque<f64>>,
    last: Mutex<Option<f64>>,
    samples: AtomicUsize,
}

impl ScriptedSampler {
    pub fn new(readings: &[f64]) -> Arc<Self> {
        Arc::new(Self {
            readings: Mutex::new(readings.iter().copied().collect()),
            last: Mutex::new(None),
            samples: AtomicUsize::new(0),
        })
    }

    pub fn samples(&self) -> usize {
        self.samples.load(Ordering::SeqCst)
    }
}

impl MemorySampler for ScriptedSampler {
    fn resident_mb(&self) -> Option<f64> {
        self.samples.fetch_add(1, Ordering::SeqCst);
        let mut last = self.last.lock().unwrap();
        if let Some(next) = self.readings.lock().unwrap().pop_front() {
            *last = Some(next);
        }
        *last
    }
}
