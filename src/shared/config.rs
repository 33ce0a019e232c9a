use crate::shared::errors::{AppError, AppResult};
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";

/// Runtime settings for one worker process, read from the environment.
#[derive(Debug, Clone)]
pub struct EnrichmentConfig {
    pub api_key: String,
    pub base_url: String,
    /// Semaphore size of the first client of a run
    pub concurrency: usize,
    /// Requests per trailing second, shared by every client of the process
    pub rate_limit: usize,
    pub cache_db_path: PathBuf,
    pub cache_ttl_days: i64,
    pub batch_size: usize,
    pub phase2_top_k: usize,
    pub memory_reduce_mb: u64,
    pub memory_minimal_mb: u64,
    pub memory_abort_mb: u64,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_TMDB_BASE_URL.to_string(),
            concurrency: 8,
            rate_limit: 40,
            cache_db_path: PathBuf::from("tmdb_cache.sqlite"),
            cache_ttl_days: 30,
            batch_size: 25,
            phase2_top_k: 200,
            memory_reduce_mb: 420,
            memory_minimal_mb: 460,
            memory_abort_mb: 490,
        }
    }
}

impl EnrichmentConfig {
    /// Load configuration from the process environment (after `.env`, if any).
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_key = lookup("TMDB_API_KEY")
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                AppError::ConfigurationError("TMDB_API_KEY is not set".to_string())
            })?;

        let config = Self {
            api_key,
            base_url: lookup("TMDB_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            concurrency: parse_var(&lookup, "TMDB_CONCURRENCY", defaults.concurrency)?,
            rate_limit: parse_var(&lookup, "TMDB_RATE_LIMIT", defaults.rate_limit)?,
            cache_db_path: lookup("CACHE_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_db_path),
            cache_ttl_days: parse_var(&lookup, "CACHE_TTL_DAYS", defaults.cache_ttl_days)?,
            batch_size: parse_var(&lookup, "ENRICH_BATCH_SIZE", defaults.batch_size)?,
            phase2_top_k: parse_var(&lookup, "PHASE2_TOP_K", defaults.phase2_top_k)?,
            memory_reduce_mb: parse_var(&lookup, "MEMORY_MB_REDUCE", defaults.memory_reduce_mb)?,
            memory_minimal_mb: parse_var(
                &lookup,
                "MEMORY_MB_MINIMAL",
                defaults.memory_minimal_mb,
            )?,
            memory_abort_mb: parse_var(&lookup, "MEMORY_MB_ABORT", defaults.memory_abort_mb)?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> AppResult<()> {
        if self.concurrency == 0 || self.rate_limit == 0 || self.batch_size == 0 {
            return Err(AppError::ConfigurationError(
                "TMDB_CONCURRENCY, TMDB_RATE_LIMIT and ENRICH_BATCH_SIZE must be positive"
                    .to_string(),
            ));
        }
        if self.cache_ttl_days <= 0 {
            return Err(AppError::ConfigurationError(
                "CACHE_TTL_DAYS must be positive".to_string(),
            ));
        }
        if !(self.memory_reduce_mb <= self.memory_minimal_mb
            && self.memory_minimal_mb <= self.memory_abort_mb)
        {
            return Err(AppError::ConfigurationError(format!(
                "Memory thresholds must be ascending (got {} / {} / {})",
                self.memory_reduce_mb, self.memory_minimal_mb, self.memory_abort_mb
            )));
        }
        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, name: &str, default: T) -> AppResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw.trim().parse::<T>().map_err(|_| {
            AppError::ConfigurationError(format!("{} has an invalid value: {:?}", name, raw))
        }),
    }
}
