//! Enrichment client tests
//!
//! Memo → cache → network ordering against a fake TMDb, including reuse of
//! cached results across runs.
mod utils;

use film_enricher::modules::cache::PersistentCache;
use film_enricher::shared::errors::{AppError, ProviderError};
use futures::future::join_all;
use std::sync::Arc;
use utils::{
    db,
    factories::MovieFactory,
    helpers::{build_client, FakeTmdb},
};

fn heat_catalogue() -> Arc<FakeTmdb> {
    FakeTmdb::new()
        .with_movie("Heat", MovieFactory::new(949, "Heat").votes(7.9, 6000).directors(&["Michael Mann"]), 949)
        .with_movie("Ronin", MovieFactory::new(8195, "Ronin").votes(6.9, 2500), 8195)
}

// ================================================================================================
// MEMOIZATION
// ================================================================================================

#[tokio::test]
async fn concurrent_resolves_share_one_search() {
    let t = db::open_test_cache();
    let tmdb = heat_catalogue();
    let client = build_client(tmdb.clone(), t.cache.clone(), 8);

    let ids = join_all((0..10).map(|_| client.resolve("Heat", Some(1995)))).await;
    let again = client.resolve("Heat", Some(1995)).await.unwrap();

    assert!(ids.iter().all(|r| matches!(r, Ok(Some(949)))));
    assert_eq!(again, Some(949));
    assert_eq!(tmdb.calls("search:heat"), 1);
}

#[tokio::test]
async fn normalized_titles_and_misses_are_looked_up_once() {
    let t = db::open_test_cache();
    let tmdb = heat_catalogue();
    let client = build_client(tmdb.clone(), t.cache.clone(), 8);

    let results = join_all(vec![
        client.get_enriched("Heat", Some(1995)),
        client.get_enriched(" heat ", Some(1995)),
        client.get_enriched("No Such Film", None),
    ])
    .await;
    let results: Vec<_> = results.into_iter().map(|r| r.unwrap()).collect();

    assert_eq!(results[0].0, Some(949));
    assert_eq!(results[1].0, Some(949));
    assert_eq!(results[0].1, results[1].1);
    assert_eq!(results[0].1.tmdb_vote_count, 6000);
    assert_eq!(results[2].0, None);
    assert_eq!(results[2].1.tmdb_vote_count, 0);

    assert_eq!(tmdb.calls("search:heat"), 1);
    assert_eq!(tmdb.calls("movie:949"), 1);
    assert_eq!(tmdb.calls("search:no such film"), 1);
    assert_eq!(tmdb.total_calls(), 3);
}

// ================================================================================================
// PERSISTENT CACHE
// ================================================================================================

#[tokio::test]
async fn second_run_is_served_from_cache() {
    let t = db::open_test_cache();
    let tmdb = heat_catalogue();

    let first = build_client(tmdb.clone(), t.cache.clone(), 4);
    let (id, minimal) = first.get_enriched("Heat", Some(1995)).await.unwrap();
    first.get_enriched("No Such Film", None).await.unwrap();
    first.close();
    t.cache.shutdown().await.unwrap();
    let calls_after_first_run = tmdb.total_calls();

    // fresh memos, same store
    let cache = Arc::new(PersistentCache::open(t.db.clone(), 30).unwrap());
    let second = build_client(tmdb.clone(), cache.clone(), 4);
    let (cached_id, cached_minimal) = second.get_enriched("heat", Some(1995)).await.unwrap();
    let (missing, _) = second.get_enriched("no such film", None).await.unwrap();

    assert_eq!(cached_id, id);
    assert_eq!(cached_minimal, minimal);
    assert_eq!(missing, None);
    assert_eq!(tmdb.total_calls(), calls_after_first_run);
    cache.shutdown().await.unwrap();
}

#[tokio::test]
async fn full_batch_dedupes_and_reports_failures() {
    let t = db::open_test_cache();
    let tmdb = heat_catalogue();
    let client = build_client(tmdb.clone(), t.cache.clone(), 4);

    let batch = client.fetch_full_batch(&[949, 8195, 949, 1]).await;

    assert_eq!(batch.fields.len(), 2);
    assert_eq!(batch.fields[&949].directors, vec!["Michael Mann".to_string()]);
    assert_eq!(batch.fields[&949].actors.len(), 2);
    assert_eq!(batch.fields[&949].keywords, vec!["heist".to_string()]);
    assert_eq!(batch.failed.len(), 1);
    assert_eq!(batch.failed[0].0, 1);
    assert_eq!(tmdb.calls("full:949"), 1);

    // the combined request also answered the minimal fields
    let minimal = client.fetch_minimal(949).await.unwrap();
    assert_eq!(minimal.tmdb_stars, Some(7.9 / 2.0));
    assert_eq!(tmdb.calls("movie:949"), 0);

    // memo hit, no network
    let again = client.fetch_full_batch(&[949]).await;
    assert_eq!(again.fields.len(), 1);
    assert_eq!(tmdb.calls("full:949"), 1);
}

#[tokio::test]
async fn extended_fields_come_from_cache_in_a_later_run() {
    let t = db::open_test_cache();
    let tmdb = heat_catalogue();

    let first = build_client(tmdb.clone(), t.cache.clone(), 4);
    first.fetch_full(949).await.unwrap();
    t.cache.shutdown().await.unwrap();

    let cache = Arc::new(PersistentCache::open(t.db.clone(), 30).unwrap());
    let second = build_client(tmdb.clone(), cache.clone(), 4);
    let batch = second.fetch_full_batch(&[949]).await;

    assert_eq!(batch.fields[&949].directors, vec!["Michael Mann".to_string()]);
    assert_eq!(tmdb.calls("full:949"), 1);
    cache.shutdown().await.unwrap();
}

// ================================================================================================
// FAILURES
// ================================================================================================

#[tokio::test]
async fn exhausted_retries_surface_as_api_error() {
    let t = db::open_test_cache();
    let tmdb = heat_catalogue().failing("search:heat");
    let client = build_client(tmdb.clone(), t.cache.clone(), 4);

    let err = client.get_enriched("Heat", Some(1995)).await.unwrap_err();

    assert!(matches!(err, AppError::ApiError(_)), "unexpected error: {:?}", err);
    assert_eq!(tmdb.calls("search:heat"), 6);

    // failures are not memoized
    let _ = client.resolve("Heat", Some(1995)).await;
    assert_eq!(tmdb.calls("search:heat"), 12);
}

#[tokio::test]
async fn closed_client_makes_no_requests() {
    let t = db::open_test_cache();
    let tmdb = heat_catalogue();
    let client = build_client(tmdb.clone(), t.cache.clone(), 4);
    client.close();

    let err = client.resolve("Heat", Some(1995)).await.unwrap_err();
    assert!(err.to_string().contains(&ProviderError::ClientClosed.to_string()));
    assert_eq!(tmdb.total_calls(), 0);

    let replacement = client.with_concurrency(1);
    assert_eq!(replacement.resolve("Heat", Some(1995)).await.unwrap(), Some(949));
}
