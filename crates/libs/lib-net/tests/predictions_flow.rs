//! # Predictions Flow
//!
//! Cached `GET /predictions` across the TTL boundary, backed by memory and by
//! the on-disk store.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{scratch_dir, CannedTransport};
use lib_core::FailureKind;
use lib_net::{
    ApiRequest, CacheStore, FileStore, MemoryStore, RequestExecutor, RequestOptions,
    RequestOutcome, RetryPolicy, TimeBoxedCache,
};
use lib_utils::ManualClock;
use shared::{Direction, Prediction};

const PREDICTIONS: &str = r#"[
    {"symbol": "SOL", "direction": "up", "confidence": 0.82, "target_price": 162.5, "generated_at": "2024-05-01T12:00:00Z"},
    {"symbol": "BTC", "direction": "flat", "confidence": 0.55, "target_price": 64000.0, "generated_at": "2024-05-01T12:00:00Z"}
]"#;

const TTL: Duration = Duration::from_secs(1800);

fn predictions_options() -> RequestOptions {
    RequestOptions::default()
        .cached(TTL)
        .with_retry(RetryPolicy::new(3, Duration::from_millis(10)))
}

async fn fetch(executor: &RequestExecutor) -> RequestOutcome<Vec<Prediction>> {
    executor
        .execute(ApiRequest::get("/predictions"), predictions_options())
        .await
}

#[tokio::test]
async fn test_predictions_cached_for_ttl_then_refetched() {
    // Arrange
    let transport = CannedTransport::new();
    transport.respond(200, PREDICTIONS);
    transport.respond(200, PREDICTIONS);
    let clock = Arc::new(ManualClock::starting_now());
    let cache = Arc::new(TimeBoxedCache::new(Arc::new(MemoryStore::new()), clock.clone()));
    let executor = RequestExecutor::new(transport.clone(), cache);

    // Act + Assert: first call goes to the network once
    let first = fetch(&executor).await;
    assert!(first.is_success());
    assert!(!first.is_from_cache());
    assert_eq!(transport.calls(), 1);
    let predictions = first.value().cloned().unwrap();
    assert_eq!(predictions.len(), 2);
    assert_eq!(predictions[0].direction, Direction::Up);

    // Within the TTL: identical data, no network
    clock.advance(chrono::Duration::seconds(1799));
    let second = fetch(&executor).await;
    assert!(second.is_from_cache());
    assert_eq!(second.value(), Some(&predictions));
    assert_eq!(transport.calls(), 1);

    // TTL elapsed: exactly one fresh attempt
    clock.advance(chrono::Duration::seconds(1));
    let third = fetch(&executor).await;
    assert!(third.is_success());
    assert!(!third.is_from_cache());
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn test_cache_hit_survives_outage() {
    let transport = CannedTransport::new();
    transport.respond(200, PREDICTIONS);
    let cache = Arc::new(TimeBoxedCache::in_memory());
    let executor = RequestExecutor::new(transport.clone(), cache);

    assert!(fetch(&executor).await.is_success());

    // Nothing else is scripted; any network call would get a 503.
    let offline = fetch(&executor).await;
    assert!(offline.is_from_cache());
    assert_eq!(transport.calls(), 1);

    let uncached: RequestOutcome<Vec<Prediction>> = executor
        .execute(
            ApiRequest::get("/predictions"),
            RequestOptions::default().with_retry(RetryPolicy::new(2, Duration::from_millis(1))),
        )
        .await;
    assert_eq!(
        uncached.failure().map(|f| (f.kind, f.attempts)),
        Some((FailureKind::ServerError, 2))
    );
}

#[tokio::test]
async fn test_predictions_persist_across_restarts_on_disk() {
    let dir = scratch_dir("predictions");
    let clock = Arc::new(ManualClock::starting_now());

    // First process lifetime
    {
        let transport = CannedTransport::new();
        transport.respond(200, PREDICTIONS);
        let store = Arc::new(FileStore::open(&dir).await.unwrap());
        let executor = RequestExecutor::new(
            transport.clone(),
            Arc::new(TimeBoxedCache::new(store, clock.clone())),
        );
        assert!(fetch(&executor).await.is_success());
        assert_eq!(transport.calls(), 1);
    }

    // Second lifetime, same directory, ten minutes later
    clock.advance(chrono::Duration::minutes(10));
    let transport = CannedTransport::new();
    let store = Arc::new(FileStore::open(&dir).await.unwrap());
    let cache = Arc::new(TimeBoxedCache::new(store.clone(), clock.clone()));
    let executor = RequestExecutor::new(transport.clone(), cache.clone());

    let restored = fetch(&executor).await;
    assert!(restored.is_from_cache());
    assert_eq!(transport.calls(), 0);
    assert_eq!(
        cache.remaining_ttl("/predictions").await.unwrap(),
        Some(Duration::from_secs(1200))
    );

    let keys = store.keys().await.unwrap();
    assert_eq!(keys, vec!["cache:/predictions".to_string()]);

    let _ = std::fs::remove_dir_all(dir);
}
