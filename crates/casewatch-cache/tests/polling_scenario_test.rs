//! Dashboard polling timeline with independent cadences per resource.

use casewatch_cache::{CacheEntry, Invalidation, PollingCache};
use casewatch_core::{Resource, ResourceKey};
use casewatch_fetch::{FetchResult, Fetcher};
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Counts fetches per resource and returns the running count.
#[derive(Default)]
struct CountingFetcher {
    counts: Mutex<HashMap<Resource, u32>>,
}

impl CountingFetcher {
    fn count(&self, resource: Resource) -> u32 {
        self.counts.lock().get(&resource).copied().unwrap_or(0)
    }
}

impl Fetcher<u32> for CountingFetcher {
    fn fetch<'a>(&'a self, key: &'a ResourceKey) -> BoxFuture<'a, FetchResult<u32>> {
        Box::pin(async move {
            let mut counts = self.counts.lock();
            let n = counts.entry(key.resource).or_insert(0);
            *n += 1;
            Ok(*n)
        })
    }
}

async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

async fn advance_to(start: Instant, at: Duration) {
    tokio::time::sleep_until(start + at).await;
    settle().await;
}

fn noop(_: &CacheEntry<u32>) {}

#[tokio::test(start_paused = true)]
async fn test_independent_cadences_and_out_of_band_invalidation() {
    let fetcher = Arc::new(CountingFetcher::default());
    let cache = PollingCache::new(fetcher.clone() as Arc<dyn Fetcher<u32>>);
    let start = Instant::now();

    let _jobs = cache.subscribe(ResourceKey::ai_jobs(), Duration::from_secs(10), noop);
    let _threats = cache.subscribe(ResourceKey::threats(), Duration::from_secs(15), noop);
    let _cases = cache.subscribe(ResourceKey::cases(), Duration::from_secs(30), noop);
    settle().await;

    assert_eq!(fetcher.count(Resource::AiJobs), 1);
    assert_eq!(fetcher.count(Resource::Threats), 1);
    assert_eq!(fetcher.count(Resource::Cases), 1);

    // t=5s: push-driven invalidation of threats only.
    advance_to(start, Duration::from_secs(5)).await;
    assert_eq!(cache.invalidate(&ResourceKey::threats()), Invalidation::Started);
    settle().await;
    assert_eq!(fetcher.count(Resource::Threats), 2);
    assert_eq!(fetcher.count(Resource::AiJobs), 1);
    assert_eq!(fetcher.count(Resource::Cases), 1);

    // t=10s: jobs tick, cases do not.
    advance_to(start, Duration::from_millis(10_100)).await;
    assert_eq!(fetcher.count(Resource::AiJobs), 2);
    assert_eq!(fetcher.count(Resource::Threats), 2);
    assert_eq!(fetcher.count(Resource::Cases), 1);

    // t=15s: threats timer kept its phase despite the invalidation.
    advance_to(start, Duration::from_millis(15_100)).await;
    assert_eq!(fetcher.count(Resource::Threats), 3);

    advance_to(start, Duration::from_millis(30_100)).await;
    assert_eq!(fetcher.count(Resource::AiJobs), 4);
    assert_eq!(fetcher.count(Resource::Threats), 4);
    assert_eq!(fetcher.count(Resource::Cases), 2);

    let snap = cache.snapshot(&ResourceKey::threats()).unwrap();
    assert_eq!(snap.value(), Some(&4));
}

#[tokio::test(start_paused = true)]
async fn test_invalidate_all_refreshes_every_cached_key() {
    let fetcher = Arc::new(CountingFetcher::default());
    let cache = PollingCache::new(fetcher.clone() as Arc<dyn Fetcher<u32>>);

    let _a = cache.subscribe(ResourceKey::dashboard(), Duration::from_secs(30), noop);
    let _b = cache.subscribe(ResourceKey::notifications(), Duration::from_secs(30), noop);
    settle().await;

    assert_eq!(cache.invalidate_all(), 2);
    settle().await;

    assert_eq!(fetcher.count(Resource::Dashboard), 2);
    assert_eq!(fetcher.count(Resource::Notifications), 2);
    assert_eq!(fetcher.count(Resource::Cases), 0);
}

#[tokio::test(start_paused = true)]
async fn test_keys_with_different_params_are_separate_entries() {
    let fetcher = Arc::new(CountingFetcher::default());
    let cache = PollingCache::new(fetcher.clone() as Arc<dyn Fetcher<u32>>);

    let recent = ResourceKey::cases().with_param("limit", 5);
    let all = ResourceKey::cases();
    let h1 = cache.subscribe(recent.clone(), Duration::from_secs(30), noop);
    let h2 = cache.subscribe(all.clone(), Duration::from_secs(30), noop);
    let h3 = cache.subscribe(recent.clone(), Duration::from_secs(30), noop);
    settle().await;

    assert_eq!(cache.len(), 2);
    assert_eq!(fetcher.count(Resource::Cases), 2);

    assert!(cache.unsubscribe(h1));
    assert_eq!(cache.snapshot(&recent).unwrap().subscriber_count, 1);
    assert!(cache.unsubscribe(h3));
    assert!(cache.snapshot(&recent).is_none());
    assert_eq!(cache.keys(), vec![all]);
    assert!(cache.unsubscribe(h2));
    assert!(cache.is_empty());
}
