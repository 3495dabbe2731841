//! Cache entry snapshots and subscription types.

use casewatch_core::ResourceKey;
use casewatch_fetch::FetchError;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Subscriber callback, invoked with the entry snapshot after every settled
/// fetch (and once on subscribe when the key already holds data).
pub type Callback<V> = Arc<dyn Fn(&CacheEntry<V>) + Send + Sync>;

/// Point-in-time view of one cache entry.
#[derive(Debug)]
pub struct CacheEntry<V> {
    pub key: ResourceKey,
    /// Most recent successful value.
    pub last_value: Option<Arc<V>>,
    /// Error from the most recent fetch, cleared by the next success.
    pub last_error: Option<FetchError>,
    /// When `last_value` was fetched.
    pub fetched_at: Option<DateTime<Utc>>,
    /// Count of settled fetches applied to this entry; increases monotonically.
    pub revision: u64,
    /// Whether a fetch is currently outstanding.
    pub in_flight: bool,
    pub subscriber_count: usize,
    pub refresh_interval: Duration,
}

// Manual impl: `V` itself does not need to be `Clone`.
impl<V> Clone for CacheEntry<V> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            last_value: self.last_value.clone(),
            last_error: self.last_error.clone(),
            fetched_at: self.fetched_at,
            revision: self.revision,
            in_flight: self.in_flight,
            subscriber_count: self.subscriber_count,
            refresh_interval: self.refresh_interval,
        }
    }
}

impl<V> CacheEntry<V> {
    pub fn value(&self) -> Option<&V> {
        self.last_value.as_deref()
    }

    /// Nothing known yet: no value and no error.
    pub fn is_loading(&self) -> bool {
        self.last_value.is_none() && self.last_error.is_none()
    }

    /// A value is shown but the latest fetch failed.
    pub fn is_stale(&self) -> bool {
        self.last_value.is_some() && self.last_error.is_some()
    }

    /// Time since the last successful fetch.
    pub fn age(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.fetched_at.map(|t| now - t)
    }
}

/// Outcome of an invalidation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invalidation {
    /// A new fetch was issued.
    Started,
    /// A fetch was already in flight; its result will be delivered instead.
    Joined,
    /// No subscriber holds the key, so nothing was fetched.
    NotCached,
}

/// Proof of one subscription; pass it back to `PollingCache::unsubscribe`.
#[derive(Debug)]
#[must_use = "dropping the handle leaks the subscription; call unsubscribe"]
pub struct SubscriptionHandle {
    pub(crate) id: u64,
    pub(crate) key: ResourceKey,
}

impl SubscriptionHandle {
    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(value: Option<u32>, error: Option<FetchError>) -> CacheEntry<u32> {
        CacheEntry {
            key: ResourceKey::cases(),
            last_value: value.map(Arc::new),
            last_error: error,
            fetched_at: value.map(|_| Utc::now()),
            revision: 1,
            in_flight: false,
            subscriber_count: 1,
            refresh_interval: Duration::from_secs(30),
        }
    }

    #[test]
    fn test_entry_states() {
        assert!(entry(None, None).is_loading());

        let failed = entry(None, Some(FetchError::Http { status: 500 }));
        assert!(!failed.is_loading());
        assert!(!failed.is_stale());

        let stale = entry(Some(4), Some(FetchError::Network("reset".to_string())));
        assert!(stale.is_stale());
        assert_eq!(stale.value(), Some(&4));
    }

    #[test]
    fn test_entry_age() {
        let e = entry(Some(1), None);
        let later = e.fetched_at.unwrap() + chrono::Duration::seconds(12);
        assert_eq!(e.age(later), Some(chrono::Duration::seconds(12)));
    }
}
