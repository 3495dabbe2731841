//! Polling cache.
//!
//! Every entry lives in one `DashMap` keyed by `ResourceKey`. All mutations
//! happen inside short synchronous critical sections on that map and are
//! never held across an `.await`; subscriber callbacks run after the guard
//! is released. The in-flight marker is checked and set inside a single
//! critical section, which is what keeps at most one fetch per key.
//!
//! Each fetch carries a unique id. A completion only applies if its id still
//! matches the entry's in-flight marker, so results for evicted (or evicted
//! and re-created) entries are discarded.
//!
//! Every applied completion bumps the entry revision. A subscriber never
//! sees a revision older than one it was already handed, even when a
//! completion and a new subscription race on different threads.

use crate::config::CacheConfig;
use crate::entry::{CacheEntry, Callback, Invalidation, SubscriptionHandle};
use casewatch_core::ResourceKey;
use casewatch_fetch::{FetchError, FetchResult, Fetcher};
use casewatch_telemetry::Metrics;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// What asked for a fetch (metric label).
#[derive(Debug, Clone, Copy)]
enum FetchOrigin {
    Subscribe,
    Tick,
    Invalidate,
}

impl FetchOrigin {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Subscribe => "subscribe",
            Self::Tick => "tick",
            Self::Invalidate => "invalidate",
        }
    }
}

struct Subscriber<V> {
    id: u64,
    interval: Duration,
    delivery: Delivery<V>,
}

/// A subscriber callback plus the newest revision it has been handed.
struct Delivery<V> {
    callback: Callback<V>,
    delivered: Arc<AtomicU64>,
}

impl<V> Clone for Delivery<V> {
    fn clone(&self) -> Self {
        Self {
            callback: Arc::clone(&self.callback),
            delivered: Arc::clone(&self.delivered),
        }
    }
}

impl<V> Delivery<V> {
    fn new(callback: Callback<V>) -> Self {
        Self {
            callback,
            delivered: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Invoke the callback unless a newer revision already went out.
    fn deliver(&self, snapshot: &CacheEntry<V>) -> bool {
        let previous = self.delivered.fetch_max(snapshot.revision, Ordering::AcqRel);
        if previous >= snapshot.revision {
            trace!(key = %snapshot.key, revision = snapshot.revision, previous, "Skipping outdated snapshot");
            return false;
        }
        (self.callback)(snapshot);
        true
    }
}

struct InFlight<V> {
    fetch_id: u64,
    cancel: CancellationToken,
    /// `refresh` callers waiting for this fetch to settle.
    waiters: Vec<oneshot::Sender<CacheEntry<V>>>,
}

struct EntryState<V> {
    last_value: Option<Arc<V>>,
    last_error: Option<FetchError>,
    fetched_at: Option<DateTime<Utc>>,
    /// Bumped on every completion that notifies subscribers.
    revision: u64,
    in_flight: Option<InFlight<V>>,
    /// In subscription order.
    subscribers: Vec<Subscriber<V>>,
    interval: Duration,
    /// Stops the refresh timer task.
    timer: CancellationToken,
}

impl<V> EntryState<V> {
    fn snapshot(&self, key: &ResourceKey) -> CacheEntry<V> {
        CacheEntry {
            key: key.clone(),
            last_value: self.last_value.clone(),
            last_error: self.last_error.clone(),
            fetched_at: self.fetched_at,
            revision: self.revision,
            in_flight: self.in_flight.is_some(),
            subscriber_count: self.subscribers.len(),
            refresh_interval: self.interval,
        }
    }

    fn has_known_state(&self) -> bool {
        self.last_value.is_some() || self.last_error.is_some()
    }

    fn shortest_interval(&self) -> Duration {
        self.subscribers
            .iter()
            .map(|s| s.interval)
            .min()
            .unwrap_or(self.interval)
    }

    /// Re-arm the timer if the shortest requested interval changed.
    ///
    /// Returns the new timer token and period for the caller to spawn once
    /// the map guard is released.
    fn retime(&mut self) -> Option<(CancellationToken, Duration)> {
        let wanted = self.shortest_interval();
        if wanted == self.interval {
            return None;
        }
        self.timer.cancel();
        self.timer = CancellationToken::new();
        self.interval = wanted;
        Some((self.timer.clone(), wanted))
    }

    fn shutdown(&self) {
        self.timer.cancel();
        if let Some(flight) = &self.in_flight {
            flight.cancel.cancel();
        }
    }
}

struct Inner<V> {
    fetcher: Arc<dyn Fetcher<V>>,
    entries: DashMap<ResourceKey, EntryState<V>>,
    next_id: AtomicU64,
    config: CacheConfig,
}

impl<V> Inner<V> {
    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl<V> Drop for Inner<V> {
    fn drop(&mut self) {
        for entry in self.entries.iter() {
            entry.shutdown();
        }
    }
}

impl<V: Send + Sync + 'static> Inner<V> {
    /// Issue a fetch for `key` unless one is already in flight.
    fn start_fetch(self: &Arc<Self>, key: &ResourceKey, origin: FetchOrigin) -> Invalidation {
        let (fetch_id, cancel, timeout) = {
            let Some(mut entry) = self.entries.get_mut(key) else {
                trace!(key = %key, origin = origin.as_str(), "Fetch requested for uncached key");
                return Invalidation::NotCached;
            };

            if entry.in_flight.is_some() {
                debug!(key = %key, origin = origin.as_str(), "Fetch already in flight, joining");
                Metrics::fetch_deduplicated(key.resource.name(), origin.as_str());
                return Invalidation::Joined;
            }

            let fetch_id = self.next_id();
            let cancel = CancellationToken::new();
            entry.in_flight = Some(InFlight {
                fetch_id,
                cancel: cancel.clone(),
                waiters: Vec::new(),
            });
            (fetch_id, cancel, self.config.request_timeout(entry.interval))
        };

        debug!(key = %key, fetch_id, origin = origin.as_str(), "Starting fetch");
        let inner = Arc::clone(self);
        let key = key.clone();
        tokio::spawn(async move {
            inner.run_fetch(key, fetch_id, cancel, timeout).await;
        });
        Invalidation::Started
    }

    async fn run_fetch(
        &self,
        key: ResourceKey,
        fetch_id: u64,
        cancel: CancellationToken,
        timeout: Duration,
    ) {
        let started = Instant::now();

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(FetchError::Cancelled),
            res = tokio::time::timeout(timeout, self.fetcher.fetch(&key)) => match res {
                Ok(result) => result,
                Err(_) => Err(FetchError::Network(format!(
                    "request exceeded {}ms timeout",
                    timeout.as_millis()
                ))),
            },
        };

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind(),
        };
        Metrics::fetch_completed(key.resource.name(), outcome, elapsed_ms);

        self.complete(&key, fetch_id, result);
    }

    /// Apply a settled fetch to its entry and notify subscribers.
    fn complete(&self, key: &ResourceKey, fetch_id: u64, result: FetchResult<V>) {
        let (snapshot, callbacks, waiters) = {
            let Some(mut entry) = self.entries.get_mut(key) else {
                debug!(key = %key, fetch_id, "Discarding result for evicted entry");
                return;
            };

            let current = entry.in_flight.as_ref().map(|f| f.fetch_id);
            if current != Some(fetch_id) {
                debug!(key = %key, fetch_id, ?current, "Discarding result of superseded fetch");
                return;
            }
            let waiters = entry
                .in_flight
                .take()
                .map(|f| f.waiters)
                .unwrap_or_default();

            let notify = match result {
                Ok(value) => {
                    entry.last_value = Some(Arc::new(value));
                    entry.last_error = None;
                    entry.fetched_at = Some(Utc::now());
                    debug!(key = %key, fetch_id, "Fetch succeeded");
                    true
                }
                Err(FetchError::Cancelled) => {
                    debug!(key = %key, fetch_id, "Fetch cancelled, entry unchanged");
                    false
                }
                Err(e) => {
                    warn!(
                        key = %key,
                        fetch_id,
                        error = %e,
                        has_value = entry.last_value.is_some(),
                        "Fetch failed, keeping last value"
                    );
                    entry.last_error = Some(e);
                    true
                }
            };

            let callbacks: Vec<Delivery<V>> = if notify {
                entry.revision += 1;
                entry
                    .subscribers
                    .iter()
                    .map(|s| s.delivery.clone())
                    .collect()
            } else {
                Vec::new()
            };
            (entry.snapshot(key), callbacks, waiters)
        };

        for waiter in waiters {
            let _ = waiter.send(snapshot.clone());
        }
        for delivery in callbacks {
            delivery.deliver(&snapshot);
        }
    }
}

/// Spawn the repeating refresh timer for one entry.
///
/// Holds only a weak reference so a dropped cache stops its timers.
fn spawn_timer<V: Send + Sync + 'static>(
    inner: Weak<Inner<V>>,
    key: ResourceKey,
    period: Duration,
    stop: CancellationToken,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = stop.cancelled() => break,
                _ = ticker.tick() => {
                    let Some(inner) = inner.upgrade() else { break };
                    inner.start_fetch(&key, FetchOrigin::Tick);
                }
            }
        }
        trace!(key = %key, period_ms = period.as_millis() as u64, "Refresh timer stopped");
    });
}

/// Polling cache shared by every widget.
///
/// Cheap to clone; clones share the same entries.
pub struct PollingCache<V> {
    inner: Arc<Inner<V>>,
}

impl<V> Clone for PollingCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V: Send + Sync + 'static> PollingCache<V> {
    /// Create a cache with default configuration.
    pub fn new(fetcher: Arc<dyn Fetcher<V>>) -> Self {
        Self::with_config(fetcher, CacheConfig::default())
    }

    pub fn with_config(fetcher: Arc<dyn Fetcher<V>>, config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                fetcher,
                entries: DashMap::new(),
                next_id: AtomicU64::new(1),
                config,
            }),
        }
    }

    /// Register interest in `key`, refreshed at least every `interval`.
    ///
    /// The first subscriber creates the entry, triggers an immediate fetch
    /// and arms the refresh timer. Later subscribers get the cached snapshot
    /// passed to `callback` before this returns, when one exists.
    pub fn subscribe<F>(&self, key: ResourceKey, interval: Duration, callback: F) -> SubscriptionHandle
    where
        F: Fn(&CacheEntry<V>) + Send + Sync + 'static,
    {
        let interval = self.inner.config.clamp_interval(interval);
        let delivery = Delivery::new(Arc::new(callback) as Callback<V>);
        let id = self.inner.next_id();
        let subscriber = Subscriber {
            id,
            interval,
            delivery: delivery.clone(),
        };

        let mut created = false;
        let mut cached = None;
        let rearm = match self.inner.entries.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                entry.subscribers.push(subscriber);
                if entry.has_known_state() {
                    cached = Some(entry.snapshot(&key));
                }
                entry.retime()
            }
            Entry::Vacant(vacant) => {
                let timer = CancellationToken::new();
                vacant.insert(EntryState {
                    last_value: None,
                    last_error: None,
                    fetched_at: None,
                    revision: 0,
                    in_flight: None,
                    subscribers: vec![subscriber],
                    interval,
                    timer: timer.clone(),
                });
                created = true;
                Some((timer, interval))
            }
        };

        if let Some((timer, period)) = rearm {
            debug!(key = %key, period_ms = period.as_millis() as u64, "Arming refresh timer");
            spawn_timer(Arc::downgrade(&self.inner), key.clone(), period, timer);
        }

        if created {
            info!(key = %key, interval_ms = interval.as_millis() as u64, "Cache entry created");
            Metrics::cache_entries(self.inner.entries.len());
            self.inner.start_fetch(&key, FetchOrigin::Subscribe);
        }

        // A completion racing this call may already have delivered a newer
        // revision, in which case the cached one is skipped.
        if let Some(snapshot) = cached {
            delivery.deliver(&snapshot);
        }

        SubscriptionHandle { id, key }
    }

    /// Drop one subscription. The last one out stops the timer, cancels any
    /// in-flight fetch and evicts the entry.
    ///
    /// Returns `false` if the handle was no longer registered.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        let SubscriptionHandle { id, key } = handle;

        let mut evicted = None;
        let mut rearm = None;
        match self.inner.entries.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                let before = entry.subscribers.len();
                entry.subscribers.retain(|s| s.id != id);
                if entry.subscribers.len() == before {
                    return false;
                }
                if entry.subscribers.is_empty() {
                    evicted = Some(occupied.remove());
                } else {
                    rearm = entry.retime();
                }
            }
            Entry::Vacant(_) => return false,
        }

        if let Some(state) = evicted {
            state.shutdown();
            info!(key = %key, "Cache entry evicted");
            Metrics::cache_entries(self.inner.entries.len());
        }
        if let Some((timer, period)) = rearm {
            debug!(key = %key, period_ms = period.as_millis() as u64, "Re-arming refresh timer");
            spawn_timer(Arc::downgrade(&self.inner), key, period, timer);
        }
        true
    }

    /// Force an out-of-band fetch for `key` regardless of timer phase.
    ///
    /// Joins the in-flight fetch if there is one. The refresh timer keeps its
    /// phase either way.
    pub fn invalidate(&self, key: &ResourceKey) -> Invalidation {
        self.inner.start_fetch(key, FetchOrigin::Invalidate)
    }

    /// Invalidate every cached key. Returns how many fetches were started.
    pub fn invalidate_all(&self) -> usize {
        self.keys()
            .iter()
            .filter(|key| self.invalidate(key) == Invalidation::Started)
            .count()
    }

    /// Invalidate `key` and wait for the resulting (or joined) fetch to
    /// settle. Returns `None` if the key is not cached or was evicted while
    /// waiting.
    pub async fn refresh(&self, key: &ResourceKey) -> Option<CacheEntry<V>> {
        self.inner.start_fetch(key, FetchOrigin::Invalidate);

        let rx = {
            let mut entry = self.inner.entries.get_mut(key)?;
            match entry.in_flight.as_mut() {
                Some(flight) => {
                    let (tx, rx) = oneshot::channel();
                    flight.waiters.push(tx);
                    rx
                }
                // Settled between the start and this lookup.
                None => return Some(entry.snapshot(key)),
            }
        };
        rx.await.ok()
    }

    /// Synchronous read of the current state for `key`.
    pub fn snapshot(&self, key: &ResourceKey) -> Option<CacheEntry<V>> {
        self.inner.entries.get(key).map(|entry| entry.snapshot(key))
    }

    /// Keys with at least one subscriber, sorted.
    pub fn keys(&self) -> Vec<ResourceKey> {
        let mut keys: Vec<_> = self.inner.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }
}
