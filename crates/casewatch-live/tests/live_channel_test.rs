//! Live channel against a mock WebSocket server and a real polling cache.

mod common;

use casewatch_cache::{CacheEntry, PollingCache};
use casewatch_core::{Resource, ResourceKey};
use casewatch_fetch::Fetcher;
use casewatch_live::{ChannelState, InvalidationSink, LiveChannel, LiveConfig, LiveError};
use common::{wait_until, CountingFetcher, MockWsServer};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

const WAIT: Duration = Duration::from_secs(5);

fn noop(_: &CacheEntry<u32>) {}

fn config_for(url: String) -> LiveConfig {
    LiveConfig {
        enabled: true,
        url,
        reconnect_base_delay_ms: 10,
        reconnect_max_delay_ms: 50,
        ..Default::default()
    }
}

struct Harness {
    fetcher: Arc<CountingFetcher>,
    cache: PollingCache<u32>,
    channel: Arc<LiveChannel>,
}

fn harness(config: LiveConfig) -> Harness {
    let fetcher = Arc::new(CountingFetcher::default());
    let cache = PollingCache::new(fetcher.clone() as Arc<dyn Fetcher<u32>>);
    let sink: Arc<dyn InvalidationSink> = Arc::new(cache.clone());
    let channel = Arc::new(LiveChannel::new(config, sink));
    Harness {
        fetcher,
        cache,
        channel,
    }
}

async fn wait_for_state(channel: &LiveChannel, state: ChannelState) -> bool {
    let mut rx = channel.watch_state();
    tokio::time::timeout(WAIT, rx.wait_for(|s| *s == state))
        .await
        .is_ok_and(|r| r.is_ok())
}

#[tokio::test]
async fn test_push_event_triggers_targeted_refetch() {
    let server = MockWsServer::start().await;
    let h = harness(config_for(server.url()));

    // Long intervals so only pushes cause refetches.
    let _cases = h
        .cache
        .subscribe(ResourceKey::cases(), Duration::from_secs(600), noop);
    let _threats = h
        .cache
        .subscribe(ResourceKey::threats(), Duration::from_secs(600), noop);
    let f = &h.fetcher;
    assert!(
        wait_until(WAIT, || {
            f.count(Resource::Cases) == 1 && f.count(Resource::Threats) == 1
        })
        .await
    );

    let driver = h.channel.clone().spawn();
    assert!(wait_for_state(&h.channel, ChannelState::Connected).await);

    server.push(r#"{"type":"case_created","data":{"id":42},"timestamp":"2024-03-01T10:00:00Z"}"#);
    let f = &h.fetcher;
    assert!(wait_until(WAIT, || f.count(Resource::Cases) == 2).await);
    assert_eq!(h.fetcher.count(Resource::Threats), 1);

    h.channel.shutdown();
    driver.await.unwrap();
    assert_eq!(h.channel.state(), ChannelState::Disconnected);
    server.shutdown().await;
}

#[tokio::test]
async fn test_unknown_and_malformed_frames_change_nothing() {
    let server = MockWsServer::start().await;
    let h = harness(config_for(server.url()));

    let _cases = h
        .cache
        .subscribe(ResourceKey::cases(), Duration::from_secs(600), noop);
    let f = &h.fetcher;
    assert!(wait_until(WAIT, || f.count(Resource::Cases) == 1).await);

    let driver = h.channel.clone().spawn();
    assert!(wait_for_state(&h.channel, ChannelState::Connected).await);

    server.push(r#"{"type":"presence","data":{"user":"k"}}"#);
    server.push("{{{ not json");
    // A known event afterwards proves the earlier frames did not kill the socket.
    server.push(r#"{"type":"case_updated","data":{}}"#);

    let f = &h.fetcher;
    assert!(wait_until(WAIT, || f.count(Resource::Cases) == 2).await);
    assert_eq!(h.channel.state(), ChannelState::Connected);
    assert_eq!(server.connection_count(), 1);

    h.channel.shutdown();
    driver.await.unwrap();
    server.shutdown().await;
}

#[tokio::test]
async fn test_reconnects_after_server_close() {
    let server = MockWsServer::start().await;
    let h = harness(config_for(server.url()));

    let driver = h.channel.clone().spawn();
    assert!(wait_for_state(&h.channel, ChannelState::Connected).await);

    server.close_all();
    assert!(wait_until(WAIT, || server.connection_count() == 2).await);
    assert!(wait_for_state(&h.channel, ChannelState::Connected).await);

    h.channel.shutdown();
    driver.await.unwrap();
    server.shutdown().await;
}

#[tokio::test]
async fn test_unreachable_endpoint_fails_without_touching_cache() {
    // Bind then drop to get a port nothing listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut config = config_for(format!("ws://{addr}"));
    config.max_reconnect_attempts = 3;
    let h = harness(config);

    let _jobs = h
        .cache
        .subscribe(ResourceKey::ai_jobs(), Duration::from_secs(600), noop);

    let err = tokio::time::timeout(WAIT, h.channel.run())
        .await
        .expect("driver should give up")
        .unwrap_err();
    assert!(matches!(err, LiveError::RetriesExhausted { attempts: 3 }));
    assert_eq!(h.channel.state(), ChannelState::Failed);

    // Polling is unaffected.
    let snap = h.cache.snapshot(&ResourceKey::ai_jobs()).unwrap();
    assert_eq!(snap.value(), Some(&1));
    assert!(snap.last_error.is_none());
}
