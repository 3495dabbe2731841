//! Shared fixtures for live channel integration tests.
//!
//! - `MockWsServer`: accepts connections and pushes frames to all of them
//! - `CountingFetcher`: per-resource fetch counter backing a real cache

#![allow(dead_code)]

use casewatch_core::{Resource, ResourceKey};
use casewatch_fetch::{FetchResult, Fetcher};
use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// Command pushed to every open connection.
#[derive(Debug, Clone)]
enum Push {
    Text(String),
    Close,
}

/// A mock WebSocket server for testing.
pub struct MockWsServer {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    push_tx: broadcast::Sender<Push>,
    connections: Arc<AtomicU32>,
}

impl MockWsServer {
    /// Start a new mock WebSocket server on an available port.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connections = Arc::new(AtomicU32::new(0));
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let (push_tx, _) = broadcast::channel::<Push>(64);

        let connections_clone = connections.clone();
        let push_clone = push_tx.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Ok((stream, _)) = listener.accept() => {
                        let push_rx = push_clone.subscribe();
                        tokio::spawn(handle_connection(stream, push_rx, connections_clone.clone()));
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            push_tx,
            connections,
        }
    }

    /// Get the server's WebSocket URL.
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Number of completed handshakes.
    pub fn connection_count(&self) -> u32 {
        self.connections.load(Ordering::SeqCst)
    }

    /// Send a text frame to every open connection.
    pub fn push(&self, text: impl Into<String>) {
        let _ = self.push_tx.send(Push::Text(text.into()));
    }

    /// Close every open connection from the server side.
    pub fn close_all(&self) {
        let _ = self.push_tx.send(Push::Close);
    }

    /// Shutdown the server.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

async fn handle_connection(
    stream: TcpStream,
    mut push_rx: broadcast::Receiver<Push>,
    connections: Arc<AtomicU32>,
) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("WebSocket handshake failed: {}", e);
            return;
        }
    };
    connections.fetch_add(1, Ordering::SeqCst);

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            msg = read.next() => match msg {
                Some(Ok(Message::Ping(data))) => {
                    let _ = write.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                _ => {}
            },
            push = push_rx.recv() => match push {
                Ok(Push::Text(text)) => {
                    let _ = write.send(Message::Text(text)).await;
                }
                Ok(Push::Close) | Err(_) => {
                    let _ = write.send(Message::Close(None)).await;
                    break;
                }
            },
        }
    }
}

/// Counts fetches per resource; value is the running count.
#[derive(Default)]
pub struct CountingFetcher {
    counts: Mutex<HashMap<Resource, u32>>,
}

impl CountingFetcher {
    pub fn count(&self, resource: Resource) -> u32 {
        self.counts
            .lock()
            .unwrap()
            .get(&resource)
            .copied()
            .unwrap_or(0)
    }
}

impl Fetcher<u32> for CountingFetcher {
    fn fetch<'a>(&'a self, key: &'a ResourceKey) -> BoxFuture<'a, FetchResult<u32>> {
        Box::pin(async move {
            let mut counts = self.counts.lock().unwrap();
            let n = counts.entry(key.resource).or_insert(0);
            *n += 1;
            Ok(*n)
        })
    }
}

/// Poll `cond` every 10ms until it holds or `timeout` elapses.
pub async fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}
