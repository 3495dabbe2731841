//! Live channel driver.
//!
//! Owns the socket and the reconnect loop. Every state change goes through
//! `ChannelMachine` and is published on a `watch` channel; the driver only
//! performs the action the machine returns.

use crate::backoff::{BackoffPolicy, DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_DELAY_MS};
use crate::error::{LiveError, LiveResult};
use crate::heartbeat::HeartbeatMonitor;
use crate::message::{dispatch, InvalidationSink};
use crate::state::{Action, ChannelEvent, ChannelMachine, ChannelState, DEFAULT_MAX_ATTEMPTS};
use casewatch_telemetry::Metrics;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async_tls_with_config, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Live channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveConfig {
    /// Whether to open the channel at all.
    #[serde(default)]
    pub enabled: bool,
    /// WebSocket URL.
    #[serde(default = "default_url")]
    pub url: String,
    /// Reconnect attempts before the channel gives up.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    /// Base delay for exponential backoff.
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,
    /// Maximum delay for exponential backoff.
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,
    /// Idle time before a ping is sent.
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// Pong must arrive within this.
    #[serde(default = "default_heartbeat_timeout_ms")]
    pub heartbeat_timeout_ms: u64,
}

fn default_url() -> String {
    "ws://localhost:8000/ws".to_string()
}

fn default_max_reconnect_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_reconnect_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY_MS
}

fn default_reconnect_max_delay_ms() -> u64 {
    DEFAULT_MAX_DELAY_MS
}

fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

fn default_heartbeat_timeout_ms() -> u64 {
    10_000
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: default_url(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            heartbeat_timeout_ms: default_heartbeat_timeout_ms(),
        }
    }
}

impl LiveConfig {
    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy::new(self.reconnect_base_delay_ms, self.reconnect_max_delay_ms)
    }
}

/// Push channel feeding invalidations into a sink (normally the cache).
pub struct LiveChannel {
    config: LiveConfig,
    sink: Arc<dyn InvalidationSink>,
    heartbeat: HeartbeatMonitor,
    state_tx: watch::Sender<ChannelState>,
    /// Cancellation token for graceful shutdown.
    shutdown_token: CancellationToken,
}

impl LiveChannel {
    pub fn new(config: LiveConfig, sink: Arc<dyn InvalidationSink>) -> Self {
        let (state_tx, _) = watch::channel(ChannelState::Disconnected);
        Self {
            heartbeat: HeartbeatMonitor::new(
                config.heartbeat_interval_ms,
                config.heartbeat_timeout_ms,
            ),
            config,
            sink,
            state_tx,
            shutdown_token: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> ChannelState {
        *self.state_tx.borrow()
    }

    /// Receiver for state changes, for the connection indicator.
    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.state_tx.subscribe()
    }

    /// Signal graceful shutdown. The driver sends a Close frame and exits.
    pub fn shutdown(&self) {
        info!("Live channel shutdown requested");
        self.shutdown_token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// Run the driver on its own task. Errors are logged, never propagated.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(e) = self.run().await {
                error!(error = %e, "Live channel stopped; polling continues without push");
            }
        })
    }

    /// Drive the channel until shutdown or until reconnects are exhausted.
    pub async fn run(&self) -> LiveResult<()> {
        let mut machine =
            ChannelMachine::new(self.config.max_reconnect_attempts, self.config.backoff());
        let mut action = self.apply(&mut machine, ChannelEvent::Connect);

        loop {
            if self.is_shutdown() {
                action = self.apply(&mut machine, ChannelEvent::Shutdown);
            }

            match action {
                Action::Dial | Action::Continue => {
                    let result = self.session(&mut machine).await;
                    if self.is_shutdown() {
                        continue;
                    }
                    let reason = match &result {
                        Ok(()) => "stream_ended",
                        Err(e) => {
                            warn!(error = %e, "Live channel connection lost");
                            e.reason()
                        }
                    };
                    Metrics::live_reconnect(reason);
                    action = self.apply(&mut machine, ChannelEvent::Lost);
                }
                Action::Wait(delay) => {
                    warn!(
                        attempt = machine.attempts(),
                        delay_ms = delay.as_millis() as u64,
                        "Reconnecting live channel"
                    );
                    tokio::select! {
                        () = tokio::time::sleep(delay) => {
                            action = self.apply(&mut machine, ChannelEvent::RetryElapsed);
                        }
                        () = self.shutdown_token.cancelled() => {
                            info!("Shutdown requested during backoff");
                        }
                    }
                }
                Action::Stop => break,
            }
        }

        if machine.state() == ChannelState::Failed {
            error!(
                attempts = machine.attempts(),
                "Max reconnection attempts reached"
            );
            return Err(LiveError::RetriesExhausted {
                attempts: machine.attempts(),
            });
        }
        Ok(())
    }

    fn apply(&self, machine: &mut ChannelMachine, event: ChannelEvent) -> Action {
        let before = machine.state();
        let action = machine.on(event);
        let after = machine.state();
        if before != after {
            info!(from = %before, to = %after, ?event, "Live channel state change");
            Metrics::live_state_set(after.as_str());
            self.state_tx.send_replace(after);
        }
        action
    }

    /// One socket lifetime: dial, then read until close, error or shutdown.
    async fn session(&self, machine: &mut ChannelMachine) -> LiveResult<()> {
        info!(url = %self.config.url, "Connecting live channel");

        let connect = connect_async_tls_with_config(&self.config.url, None, true, None);
        let (ws_stream, _response) = tokio::select! {
            () = self.shutdown_token.cancelled() => return Ok(()),
            res = connect => res.map_err(|e| LiveError::ConnectionFailed(e.to_string()))?,
        };
        let (mut write, mut read) = ws_stream.split();

        self.apply(machine, ChannelEvent::Opened);
        self.heartbeat.reset();

        loop {
            tokio::select! {
                () = self.shutdown_token.cancelled() => {
                    if let Err(e) = write.send(Message::Close(None)).await {
                        warn!(?e, "Failed to send Close frame during shutdown");
                    }
                    return Ok(());
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.heartbeat.record_message();
                            dispatch(&text, self.sink.as_ref());
                        }
                        Some(Ok(Message::Ping(data))) => {
                            self.heartbeat.record_message();
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Pong(_))) => {
                            self.heartbeat.record_pong();
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason): (u16, String) = frame
                                .map(|f| (f.code.into(), f.reason.to_string()))
                                .unwrap_or((1000, "Normal close".to_string()));
                            warn!(code, %reason, "Live channel closed by server");
                            return Err(LiveError::ConnectionClosed { code, reason });
                        }
                        Some(Ok(other)) => {
                            self.heartbeat.record_message();
                            debug!(len = other.len(), "Ignoring non-text frame");
                        }
                        Some(Err(e)) => return Err(e.into()),
                        None => {
                            warn!("Live channel stream ended");
                            return Ok(());
                        }
                    }
                }

                () = self.heartbeat.wait_for_check() => {
                    if self.heartbeat.is_timed_out() {
                        error!(stats = ?self.heartbeat.stats(), "Heartbeat timeout");
                        return Err(LiveError::HeartbeatTimeout);
                    }
                    if self.heartbeat.should_send_ping() {
                        write.send(Message::Ping(Vec::new())).await?;
                        self.heartbeat.record_ping();
                        debug!("Sent heartbeat ping");
                    }
                }
            }
        }
    }
}
