//! Live push channel for casewatch.
//!
//! Optional latency optimization on top of interval polling:
//! - WebSocket driver with explicit reconnect state machine
//! - Exponential backoff (1s base, 30s cap, attempt counter reset on connect)
//! - Heartbeat ping/pong watchdog
//! - One dispatch function mapping event types to cache invalidations
//!
//! Widgets never depend on this crate being connected; the polling cache
//! stays authoritative.

pub mod backoff;
pub mod channel;
pub mod error;
pub mod heartbeat;
pub mod message;
pub mod state;

pub use backoff::{backoff_delay, BackoffPolicy};
pub use channel::{LiveChannel, LiveConfig};
pub use error::{LiveError, LiveResult};
pub use heartbeat::{HeartbeatMonitor, HeartbeatStats};
pub use message::{dispatch, Dispatch, InvalidationSink, LiveEvent, LiveMessage, Targets};
pub use state::{Action, ChannelEvent, ChannelMachine, ChannelState};

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any `wss://` connection is made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
