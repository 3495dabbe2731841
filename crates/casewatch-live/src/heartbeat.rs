//! Heartbeat watchdog for the live socket.
//!
//! Tracks frame activity and ping/pong timing so a silently dead socket is
//! detected and handed to the reconnect machine.

use parking_lot::RwLock;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug)]
struct Beat {
    last_ping: Option<Instant>,
    last_pong: Option<Instant>,
    /// Last frame of any kind.
    last_message: Instant,
    waiting_for_pong: bool,
}

impl Beat {
    fn fresh() -> Self {
        Self {
            last_ping: None,
            last_pong: None,
            last_message: Instant::now(),
            waiting_for_pong: false,
        }
    }
}

/// Heartbeat monitor for one socket at a time.
#[derive(Debug)]
pub struct HeartbeatMonitor {
    /// Idle time after which a ping is sent.
    interval: Duration,
    /// How long to wait for the pong.
    timeout: Duration,
    beat: RwLock<Beat>,
}

impl HeartbeatMonitor {
    pub fn new(interval_ms: u64, timeout_ms: u64) -> Self {
        Self {
            interval: Duration::from_millis(interval_ms.max(1)),
            timeout: Duration::from_millis(timeout_ms),
            beat: RwLock::new(Beat::fresh()),
        }
    }

    /// Reset state (called on every new connection).
    pub fn reset(&self) {
        *self.beat.write() = Beat::fresh();
    }

    pub fn record_ping(&self) {
        let mut beat = self.beat.write();
        beat.last_ping = Some(Instant::now());
        beat.waiting_for_pong = true;
        debug!("Recorded ping");
    }

    pub fn record_pong(&self) {
        let now = Instant::now();
        let mut beat = self.beat.write();
        beat.last_pong = Some(now);
        beat.last_message = now;
        beat.waiting_for_pong = false;

        if let Some(ping) = beat.last_ping {
            debug!(rtt_ms = (now - ping).as_millis() as u64, "Received pong");
        }
    }

    /// Record that any frame was received.
    pub fn record_message(&self) {
        self.beat.write().last_message = Instant::now();
    }

    /// A ping is outstanding for longer than the timeout.
    pub fn is_timed_out(&self) -> bool {
        let beat = self.beat.read();
        match (beat.waiting_for_pong, beat.last_ping) {
            (true, Some(ping)) => ping.elapsed() > self.timeout,
            _ => false,
        }
    }

    /// Nothing outstanding and the socket has been idle for a full interval.
    pub fn should_send_ping(&self) -> bool {
        let beat = self.beat.read();
        !beat.waiting_for_pong && beat.last_message.elapsed() >= self.interval
    }

    /// Wait for the next heartbeat check.
    pub async fn wait_for_check(&self) {
        tokio::time::sleep(self.interval / 2).await;
    }

    pub fn stats(&self) -> HeartbeatStats {
        let beat = self.beat.read();
        HeartbeatStats {
            waiting_for_pong: beat.waiting_for_pong,
            idle_ms: beat.last_message.elapsed().as_millis() as u64,
            last_pong_ago_ms: beat.last_pong.map(|t| t.elapsed().as_millis() as u64),
        }
    }
}

/// Heartbeat statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatStats {
    pub waiting_for_pong: bool,
    pub idle_ms: u64,
    pub last_pong_ago_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_ping_due_after_idle_interval() {
        let hb = HeartbeatMonitor::new(30_000, 10_000);
        assert!(!hb.should_send_ping());

        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(hb.should_send_ping());

        hb.record_ping();
        assert!(!hb.should_send_ping());
        assert!(!hb.is_timed_out());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_pong_times_out() {
        let hb = HeartbeatMonitor::new(30_000, 10_000);
        hb.record_ping();

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(hb.is_timed_out());

        hb.record_pong();
        assert!(!hb.is_timed_out());
        assert_eq!(hb.stats().last_pong_ago_ms, Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_traffic_defers_ping() {
        let hb = HeartbeatMonitor::new(30_000, 10_000);
        tokio::time::advance(Duration::from_secs(20)).await;
        hb.record_message();
        tokio::time::advance(Duration::from_secs(20)).await;

        assert!(!hb.should_send_ping());
        assert_eq!(hb.stats().idle_ms, 20_000);
    }
}
