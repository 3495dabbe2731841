//! Live channel connection state machine.
//!
//! Pure: no sockets, no timers. The driver feeds it events and performs the
//! returned action.
//!
//! ```text
//! Disconnected --Connect--> Connecting --Opened--> Connected
//! Connecting | Connected --Lost--> Reconnecting   (attempts < max)
//!                                  Failed         (otherwise, terminal)
//! Reconnecting --RetryElapsed--> Connecting
//! any non-terminal --Shutdown--> Disconnected
//! ```

use crate::backoff::BackoffPolicy;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tracing::trace;

/// Default reconnect attempts before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Failed,
}

impl ChannelState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Failed => "failed",
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Start connecting.
    Connect,
    /// Socket handshake completed.
    Opened,
    /// Socket closed or errored (including failed dials).
    Lost,
    /// Backoff delay elapsed.
    RetryElapsed,
    /// Caller asked the channel to stop.
    Shutdown,
}

/// What the driver should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Open a socket.
    Dial,
    /// Sleep, then feed `RetryElapsed`.
    Wait(Duration),
    /// Keep reading the open socket.
    Continue,
    /// Stop the driver.
    Stop,
}

/// Reconnect state machine.
#[derive(Debug, Clone)]
pub struct ChannelMachine {
    state: ChannelState,
    /// Consecutive reconnect attempts since the last successful connect.
    attempts: u32,
    max_attempts: u32,
    backoff: BackoffPolicy,
}

impl Default for ChannelMachine {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, BackoffPolicy::default())
    }
}

impl ChannelMachine {
    pub fn new(max_attempts: u32, backoff: BackoffPolicy) -> Self {
        Self {
            state: ChannelState::Disconnected,
            attempts: 0,
            max_attempts,
            backoff,
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Apply `event` and return the next action.
    ///
    /// Events that do not apply to the current state leave it unchanged.
    pub fn on(&mut self, event: ChannelEvent) -> Action {
        use ChannelEvent as E;
        use ChannelState as S;

        match (self.state, event) {
            (S::Failed, _) => Action::Stop,
            (_, E::Shutdown) => {
                self.state = S::Disconnected;
                Action::Stop
            }
            (S::Disconnected, E::Connect) | (S::Reconnecting, E::RetryElapsed) => {
                self.state = S::Connecting;
                Action::Dial
            }
            (S::Connecting, E::Opened) => {
                self.state = S::Connected;
                self.attempts = 0;
                Action::Continue
            }
            (S::Connecting | S::Connected, E::Lost) => {
                if self.attempts < self.max_attempts {
                    self.attempts += 1;
                    self.state = S::Reconnecting;
                    Action::Wait(self.backoff.delay(self.attempts))
                } else {
                    self.state = S::Failed;
                    Action::Stop
                }
            }
            (state, event) => {
                trace!(%state, ?event, "Ignoring event for current state");
                match state {
                    S::Connected => Action::Continue,
                    S::Connecting => Action::Dial,
                    S::Reconnecting => Action::Wait(self.backoff.delay(self.attempts)),
                    S::Disconnected | S::Failed => Action::Stop,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lose_and_retry(m: &mut ChannelMachine) -> Action {
        let action = m.on(ChannelEvent::Lost);
        if matches!(action, Action::Wait(_)) {
            assert_eq!(m.state(), ChannelState::Reconnecting);
            assert_eq!(m.on(ChannelEvent::RetryElapsed), Action::Dial);
        }
        action
    }

    #[test]
    fn test_connect_and_open() {
        let mut m = ChannelMachine::default();
        assert_eq!(m.on(ChannelEvent::Connect), Action::Dial);
        assert_eq!(m.state(), ChannelState::Connecting);
        assert_eq!(m.on(ChannelEvent::Opened), Action::Continue);
        assert_eq!(m.state(), ChannelState::Connected);
    }

    #[test]
    fn test_backoff_delays_for_consecutive_failures() {
        let mut m = ChannelMachine::default();
        m.on(ChannelEvent::Connect);

        let delays: Vec<Action> = (0..4).map(|_| lose_and_retry(&mut m)).collect();
        assert_eq!(
            delays,
            vec![
                Action::Wait(Duration::from_millis(2_000)),
                Action::Wait(Duration::from_millis(4_000)),
                Action::Wait(Duration::from_millis(8_000)),
                Action::Wait(Duration::from_millis(16_000)),
            ]
        );
        assert_eq!(
            lose_and_retry(&mut m),
            Action::Wait(Duration::from_millis(30_000))
        );
    }

    #[test]
    fn test_successful_connect_resets_backoff() {
        let mut m = ChannelMachine::default();
        m.on(ChannelEvent::Connect);
        lose_and_retry(&mut m);
        lose_and_retry(&mut m);
        lose_and_retry(&mut m);
        assert_eq!(m.attempts(), 3);

        m.on(ChannelEvent::Opened);
        assert_eq!(m.attempts(), 0);
        assert_eq!(
            m.on(ChannelEvent::Lost),
            Action::Wait(Duration::from_millis(2_000))
        );
    }

    #[test]
    fn test_fails_after_max_attempts() {
        let mut m = ChannelMachine::new(2, BackoffPolicy::default());
        m.on(ChannelEvent::Connect);
        assert!(matches!(lose_and_retry(&mut m), Action::Wait(_)));
        assert!(matches!(lose_and_retry(&mut m), Action::Wait(_)));
        assert_eq!(m.on(ChannelEvent::Lost), Action::Stop);
        assert_eq!(m.state(), ChannelState::Failed);

        // Terminal.
        assert_eq!(m.on(ChannelEvent::Connect), Action::Stop);
        assert_eq!(m.on(ChannelEvent::Shutdown), Action::Stop);
        assert_eq!(m.state(), ChannelState::Failed);
    }

    #[test]
    fn test_shutdown_from_any_live_state() {
        for events in [
            vec![ChannelEvent::Connect],
            vec![ChannelEvent::Connect, ChannelEvent::Opened],
            vec![ChannelEvent::Connect, ChannelEvent::Lost],
        ] {
            let mut m = ChannelMachine::default();
            for e in events {
                m.on(e);
            }
            assert_eq!(m.on(ChannelEvent::Shutdown), Action::Stop);
            assert_eq!(m.state(), ChannelState::Disconnected);
        }
    }

    #[test]
    fn test_out_of_order_events_are_ignored() {
        let mut m = ChannelMachine::default();
        assert_eq!(m.on(ChannelEvent::Opened), Action::Stop);
        assert_eq!(m.state(), ChannelState::Disconnected);

        m.on(ChannelEvent::Connect);
        m.on(ChannelEvent::Opened);
        assert_eq!(m.on(ChannelEvent::RetryElapsed), Action::Continue);
        assert_eq!(m.state(), ChannelState::Connected);
    }
}
