//! Fetch error types.

use thiserror::Error;

/// Failure of a single fetch.
///
/// `Clone` so the latest error can be kept in cache snapshots next to the
/// last good value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Connection-level failure, including request timeouts.
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response.
    #[error("HTTP {status}")]
    Http { status: u16 },

    /// Body did not match the expected shape.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Caller gave up before completion. Never stored in a cache entry.
    #[error("Fetch cancelled")]
    Cancelled,
}

impl FetchError {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Http { .. } => "http",
            Self::Parse(_) => "parse",
            Self::Cancelled => "cancelled",
        }
    }

    /// A 4xx response that the next tick will not fix.
    ///
    /// 408 (request timeout) and 429 (rate limited) are transient.
    pub fn is_permanent_client_error(&self) -> bool {
        match self {
            Self::Http { status } => (400..500).contains(status) && *status != 408 && *status != 429,
            _ => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e.to_string())
    }
}

pub type FetchResult<T> = Result<T, FetchError>;
