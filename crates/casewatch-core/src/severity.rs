//! Severity ranking.
//!
//! Severities, priorities and threat levels share one fixed rank:
//! critical > high > medium > low > anything else. Unrecognized values rank
//! lowest and map to the neutral color downstream.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ranked severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "String")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    #[default]
    Unknown,
}

impl Severity {
    /// Parse a severity label, case-insensitively.
    ///
    /// `urgent` is accepted as an alias of `critical` (case priorities use it).
    pub fn parse(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "critical" | "urgent" => Self::Critical,
            "high" => Self::High,
            "medium" | "moderate" => Self::Medium,
            "low" => Self::Low,
            _ => Self::Unknown,
        }
    }

    /// Rank used for ordering (higher is more severe).
    pub fn rank(&self) -> u8 {
        match self {
            Self::Critical => 4,
            Self::High => 3,
            Self::Medium => 2,
            Self::Low => 1,
            Self::Unknown => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Unknown => "unknown",
        }
    }
}

impl From<String> for Severity {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<Option<String>> for Severity {
    fn from(s: Option<String>) -> Self {
        s.map_or(Self::Unknown, Self::from)
    }
}

impl From<Severity> for String {
    fn from(s: Severity) -> Self {
        s.as_str().to_string()
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PartialOrd for Severity {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Severity {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank().cmp(&other.rank())
    }
}

/// Rank of a raw severity label.
pub fn severity_rank(label: &str) -> u8 {
    Severity::parse(label).rank()
}

/// Sort labels by rank, most severe first. Equal ranks keep their order.
pub fn sort_by_rank_desc<S: AsRef<str>>(labels: &mut [S]) {
    labels.sort_by(|a, b| severity_rank(b.as_ref()).cmp(&severity_rank(a.as_ref())));
}
