//! Entities observed from the case-management backend.
//!
//! All entities are read-only from the client's perspective. Every field
//! except the identity is optional on the wire: missing or `null` fields
//! decode to defaults, timestamps are read leniently (see [`crate::wire`]),
//! and unknown lifecycle values decode to an `Unknown` variant.

use crate::severity::Severity;
use crate::wire::{lenient_timestamp, null_as_default};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Case lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Active,
    Closed,
    #[serde(alias = "on-hold")]
    OnHold,
    #[default]
    #[serde(other)]
    Unknown,
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Closed => write!(f, "closed"),
            Self::OnHold => write!(f, "on-hold"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Evidence processing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceStatus {
    Pending,
    Processing,
    Processed,
    Failed,
    #[default]
    #[serde(other)]
    Unknown,
}

impl fmt::Display for EvidenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Processed => write!(f, "processed"),
            Self::Failed => write!(f, "failed"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// AI analysis job status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    #[default]
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    /// Whether the job still occupies the analysis engine.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Queued | Self::Running)
    }

    /// Whether the job reached a final state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Forensic case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    pub id: i64,
    /// Human-facing case number (e.g., "CASE-2024-0042").
    #[serde(default)]
    pub case_number: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: CaseStatus,
    #[serde(default)]
    pub priority: Severity,
    #[serde(default)]
    pub investigator: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub last_activity: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub evidence_count: u64,
}

impl Case {
    /// Timestamp used for recency ordering.
    pub fn activity_at(&self) -> Option<DateTime<Utc>> {
        self.last_activity.or(self.created_at)
    }

    /// Case number if present, otherwise `#id`.
    pub fn label(&self) -> String {
        self.case_number
            .clone()
            .unwrap_or_else(|| format!("#{}", self.id))
    }
}

/// Evidence item attached to a case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub id: i64,
    #[serde(default)]
    pub case_id: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    /// Evidence kind (disk image, memory dump, pcap, ...).
    #[serde(default)]
    pub evidence_type: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: EvidenceStatus,
    /// Size in bytes.
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub collected_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub processed_at: Option<DateTime<Utc>>,
}

/// Threat detected during analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threat {
    pub id: i64,
    #[serde(default)]
    pub case_id: Option<i64>,
    #[serde(default)]
    pub evidence_id: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub threat_type: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub description: Option<String>,
    /// Detection confidence in `[0.0, 1.0]`.
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub detected_at: Option<DateTime<Utc>>,
}

/// Background AI analysis job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiAnalysisJob {
    pub id: i64,
    #[serde(default)]
    pub case_id: Option<i64>,
    #[serde(default)]
    pub evidence_id: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub job_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: JobStatus,
    /// Progress percentage; values above 100 are clamped on display.
    #[serde(default, deserialize_with = "null_as_default")]
    pub progress: f64,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// User-facing notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default, deserialize_with = "null_as_default")]
    pub read: bool,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Aggregate dashboard snapshot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardSummary {
    #[serde(deserialize_with = "null_as_default")]
    pub total_cases: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub active_cases: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub total_evidence: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub processed_evidence: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub threats_detected: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub critical_threats: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub active_jobs: u64,
    /// Analysis engine status label reported by the backend.
    pub engine_status: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub recent_cases: Vec<Case>,
    #[serde(deserialize_with = "null_as_default")]
    pub recent_threats: Vec<Threat>,
}
