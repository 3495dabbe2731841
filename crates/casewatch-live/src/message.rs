//! Live channel messages and their dispatch into cache invalidations.

use casewatch_cache::{Invalidation, PollingCache};
use casewatch_core::{parse_timestamp, Resource};
use casewatch_telemetry::Metrics;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, trace, warn};

/// Frame pushed by the backend: `{type, data, timestamp}`.
#[derive(Debug, Clone, Deserialize)]
pub struct LiveMessage {
    #[serde(rename = "type")]
    pub kind: String,
    /// Opaque payload; only the type drives invalidation.
    #[serde(default)]
    pub data: serde_json::Value,
    /// RFC 3339 string or epoch number; never needed for dispatch.
    #[serde(default)]
    pub timestamp: Option<serde_json::Value>,
}

impl LiveMessage {
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Parsed send time, if present and readable.
    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp.as_ref().and_then(parse_timestamp)
    }
}

/// Recognized event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveEvent {
    CaseCreated,
    CaseUpdated,
    CaseClosed,
    EvidenceAdded,
    EvidenceProcessed,
    ThreatDetected,
    ThreatUpdated,
    AiJobQueued,
    AiJobStarted,
    AiJobProgress,
    AiJobCompleted,
    AiJobFailed,
    Notification,
    DashboardRefresh,
}

/// Which cache keys an event invalidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Targets {
    /// Every key of the listed resources, whatever its params.
    Resources(&'static [Resource]),
    /// Every cached key.
    All,
}

impl LiveEvent {
    pub fn from_type(kind: &str) -> Option<Self> {
        Some(match kind {
            "case_created" => Self::CaseCreated,
            "case_updated" => Self::CaseUpdated,
            "case_closed" => Self::CaseClosed,
            "evidence_added" => Self::EvidenceAdded,
            "evidence_processed" => Self::EvidenceProcessed,
            "threat_detected" => Self::ThreatDetected,
            "threat_updated" => Self::ThreatUpdated,
            "ai_job_queued" => Self::AiJobQueued,
            "ai_job_started" => Self::AiJobStarted,
            "ai_job_progress" => Self::AiJobProgress,
            "ai_job_completed" => Self::AiJobCompleted,
            "ai_job_failed" => Self::AiJobFailed,
            "notification" => Self::Notification,
            "dashboard_refresh" => Self::DashboardRefresh,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CaseCreated => "case_created",
            Self::CaseUpdated => "case_updated",
            Self::CaseClosed => "case_closed",
            Self::EvidenceAdded => "evidence_added",
            Self::EvidenceProcessed => "evidence_processed",
            Self::ThreatDetected => "threat_detected",
            Self::ThreatUpdated => "threat_updated",
            Self::AiJobQueued => "ai_job_queued",
            Self::AiJobStarted => "ai_job_started",
            Self::AiJobProgress => "ai_job_progress",
            Self::AiJobCompleted => "ai_job_completed",
            Self::AiJobFailed => "ai_job_failed",
            Self::Notification => "notification",
            Self::DashboardRefresh => "dashboard_refresh",
        }
    }

    pub fn targets(&self) -> Targets {
        use Resource::*;
        match self {
            Self::CaseCreated | Self::CaseUpdated | Self::CaseClosed => {
                Targets::Resources(&[Cases, Dashboard])
            }
            Self::EvidenceAdded | Self::EvidenceProcessed => {
                Targets::Resources(&[Evidence, Cases, Dashboard])
            }
            Self::ThreatDetected | Self::ThreatUpdated => Targets::Resources(&[Threats, Dashboard]),
            Self::AiJobQueued | Self::AiJobStarted | Self::AiJobProgress => {
                Targets::Resources(&[AiJobs])
            }
            Self::AiJobCompleted | Self::AiJobFailed => {
                Targets::Resources(&[AiJobs, Threats, Evidence, Dashboard])
            }
            Self::Notification => Targets::Resources(&[Notifications]),
            Self::DashboardRefresh => Targets::All,
        }
    }
}

/// Something that can be told to refetch.
pub trait InvalidationSink: Send + Sync {
    /// Invalidate every cached key for `resource`. Returns fetches started.
    fn invalidate_resource(&self, resource: Resource) -> usize;

    /// Invalidate every cached key. Returns fetches started.
    fn invalidate_all(&self) -> usize;
}

impl<V: Send + Sync + 'static> InvalidationSink for PollingCache<V> {
    fn invalidate_resource(&self, resource: Resource) -> usize {
        self.keys()
            .iter()
            .filter(|key| key.resource == resource)
            .filter(|key| self.invalidate(key) == Invalidation::Started)
            .count()
    }

    fn invalidate_all(&self) -> usize {
        PollingCache::invalidate_all(self)
    }
}

/// Outcome of dispatching one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Recognized event; `started` fetches were issued.
    Invalidated { event: LiveEvent, started: usize },
    /// Well-formed frame with a type we do not handle.
    Ignored { kind: String },
    /// Not a `{type, ...}` JSON object. Dropped.
    Malformed,
}

/// Parse one text frame and apply its invalidations to `sink`.
///
/// Never fails: bad frames are logged and dropped so the socket stays up.
pub fn dispatch(text: &str, sink: &dyn InvalidationSink) -> Dispatch {
    let message = match LiveMessage::parse(text) {
        Ok(m) => m,
        Err(e) => {
            warn!(error = %e, len = text.len(), "Dropping malformed live message");
            Metrics::live_message("malformed");
            return Dispatch::Malformed;
        }
    };

    let Some(event) = LiveEvent::from_type(&message.kind) else {
        trace!(kind = %message.kind, "Ignoring unknown live message type");
        Metrics::live_message("unknown");
        return Dispatch::Ignored { kind: message.kind };
    };
    Metrics::live_message(event.as_str());

    let started = match event.targets() {
        Targets::All => sink.invalidate_all(),
        Targets::Resources(resources) => resources
            .iter()
            .map(|r| sink.invalidate_resource(*r))
            .sum(),
    };
    debug!(event = event.as_str(), started, sent_at = ?message.sent_at(), "Applied live event");

    Dispatch::Invalidated { event, started }
}
