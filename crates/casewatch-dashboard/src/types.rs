//! Dashboard view-model types.
//!
//! These types are used for JSON serialization of frames and by the plain
//! text renderer.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::format::Color;

/// Stale-data or error affordance attached to a widget that still shows data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub message: String,
    /// Permanent client error (4xx other than 408/429): retrying will not help.
    pub permanent: bool,
}

/// Widget state derived from cache snapshots.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WidgetState<T> {
    /// No value yet and no error.
    Loading,
    /// No value and the fetch failed.
    Error { message: String, permanent: bool },
    /// Value present with zero items.
    Empty {
        #[serde(skip_serializing_if = "Option::is_none")]
        notice: Option<Notice>,
    },
    /// Value present, possibly stale.
    Populated {
        data: T,
        #[serde(skip_serializing_if = "Option::is_none")]
        notice: Option<Notice>,
    },
}

impl<T> WidgetState<T> {
    pub fn notice(&self) -> Option<&Notice> {
        match self {
            Self::Empty { notice } | Self::Populated { notice, .. } => notice.as_ref(),
            Self::Loading | Self::Error { .. } => None,
        }
    }

    pub fn is_stale(&self) -> bool {
        self.notice().is_some()
    }

    /// Message for the non-dismissing banner, if this state carries a
    /// permanent client error.
    pub fn banner(&self) -> Option<&str> {
        match self {
            Self::Error {
                message,
                permanent: true,
            } => Some(message),
            _ => self
                .notice()
                .filter(|n| n.permanent)
                .map(|n| n.message.as_str()),
        }
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Populated { data, .. } => Some(data),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> WidgetState<U> {
        match self {
            Self::Loading => WidgetState::Loading,
            Self::Error { message, permanent } => WidgetState::Error { message, permanent },
            Self::Empty { notice } => WidgetState::Empty { notice },
            Self::Populated { data, notice } => WidgetState::Populated {
                data: f(data),
                notice,
            },
        }
    }
}

/// One rendered widget.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WidgetView {
    pub id: &'static str,
    pub title: &'static str,
    #[serde(flatten)]
    pub state: WidgetState<WidgetBody>,
}

/// Widget-specific content.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WidgetBody {
    StatusCards { cards: Vec<StatusCard> },
    Cases { rows: Vec<CaseRow> },
    Threats { rows: Vec<ThreatRow> },
    Jobs { active: usize, rows: Vec<JobRow> },
    Evidence {
        pending: usize,
        processing: usize,
        rows: Vec<EvidenceRow>,
    },
    Notifications {
        unread: usize,
        rows: Vec<NotificationRow>,
    },
    Connection(ConnectionStatus),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusCard {
    pub label: &'static str,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseRow {
    pub id: i64,
    pub label: String,
    pub title: String,
    pub status: String,
    pub status_color: Color,
    pub priority: String,
    pub priority_color: Color,
    pub investigator: String,
    pub evidence_count: u64,
    pub activity: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreatRow {
    pub id: i64,
    pub threat_type: String,
    pub severity: String,
    pub color: Color,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<String>,
    pub detected: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobRow {
    pub id: i64,
    pub job_type: String,
    pub status: String,
    pub color: Color,
    pub progress: f64,
    pub bar: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvidenceRow {
    pub id: i64,
    pub name: String,
    pub evidence_type: String,
    pub status: String,
    pub color: Color,
    pub size: String,
    pub collected: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationRow {
    pub id: i64,
    pub title: String,
    pub message: String,
    pub severity: String,
    pub color: Color,
    pub read: bool,
    pub created: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionStatus {
    /// Channel state, or "disabled" when push is not configured.
    pub state: String,
    pub connected: bool,
    pub color: Color,
}

/// Full dashboard frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardFrame {
    pub generated_at: DateTime<Utc>,
    /// Non-dismissing banners (permanent client errors).
    pub banners: Vec<String>,
    pub widgets: Vec<WidgetView>,
}

impl DashboardFrame {
    pub fn widget(&self, id: &str) -> Option<&WidgetView> {
        self.widgets.iter().find(|w| w.id == id)
    }
}
