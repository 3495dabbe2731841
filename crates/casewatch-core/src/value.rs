//! Typed payloads for each `Resource`.

use crate::entity::{AiAnalysisJob, Case, DashboardSummary, Evidence, Notification, Threat};
use crate::key::Resource;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Decoded body of a read endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "resource", content = "data", rename_all = "snake_case")]
pub enum ResourceValue {
    Dashboard(DashboardSummary),
    Cases(Vec<Case>),
    Evidence(Vec<Evidence>),
    Threats(Vec<Threat>),
    AiJobs(Vec<AiAnalysisJob>),
    Notifications(Vec<Notification>),
}

/// Envelope form of a list response.
#[derive(Deserialize)]
struct Envelope<T> {
    #[serde(alias = "data", alias = "results")]
    items: Vec<T>,
}

/// List endpoints answer either a bare array or an envelope object. The
/// shape is picked from the first byte so serde's position and cause
/// survive into the error.
fn decode_list<T: DeserializeOwned>(body: &[u8]) -> serde_json::Result<Vec<T>> {
    let first = body.iter().copied().find(|b| !b.is_ascii_whitespace());
    if first == Some(b'[') {
        serde_json::from_slice(body)
    } else {
        serde_json::from_slice::<Envelope<T>>(body).map(|e| e.items)
    }
}

impl ResourceValue {
    /// Decode a raw JSON body into the shape expected for `resource`.
    pub fn decode(resource: Resource, body: &[u8]) -> serde_json::Result<Self> {
        Ok(match resource {
            Resource::Dashboard => Self::Dashboard(serde_json::from_slice(body)?),
            Resource::Cases => Self::Cases(decode_list(body)?),
            Resource::Evidence => Self::Evidence(decode_list(body)?),
            Resource::Threats => Self::Threats(decode_list(body)?),
            Resource::AiJobs => Self::AiJobs(decode_list(body)?),
            Resource::Notifications => Self::Notifications(decode_list(body)?),
        })
    }

    pub fn resource(&self) -> Resource {
        match self {
            Self::Dashboard(_) => Resource::Dashboard,
            Self::Cases(_) => Resource::Cases,
            Self::Evidence(_) => Resource::Evidence,
            Self::Threats(_) => Resource::Threats,
            Self::AiJobs(_) => Resource::AiJobs,
            Self::Notifications(_) => Resource::Notifications,
        }
    }

    /// Number of items for list resources; `None` for the dashboard summary.
    pub fn item_count(&self) -> Option<usize> {
        match self {
            Self::Dashboard(_) => None,
            Self::Cases(v) => Some(v.len()),
            Self::Evidence(v) => Some(v.len()),
            Self::Threats(v) => Some(v.len()),
            Self::AiJobs(v) => Some(v.len()),
            Self::Notifications(v) => Some(v.len()),
        }
    }

    /// True when the value represents zero items.
    pub fn is_empty(&self) -> bool {
        self.item_count() == Some(0)
    }

    pub fn as_dashboard(&self) -> Option<&DashboardSummary> {
        match self {
            Self::Dashboard(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_cases(&self) -> Option<&[Case]> {
        match self {
            Self::Cases(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_evidence(&self) -> Option<&[Evidence]> {
        match self {
            Self::Evidence(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_threats(&self) -> Option<&[Threat]> {
        match self {
            Self::Threats(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_ai_jobs(&self) -> Option<&[AiAnalysisJob]> {
        match self {
            Self::AiJobs(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_notifications(&self) -> Option<&[Notification]> {
        match self {
            Self::Notifications(v) => Some(v),
            _ => None,
        }
    }
}
