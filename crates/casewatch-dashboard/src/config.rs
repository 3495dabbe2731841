//! Dashboard configuration.

use casewatch_core::Resource;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Dashboard layout and frame server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Serve frames over HTTP.
    #[serde(default)]
    pub serve: bool,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Interval between rendered frames in milliseconds.
    #[serde(default = "default_render_interval_ms")]
    pub render_interval_ms: u64,
    #[serde(default = "default_case_limit")]
    pub case_limit: usize,
    #[serde(default = "default_threat_limit")]
    pub threat_limit: usize,
    #[serde(default = "default_job_limit")]
    pub job_limit: usize,
    #[serde(default = "default_evidence_limit")]
    pub evidence_limit: usize,
    #[serde(default = "default_notification_limit")]
    pub notification_limit: usize,
}

fn default_port() -> u16 {
    8080
}

fn default_render_interval_ms() -> u64 {
    1_000
}

fn default_case_limit() -> usize {
    10
}

fn default_threat_limit() -> usize {
    10
}

fn default_job_limit() -> usize {
    8
}

fn default_evidence_limit() -> usize {
    10
}

fn default_notification_limit() -> usize {
    5
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            serve: false,
            port: default_port(),
            render_interval_ms: default_render_interval_ms(),
            case_limit: default_case_limit(),
            threat_limit: default_threat_limit(),
            job_limit: default_job_limit(),
            evidence_limit: default_evidence_limit(),
            notification_limit: default_notification_limit(),
        }
    }
}

impl DashboardConfig {
    pub fn render_interval(&self) -> Duration {
        Duration::from_millis(self.render_interval_ms.max(50))
    }
}

/// Refresh cadence per resource, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntervalConfig {
    #[serde(default = "default_dashboard_ms")]
    pub dashboard_ms: u64,
    #[serde(default = "default_cases_ms")]
    pub cases_ms: u64,
    #[serde(default = "default_evidence_ms")]
    pub evidence_ms: u64,
    #[serde(default = "default_threats_ms")]
    pub threats_ms: u64,
    #[serde(default = "default_ai_jobs_ms")]
    pub ai_jobs_ms: u64,
    #[serde(default = "default_notifications_ms")]
    pub notifications_ms: u64,
}

fn default_dashboard_ms() -> u64 {
    30_000
}

fn default_cases_ms() -> u64 {
    30_000
}

fn default_evidence_ms() -> u64 {
    15_000
}

fn default_threats_ms() -> u64 {
    15_000
}

fn default_ai_jobs_ms() -> u64 {
    10_000
}

fn default_notifications_ms() -> u64 {
    30_000
}

impl Default for IntervalConfig {
    fn default() -> Self {
        Self {
            dashboard_ms: default_dashboard_ms(),
            cases_ms: default_cases_ms(),
            evidence_ms: default_evidence_ms(),
            threats_ms: default_threats_ms(),
            ai_jobs_ms: default_ai_jobs_ms(),
            notifications_ms: default_notifications_ms(),
        }
    }
}

impl IntervalConfig {
    pub fn for_resource(&self, resource: Resource) -> Duration {
        let ms = match resource {
            Resource::Dashboard => self.dashboard_ms,
            Resource::Cases => self.cases_ms,
            Resource::Evidence => self.evidence_ms,
            Resource::Threats => self.threats_ms,
            Resource::AiJobs => self.ai_jobs_ms,
            Resource::Notifications => self.notifications_ms,
        };
        Duration::from_millis(ms)
    }
}
