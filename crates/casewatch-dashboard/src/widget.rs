//! Dashboard widgets.
//!
//! Each widget declares the cache keys it reads and maps their snapshots to
//! a `WidgetView`. Mapping is pure: the same snapshots and clock always give
//! the same view.

use std::collections::HashMap;
use std::time::Duration;

use casewatch_cache::CacheEntry;
use casewatch_core::{
    AiAnalysisJob, Case, Evidence, EvidenceStatus, JobStatus, Notification, ResourceKey,
    ResourceValue, Threat,
};
use casewatch_fetch::FetchError;
use casewatch_live::ChannelState;
use chrono::{DateTime, Utc};

use crate::config::{DashboardConfig, IntervalConfig};
use crate::format::{
    clamp_progress, format_file_size, progress_bar, severity_color, status_color, time_ago, Color,
};
use crate::types::{
    CaseRow, ConnectionStatus, EvidenceRow, JobRow, Notice, NotificationRow, StatusCard,
    ThreatRow, WidgetBody, WidgetState, WidgetView,
};

const PROGRESS_WIDTH: usize = 20;

/// A cache key a widget needs, refreshed at least every `interval`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub key: ResourceKey,
    pub interval: Duration,
}

impl Requirement {
    pub fn new(key: ResourceKey, interval: Duration) -> Self {
        Self { key, interval }
    }
}

/// Everything a widget may read while building one frame.
pub struct ViewContext {
    entries: HashMap<ResourceKey, CacheEntry<ResourceValue>>,
    live: Option<ChannelState>,
    now: DateTime<Utc>,
}

impl ViewContext {
    pub fn new(
        entries: HashMap<ResourceKey, CacheEntry<ResourceValue>>,
        live: Option<ChannelState>,
        now: DateTime<Utc>,
    ) -> Self {
        Self { entries, live, now }
    }

    pub fn entry(&self, key: &ResourceKey) -> Option<&CacheEntry<ResourceValue>> {
        self.entries.get(key)
    }

    /// Live channel state; `None` when push is not configured.
    pub fn live(&self) -> Option<ChannelState> {
        self.live
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }
}

/// A dashboard panel.
pub trait Widget: Send + Sync {
    fn id(&self) -> &'static str;

    fn title(&self) -> &'static str;

    /// Keys this widget reads. May be empty.
    fn requirements(&self) -> Vec<Requirement>;

    fn view(&self, ctx: &ViewContext) -> WidgetView;
}

fn notice_for(error: &FetchError) -> Notice {
    Notice {
        message: error.to_string(),
        permanent: error.is_permanent_client_error(),
    }
}

/// Map a snapshot to a widget state.
///
/// `project` returns `None` when the value holds no items.
pub fn widget_state<T>(
    entry: Option<&CacheEntry<ResourceValue>>,
    project: impl FnOnce(&ResourceValue) -> Option<T>,
) -> WidgetState<T> {
    let Some(entry) = entry else {
        return WidgetState::Loading;
    };
    let notice = entry.last_error.as_ref().map(notice_for);

    match (entry.value(), &entry.last_error) {
        (None, None) => WidgetState::Loading,
        (None, Some(error)) => WidgetState::Error {
            message: error.to_string(),
            permanent: error.is_permanent_client_error(),
        },
        (Some(value), _) => match project(value) {
            Some(data) => WidgetState::Populated { data, notice },
            None => WidgetState::Empty { notice },
        },
    }
}

fn non_empty<T>(items: Option<&[T]>) -> Option<&[T]> {
    items.filter(|items| !items.is_empty())
}

fn or_dash(value: Option<&str>) -> String {
    value
        .filter(|s| !s.trim().is_empty())
        .unwrap_or("-")
        .to_string()
}

/// Headline counters from the dashboard summary.
///
/// The active-jobs card prefers the faster job list when it is cached.
pub struct StatusCardsWidget {
    dashboard: Requirement,
    jobs: Requirement,
}

impl StatusCardsWidget {
    pub fn new(intervals: &IntervalConfig) -> Self {
        let dashboard = ResourceKey::dashboard();
        let jobs = ResourceKey::ai_jobs();
        Self {
            dashboard: Requirement::new(
                dashboard.clone(),
                intervals.for_resource(dashboard.resource),
            ),
            jobs: Requirement::new(jobs.clone(), intervals.for_resource(jobs.resource)),
        }
    }
}

impl Widget for StatusCardsWidget {
    fn id(&self) -> &'static str {
        "status"
    }

    fn title(&self) -> &'static str {
        "Overview"
    }

    fn requirements(&self) -> Vec<Requirement> {
        vec![self.dashboard.clone(), self.jobs.clone()]
    }

    fn view(&self, ctx: &ViewContext) -> WidgetView {
        let live_jobs = ctx
            .entry(&self.jobs.key)
            .and_then(|e| e.value())
            .and_then(|v| v.as_ai_jobs())
            .map(|jobs| jobs.iter().filter(|j| j.status.is_active()).count() as u64);

        let state = widget_state(ctx.entry(&self.dashboard.key), |value| {
            let s = value.as_dashboard()?;
            let active_jobs = live_jobs.unwrap_or(s.active_jobs);
            let engine = s.engine_status.as_deref().unwrap_or("unknown");
            Some(WidgetBody::StatusCards {
                cards: vec![
                    StatusCard {
                        label: "Active cases",
                        value: s.active_cases.to_string(),
                        detail: Some(format!("{} total", s.total_cases)),
                        color: Color::Blue,
                    },
                    StatusCard {
                        label: "Evidence processed",
                        value: format!("{}/{}", s.processed_evidence, s.total_evidence),
                        detail: None,
                        color: if s.processed_evidence >= s.total_evidence {
                            Color::Green
                        } else {
                            Color::Yellow
                        },
                    },
                    StatusCard {
                        label: "Threats",
                        value: s.threats_detected.to_string(),
                        detail: Some(format!("{} critical", s.critical_threats)),
                        color: if s.critical_threats > 0 {
                            Color::Red
                        } else {
                            Color::Gray
                        },
                    },
                    StatusCard {
                        label: "AI jobs",
                        value: active_jobs.to_string(),
                        detail: Some(format!("engine {engine}")),
                        color: status_color(engine),
                    },
                ],
            })
        });

        WidgetView {
            id: self.id(),
            title: self.title(),
            state,
        }
    }
}

/// Most recently active cases.
pub struct CaseListWidget {
    req: Requirement,
    limit: usize,
}

impl CaseListWidget {
    pub fn new(limit: usize, interval: Duration) -> Self {
        Self {
            req: Requirement::new(ResourceKey::cases().with_param("limit", limit), interval),
            limit,
        }
    }
}

fn case_row(case: &Case, now: DateTime<Utc>) -> CaseRow {
    let status = case.status.to_string();
    CaseRow {
        id: case.id,
        label: case.label(),
        title: case.title.clone(),
        status_color: status_color(&status),
        status,
        priority: case.priority.to_string(),
        priority_color: severity_color(case.priority),
        investigator: or_dash(case.investigator.as_deref()),
        evidence_count: case.evidence_count,
        activity: time_ago(case.activity_at(), now),
    }
}

impl Widget for CaseListWidget {
    fn id(&self) -> &'static str {
        "cases"
    }

    fn title(&self) -> &'static str {
        "Recent Cases"
    }

    fn requirements(&self) -> Vec<Requirement> {
        vec![self.req.clone()]
    }

    fn view(&self, ctx: &ViewContext) -> WidgetView {
        let state = widget_state(ctx.entry(&self.req.key), |value| {
            let cases = non_empty(value.as_cases())?;
            let mut sorted: Vec<&Case> = cases.iter().collect();
            sorted.sort_by(|a, b| b.activity_at().cmp(&a.activity_at()));
            let rows = sorted
                .into_iter()
                .take(self.limit)
                .map(|c| case_row(c, ctx.now()))
                .collect();
            Some(WidgetBody::Cases { rows })
        });

        WidgetView {
            id: self.id(),
            title: self.title(),
            state,
        }
    }
}

/// Recent threats, most severe first, then most recent.
pub struct ThreatFeedWidget {
    req: Requirement,
    limit: usize,
}

impl ThreatFeedWidget {
    pub fn new(limit: usize, interval: Duration) -> Self {
        Self {
            req: Requirement::new(ResourceKey::threats().with_param("limit", limit), interval),
            limit,
        }
    }
}

/// Stable sort by severity rank, then detection time, both descending.
pub fn sort_threats(threats: &mut [&Threat]) {
    threats.sort_by(|a, b| {
        b.severity
            .rank()
            .cmp(&a.severity.rank())
            .then_with(|| b.detected_at.cmp(&a.detected_at))
    });
}

fn threat_row(threat: &Threat, now: DateTime<Utc>) -> ThreatRow {
    ThreatRow {
        id: threat.id,
        threat_type: threat.threat_type.clone(),
        severity: threat.severity.to_string(),
        color: severity_color(threat.severity),
        description: or_dash(threat.description.as_deref()),
        confidence: threat.confidence.map(|c| {
            // Backends send either 0..1 or 0..100.
            let pct = if c <= 1.0 { c * 100.0 } else { c };
            format!("{:.0}%", pct.clamp(0.0, 100.0))
        }),
        detected: time_ago(threat.detected_at, now),
    }
}

impl Widget for ThreatFeedWidget {
    fn id(&self) -> &'static str {
        "threats"
    }

    fn title(&self) -> &'static str {
        "Threat Feed"
    }

    fn requirements(&self) -> Vec<Requirement> {
        vec![self.req.clone()]
    }

    fn view(&self, ctx: &ViewContext) -> WidgetView {
        let state = widget_state(ctx.entry(&self.req.key), |value| {
            let threats = non_empty(value.as_threats())?;
            let mut sorted: Vec<&Threat> = threats.iter().collect();
            sort_threats(&mut sorted);
            let rows = sorted
                .into_iter()
                .take(self.limit)
                .map(|t| threat_row(t, ctx.now()))
                .collect();
            Some(WidgetBody::Threats { rows })
        });

        WidgetView {
            id: self.id(),
            title: self.title(),
            state,
        }
    }
}

/// AI analysis jobs: running, then queued, then finished.
pub struct JobProgressWidget {
    req: Requirement,
    limit: usize,
}

impl JobProgressWidget {
    pub fn new(limit: usize, interval: Duration) -> Self {
        Self {
            req: Requirement::new(ResourceKey::ai_jobs(), interval),
            limit,
        }
    }
}

fn job_order(status: JobStatus) -> u8 {
    match status {
        JobStatus::Running => 0,
        JobStatus::Queued => 1,
        JobStatus::Failed => 2,
        JobStatus::Completed => 3,
        JobStatus::Unknown => 4,
    }
}

fn job_row(job: &AiAnalysisJob) -> JobRow {
    let status = job.status.to_string();
    let progress = match job.status {
        JobStatus::Completed => 100.0,
        _ => clamp_progress(job.progress),
    };
    JobRow {
        id: job.id,
        job_type: job.job_type.clone(),
        color: status_color(&status),
        status,
        progress,
        bar: progress_bar(progress, PROGRESS_WIDTH),
        error: job.error_message.clone().filter(|m| !m.is_empty()),
    }
}

impl Widget for JobProgressWidget {
    fn id(&self) -> &'static str {
        "jobs"
    }

    fn title(&self) -> &'static str {
        "AI Analysis"
    }

    fn requirements(&self) -> Vec<Requirement> {
        vec![self.req.clone()]
    }

    fn view(&self, ctx: &ViewContext) -> WidgetView {
        let state = widget_state(ctx.entry(&self.req.key), |value| {
            let jobs = non_empty(value.as_ai_jobs())?;
            let mut sorted: Vec<&AiAnalysisJob> = jobs.iter().collect();
            sorted.sort_by(|a, b| {
                job_order(a.status)
                    .cmp(&job_order(b.status))
                    .then_with(|| b.created_at.cmp(&a.created_at))
            });
            let active = jobs.iter().filter(|j| j.status.is_active()).count();
            let rows = sorted.into_iter().take(self.limit).map(job_row).collect();
            Some(WidgetBody::Jobs { active, rows })
        });

        WidgetView {
            id: self.id(),
            title: self.title(),
            state,
        }
    }
}

/// Evidence waiting for or undergoing processing.
pub struct EvidenceQueueWidget {
    req: Requirement,
    limit: usize,
}

impl EvidenceQueueWidget {
    pub fn new(limit: usize, interval: Duration) -> Self {
        Self {
            req: Requirement::new(ResourceKey::evidence(), interval),
            limit,
        }
    }
}

fn evidence_order(status: EvidenceStatus) -> u8 {
    match status {
        EvidenceStatus::Processing => 0,
        EvidenceStatus::Pending => 1,
        EvidenceStatus::Failed => 2,
        EvidenceStatus::Processed => 3,
        EvidenceStatus::Unknown => 4,
    }
}

fn evidence_row(item: &Evidence, now: DateTime<Utc>) -> EvidenceRow {
    let status = item.status.to_string();
    EvidenceRow {
        id: item.id,
        name: item.name.clone(),
        evidence_type: or_dash(item.evidence_type.as_deref()),
        color: status_color(&status),
        status,
        size: format_file_size(item.file_size),
        collected: time_ago(item.collected_at, now),
    }
}

impl Widget for EvidenceQueueWidget {
    fn id(&self) -> &'static str {
        "evidence"
    }

    fn title(&self) -> &'static str {
        "Evidence Queue"
    }

    fn requirements(&self) -> Vec<Requirement> {
        vec![self.req.clone()]
    }

    fn view(&self, ctx: &ViewContext) -> WidgetView {
        let state = widget_state(ctx.entry(&self.req.key), |value| {
            let items = non_empty(value.as_evidence())?;
            let count = |s: EvidenceStatus| items.iter().filter(|e| e.status == s).count();
            let mut sorted: Vec<&Evidence> = items.iter().collect();
            sorted.sort_by(|a, b| {
                evidence_order(a.status)
                    .cmp(&evidence_order(b.status))
                    .then_with(|| b.collected_at.cmp(&a.collected_at))
            });
            Some(WidgetBody::Evidence {
                pending: count(EvidenceStatus::Pending),
                processing: count(EvidenceStatus::Processing),
                rows: sorted
                    .into_iter()
                    .take(self.limit)
                    .map(|e| evidence_row(e, ctx.now()))
                    .collect(),
            })
        });

        WidgetView {
            id: self.id(),
            title: self.title(),
            state,
        }
    }
}

/// Notifications, unread first.
pub struct NotificationsWidget {
    req: Requirement,
    limit: usize,
}

impl NotificationsWidget {
    pub fn new(limit: usize, interval: Duration) -> Self {
        Self {
            req: Requirement::new(ResourceKey::notifications(), interval),
            limit,
        }
    }
}

fn notification_row(n: &Notification, now: DateTime<Utc>) -> NotificationRow {
    NotificationRow {
        id: n.id,
        title: n.title.clone(),
        message: n.message.clone().unwrap_or_default(),
        severity: n.severity.to_string(),
        color: severity_color(n.severity),
        read: n.read,
        created: time_ago(n.created_at, now),
    }
}

impl Widget for NotificationsWidget {
    fn id(&self) -> &'static str {
        "notifications"
    }

    fn title(&self) -> &'static str {
        "Notifications"
    }

    fn requirements(&self) -> Vec<Requirement> {
        vec![self.req.clone()]
    }

    fn view(&self, ctx: &ViewContext) -> WidgetView {
        let state = widget_state(ctx.entry(&self.req.key), |value| {
            let items = non_empty(value.as_notifications())?;
            let mut sorted: Vec<&Notification> = items.iter().collect();
            sorted.sort_by(|a, b| a.read.cmp(&b.read).then_with(|| b.created_at.cmp(&a.created_at)));
            Some(WidgetBody::Notifications {
                unread: items.iter().filter(|n| !n.read).count(),
                rows: sorted
                    .into_iter()
                    .take(self.limit)
                    .map(|n| notification_row(n, ctx.now()))
                    .collect(),
            })
        });

        WidgetView {
            id: self.id(),
            title: self.title(),
            state,
        }
    }
}

/// Live channel indicator. Reads no cache keys.
pub struct ConnectionWidget;

impl Widget for ConnectionWidget {
    fn id(&self) -> &'static str {
        "connection"
    }

    fn title(&self) -> &'static str {
        "Live Updates"
    }

    fn requirements(&self) -> Vec<Requirement> {
        Vec::new()
    }

    fn view(&self, ctx: &ViewContext) -> WidgetView {
        let status = match ctx.live() {
            None => ConnectionStatus {
                state: "disabled".to_string(),
                connected: false,
                color: Color::Gray,
            },
            Some(state) => ConnectionStatus {
                state: state.to_string(),
                connected: state.is_connected(),
                color: match state {
                    ChannelState::Connected => Color::Green,
                    ChannelState::Connecting | ChannelState::Reconnecting => Color::Yellow,
                    ChannelState::Failed => Color::Red,
                    ChannelState::Disconnected => Color::Gray,
                },
            },
        };

        WidgetView {
            id: self.id(),
            title: self.title(),
            state: WidgetState::Populated {
                data: WidgetBody::Connection(status),
                notice: None,
            },
        }
    }
}

/// The default widget set.
pub fn standard_layout(
    config: &DashboardConfig,
    intervals: &IntervalConfig,
) -> Vec<Box<dyn Widget>> {
    use casewatch_core::Resource;
    vec![
        Box::new(StatusCardsWidget::new(intervals)),
        Box::new(CaseListWidget::new(
            config.case_limit,
            intervals.for_resource(Resource::Cases),
        )),
        Box::new(ThreatFeedWidget::new(
            config.threat_limit,
            intervals.for_resource(Resource::Threats),
        )),
        Box::new(JobProgressWidget::new(
            config.job_limit,
            intervals.for_resource(Resource::AiJobs),
        )),
        Box::new(EvidenceQueueWidget::new(
            config.evidence_limit,
            intervals.for_resource(Resource::Evidence),
        )),
        Box::new(NotificationsWidget::new(
            config.notification_limit,
            intervals.for_resource(Resource::Notifications),
        )),
        Box::new(ConnectionWidget),
    ]
}
