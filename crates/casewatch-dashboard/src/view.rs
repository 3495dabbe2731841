//! Aggregate dashboard view.
//!
//! Owns the layout and the subscription handles, nothing else. Data always
//! comes from the polling cache at frame time.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use casewatch_cache::{PollingCache, SubscriptionHandle};
use casewatch_core::{ResourceKey, ResourceValue};
use casewatch_live::ChannelState;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::{watch, Notify};
use tracing::{debug, info};

use crate::types::{DashboardFrame, WidgetBody, WidgetState};
use crate::widget::{ViewContext, Widget};

/// Widgets composed over one cache.
pub struct DashboardView {
    widgets: Vec<Box<dyn Widget>>,
    cache: PollingCache<ResourceValue>,
    live: Option<watch::Receiver<ChannelState>>,
    handles: Mutex<Vec<SubscriptionHandle>>,
    /// Signalled whenever a subscribed entry settles.
    changed: Arc<Notify>,
}

impl DashboardView {
    pub fn new(
        widgets: Vec<Box<dyn Widget>>,
        cache: PollingCache<ResourceValue>,
        live: Option<watch::Receiver<ChannelState>>,
    ) -> Self {
        Self {
            widgets,
            cache,
            live,
            handles: Mutex::new(Vec::new()),
            changed: Arc::new(Notify::new()),
        }
    }

    /// Every key the layout reads, each at the shortest interval any widget
    /// asked for.
    pub fn requirements(&self) -> BTreeMap<ResourceKey, Duration> {
        let mut merged: BTreeMap<ResourceKey, Duration> = BTreeMap::new();
        for req in self.widgets.iter().flat_map(|w| w.requirements()) {
            merged
                .entry(req.key)
                .and_modify(|d| *d = (*d).min(req.interval))
                .or_insert(req.interval);
        }
        merged
    }

    /// Subscribe every required key once. Mounting twice is a no-op.
    pub fn mount(&self) {
        let mut handles = self.handles.lock();
        if !handles.is_empty() {
            debug!("Dashboard already mounted");
            return;
        }

        for (key, interval) in self.requirements() {
            let changed = self.changed.clone();
            let handle = self
                .cache
                .subscribe(key, interval, move |_| changed.notify_one());
            handles.push(handle);
        }
        info!(
            widgets = self.widgets.len(),
            keys = handles.len(),
            "Dashboard mounted"
        );
    }

    /// Release every subscription. Returns how many were released.
    pub fn unmount(&self) -> usize {
        let handles = std::mem::take(&mut *self.handles.lock());
        let released = handles
            .into_iter()
            .map(|h| self.cache.unsubscribe(h))
            .filter(|released| *released)
            .count();
        info!(released, "Dashboard unmounted");
        released
    }

    pub fn is_mounted(&self) -> bool {
        !self.handles.lock().is_empty()
    }

    /// Resolves after the next settled fetch on any subscribed key.
    pub async fn changed(&self) {
        self.changed.notified().await;
    }

    /// True once every required key has a value or an error.
    pub fn is_settled(&self) -> bool {
        self.requirements().keys().all(|key| {
            self.cache
                .snapshot(key)
                .is_some_and(|entry| !entry.is_loading())
        })
    }

    pub fn frame(&self) -> DashboardFrame {
        self.frame_at(Utc::now())
    }

    /// Build a frame from the current snapshots.
    pub fn frame_at(&self, now: DateTime<Utc>) -> DashboardFrame {
        let entries = self
            .requirements()
            .into_keys()
            .filter_map(|key| self.cache.snapshot(&key).map(|entry| (key, entry)))
            .collect();
        let live = self.live.as_ref().map(|rx| *rx.borrow());
        let ctx = ViewContext::new(entries, live, now);

        let widgets: Vec<_> = self.widgets.iter().map(|w| w.view(&ctx)).collect();
        let mut banners: Vec<String> = widgets
            .iter()
            .filter_map(|w| w.state.banner().map(|b| format!("{}: {b}", w.title)))
            .collect();
        banners.dedup();

        DashboardFrame {
            generated_at: now,
            banners,
            widgets,
        }
    }
}

impl Drop for DashboardView {
    fn drop(&mut self) {
        if self.is_mounted() {
            self.unmount();
        }
    }
}

/// Plain-text rendering of a frame.
pub fn render_text(frame: &DashboardFrame) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "casewatch  {}\n",
        frame.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    for banner in &frame.banners {
        out.push_str(&format!("!! {banner}\n"));
    }

    for widget in &frame.widgets {
        out.push('\n');
        out.push_str(&format!("== {} ==", widget.title));
        if let Some(notice) = widget.state.notice() {
            out.push_str(&format!("  (stale: {})", notice.message));
        }
        out.push('\n');

        match &widget.state {
            WidgetState::Loading => out.push_str("  loading...\n"),
            WidgetState::Error { message, .. } => out.push_str(&format!("  error: {message}\n")),
            WidgetState::Empty { .. } => out.push_str("  nothing to show\n"),
            WidgetState::Populated { data, .. } => render_body(&mut out, data),
        }
    }
    out
}

fn render_body(out: &mut String, body: &WidgetBody) {
    match body {
        WidgetBody::StatusCards { cards } => {
            for card in cards {
                let detail = card.detail.as_deref().unwrap_or("");
                out.push_str(&format!("  {:<20} {:>8}  {detail}\n", card.label, card.value));
            }
        }
        WidgetBody::Cases { rows } => {
            for r in rows {
                out.push_str(&format!(
                    "  {:<12} {:<32} {:<8} {:<8} {}\n",
                    r.label, r.title, r.status, r.priority, r.activity
                ));
            }
        }
        WidgetBody::Threats { rows } => {
            for r in rows {
                out.push_str(&format!(
                    "  [{:<8}] {:<20} {:<6} {}\n",
                    r.severity,
                    r.threat_type,
                    r.confidence.as_deref().unwrap_or(""),
                    r.detected
                ));
            }
        }
        WidgetBody::Jobs { active, rows } => {
            out.push_str(&format!("  {active} active\n"));
            for r in rows {
                out.push_str(&format!("  #{:<6} {:<20} {:<10} {}\n", r.id, r.job_type, r.status, r.bar));
                if let Some(error) = &r.error {
                    out.push_str(&format!("          {error}\n"));
                }
            }
        }
        WidgetBody::Evidence {
            pending,
            processing,
            rows,
        } => {
            out.push_str(&format!("  {pending} pending, {processing} processing\n"));
            for r in rows {
                out.push_str(&format!(
                    "  {:<28} {:<12} {:<10} {:>10}  {}\n",
                    r.name, r.evidence_type, r.status, r.size, r.collected
                ));
            }
        }
        WidgetBody::Notifications { unread, rows } => {
            out.push_str(&format!("  {unread} unread\n"));
            for r in rows {
                let marker = if r.read { ' ' } else { '*' };
                out.push_str(&format!("  {marker} {:<40} {}\n", r.title, r.created));
            }
        }
        WidgetBody::Connection(status) => {
            out.push_str(&format!("  {}\n", status.state));
        }
    }
}
