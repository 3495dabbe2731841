//! casewatch-dashboard - Widgets and aggregate view over the polling cache.
//!
//! Widgets declare the resource keys they read. The view subscribes each key
//! once, builds frames from cache snapshots and can serve them over HTTP.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   subscribe(key, interval)   ┌──────────────────┐
//! │ DashboardView│ ───────────────────────────▶ │   PollingCache   │
//! │  (widgets)   │ ◀─────────── snapshots ───── │  (one entry/key) │
//! └──────┬───────┘                              └────────▲─────────┘
//!        │ frame()                                       │ invalidate
//!        ▼                                               │
//!   render_text / GET /api/frame                  ┌──────┴──────┐
//!                                                 │ LiveChannel │
//!                                                 └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let layout = standard_layout(&config.dashboard, &config.intervals);
//! let view = Arc::new(DashboardView::new(layout, cache.clone(), live_rx));
//! view.mount();
//! println!("{}", render_text(&view.frame()));
//! ```

pub mod config;
pub mod format;
pub mod server;
pub mod types;
pub mod view;
pub mod widget;

pub use config::{DashboardConfig, IntervalConfig};
pub use server::{create_router, run_server, serve, AppState};
pub use types::{DashboardFrame, Notice, WidgetBody, WidgetState, WidgetView};
pub use view::{render_text, DashboardView};
pub use widget::{standard_layout, Requirement, ViewContext, Widget};
