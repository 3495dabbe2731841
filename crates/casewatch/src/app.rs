//! Main application orchestration.
//!
//! Wires the components:
//! - HTTP fetcher and polling cache
//! - Live channel (when enabled) invalidating cache entries
//! - Dashboard view, rendered on change and optionally served over HTTP

use crate::config::AppConfig;
use crate::error::AppResult;
use casewatch_cache::PollingCache;
use casewatch_core::ResourceValue;
use casewatch_dashboard::{render_text, run_server, standard_layout, DashboardView};
use casewatch_fetch::{Fetcher, HttpFetcher};
use casewatch_live::{InvalidationSink, LiveChannel};
use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

/// How long `--once` waits for every widget to settle.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(15);

/// How long shutdown waits for background tasks.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Output format for rendered frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Main application.
pub struct Application {
    config: AppConfig,
    cache: PollingCache<ResourceValue>,
    live: Option<Arc<LiveChannel>>,
    view: Arc<DashboardView>,
}

impl Application {
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let fetcher = HttpFetcher::new(
            config.backend.base_url.clone(),
            config.backend.request_timeout(),
        )?;
        let cache = PollingCache::with_config(
            Arc::new(fetcher) as Arc<dyn Fetcher<ResourceValue>>,
            config.cache.clone(),
        );
        Ok(Self::with_cache(config, cache))
    }

    /// Build around an existing cache. The live channel, if enabled,
    /// invalidates this cache.
    pub fn with_cache(config: AppConfig, cache: PollingCache<ResourceValue>) -> Self {
        let live = config.live.enabled.then(|| {
            let sink: Arc<dyn InvalidationSink> = Arc::new(cache.clone());
            Arc::new(LiveChannel::new(config.live.clone(), sink))
        });

        let layout = standard_layout(&config.dashboard, &config.intervals);
        let view = Arc::new(DashboardView::new(
            layout,
            cache.clone(),
            live.as_ref().map(|l| l.watch_state()),
        ));

        Self {
            config,
            cache,
            live,
            view,
        }
    }

    pub fn view(&self) -> &Arc<DashboardView> {
        &self.view
    }

    /// Mount, wait until every widget has a value or an error, and render one
    /// frame. Widgets still loading after the timeout render as loading.
    pub async fn run_once(&self, format: OutputFormat) -> AppResult<String> {
        self.view.mount();

        let settled = tokio::time::timeout(SETTLE_TIMEOUT, async {
            while !self.view.is_settled() {
                self.view.changed().await;
            }
        })
        .await
        .is_ok();
        if !settled {
            warn!(
                timeout_ms = SETTLE_TIMEOUT.as_millis() as u64,
                "Dashboard did not settle, rendering partial frame"
            );
        }

        let out = self.render(format)?;
        self.view.unmount();
        Ok(out)
    }

    /// Run until ctrl-c: render on change, serve frames if configured.
    pub async fn run(&self, format: OutputFormat) -> AppResult<()> {
        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            info!("Shutdown signal received");
        };
        self.run_with(format, &mut std::io::stdout(), shutdown).await
    }

    /// Render loop writing frames to `out` until `shutdown` resolves or a
    /// write fails. Background tasks and subscriptions are stopped on either
    /// path.
    pub async fn run_with<W: Write>(
        &self,
        format: OutputFormat,
        out: &mut W,
        shutdown: impl Future<Output = ()>,
    ) -> AppResult<()> {
        info!(
            backend = %self.config.backend.base_url,
            live = self.live.is_some(),
            serve = self.config.dashboard.serve,
            "Starting application"
        );

        let live_handle = self.live.clone().map(|live| live.spawn());

        let (server_stop, server_handle) = if self.config.dashboard.serve {
            let (stop_tx, stop_rx) = oneshot::channel::<()>();
            let view = self.view.clone();
            let config = self.config.dashboard.clone();
            let handle = tokio::spawn(async move {
                let shutdown = async {
                    let _ = stop_rx.await;
                };
                if let Err(e) = run_server(view, config, shutdown).await {
                    error!(error = %e, "Dashboard server failed");
                }
            });
            (Some(stop_tx), Some(handle))
        } else {
            (None, None)
        };

        self.view.mount();

        info!("Entering render loop");
        let mut render_interval = tokio::time::interval(self.config.dashboard.render_interval());
        render_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut dirty = true;
        let mut frames = 0u64;
        tokio::pin!(shutdown);

        let outcome = loop {
            tokio::select! {
                _ = self.view.changed() => {
                    dirty = true;
                }

                _ = render_interval.tick() => {
                    if dirty {
                        if let Err(e) = self.print(format, &mut *out) {
                            error!(error = %e, "Failed to write frame");
                            break Err(e);
                        }
                        frames += 1;
                        dirty = false;
                    }
                }

                () = &mut shutdown => break Ok(()),
            }
        };

        info!(frames, entries = self.cache.len(), "Shutting down");

        if let Some(live) = &self.live {
            live.shutdown();
        }
        if let Some(stop) = server_stop {
            let _ = stop.send(());
        }
        for handle in [live_handle, server_handle].into_iter().flatten() {
            if tokio::time::timeout(SHUTDOWN_GRACE, handle).await.is_err() {
                warn!("Background task did not stop in time");
            }
        }

        let released = self.view.unmount();
        debug!(released, "Subscriptions released");
        outcome
    }

    fn render(&self, format: OutputFormat) -> AppResult<String> {
        let frame = self.view.frame();
        Ok(match format {
            OutputFormat::Text => render_text(&frame),
            OutputFormat::Json => serde_json::to_string_pretty(&frame)?,
        })
    }

    fn print<W: Write>(&self, format: OutputFormat, out: &mut W) -> AppResult<()> {
        let frame = self.render(format)?;
        if format == OutputFormat::Text {
            // Clear screen and home the cursor between frames.
            write!(out, "\x1b[2J\x1b[H")?;
        }
        writeln!(out, "{frame}")?;
        out.flush()?;
        Ok(())
    }
}
