//! casewatch - live forensics dashboard.
//!
//! Orchestrates the components:
//! - HTTP fetcher against the forensics backend
//! - Polling cache with per-key de-duplication
//! - Optional live push channel driving invalidations
//! - Dashboard view rendered to the terminal or served over HTTP

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
