//! Pure display formatting shared by the widgets.

use casewatch_core::Severity;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Display color for severities and statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Color {
    Red,
    Orange,
    Yellow,
    Blue,
    Green,
    /// Neutral.
    Gray,
}

impl Color {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Orange => "orange",
            Self::Yellow => "yellow",
            Self::Blue => "blue",
            Self::Green => "green",
            Self::Gray => "gray",
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Critical => Color::Red,
        Severity::High => Color::Orange,
        Severity::Medium => Color::Yellow,
        Severity::Low => Color::Blue,
        Severity::Unknown => Color::Gray,
    }
}

/// Color for any lifecycle status label (case, evidence or job).
pub fn status_color(status: &str) -> Color {
    match status.trim().to_ascii_lowercase().as_str() {
        "active" | "processed" | "completed" => Color::Green,
        "processing" | "running" => Color::Blue,
        "pending" | "queued" | "on_hold" | "on-hold" => Color::Yellow,
        "failed" => Color::Red,
        _ => Color::Gray,
    }
}

/// Relative time: "just now", "5m ago", "3h ago", "2d ago".
///
/// Timestamps in the future (clock skew) read as "just now".
pub fn time_ago(at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(at) = at else {
        return "unknown".to_string();
    };
    let secs = (now - at).num_seconds();
    if secs < 60 {
        "just now".to_string()
    } else if secs < 3_600 {
        format!("{}m ago", secs / 60)
    } else if secs < 86_400 {
        format!("{}h ago", secs / 3_600)
    } else {
        format!("{}d ago", secs / 86_400)
    }
}

/// Clamp a job progress value into 0..=100. NaN reads as 0.
pub fn clamp_progress(progress: f64) -> f64 {
    if progress.is_nan() {
        0.0
    } else {
        progress.clamp(0.0, 100.0)
    }
}

/// Text progress bar, e.g. `[#####-----]  50%`.
pub fn progress_bar(progress: f64, width: usize) -> String {
    let pct = clamp_progress(progress);
    let filled = ((pct / 100.0) * width as f64).round() as usize;
    let filled = filled.min(width);
    format!(
        "[{}{}] {:>3.0}%",
        "#".repeat(filled),
        "-".repeat(width - filled),
        pct
    )
}

const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Human-readable size in binary units: `512 B`, `1.5 KB`, `2.0 GB`.
pub fn format_file_size(bytes: Option<u64>) -> String {
    let Some(bytes) = bytes else {
        return "-".to_string();
    };
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}
