//! Core domain types for the casewatch dashboard.
//!
//! This crate provides the types shared by every layer of the client:
//! - `ResourceKey`: cache-partitioning identifier for a pollable endpoint
//! - Entities observed from the case-management backend (cases, evidence,
//!   threats, AI analysis jobs, notifications, dashboard summary)
//! - `Severity`: fixed rank ordering used for color-coding and sorting
//! - `ResourceValue`: typed payload for each `Resource`
//! - `wire`: lenient field decoders for backend payloads

pub mod entity;
pub mod error;
pub mod key;
pub mod severity;
pub mod value;
pub mod wire;

pub use entity::{
    AiAnalysisJob, Case, CaseStatus, DashboardSummary, Evidence, EvidenceStatus, JobStatus,
    Notification, Threat,
};
pub use error::{CoreError, Result};
pub use key::{Resource, ResourceKey};
pub use severity::{severity_rank, sort_by_rank_desc, Severity};
pub use value::ResourceValue;
pub use wire::parse_timestamp;
