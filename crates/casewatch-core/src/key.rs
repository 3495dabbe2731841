//! Resource keys.
//!
//! A `ResourceKey` partitions cached state: one backend endpoint plus a set of
//! query parameters. Parameters are kept in a `BTreeMap` so that equality,
//! hashing and the rendered query string are all independent of insertion
//! order.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Pollable backend resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    /// Aggregate dashboard snapshot.
    Dashboard,
    /// Case list.
    Cases,
    /// Evidence items.
    Evidence,
    /// Recent threats feed.
    Threats,
    /// AI analysis jobs.
    AiJobs,
    /// User notifications.
    Notifications,
}

impl Resource {
    /// All resources, in display order.
    pub const ALL: [Resource; 6] = [
        Self::Dashboard,
        Self::Cases,
        Self::Evidence,
        Self::Threats,
        Self::AiJobs,
        Self::Notifications,
    ];

    /// Endpoint path relative to the backend base URL.
    pub fn path(&self) -> &'static str {
        match self {
            Self::Dashboard => "/api/dashboard",
            Self::Cases => "/api/cases",
            Self::Evidence => "/api/evidence",
            Self::Threats => "/api/threats/recent",
            Self::AiJobs => "/api/ai-jobs",
            Self::Notifications => "/api/notifications",
        }
    }

    /// Short name used in keys, logs and metric labels.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Dashboard => "dashboard",
            Self::Cases => "cases",
            Self::Evidence => "evidence",
            Self::Threats => "threats",
            Self::AiJobs => "ai_jobs",
            Self::Notifications => "notifications",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Resource {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|r| r.name() == s)
            .ok_or_else(|| CoreError::UnknownResource(s.to_string()))
    }
}

/// Cache-partitioning identifier for a pollable data source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKey {
    pub resource: Resource,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl ResourceKey {
    pub fn new(resource: Resource) -> Self {
        Self {
            resource,
            params: BTreeMap::new(),
        }
    }

    /// Add a query parameter, replacing any previous value for `name`.
    pub fn with_param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(name.into(), value.to_string());
        self
    }

    pub fn dashboard() -> Self {
        Self::new(Resource::Dashboard)
    }

    pub fn cases() -> Self {
        Self::new(Resource::Cases)
    }

    pub fn evidence() -> Self {
        Self::new(Resource::Evidence)
    }

    pub fn threats() -> Self {
        Self::new(Resource::Threats)
    }

    pub fn ai_jobs() -> Self {
        Self::new(Resource::AiJobs)
    }

    pub fn notifications() -> Self {
        Self::new(Resource::Notifications)
    }

    /// Endpoint path for this key.
    pub fn path(&self) -> &'static str {
        self.resource.path()
    }

    /// Query parameters as ordered pairs.
    pub fn query_pairs(&self) -> Vec<(&str, &str)> {
        self.params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }

    /// Path plus rendered query string, e.g. `/api/cases?limit=10&status=active`.
    pub fn endpoint(&self) -> String {
        if self.params.is_empty() {
            return self.path().to_string();
        }
        format!("{}?{}", self.path(), self.query_string())
    }

    fn query_string(&self) -> String {
        self.params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.params.is_empty() {
            write!(f, "{}", self.resource)
        } else {
            write!(f, "{}?{}", self.resource, self.query_string())
        }
    }
}

impl FromStr for ResourceKey {
    type Err = CoreError;

    /// Parse the `Display` form: `cases` or `cases?limit=10&status=active`.
    fn from_str(s: &str) -> Result<Self> {
        let (name, query) = match s.split_once('?') {
            Some((name, query)) => (name, Some(query)),
            None => (s, None),
        };

        let mut key = Self::new(name.parse()?);
        if let Some(query) = query {
            for pair in query.split('&').filter(|p| !p.is_empty()) {
                let (k, v) = pair
                    .split_once('=')
                    .ok_or_else(|| CoreError::InvalidKey(format!("{s}: bad pair '{pair}'")))?;
                key.params.insert(k.to_string(), v.to_string());
            }
        }
        Ok(key)
    }
}

impl From<Resource> for ResourceKey {
    fn from(resource: Resource) -> Self {
        Self::new(resource)
    }
}
