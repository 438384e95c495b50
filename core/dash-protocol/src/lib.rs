//! REST wire types for the Trailblazer analysis API.
//!
//! This crate is shared by the dashboard core and its clients to prevent schema
//! drift. The backend remains the authority on validation; these types only
//! describe what goes over the wire.
//!
//! Every path in [`routes`] is relative to the API base URL (by default the
//! backend's `/api/v1/` prefix).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_PAGE_SIZE: u32 = 200;

pub mod routes {
    pub const INFO: &str = "info";
    pub const ANALYSES: &str = "analyses";
    pub const AGGREGATE_JOBS: &str = "aggregate/jobs";

    pub fn analysis(id: u64) -> String {
        format!("{}/{}", ANALYSES, id)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Analyses
// ═══════════════════════════════════════════════════════════════════════════════

/// Lifecycle status reported by the backend.
///
/// Statuses this crate does not know about (and a null status) read as
/// [`AnalysisStatus::Unknown`] instead of failing the whole page; no status
/// view ever selects them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Pending,
    Running,
    Completing,
    Completed,
    Qc,
    Failed,
    Error,
    #[serde(alias = "canceled")]
    Cancelled,
    #[default]
    #[serde(other)]
    Unknown,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Pending => "pending",
            AnalysisStatus::Running => "running",
            AnalysisStatus::Completing => "completing",
            AnalysisStatus::Completed => "completed",
            AnalysisStatus::Qc => "qc",
            AnalysisStatus::Failed => "failed",
            AnalysisStatus::Error => "error",
            AnalysisStatus::Cancelled => "cancelled",
            AnalysisStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown analysis status: {0}")]
pub struct ParseStatusError(pub String);

/// Parses user input. `unknown` is not accepted: it is a read-side fallback,
/// not something to filter on.
impl FromStr for AnalysisStatus {
    type Err = ParseStatusError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(AnalysisStatus::Pending),
            "running" => Ok(AnalysisStatus::Running),
            "completing" => Ok(AnalysisStatus::Completing),
            "completed" => Ok(AnalysisStatus::Completed),
            "qc" => Ok(AnalysisStatus::Qc),
            "failed" => Ok(AnalysisStatus::Failed),
            "error" => Ok(AnalysisStatus::Error),
            "cancelled" | "canceled" => Ok(AnalysisStatus::Cancelled),
            _ => Err(ParseStatusError(value.to_string())),
        }
    }
}

fn lenient_status<'de, D>(deserializer: D) -> Result<AnalysisStatus, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<AnalysisStatus>::deserialize(deserializer).map(Option::unwrap_or_default)
}

fn default_visible() -> bool {
    true
}

/// A single analysis record.
///
/// Only the fields the dashboard acts on are typed. Everything else the backend
/// sends (case id, pipeline, user, failed jobs, ...) is kept in `extra` and
/// written back unchanged, so local edits never drop data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub id: u64,
    #[serde(default, deserialize_with = "lenient_status")]
    pub status: AnalysisStatus,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default = "default_visible")]
    pub is_visible: bool,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Analysis {
    pub fn new(id: u64, status: AnalysisStatus) -> Self {
        Self {
            id,
            status,
            comment: None,
            is_visible: true,
            started_at: None,
            completed_at: None,
            extra: Map::new(),
        }
    }

    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(|value| value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysesResponse {
    pub analyses: Vec<Analysis>,
}

/// Query string for `GET /analyses`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysesQuery {
    pub query: Option<String>,
    pub is_visible: Option<bool>,
    pub per_page: u32,
}

impl Default for AnalysesQuery {
    fn default() -> Self {
        Self {
            query: None,
            is_visible: None,
            per_page: DEFAULT_PAGE_SIZE,
        }
    }
}

impl AnalysesQuery {
    pub fn new(query: Option<&str>, is_visible: Option<bool>, per_page: u32) -> Self {
        Self {
            query: query
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string),
            is_visible,
            per_page,
        }
    }

    /// Key/value pairs in the order the backend documents them.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(3);
        if let Some(query) = &self.query {
            pairs.push(("query", query.clone()));
        }
        if let Some(is_visible) = self.is_visible {
            pairs.push(("is_visible", is_visible.to_string()));
        }
        pairs.push(("per_page", self.per_page.to_string()));
        pairs
    }
}

/// Body for `PUT /analyses/:id`. Exactly one field is sent per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_visible: Option<bool>,
}

impl AnalysisUpdate {
    pub fn comment(text: impl Into<String>) -> Self {
        Self {
            comment: Some(text.into()),
            is_visible: None,
        }
    }

    pub fn visibility(is_visible: bool) -> Self {
        Self {
            comment: None,
            is_visible: Some(is_visible),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Aggregates & metadata
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStat {
    pub name: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobsResponse {
    pub jobs: Vec<JobStat>,
}

/// `GET /info`: database metadata. `updated_at` is null before the first scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoResponse {
    #[serde(default)]
    pub updated_at: Option<String>,
}
