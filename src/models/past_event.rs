//! Archived past-event record

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::event::{AttendanceStats, EventKind};

/// Gallery entry written when an event that has taken place is archived
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PastEventRecord {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub date: NaiveDate,
    pub location: String,
    pub original_kind: EventKind,
    pub stats: AttendanceStats,
    #[serde(default)]
    pub image_urls: Vec<String>,
    pub archived_by: String,
    pub archived_at: DateTime<Utc>,
}
