//! Attendance record model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use super::event::AttendanceStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    #[serde(default)]
    pub id: String,
    pub event_id: String,
    /// Absent for walk-up participants without a registration
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub registration_id: Option<String>,
    pub participant_key: String,
    pub status: AttendanceStatus,
    #[serde(default)]
    pub marked_by: Option<String>,
    #[serde(default)]
    pub marked_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub service_hours_awarded: u32,
    /// Set once the user's cumulative total has been credited for this record
    #[serde(default)]
    pub hours_credited: bool,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AttendanceRecord {
    pub fn id_for(event_id: &str, participant_key: &str) -> String {
        format!("{}_{}", event_id, participant_key)
    }

    pub fn pending(
        event_id: &str,
        participant_key: &str,
        user_id: Option<String>,
        registration_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Self::id_for(event_id, participant_key),
            event_id: event_id.to_string(),
            user_id,
            registration_id,
            participant_key: participant_key.to_string(),
            status: AttendanceStatus::Pending,
            marked_by: None,
            marked_at: None,
            service_hours_awarded: 0,
            hours_credited: false,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }
}
