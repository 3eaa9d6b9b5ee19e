//! Event model

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::utils::helpers::hhmm;

/// Closed set of event kinds. Only gbm and meeting carry minutes and freeze
/// attendance once marked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    Event,
    Gbm,
    Meeting,
    PastEvent,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Event => "event",
            EventKind::Gbm => "gbm",
            EventKind::Meeting => "meeting",
            EventKind::PastEvent => "past-event",
        }
    }

    /// Attendance for these kinds may be marked exactly once per participant
    pub fn freezes_attendance(&self) -> bool {
        matches!(self, EventKind::Gbm | EventKind::Meeting)
    }

    pub fn supports_minutes(&self) -> bool {
        matches!(self, EventKind::Gbm | EventKind::Meeting)
    }

    pub fn issues_certificates(&self) -> bool {
        !matches!(self, EventKind::Gbm | EventKind::Meeting)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Pending,
    Present,
    Absent,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Pending => "pending",
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
        }
    }
}

/// Registration snapshot kept on the event. This list is a projection of the
/// registration collection and can be rebuilt from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredUser {
    /// Absent for walk-up entries captured while marking attendance
    #[serde(default)]
    pub user_id: Option<String>,
    pub full_name: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub registration_number: Option<String>,
    pub registered_at: DateTime<Utc>,
    #[serde(default)]
    pub manually_added: bool,
}

impl RegisteredUser {
    pub fn participant_key(&self) -> String {
        participant_key(self.registration_number.as_deref(), &self.full_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingMinutes {
    pub summary: String,
    #[serde(default)]
    pub action_items: Vec<String>,
    pub recorded_by: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub location: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(default)]
    pub enable_registration: bool,
    #[serde(default)]
    pub enable_attendance: bool,
    #[serde(default)]
    pub show_on_guest_calendar: bool,
    /// Unset means enabled
    #[serde(default)]
    pub enable_certificate: Option<bool>,
    #[serde(default)]
    pub registered_users: Vec<RegisteredUser>,
    #[serde(default)]
    pub attendance: BTreeMap<String, AttendanceStatus>,
    #[serde(default)]
    pub meeting_minutes: Option<MeetingMinutes>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn starts_at(&self) -> NaiveDateTime {
        NaiveDateTime::new(self.date, self.start_time)
    }

    /// Derived on every call; never stored
    pub fn is_past_at(&self, now: NaiveDateTime) -> bool {
        self.starts_at() < now
    }

    pub fn certificates_enabled(&self) -> bool {
        self.enable_certificate != Some(false)
    }

    pub fn is_registered(&self, key: &str) -> bool {
        self.registered_users
            .iter()
            .any(|u| u.participant_key() == key)
    }

    pub fn attendance_stats(&self) -> AttendanceStats {
        get_attendance_stats(self)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceStats {
    pub total_registered: usize,
    pub present: usize,
    pub absent: usize,
    pub pending: usize,
}

/// Counts are taken per registered user, so `present + absent + pending`
/// always equals `total_registered`.
pub fn get_attendance_stats(event: &Event) -> AttendanceStats {
    let mut stats = AttendanceStats {
        total_registered: event.registered_users.len(),
        ..Default::default()
    };

    for user in &event.registered_users {
        match event.attendance.get(&user.participant_key()) {
            Some(AttendanceStatus::Present) => stats.present += 1,
            Some(AttendanceStatus::Absent) => stats.absent += 1,
            _ => {}
        }
    }
    stats.pending = stats.total_registered - stats.present - stats.absent;
    stats
}

/// Resolve the identity key of a participant: the registration number when
/// present, otherwise the full name.
///
/// Two people sharing a name and lacking registration numbers collide under
/// this rule, so the fallback is logged.
pub fn participant_key(registration_number: Option<&str>, full_name: &str) -> String {
    match registration_number.map(str::trim).filter(|r| !r.is_empty()) {
        Some(reg) => reg.to_string(),
        None => {
            let name = full_name.trim();
            warn!(full_name = name, "Participant has no registration number, keying by full name");
            name.to_string()
        }
    }
}

/// Fields accepted when creating an event. Required fields are optional here
/// so that missing input surfaces as a validation error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<NaiveDate>,
    #[serde(default, with = "hhmm::option")]
    pub start_time: Option<NaiveTime>,
    #[serde(default, with = "hhmm::option")]
    pub end_time: Option<NaiveTime>,
    pub location: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<EventKind>,
    pub show_on_guest_calendar: Option<bool>,
    pub enable_certificate: Option<bool>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEventRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<NaiveDate>,
    #[serde(default, with = "hhmm::option")]
    pub start_time: Option<NaiveTime>,
    #[serde(default, with = "hhmm::option")]
    pub end_time: Option<NaiveTime>,
    pub location: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<EventKind>,
    pub enable_registration: Option<bool>,
    pub enable_attendance: Option<bool>,
    pub show_on_guest_calendar: Option<bool>,
    pub enable_certificate: Option<bool>,
    pub image_url: Option<String>,
    pub registered_users: Option<Vec<RegisteredUser>>,
    pub attendance: Option<BTreeMap<String, AttendanceStatus>>,
}

impl UpdateEventRequest {
    /// Whether the update edits toggles or participant collections, which are
    /// frozen once the event has started
    pub fn touches_structure(&self) -> bool {
        self.enable_registration.is_some()
            || self.enable_attendance.is_some()
            || self.registered_users.is_some()
            || self.attendance.is_some()
    }
}

/// Calendar listing options
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    pub kind: Option<EventKind>,
    pub upcoming_only: bool,
    pub guest_calendar_only: bool,
}
