//! User model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::event::participant_key;

/// Prefix of synthetic user ids given to manually added participants
pub const MANUAL_USER_PREFIX: &str = "manual_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Student,
    Executive,
    Guest,
}

/// Club domain a member belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Domain {
    Csd,
    Cmd,
    Isd,
    Pdd,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub uid: String,
    pub email: String,
    pub full_name: String,
    pub role: UserRole,
    #[serde(default)]
    pub registration_number: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub domain: Option<Domain>,
    #[serde(default)]
    pub service_hours: u32,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl UserProfile {
    /// Key under which this user appears in event attendance maps
    pub fn participant_key(&self) -> String {
        participant_key(self.registration_number.as_deref(), &self.full_name)
    }

    pub fn is_guest(&self) -> bool {
        self.role == UserRole::Guest
    }

    /// Transient profile for an anonymous session; never persisted
    pub fn guest(uid: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            uid: uid.into(),
            email: String::new(),
            full_name: "Guest".to_string(),
            role: UserRole::Guest,
            registration_number: None,
            phone: None,
            domain: None,
            service_hours: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Whether a user id was synthesized for a manually added participant
pub fn is_manual_user_id(uid: &str) -> bool {
    uid.starts_with(MANUAL_USER_PREFIX)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub uid: String,
    pub email: String,
    pub full_name: String,
    pub role: UserRole,
    pub registration_number: Option<String>,
    pub phone: Option<String>,
    pub domain: Option<Domain>,
}

/// Contact fields a member may change on their own profile; role and
/// activation are executive-only
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub full_name: Option<String>,
    pub registration_number: Option<String>,
    pub phone: Option<String>,
    pub domain: Option<Domain>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
}

impl UpdateUserRequest {
    pub fn touches_privileged_fields(&self) -> bool {
        self.role.is_some() || self.is_active.is_some()
    }
}
