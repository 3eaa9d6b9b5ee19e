//! Registration model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::event::{participant_key, RegisteredUser};
use super::user::{Domain, UserProfile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Pending,
    Approved,
    Rejected,
}

impl RegistrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::Pending => "pending",
            RegistrationStatus::Approved => "approved",
            RegistrationStatus::Rejected => "rejected",
        }
    }
}

/// Contact fields copied from the user profile at registration time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantSnapshot {
    pub full_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub registration_number: Option<String>,
    #[serde(default)]
    pub domain: Option<Domain>,
}

impl ParticipantSnapshot {
    pub fn from_profile(profile: &UserProfile) -> Self {
        Self {
            full_name: profile.full_name.clone(),
            email: Some(profile.email.clone()).filter(|e| !e.is_empty()),
            phone_number: profile.phone.clone(),
            registration_number: profile.registration_number.clone(),
            domain: profile.domain,
        }
    }

    pub fn participant_key(&self) -> String {
        participant_key(self.registration_number.as_deref(), &self.full_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    #[serde(default)]
    pub id: String,
    pub event_id: String,
    pub user_id: String,
    pub participant: ParticipantSnapshot,
    pub status: RegistrationStatus,
    pub registered_at: DateTime<Utc>,
    #[serde(default)]
    pub additional_info: Option<serde_json::Value>,
    #[serde(default)]
    pub approved_by: Option<String>,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub manually_added: bool,
    pub updated_at: DateTime<Utc>,
}

impl Registration {
    /// Registrations are keyed by the (event, user) pair, which makes the
    /// store's insert-only write the final duplicate guard
    pub fn id_for(event_id: &str, user_id: &str) -> String {
        format!("{}_{}", event_id, user_id)
    }

    pub fn participant_key(&self) -> String {
        self.participant.participant_key()
    }

    /// The snapshot this registration contributes to the event's
    /// registered-user projection
    pub fn to_registered_user(&self) -> RegisteredUser {
        RegisteredUser {
            user_id: Some(self.user_id.clone()),
            full_name: self.participant.full_name.clone(),
            phone_number: self.participant.phone_number.clone(),
            registration_number: self.participant.registration_number.clone(),
            registered_at: self.registered_at,
            manually_added: self.manually_added,
        }
    }
}
