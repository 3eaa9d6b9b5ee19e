//! Certificate eligibility
//!
//! Certificates are derived, never stored: a member who was marked present
//! at an event that issues certificates can download one.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::database::DatabaseService;
use crate::middleware::auth::{Authorizer, Permission};
use crate::models::event::{AttendanceStatus, Event, EventKind};
use crate::models::user::UserProfile;
use crate::utils::errors::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Eligibility {
    pub attended: bool,
    pub certificate_available: bool,
}

/// Eligibility of one participant for one event.
///
/// GBMs and meetings never issue certificates, whatever `enableCertificate`
/// says.
pub fn eligibility(event: &Event, participant_key: &str) -> Eligibility {
    let attended = event.attendance.get(participant_key) == Some(&AttendanceStatus::Present);
    Eligibility {
        attended,
        certificate_available: attended
            && event.kind.issues_certificates()
            && event.certificates_enabled(),
    }
}

/// One row of a member's certificate overview
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateEntry {
    pub event_id: String,
    pub event_title: String,
    pub date: NaiveDate,
    pub kind: EventKind,
    pub eligibility: Eligibility,
}

#[derive(Clone)]
pub struct CertificateService {
    db: DatabaseService,
    authorizer: Authorizer,
}

impl CertificateService {
    pub fn new(db: DatabaseService) -> Self {
        Self {
            db,
            authorizer: Authorizer::new(),
        }
    }

    /// Eligibility for every event the member registered for, in date order
    pub async fn certificates_for_user(&self, user: &UserProfile) -> Result<Vec<CertificateEntry>> {
        self.authorizer.require(user, Permission::ViewEvents)?;

        let mut entries = Vec::new();
        for registration in self.db.registrations.for_user(&user.uid).await? {
            let Some(event) = self.db.events.find_by_id(&registration.event_id).await? else {
                debug!(event_id = %registration.event_id, "Registration points at a deleted event");
                continue;
            };
            entries.push(CertificateEntry {
                event_id: event.id.clone(),
                event_title: event.title.clone(),
                date: event.date,
                kind: event.kind,
                eligibility: eligibility(&event, &registration.participant_key()),
            });
        }
        entries.sort_by_key(|e| e.date);
        Ok(entries)
    }
}
