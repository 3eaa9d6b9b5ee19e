//! Registration service implementation
//!
//! Registration records are the source of truth for who signed up. The
//! `registeredUsers` list on each event is a projection of them, written
//! first and repairable with [`RegistrationService::rebuild_registered_users`].

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::settings::Settings;
use crate::database::DatabaseService;
use crate::middleware::auth::{Authorizer, Permission};
use crate::models::attendance::AttendanceRecord;
use crate::models::event::{participant_key, Event, RegisteredUser};
use crate::models::registration::{ParticipantSnapshot, Registration, RegistrationStatus};
use crate::models::user::{UserProfile, MANUAL_USER_PREFIX};
use crate::utils::clock::Clock;
use crate::utils::errors::{ClubError, ImmutableRule, Result};
use crate::utils::helpers::{generate_random_string, is_valid_phone, normalize_whitespace};
use crate::utils::logging::log_registration_action;

/// Outcome of a projection repair pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub events_checked: usize,
    pub projections_repaired: usize,
}

#[derive(Clone)]
pub struct RegistrationService {
    db: DatabaseService,
    clock: Arc<dyn Clock>,
    authorizer: Authorizer,
    max_conflict_retries: u32,
}

impl RegistrationService {
    pub fn new(db: DatabaseService, clock: Arc<dyn Clock>, settings: &Settings) -> Self {
        Self {
            db,
            clock,
            authorizer: Authorizer::new(),
            max_conflict_retries: settings.store.max_conflict_retries,
        }
    }

    async fn load_event(&self, event_id: &str) -> Result<Event> {
        self.db
            .events
            .find_by_id(event_id)
            .await?
            .ok_or_else(|| ClubError::not_found("event", event_id))
    }

    /// Self-registration. Checks run in order: role, event existence,
    /// pastness, registration toggle, existing registration.
    pub async fn register_for_event(
        &self,
        user: &UserProfile,
        event_id: &str,
        additional_info: Option<Value>,
    ) -> Result<Registration> {
        self.authorizer.require(user, Permission::Register)?;
        debug!(event_id, user_id = %user.uid, "Registering for event");

        let event = self.load_event(event_id).await?;
        let now = self.clock.now_local();
        check_open(&event, now)?;

        if self.db.registrations.find(event_id, &user.uid).await?.is_some() {
            return Err(ClubError::Duplicate(
                "You have already registered for this event".to_string(),
            ));
        }

        let registered_at = self.clock.now_utc();
        let registration = Registration {
            id: Registration::id_for(event_id, &user.uid),
            event_id: event_id.to_string(),
            user_id: user.uid.clone(),
            participant: ParticipantSnapshot::from_profile(user),
            status: RegistrationStatus::Pending,
            registered_at,
            additional_info,
            approved_by: None,
            approved_at: None,
            notes: None,
            manually_added: false,
            updated_at: registered_at,
        };

        // Projection first; the registration insert below is the final
        // duplicate guard
        let snapshot = registration.to_registered_user();
        self.db
            .events
            .modify(event_id, self.max_conflict_retries, |event| {
                check_open(event, now)?;
                if event
                    .registered_users
                    .iter()
                    .any(|u| u.user_id.as_deref() == Some(user.uid.as_str()))
                {
                    return Ok(());
                }
                let key = snapshot.participant_key();
                if event.is_registered(&key) {
                    return Err(ClubError::Duplicate(format!(
                        "{} is already registered for this event",
                        key
                    )));
                }
                event.registered_users.push(snapshot.clone());
                event.updated_at = registered_at;
                Ok(())
            })
            .await?;

        let created = self.db.registrations.insert(&registration).await?;
        log_registration_action(&created.id, "register", &user.uid);
        Ok(created)
    }

    /// Approve or reject a registration. Approval creates the participant's
    /// pending attendance record if there is none yet.
    pub async fn update_registration_status(
        &self,
        executive: &UserProfile,
        registration_id: &str,
        status: RegistrationStatus,
        notes: Option<String>,
    ) -> Result<Registration> {
        self.authorizer
            .require(executive, Permission::ManageRegistrations)?;
        if status == RegistrationStatus::Pending {
            return Err(ClubError::Validation(
                "A registration can only be approved or rejected".to_string(),
            ));
        }

        let now = self.clock.now_utc();
        let notes = notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        let (updated, _) = self
            .db
            .registrations
            .modify(registration_id, self.max_conflict_retries, |registration| {
                match (registration.status, status) {
                    (current, target) if current == target => {}
                    (RegistrationStatus::Pending, _) => {}
                    (current, _) => {
                        return Err(ClubError::State(format!(
                            "This registration has already been {}",
                            current.as_str()
                        )))
                    }
                }
                if registration.status != status {
                    registration.status = status;
                    if status == RegistrationStatus::Approved {
                        registration.approved_by = Some(executive.uid.clone());
                        registration.approved_at = Some(now);
                    }
                    registration.updated_at = now;
                }
                if notes.is_some() && registration.notes != notes {
                    registration.notes = notes.clone();
                    registration.updated_at = now;
                }
                Ok(())
            })
            .await?;

        if status == RegistrationStatus::Approved {
            let record = AttendanceRecord::pending(
                &updated.event_id,
                &updated.participant_key(),
                Some(updated.user_id.clone()),
                Some(updated.id.clone()),
                now,
            );
            self.db.attendance.insert_if_absent(&record).await?;
        }

        log_registration_action(registration_id, status.as_str(), &executive.uid);
        Ok(updated)
    }

    /// Cancel a registration. The owner or an executive may cancel until the
    /// event starts. Attendance records are left in place.
    pub async fn cancel_registration(&self, actor: &UserProfile, registration_id: &str) -> Result<()> {
        let registration = self
            .db
            .registrations
            .find_by_id(registration_id)
            .await?
            .ok_or_else(|| ClubError::not_found("registration", registration_id))?;

        self.authorizer.require_owner_or(
            actor,
            &registration.user_id,
            Permission::ManageRegistrations,
        )?;

        let event = self.db.events.find_by_id(&registration.event_id).await?;
        let now = self.clock.now_local();
        if let Some(event) = &event {
            if event.is_past_at(now) {
                return Err(ClubError::ImmutableState(ImmutableRule::PastEvent));
            }
        }

        self.db.registrations.delete(registration_id).await?;

        if event.is_some() {
            let updated_at = self.clock.now_utc();
            self.db
                .events
                .modify(&registration.event_id, self.max_conflict_retries, |event| {
                    let before = event.registered_users.len();
                    event
                        .registered_users
                        .retain(|u| u.user_id.as_deref() != Some(registration.user_id.as_str()));
                    if event.registered_users.len() != before {
                        event.updated_at = updated_at;
                    }
                    Ok(())
                })
                .await?;
        }

        log_registration_action(registration_id, "cancel", &actor.uid);
        Ok(())
    }

    /// Add a participant on someone's behalf. The registration is approved
    /// immediately under a synthetic user id and gets its attendance record.
    pub async fn add_participant_manually(
        &self,
        executive: &UserProfile,
        event_id: &str,
        full_name: &str,
        registration_number: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Registration> {
        self.authorizer
            .require(executive, Permission::ManageRegistrations)?;

        let full_name = normalize_whitespace(full_name);
        if full_name.is_empty() {
            return Err(ClubError::Validation(
                "Participant name is required".to_string(),
            ));
        }
        let registration_number = registration_number
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string);
        let phone = phone.map(str::trim).filter(|p| !p.is_empty()).map(str::to_string);
        if let Some(p) = &phone {
            if !is_valid_phone(p) {
                return Err(ClubError::Validation(format!(
                    "'{}' is not a valid phone number",
                    p
                )));
            }
        }

        let event = self.load_event(event_id).await?;
        let now = self.clock.now_local();
        if event.is_past_at(now) {
            return Err(ClubError::ImmutableState(ImmutableRule::PastEvent));
        }
        let key = participant_key(registration_number.as_deref(), &full_name);
        if event.is_registered(&key) {
            return Err(ClubError::Duplicate(format!(
                "{} is already registered for this event",
                key
            )));
        }

        let created_at = self.clock.now_utc();
        let user_id = format!(
            "{}{}_{}",
            MANUAL_USER_PREFIX,
            created_at.timestamp_millis(),
            generate_random_string(4)
        );
        let registration = Registration {
            id: Registration::id_for(event_id, &user_id),
            event_id: event_id.to_string(),
            user_id: user_id.clone(),
            participant: ParticipantSnapshot {
                full_name,
                email: None,
                phone_number: phone,
                registration_number,
                domain: None,
            },
            status: RegistrationStatus::Approved,
            registered_at: created_at,
            additional_info: None,
            approved_by: Some(executive.uid.clone()),
            approved_at: Some(created_at),
            notes: None,
            manually_added: true,
            updated_at: created_at,
        };

        let snapshot = registration.to_registered_user();
        self.db
            .events
            .modify(event_id, self.max_conflict_retries, |event| {
                if event.is_past_at(now) {
                    return Err(ClubError::ImmutableState(ImmutableRule::PastEvent));
                }
                if event.is_registered(&key) {
                    return Err(ClubError::Duplicate(format!(
                        "{} is already registered for this event",
                        key
                    )));
                }
                event.registered_users.push(snapshot.clone());
                event.updated_at = created_at;
                Ok(())
            })
            .await?;

        let created = self.db.registrations.insert(&registration).await?;
        let record = AttendanceRecord::pending(
            event_id,
            &key,
            Some(user_id),
            Some(created.id.clone()),
            created_at,
        );
        self.db.attendance.insert_if_absent(&record).await?;

        log_registration_action(&created.id, "manual_add", &executive.uid);
        Ok(created)
    }

    pub async fn get_registration(&self, actor: &UserProfile, registration_id: &str) -> Result<Registration> {
        let registration = self
            .db
            .registrations
            .find_by_id(registration_id)
            .await?
            .ok_or_else(|| ClubError::not_found("registration", registration_id))?;
        self.authorizer.require_owner_or(
            actor,
            &registration.user_id,
            Permission::ManageRegistrations,
        )?;
        Ok(registration)
    }

    pub async fn registrations_for_event(&self, executive: &UserProfile, event_id: &str) -> Result<Vec<Registration>> {
        self.authorizer
            .require(executive, Permission::ManageRegistrations)?;
        self.db.registrations.for_event(event_id).await
    }

    pub async fn registrations_for_user(&self, actor: &UserProfile, user_id: &str) -> Result<Vec<Registration>> {
        self.authorizer
            .require_owner_or(actor, user_id, Permission::ManageRegistrations)?;
        self.db.registrations.for_user(user_id).await
    }

    /// Re-derive an event's `registeredUsers` from its registrations.
    /// Walk-up entries, which have no registration, are kept. Returns whether
    /// the stored projection differed.
    pub async fn rebuild_registered_users(&self, event_id: &str) -> Result<bool> {
        let registrations = self.db.registrations.for_event(event_id).await?;
        let derived: Vec<RegisteredUser> = registrations
            .iter()
            .map(Registration::to_registered_user)
            .collect();

        let updated_at = self.clock.now_utc();
        let (_, repaired) = self
            .db
            .events
            .modify(event_id, self.max_conflict_retries, |event| {
                let mut projection = derived.clone();
                projection.extend(
                    event
                        .registered_users
                        .iter()
                        .filter(|u| u.user_id.is_none())
                        .cloned(),
                );
                projection.sort_by_key(|u| u.registered_at);

                if projection == event.registered_users {
                    return Ok(false);
                }
                event.registered_users = projection;
                event.updated_at = updated_at;
                Ok(true)
            })
            .await?;

        if repaired {
            warn!(event_id, "Registered-user projection was out of sync and has been rebuilt");
        }
        Ok(repaired)
    }

    /// Rebuild every event's projection
    pub async fn reconcile_all(&self) -> Result<ReconcileReport> {
        let started = Utc::now();
        let mut report = ReconcileReport::default();
        for event in self.db.events.list(None).await? {
            report.events_checked += 1;
            if self.rebuild_registered_users(&event.id).await? {
                report.projections_repaired += 1;
            }
        }

        info!(
            events_checked = report.events_checked,
            projections_repaired = report.projections_repaired,
            duration_ms = (Utc::now() - started).num_milliseconds(),
            "Registration projections reconciled"
        );
        Ok(report)
    }
}

/// Registration is open while the event is upcoming and the toggle is on;
/// pastness wins over the toggle
fn check_open(event: &Event, now: chrono::NaiveDateTime) -> Result<()> {
    if event.is_past_at(now) {
        return Err(ClubError::ImmutableState(ImmutableRule::PastEvent));
    }
    if !event.enable_registration {
        return Err(ClubError::State(
            "Registration is not open for this event".to_string(),
        ));
    }
    Ok(())
}
