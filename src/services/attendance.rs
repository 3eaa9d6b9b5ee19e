//! Attendance service implementation
//!
//! Marks are written to the event's attendance map under an optimistic
//! version check so the GBM/meeting freeze rule holds when two executives
//! race. The per-participant attendance record carries the service-hour
//! award and whether it has been credited.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::config::settings::Settings;
use crate::database::DatabaseService;
use crate::middleware::auth::{Authorizer, Permission};
use crate::models::attendance::AttendanceRecord;
use crate::models::event::{
    get_attendance_stats, AttendanceStats, AttendanceStatus, Event, RegisteredUser,
};
use crate::models::registration::Registration;
use crate::models::user::{is_manual_user_id, UserProfile};
use crate::services::user::UserService;
use crate::utils::clock::Clock;
use crate::utils::errors::{ClubError, ImmutableRule, Result};
use crate::utils::logging::log_attendance_action;

/// What a successful mark changed
#[derive(Debug, Clone)]
pub struct AttendanceMark {
    pub event: Event,
    pub record: AttendanceRecord,
    /// The participant was not registered and was captured as a walk-up
    pub walk_up: bool,
    /// Hours credited to the member by this call
    pub hours_credited: u32,
}

#[derive(Clone)]
pub struct AttendanceService {
    db: DatabaseService,
    users: UserService,
    clock: Arc<dyn Clock>,
    authorizer: Authorizer,
    default_service_hours: u32,
    max_conflict_retries: u32,
}

impl AttendanceService {
    pub fn new(db: DatabaseService, users: UserService, clock: Arc<dyn Clock>, settings: &Settings) -> Self {
        Self {
            db,
            users,
            clock,
            authorizer: Authorizer::new(),
            default_service_hours: settings.attendance.default_service_hours,
            max_conflict_retries: settings.store.max_conflict_retries,
        }
    }

    /// Mark a participant present or absent.
    ///
    /// For GBMs and meetings a participant can be marked once; any later
    /// mark fails with [`ImmutableRule::FrozenAttendance`]. Ordinary events
    /// stay re-editable. Unknown participant keys are appended to the event
    /// as walk-up entries.
    pub async fn mark_attendance(
        &self,
        executive: &UserProfile,
        event_id: &str,
        participant_key: &str,
        status: AttendanceStatus,
    ) -> Result<AttendanceMark> {
        self.authorizer.require(executive, Permission::MarkAttendance)?;
        if status == AttendanceStatus::Pending {
            return Err(ClubError::Validation(
                "Attendance can only be marked present or absent".to_string(),
            ));
        }
        let key = participant_key.trim().to_string();
        if key.is_empty() {
            return Err(ClubError::Validation(
                "A registration number or name is required".to_string(),
            ));
        }
        debug!(event_id, participant_key = %key, status = status.as_str(), "Marking attendance");

        let marked_at = self.clock.now_utc();
        let (event, walk_up) = self
            .db
            .events
            .modify(event_id, self.max_conflict_retries, |event| {
                if event.kind.freezes_attendance() {
                    if let Some(existing) = event.attendance.get(&key) {
                        if *existing != AttendanceStatus::Pending {
                            return Err(ClubError::ImmutableState(ImmutableRule::FrozenAttendance));
                        }
                    }
                }

                event.attendance.insert(key.clone(), status);
                let walk_up = !event.is_registered(&key);
                if walk_up {
                    event.registered_users.push(RegisteredUser {
                        user_id: None,
                        full_name: key.clone(),
                        phone_number: None,
                        registration_number: None,
                        registered_at: marked_at,
                        manually_added: true,
                    });
                }
                event.updated_at = marked_at;
                Ok(walk_up)
            })
            .await?;

        let user_id = Self::registered_user_id(&event, &key);
        let registration_id = user_id
            .as_deref()
            .map(|uid| Registration::id_for(event_id, uid));

        let seed = AttendanceRecord::pending(event_id, &key, user_id.clone(), registration_id, marked_at);
        let record = self.db.attendance.insert_if_absent(&seed).await?;

        let award = self.default_service_hours;
        let (record, credit_claimed) = self
            .db
            .attendance
            .modify(&record.id, self.max_conflict_retries, |record| {
                record.status = status;
                record.marked_by = Some(executive.uid.clone());
                record.marked_at = Some(marked_at);
                if record.user_id.is_none() {
                    record.user_id = user_id.clone();
                }
                record.updated_at = marked_at;
                if record.hours_credited {
                    return Ok(false);
                }
                record.service_hours_awarded = match status {
                    AttendanceStatus::Present => award,
                    _ => 0,
                };
                // Claimed under the record's version so concurrent marks credit once
                let claim = record.service_hours_awarded > 0;
                record.hours_credited = claim;
                Ok(claim)
            })
            .await?;

        let mut record = record;
        let mut hours_credited = 0;
        if credit_claimed {
            let credited = match self.credit_target(&record).await {
                Ok(Some(uid)) => self.credit(&uid, record.service_hours_awarded).await,
                Ok(None) => Ok(false),
                Err(e) => Err(e),
            };
            match credited {
                Ok(true) => hours_credited = record.service_hours_awarded,
                Ok(false) => record = self.release_credit(&record.id).await?,
                Err(e) => {
                    if let Err(rollback) = self.release_credit(&record.id).await {
                        error!(record_id = %record.id, error = %rollback, "Failed to release service-hour claim");
                    }
                    return Err(e);
                }
            }
        }

        log_attendance_action(event_id, &key, status.as_str(), &executive.uid);
        Ok(AttendanceMark {
            event,
            record,
            walk_up,
            hours_credited,
        })
    }

    /// Undo a credit claim that was not paid out
    async fn release_credit(&self, record_id: &str) -> Result<AttendanceRecord> {
        let (record, _) = self
            .db
            .attendance
            .modify(record_id, self.max_conflict_retries, |record| {
                record.hours_credited = false;
                Ok(())
            })
            .await?;
        Ok(record)
    }

    /// Credit hours to a member; members without a profile are skipped
    async fn credit(&self, uid: &str, hours: u32) -> Result<bool> {
        match self.users.credit_service_hours(uid, hours).await {
            Ok(_) => Ok(true),
            Err(ClubError::NotFound { .. }) => {
                warn!(uid, hours, "No profile to credit service hours to");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// User id recorded on the event for a participant key
    fn registered_user_id(event: &Event, key: &str) -> Option<String> {
        event
            .registered_users
            .iter()
            .find(|u| u.user_id.is_some() && u.participant_key() == key)
            .and_then(|u| u.user_id.clone())
    }

    /// Member whose hours a present mark credits: the record's own user,
    /// else for manual and walk-up entries the profile holding the
    /// participant key as registration number
    async fn credit_target(&self, record: &AttendanceRecord) -> Result<Option<String>> {
        match &record.user_id {
            Some(uid) if !is_manual_user_id(uid) => Ok(Some(uid.clone())),
            _ => Ok(self
                .users
                .find_by_registration_number(&record.participant_key)
                .await?
                .map(|profile| profile.uid)),
        }
    }

    pub async fn attendance_stats(&self, event_id: &str) -> Result<AttendanceStats> {
        let event = self
            .db
            .events
            .find_by_id(event_id)
            .await?
            .ok_or_else(|| ClubError::not_found("event", event_id))?;
        Ok(get_attendance_stats(&event))
    }

    pub async fn attendance_for_event(&self, executive: &UserProfile, event_id: &str) -> Result<Vec<AttendanceRecord>> {
        self.authorizer.require(executive, Permission::MarkAttendance)?;
        self.db.attendance.for_event(event_id).await
    }

    pub async fn attendance_for_user(&self, actor: &UserProfile, user_id: &str) -> Result<Vec<AttendanceRecord>> {
        self.authorizer
            .require_owner_or(actor, user_id, Permission::MarkAttendance)?;
        self.db.attendance.for_user(user_id).await
    }

    /// Executive correction of a member's service hours
    pub async fn adjust_service_hours(
        &self,
        executive: &UserProfile,
        user_id: &str,
        delta: i64,
        reason: &str,
    ) -> Result<UserProfile> {
        self.authorizer.require(executive, Permission::ManageUsers)?;
        if reason.trim().is_empty() {
            return Err(ClubError::Validation(
                "A reason is required for service-hour corrections".to_string(),
            ));
        }

        let profile = self.users.adjust_service_hours(user_id, delta).await?;
        warn!(
            user_id,
            delta,
            total = profile.service_hours,
            executive_id = %executive.uid,
            reason = reason.trim(),
            "Service hours adjusted"
        );
        Ok(profile)
    }
}
