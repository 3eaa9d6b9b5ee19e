//! Event service implementation
//!
//! Owns event records: scheduling fields, feature toggles, meeting minutes,
//! calendar listing and archiving into the past-event gallery. Registration
//! and attendance collections on the event are changed only through their
//! own services once the event has started.

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::settings::Settings;
use crate::database::store::ChangeStream;
use crate::database::DatabaseService;
use crate::middleware::auth::{Authorizer, Permission};
use crate::models::event::{
    CreateEventRequest, Event, EventKind, EventQuery, MeetingMinutes, UpdateEventRequest,
};
use crate::models::past_event::PastEventRecord;
use crate::models::user::UserProfile;
use crate::utils::clock::Clock;
use crate::utils::errors::{ClubError, ImmutableRule, Result};
use crate::utils::helpers::normalize_whitespace;
use crate::utils::logging::log_event_action;

#[derive(Clone)]
pub struct EventService {
    db: DatabaseService,
    clock: Arc<dyn Clock>,
    authorizer: Authorizer,
    max_conflict_retries: u32,
}

impl EventService {
    pub fn new(db: DatabaseService, clock: Arc<dyn Clock>, settings: &Settings) -> Self {
        Self {
            db,
            clock,
            authorizer: Authorizer::new(),
            max_conflict_retries: settings.store.max_conflict_retries,
        }
    }

    /// Whether the event's start has passed, read from the clock each call
    pub fn is_past(&self, event: &Event) -> bool {
        event.is_past_at(self.clock.now_local())
    }

    pub async fn create_event(&self, executive: &UserProfile, request: CreateEventRequest) -> Result<Event> {
        self.authorizer.require(executive, Permission::ManageEvents)?;

        let title = required_text(request.title.as_deref(), "title")?;
        let location = required_text(request.location.as_deref(), "location")?;
        let date = request
            .date
            .ok_or_else(|| ClubError::Validation("Event date is required".to_string()))?;
        let start_time = request
            .start_time
            .ok_or_else(|| ClubError::Validation("Event start time is required".to_string()))?;
        let end_time = request
            .end_time
            .ok_or_else(|| ClubError::Validation("Event end time is required".to_string()))?;

        let now = self.clock.now_utc();
        let event = Event {
            id: String::new(),
            title,
            description: request.description.filter(|d| !d.trim().is_empty()),
            date,
            start_time,
            end_time,
            location,
            kind: request.kind.unwrap_or(EventKind::Event),
            enable_registration: false,
            enable_attendance: false,
            show_on_guest_calendar: request.show_on_guest_calendar.unwrap_or(false),
            enable_certificate: request.enable_certificate,
            registered_users: Vec::new(),
            attendance: Default::default(),
            meeting_minutes: None,
            image_url: request.image_url,
            created_by: Some(executive.uid.clone()),
            created_at: now,
            updated_at: now,
        };

        let created = self.db.events.create(&event).await?;
        log_event_action(&created.id, "create", &executive.uid, Some(created.kind.as_str()));
        Ok(created)
    }

    pub async fn get_event(&self, id: &str) -> Result<Event> {
        self.db
            .events
            .find_by_id(id)
            .await?
            .ok_or_else(|| ClubError::not_found("event", id))
    }

    /// Partial update. Once the event has started, toggles and the
    /// participant collections can no longer be edited here.
    pub async fn update_event(&self, executive: &UserProfile, id: &str, request: UpdateEventRequest) -> Result<Event> {
        self.authorizer.require(executive, Permission::ManageEvents)?;
        debug!(event_id = id, "Updating event");

        let title = match request.title.as_deref() {
            Some(t) => Some(required_text(Some(t), "title")?),
            None => None,
        };
        let location = match request.location.as_deref() {
            Some(l) => Some(required_text(Some(l), "location")?),
            None => None,
        };

        let now = self.clock.now_local();
        let updated_at = self.clock.now_utc();
        let (event, _) = self
            .db
            .events
            .modify(id, self.max_conflict_retries, |event| {
                if request.touches_structure() && event.is_past_at(now) {
                    return Err(ClubError::ImmutableState(ImmutableRule::PastEvent));
                }

                if let Some(title) = &title {
                    event.title = title.clone();
                }
                if let Some(description) = &request.description {
                    event.description = Some(description.clone()).filter(|d| !d.trim().is_empty());
                }
                if let Some(date) = request.date {
                    event.date = date;
                }
                if let Some(start) = request.start_time {
                    event.start_time = start;
                }
                if let Some(end) = request.end_time {
                    event.end_time = end;
                }
                if let Some(location) = &location {
                    event.location = location.clone();
                }
                if let Some(kind) = request.kind {
                    event.kind = kind;
                    if !kind.supports_minutes() {
                        event.meeting_minutes = None;
                    }
                }
                if let Some(v) = request.enable_registration {
                    event.enable_registration = v;
                }
                if let Some(v) = request.enable_attendance {
                    event.enable_attendance = v;
                }
                if let Some(v) = request.show_on_guest_calendar {
                    event.show_on_guest_calendar = v;
                }
                if request.enable_certificate.is_some() {
                    event.enable_certificate = request.enable_certificate;
                }
                if request.image_url.is_some() {
                    event.image_url = request.image_url.clone();
                }
                if let Some(users) = &request.registered_users {
                    event.registered_users = users.clone();
                }
                if let Some(attendance) = &request.attendance {
                    event.attendance = attendance.clone();
                }
                event.updated_at = updated_at;
                Ok(())
            })
            .await?;

        log_event_action(id, "update", &executive.uid, None);
        Ok(event)
    }

    /// Delete an event with its registrations and attendance records.
    /// Deleting an unknown id is a no-op.
    pub async fn delete_event(&self, executive: &UserProfile, id: &str) -> Result<bool> {
        self.authorizer.require(executive, Permission::ManageEvents)?;

        let registrations = self.db.registrations.delete_for_event(id).await?;
        let records = self.db.attendance.delete_for_event(id).await?;
        let existed = self.db.events.delete(id).await?;

        let details = format!("registrations={} attendance={}", registrations, records);
        log_event_action(id, "delete", &executive.uid, Some(&details));
        Ok(existed)
    }

    /// Record minutes for a GBM or meeting
    pub async fn set_meeting_minutes(
        &self,
        executive: &UserProfile,
        id: &str,
        summary: &str,
        action_items: Vec<String>,
    ) -> Result<Event> {
        self.authorizer.require(executive, Permission::ManageEvents)?;
        let summary = required_text(Some(summary), "minutes summary")?;
        let action_items: Vec<String> = action_items
            .iter()
            .map(|item| normalize_whitespace(item))
            .filter(|item| !item.is_empty())
            .collect();

        let now = self.clock.now_utc();
        let (event, _) = self
            .db
            .events
            .modify(id, self.max_conflict_retries, |event| {
                if !event.kind.supports_minutes() {
                    return Err(ClubError::Validation(format!(
                        "Meeting minutes can only be recorded for GBMs and meetings, not '{}'",
                        event.kind.as_str()
                    )));
                }
                event.meeting_minutes = Some(MeetingMinutes {
                    summary: summary.clone(),
                    action_items: action_items.clone(),
                    recorded_by: executive.uid.clone(),
                    recorded_at: now,
                });
                event.updated_at = now;
                Ok(())
            })
            .await?;

        log_event_action(id, "minutes", &executive.uid, None);
        Ok(event)
    }

    /// Calendar listing ordered by date and start time. Guests only ever see
    /// events published to the guest calendar.
    pub async fn list_events(&self, viewer: &UserProfile, query: EventQuery) -> Result<Vec<Event>> {
        self.authorizer.require(viewer, Permission::ViewEvents)?;

        let guest_only = query.guest_calendar_only || viewer.is_guest();
        let now = self.clock.now_local();
        let events = self
            .db
            .events
            .list(query.kind)
            .await?
            .into_iter()
            .filter(|e| !guest_only || e.show_on_guest_calendar)
            .filter(|e| !query.upcoming_only || !e.is_past_at(now))
            .collect();
        Ok(events)
    }

    /// Archive a past event into the gallery
    pub async fn archive_event(&self, executive: &UserProfile, id: &str) -> Result<PastEventRecord> {
        self.authorizer.require(executive, Permission::ManageEvents)?;
        let event = self.get_event(id).await?;
        if !self.is_past(&event) {
            return Err(ClubError::State(format!(
                "'{}' has not taken place yet and cannot be archived",
                event.title
            )));
        }
        self.archive(&event, &executive.uid).await
    }

    /// Archive every event that has taken place and is not archived yet.
    /// Returns how many new gallery entries were written.
    pub async fn archive_past_events(&self, archived_by: &str) -> Result<usize> {
        let now = self.clock.now_local();
        let mut archived = 0;
        for event in self.db.events.list(None).await? {
            if !event.is_past_at(now) || event.kind == EventKind::PastEvent {
                continue;
            }
            if self.db.past_events.find_by_id(&event.id).await?.is_some() {
                continue;
            }
            self.archive(&event, archived_by).await?;
            archived += 1;
        }
        Ok(archived)
    }

    async fn archive(&self, event: &Event, archived_by: &str) -> Result<PastEventRecord> {
        let record = PastEventRecord {
            id: event.id.clone(),
            title: event.title.clone(),
            description: event.description.clone(),
            date: event.date,
            location: event.location.clone(),
            original_kind: event.kind,
            stats: event.attendance_stats(),
            image_urls: event.image_url.iter().cloned().collect(),
            archived_by: archived_by.to_string(),
            archived_at: self.clock.now_utc(),
        };

        let (stored, created) = self.db.past_events.archive(&record).await?;
        if created {
            log_event_action(&event.id, "archive", archived_by, None);
        } else {
            debug!(event_id = %event.id, "Event already archived");
        }
        Ok(stored)
    }

    pub async fn list_past_events(&self, viewer: &UserProfile) -> Result<Vec<PastEventRecord>> {
        self.authorizer.require(viewer, Permission::ViewEvents)?;
        self.db.past_events.list().await
    }

    pub async fn add_past_event_image(&self, executive: &UserProfile, id: &str, image_url: &str) -> Result<PastEventRecord> {
        self.authorizer.require(executive, Permission::ManageEvents)?;
        let parsed = url::Url::parse(image_url.trim())
            .map_err(|e| ClubError::Validation(format!("Invalid image URL: {}", e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ClubError::Validation(
                "Image URL must use http or https".to_string(),
            ));
        }
        let url = parsed.to_string();

        let (record, _) = self
            .db
            .past_events
            .modify(id, self.max_conflict_retries, |record| {
                if !record.image_urls.contains(&url) {
                    record.image_urls.push(url.clone());
                }
                Ok(())
            })
            .await?;

        info!(event_id = id, images = record.image_urls.len(), "Gallery image added");
        Ok(record)
    }

    /// Live changes to the event calendar
    pub async fn watch_events(&self) -> Result<ChangeStream> {
        self.db.events.subscribe().await
    }
}

fn required_text(value: Option<&str>, field: &str) -> Result<String> {
    match value.map(normalize_whitespace).filter(|v| !v.is_empty()) {
        Some(v) => Ok(v),
        None => Err(ClubError::Validation(format!("Event {} is required", field))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_text() {
        assert_eq!(required_text(Some("  Hack   Night "), "title").unwrap(), "Hack Night");
        assert!(matches!(
            required_text(Some("   "), "title"),
            Err(ClubError::Validation(_))
        ));
        assert!(required_text(None, "location").is_err());
    }
}
