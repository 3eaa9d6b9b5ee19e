//! Attendance marking integration tests

mod helpers;

use std::collections::BTreeMap;
use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::Utc;
use helpers::*;
use proptest::prelude::*;
use serde_json::Value;

use ClubHub::database::store::{
    ChangeStream, Collection, Document, DocumentStore, Filter, OrderBy, StoreError,
};
use ClubHub::models::event::{
    get_attendance_stats, AttendanceStatus, Event, EventKind, RegisteredUser,
};
use ClubHub::services::ServiceFactory;
use ClubHub::{ClubError, FixedClock, ImmutableRule, MemoryStore};

async fn registered_event(ctx: &TestContext, kind: EventKind) -> Event {
    let event = ctx.open_event(kind).await;
    ctx.services
        .registrations
        .register_for_event(&ctx.student, &event.id, None)
        .await
        .unwrap();
    ctx.reload(&event.id).await
}

#[tokio::test]
async fn test_gbm_attendance_freezes_after_first_mark() {
    let ctx = TestContext::new().await;
    let event = registered_event(&ctx, EventKind::Gbm).await;

    ctx.services
        .attendance
        .mark_attendance(&ctx.executive, &event.id, "REG001", AttendanceStatus::Present)
        .await
        .unwrap();

    let err = ctx
        .services
        .attendance
        .mark_attendance(&ctx.executive, &event.id, "REG001", AttendanceStatus::Absent)
        .await
        .unwrap_err();
    assert_matches!(err, ClubError::ImmutableState(ImmutableRule::FrozenAttendance));

    let event = ctx.reload(&event.id).await;
    assert_eq!(event.attendance.get("REG001"), Some(&AttendanceStatus::Present));
    let record = ctx
        .services
        .db
        .attendance
        .find(&event.id, "REG001")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, AttendanceStatus::Present);
}

#[tokio::test]
async fn test_meeting_freezes_even_same_status() {
    let ctx = TestContext::new().await;
    let event = registered_event(&ctx, EventKind::Meeting).await;

    ctx.services
        .attendance
        .mark_attendance(&ctx.executive, &event.id, "REG001", AttendanceStatus::Absent)
        .await
        .unwrap();
    let err = ctx
        .services
        .attendance
        .mark_attendance(&ctx.executive, &event.id, "REG001", AttendanceStatus::Absent)
        .await
        .unwrap_err();
    assert_matches!(err, ClubError::ImmutableState(ImmutableRule::FrozenAttendance));
}

#[tokio::test]
async fn test_ordinary_event_attendance_is_editable() {
    let ctx = TestContext::new().await;
    let event = registered_event(&ctx, EventKind::Event).await;

    for status in [
        AttendanceStatus::Present,
        AttendanceStatus::Absent,
        AttendanceStatus::Present,
        AttendanceStatus::Absent,
    ] {
        ctx.services
            .attendance
            .mark_attendance(&ctx.executive, &event.id, "REG001", status)
            .await
            .unwrap();
    }

    let event = ctx.reload(&event.id).await;
    assert_eq!(event.attendance.get("REG001"), Some(&AttendanceStatus::Absent));
    assert_eq!(ctx.store.len(Collection::Attendance).await, 1);
}

#[tokio::test]
async fn test_present_credits_default_hours_once() {
    let ctx = TestContext::new().await;
    let event = registered_event(&ctx, EventKind::Event).await;

    let mark = ctx
        .services
        .attendance
        .mark_attendance(&ctx.executive, &event.id, "REG001", AttendanceStatus::Present)
        .await
        .unwrap();
    assert_eq!(mark.hours_credited, 2);
    assert!(mark.record.hours_credited);
    assert_eq!(mark.record.service_hours_awarded, 2);
    assert_eq!(ctx.profile("student-1").await.service_hours, 2);

    // Flipping back and forth never credits twice or takes hours away
    ctx.services
        .attendance
        .mark_attendance(&ctx.executive, &event.id, "REG001", AttendanceStatus::Absent)
        .await
        .unwrap();
    let mark = ctx
        .services
        .attendance
        .mark_attendance(&ctx.executive, &event.id, "REG001", AttendanceStatus::Present)
        .await
        .unwrap();
    assert_eq!(mark.hours_credited, 0);
    assert_eq!(ctx.profile("student-1").await.service_hours, 2);
}

#[tokio::test]
async fn test_absent_awards_nothing() {
    let ctx = TestContext::new().await;
    let event = registered_event(&ctx, EventKind::Gbm).await;

    let mark = ctx
        .services
        .attendance
        .mark_attendance(&ctx.executive, &event.id, "REG001", AttendanceStatus::Absent)
        .await
        .unwrap();
    assert_eq!(mark.hours_credited, 0);
    assert_eq!(mark.record.service_hours_awarded, 0);
    assert_eq!(ctx.profile("student-1").await.service_hours, 0);
}

#[tokio::test]
async fn test_configured_hours_are_used() {
    let mut settings = test_settings();
    settings.attendance.default_service_hours = 3;
    let ctx = TestContext::with_settings(settings).await;
    let event = registered_event(&ctx, EventKind::Event).await;

    ctx.services
        .attendance
        .mark_attendance(&ctx.executive, &event.id, "REG001", AttendanceStatus::Present)
        .await
        .unwrap();
    assert_eq!(ctx.profile("student-1").await.service_hours, 3);
}

#[tokio::test]
async fn test_manual_participant_marked_present_credits_matching_member() {
    let ctx = TestContext::new().await;
    let member = ctx.add_student("student-9", Some("REG123")).await;
    let event = ctx.open_event(EventKind::Event).await;
    ctx.services
        .registrations
        .add_participant_manually(&ctx.executive, &event.id, "Jane Doe", Some("REG123"), Some("9999999999"))
        .await
        .unwrap();

    let mark = ctx
        .services
        .attendance
        .mark_attendance(&ctx.executive, &event.id, "REG123", AttendanceStatus::Present)
        .await
        .unwrap();
    assert!(!mark.walk_up);
    assert_eq!(mark.record.status, AttendanceStatus::Present);
    assert!(mark.record.user_id.as_deref().unwrap().starts_with("manual_"));
    assert_eq!(ctx.profile(&member.uid).await.service_hours, 2);
}

#[tokio::test]
async fn test_walk_up_is_appended_to_event() {
    let ctx = TestContext::new().await;
    let event = registered_event(&ctx, EventKind::Meeting).await;

    let mark = ctx
        .services
        .attendance
        .mark_attendance(&ctx.executive, &event.id, " WALK01 ", AttendanceStatus::Present)
        .await
        .unwrap();
    assert!(mark.walk_up);
    assert_eq!(mark.hours_credited, 0);

    let walk_up = mark
        .event
        .registered_users
        .iter()
        .find(|u| u.full_name == "WALK01")
        .expect("walk-up entry");
    assert!(walk_up.user_id.is_none());
    assert!(walk_up.manually_added);

    let stats = ctx.services.attendance.attendance_stats(&event.id).await.unwrap();
    assert_eq!(stats.total_registered, 2);
    assert_eq!(stats.present, 1);
    assert_eq!(stats.pending, 1);
}

#[tokio::test]
async fn test_marking_requires_executive_and_final_status() {
    let ctx = TestContext::new().await;
    let event = registered_event(&ctx, EventKind::Event).await;

    for actor in [&ctx.student, &ctx.guest] {
        let err = ctx
            .services
            .attendance
            .mark_attendance(actor, &event.id, "REG001", AttendanceStatus::Present)
            .await
            .unwrap_err();
        assert_matches!(err, ClubError::Authorization(_));
    }

    let err = ctx
        .services
        .attendance
        .mark_attendance(&ctx.executive, &event.id, "REG001", AttendanceStatus::Pending)
        .await
        .unwrap_err();
    assert_matches!(err, ClubError::Validation(_));

    let err = ctx
        .services
        .attendance
        .mark_attendance(&ctx.executive, &event.id, "   ", AttendanceStatus::Present)
        .await
        .unwrap_err();
    assert_matches!(err, ClubError::Validation(_));

    let err = ctx
        .services
        .attendance
        .mark_attendance(&ctx.executive, "missing", "REG001", AttendanceStatus::Present)
        .await
        .unwrap_err();
    assert_matches!(err, ClubError::NotFound { .. });
}

#[tokio::test]
async fn test_marking_allowed_after_event_started() {
    let ctx = TestContext::new().await;
    let event = registered_event(&ctx, EventKind::Gbm).await;
    ctx.clock.advance(chrono::Duration::days(1));

    let mark = ctx
        .services
        .attendance
        .mark_attendance(&ctx.executive, &event.id, "REG001", AttendanceStatus::Present)
        .await
        .unwrap();
    assert_eq!(mark.event.attendance.get("REG001"), Some(&AttendanceStatus::Present));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_gbm_marks_only_one_wins() {
    let ctx = TestContext::new().await;
    let event = registered_event(&ctx, EventKind::Gbm).await;

    let attendance = ctx.services.attendance.clone();
    let executive = ctx.executive.clone();
    let id = event.id.clone();
    let first = tokio::spawn(async move {
        attendance
            .mark_attendance(&executive, &id, "REG001", AttendanceStatus::Present)
            .await
    });
    let attendance = ctx.services.attendance.clone();
    let executive = ctx.executive.clone();
    let id = event.id.clone();
    let second = tokio::spawn(async move {
        attendance
            .mark_attendance(&executive, &id, "REG001", AttendanceStatus::Absent)
            .await
    });

    let results = [first.await.unwrap(), second.await.unwrap()];
    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    for result in &results {
        if let Err(e) = result {
            assert_matches!(e, ClubError::ImmutableState(ImmutableRule::FrozenAttendance));
        }
    }

    let stored = ctx.reload(&event.id).await;
    let winning = winners[0].record.status;
    assert_eq!(stored.attendance.get("REG001"), Some(&winning));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_present_marks_credit_hours_once() {
    for _ in 0..20 {
        let ctx = TestContext::new().await;
        let event = registered_event(&ctx, EventKind::Event).await;

        let marks: Vec<_> = (0..4)
            .map(|_| {
                let attendance = ctx.services.attendance.clone();
                let executive = ctx.executive.clone();
                let id = event.id.clone();
                tokio::spawn(async move {
                    attendance
                        .mark_attendance(&executive, &id, "REG001", AttendanceStatus::Present)
                        .await
                })
            })
            .collect();

        let mut credited = 0;
        for mark in marks {
            credited += mark.await.unwrap().unwrap().hours_credited;
        }
        assert_eq!(credited, 2);
        assert_eq!(ctx.profile("student-1").await.service_hours, 2);

        let records = ctx
            .services
            .attendance
            .attendance_for_event(&ctx.executive, &event.id)
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].hours_credited);
    }
}

#[tokio::test]
async fn test_walk_up_without_profile_leaves_credit_unclaimed() {
    let ctx = TestContext::new().await;
    let event = registered_event(&ctx, EventKind::Event).await;

    let mark = ctx
        .services
        .attendance
        .mark_attendance(&ctx.executive, &event.id, "REG404", AttendanceStatus::Present)
        .await
        .unwrap();
    assert!(mark.walk_up);
    assert_eq!(mark.hours_credited, 0);
    assert!(!mark.record.hours_credited);

    // A profile created later picks up the hours on the next mark
    ctx.add_student("student-404", Some("REG404")).await;
    let mark = ctx
        .services
        .attendance
        .mark_attendance(&ctx.executive, &event.id, "REG404", AttendanceStatus::Present)
        .await
        .unwrap();
    assert_eq!(mark.hours_credited, 2);
    assert!(mark.record.hours_credited);
    assert_eq!(ctx.profile("student-404").await.service_hours, 2);
}

#[tokio::test]
async fn test_attendance_history_and_hour_corrections() {
    let ctx = TestContext::new().await;
    let other = ctx.add_student("student-2", Some("REG002")).await;
    let event = registered_event(&ctx, EventKind::Event).await;
    ctx.services
        .attendance
        .mark_attendance(&ctx.executive, &event.id, "REG001", AttendanceStatus::Present)
        .await
        .unwrap();

    let history = ctx
        .services
        .attendance
        .attendance_for_user(&ctx.student, "student-1")
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_matches!(
        ctx.services.attendance.attendance_for_user(&other, "student-1").await,
        Err(ClubError::Authorization(_))
    );

    let corrected = ctx
        .services
        .attendance
        .adjust_service_hours(&ctx.executive, "student-1", 5, "Ran the registration desk")
        .await
        .unwrap();
    assert_eq!(corrected.service_hours, 7);

    let err = ctx
        .services
        .attendance
        .adjust_service_hours(&ctx.executive, "student-1", -10, "Typo")
        .await
        .unwrap_err();
    assert_matches!(err, ClubError::Validation(_));

    let err = ctx
        .services
        .attendance
        .adjust_service_hours(&ctx.executive, "student-1", 1, "  ")
        .await
        .unwrap_err();
    assert_matches!(err, ClubError::Validation(_));

    let err = ctx
        .services
        .attendance
        .adjust_service_hours(&ctx.student, "student-1", 1, "Self-award")
        .await
        .unwrap_err();
    assert_matches!(err, ClubError::Authorization(_));
}

/// Store whose version checks never succeed, as if another writer always
/// got there first
struct AlwaysStaleStore {
    inner: MemoryStore,
}

#[async_trait]
impl DocumentStore for AlwaysStaleStore {
    fn backend_tag(&self) -> &'static str {
        "always-stale"
    }

    async fn put(&self, collection: Collection, id: &str, data: Value) -> Result<Document, StoreError> {
        self.inner.put(collection, id, data).await
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        self.inner.get(collection, id).await
    }

    async fn update(&self, collection: Collection, id: &str, patch: Value) -> Result<Document, StoreError> {
        self.inner.update(collection, id, patch).await
    }

    async fn update_if(
        &self,
        collection: Collection,
        id: &str,
        _expected_version: u64,
        _patch: Value,
    ) -> Result<Option<Document>, StoreError> {
        match self.inner.get(collection, id).await? {
            Some(_) => Ok(None),
            None => Err(StoreError::NotFound {
                collection,
                id: id.to_string(),
            }),
        }
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<bool, StoreError> {
        self.inner.delete(collection, id).await
    }

    async fn query(
        &self,
        collection: Collection,
        filters: &[Filter],
        order_by: Option<&OrderBy>,
    ) -> Result<Vec<Document>, StoreError> {
        self.inner.query(collection, filters, order_by).await
    }

    async fn subscribe(&self, collection: Collection, filters: Vec<Filter>) -> Result<ChangeStream, StoreError> {
        self.inner.subscribe(collection, filters).await
    }
}

#[tokio::test]
async fn test_lost_races_surface_as_conflict() {
    init_test_tracing();
    let settings = test_settings();
    let store = Arc::new(AlwaysStaleStore {
        inner: MemoryStore::new(),
    });
    let services = ServiceFactory::with_identity_provider(
        &settings,
        store,
        Arc::new(FixedClock::new(test_now())),
        Arc::new(StaticIdentityProvider::default()),
    )
    .unwrap();

    let executive = ClubHub::models::user::UserProfile {
        role: ClubHub::models::user::UserRole::Executive,
        ..ClubHub::models::user::UserProfile::guest("exec-x", Utc::now())
    };
    let event = services
        .events
        .create_event(&executive, event_request("Contested", EventKind::Gbm, tomorrow()))
        .await
        .unwrap();

    let err = services
        .attendance
        .mark_attendance(&executive, &event.id, "REG001", AttendanceStatus::Present)
        .await
        .unwrap_err();
    assert_matches!(err, ClubError::Conflict(_));
    assert!(services.events.get_event(&event.id).await.unwrap().attendance.is_empty());
}

fn status_strategy() -> impl Strategy<Value = Option<AttendanceStatus>> {
    prop_oneof![
        Just(None),
        Just(Some(AttendanceStatus::Pending)),
        Just(Some(AttendanceStatus::Present)),
        Just(Some(AttendanceStatus::Absent)),
    ]
}

fn event_with_marks(marks: &[Option<AttendanceStatus>], strays: usize) -> Event {
    let now = Utc::now();
    let registered_users = (0..marks.len())
        .map(|i| RegisteredUser {
            user_id: Some(format!("u{}", i)),
            full_name: format!("Member {}", i),
            phone_number: None,
            registration_number: Some(format!("R{}", i)),
            registered_at: now,
            manually_added: false,
        })
        .collect();
    let mut attendance: BTreeMap<String, AttendanceStatus> = marks
        .iter()
        .enumerate()
        .filter_map(|(i, m)| m.map(|s| (format!("R{}", i), s)))
        .collect();
    for i in 0..strays {
        attendance.insert(format!("STRAY{}", i), AttendanceStatus::Present);
    }

    Event {
        id: "prop".into(),
        title: "Property".into(),
        description: None,
        date: tomorrow(),
        start_time: at(18, 0),
        end_time: at(20, 0),
        location: "Hall".into(),
        kind: EventKind::Event,
        enable_registration: true,
        enable_attendance: true,
        show_on_guest_calendar: false,
        enable_certificate: None,
        registered_users,
        attendance,
        meeting_minutes: None,
        image_url: None,
        created_by: None,
        created_at: now,
        updated_at: now,
    }
}

proptest! {
    #[test]
    fn stats_partition_registered_users(
        marks in proptest::collection::vec(status_strategy(), 0..40),
        strays in 0usize..5,
    ) {
        let event = event_with_marks(&marks, strays);
        let stats = get_attendance_stats(&event);

        prop_assert_eq!(stats.total_registered, marks.len());
        prop_assert_eq!(stats.present + stats.absent + stats.pending, stats.total_registered);
        prop_assert_eq!(
            stats.present,
            marks.iter().filter(|m| **m == Some(AttendanceStatus::Present)).count()
        );
        prop_assert_eq!(
            stats.absent,
            marks.iter().filter(|m| **m == Some(AttendanceStatus::Absent)).count()
        );
    }
}
