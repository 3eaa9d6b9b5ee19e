//! Test context for integration tests
//!
//! Wires every service over an in-memory store and a clock pinned to
//! 2026-03-01 09:00, with an executive, a student and a guest ready to use.

use std::sync::{Arc, Once};

use chrono::{NaiveDate, NaiveDateTime};

use ClubHub::models::event::{CreateEventRequest, Event, EventKind, UpdateEventRequest};
use ClubHub::models::user::{CreateUserRequest, Domain, UserProfile, UserRole};
use ClubHub::services::ServiceFactory;
use ClubHub::{Clock, FixedClock, MemoryStore, Settings};

use super::identity_mock::StaticIdentityProvider;
use super::test_data::{event_request, tomorrow};

static INIT_TRACING: Once = Once::new();

pub fn init_test_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("ClubHub=debug")
            .with_test_writer()
            .try_init();
    });
}

pub fn test_now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 3, 1)
        .and_then(|d| d.and_hms_opt(9, 0, 0))
        .unwrap()
}

pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.auth.api_key = "test-api-key".to_string();
    settings.features.change_feed = false;
    settings
}

pub struct TestContext {
    pub settings: Settings,
    pub clock: Arc<FixedClock>,
    pub store: Arc<MemoryStore>,
    pub identity: Arc<StaticIdentityProvider>,
    pub services: ServiceFactory,
    pub executive: UserProfile,
    pub student: UserProfile,
    pub guest: UserProfile,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::with_settings(test_settings()).await
    }

    pub async fn with_settings(settings: Settings) -> Self {
        init_test_tracing();

        let clock = Arc::new(FixedClock::new(test_now()));
        let store = Arc::new(MemoryStore::new());
        let identity = Arc::new(StaticIdentityProvider::default());
        let services = ServiceFactory::with_identity_provider(
            &settings,
            store.clone(),
            clock.clone(),
            identity.clone(),
        )
        .expect("failed to wire services");

        let executive = services
            .users
            .create_profile(CreateUserRequest {
                uid: "exec-1".to_string(),
                email: "president@club.example".to_string(),
                full_name: "Priya Raman".to_string(),
                role: UserRole::Executive,
                registration_number: Some("EXEC001".to_string()),
                phone: None,
                domain: Some(Domain::Cmd),
            })
            .await
            .expect("failed to create executive");

        let student = services
            .users
            .create_profile(CreateUserRequest {
                uid: "student-1".to_string(),
                email: "ada@club.example".to_string(),
                full_name: "Ada Lovelace".to_string(),
                role: UserRole::Student,
                registration_number: Some("REG001".to_string()),
                phone: Some("9876543210".to_string()),
                domain: Some(Domain::Csd),
            })
            .await
            .expect("failed to create student");

        let guest = UserProfile::guest("anon-guest", clock.now_utc());

        Self {
            settings,
            clock,
            store,
            identity,
            services,
            executive,
            student,
            guest,
        }
    }

    /// Create another student profile
    pub async fn add_student(&self, uid: &str, registration_number: Option<&str>) -> UserProfile {
        let full_name = super::test_data::fake_name();
        self.services
            .users
            .create_profile(CreateUserRequest {
                uid: uid.to_string(),
                email: format!("{}@club.example", uid),
                full_name,
                role: UserRole::Student,
                registration_number: registration_number.map(str::to_string),
                phone: None,
                domain: Some(Domain::Isd),
            })
            .await
            .expect("failed to create student")
    }

    pub async fn create_event(&self, request: CreateEventRequest) -> Event {
        self.services
            .events
            .create_event(&self.executive, request)
            .await
            .expect("failed to create event")
    }

    /// Upcoming event of the given kind with registration switched on
    pub async fn open_event(&self, kind: EventKind) -> Event {
        let event = self
            .create_event(event_request("Hack Night", kind, tomorrow()))
            .await;
        self.services
            .events
            .update_event(
                &self.executive,
                &event.id,
                UpdateEventRequest {
                    enable_registration: Some(true),
                    enable_attendance: Some(true),
                    ..Default::default()
                },
            )
            .await
            .expect("failed to open registration")
    }

    pub async fn reload(&self, event_id: &str) -> Event {
        self.services
            .events
            .get_event(event_id)
            .await
            .expect("event should exist")
    }

    pub async fn profile(&self, uid: &str) -> UserProfile {
        self.services
            .users
            .get_profile(uid)
            .await
            .expect("profile should exist")
    }
}
