//! Services module
//!
//! This module contains the business logic services

pub mod attendance;
pub mod auth;
pub mod certificate;
pub mod event;
pub mod feedback;
pub mod image;
pub mod registration;
pub mod user;

// Re-export commonly used services
pub use attendance::{AttendanceMark, AttendanceService};
pub use auth::{AuthService, AuthState, HttpIdentityProvider, Identity, IdentityProvider};
pub use certificate::{eligibility, CertificateEntry, CertificateService, Eligibility};
pub use event::EventService;
pub use feedback::FeedbackService;
pub use image::ImageHostClient;
pub use registration::{ReconcileReport, RegistrationService};
pub use user::UserService;

use std::sync::Arc;

use crate::config::settings::Settings;
use crate::database::{DatabaseService, DocumentStore};
use crate::utils::clock::Clock;
use crate::utils::errors::Result;

/// Service factory for creating and managing all services
#[derive(Clone)]
pub struct ServiceFactory {
    pub db: DatabaseService,
    pub events: EventService,
    pub registrations: RegistrationService,
    pub attendance: AttendanceService,
    pub certificates: CertificateService,
    pub feedback: FeedbackService,
    pub users: UserService,
    pub auth: AuthService,
    pub images: ImageHostClient,
}

impl ServiceFactory {
    /// Wire all services over one store, using the configured HTTP identity provider
    pub fn new(settings: &Settings, store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Result<Self> {
        let provider = Arc::new(HttpIdentityProvider::new(&settings.auth)?);
        Self::with_identity_provider(settings, store, clock, provider)
    }

    pub fn with_identity_provider(
        settings: &Settings,
        store: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
        provider: Arc<dyn IdentityProvider>,
    ) -> Result<Self> {
        let db = DatabaseService::new(store);
        let users = UserService::new(db.users.clone(), clock.clone(), settings);

        Ok(Self {
            events: EventService::new(db.clone(), clock.clone(), settings),
            registrations: RegistrationService::new(db.clone(), clock.clone(), settings),
            attendance: AttendanceService::new(db.clone(), users.clone(), clock.clone(), settings),
            certificates: CertificateService::new(db.clone()),
            feedback: FeedbackService::new(db.clone(), clock.clone(), settings),
            auth: AuthService::new(provider, db.users.clone(), clock, &settings.auth),
            images: ImageHostClient::new(&settings.image_host)?,
            users,
            db,
        })
    }
}
