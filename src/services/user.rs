//! User service implementation
//!
//! Member profiles: lookup, self-service contact edits, executive
//! administration, and the service-hour ledger.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::settings::Settings;
use crate::database::repositories::UserRepository;
use crate::middleware::auth::{Authorizer, Permission};
use crate::models::user::{CreateUserRequest, Domain, UpdateUserRequest, UserProfile};
use crate::utils::clock::Clock;
use crate::utils::errors::{ClubError, Result};
use crate::utils::helpers::{is_valid_email, is_valid_phone, normalize_whitespace};

#[derive(Clone)]
pub struct UserService {
    users: UserRepository,
    clock: Arc<dyn Clock>,
    authorizer: Authorizer,
    max_conflict_retries: u32,
}

impl UserService {
    pub fn new(users: UserRepository, clock: Arc<dyn Clock>, settings: &Settings) -> Self {
        Self {
            users,
            clock,
            authorizer: Authorizer::new(),
            max_conflict_retries: settings.store.max_conflict_retries,
        }
    }

    pub async fn get_profile(&self, uid: &str) -> Result<UserProfile> {
        self.users
            .find_by_id(uid)
            .await?
            .ok_or_else(|| ClubError::not_found("user", uid))
    }

    /// Create a member profile for a freshly provisioned account
    pub async fn create_profile(&self, request: CreateUserRequest) -> Result<UserProfile> {
        if request.uid.trim().is_empty() {
            return Err(ClubError::Validation("User id is required".to_string()));
        }
        if !is_valid_email(&request.email) {
            return Err(ClubError::Validation(format!(
                "'{}' is not a valid email address",
                request.email
            )));
        }
        let full_name = normalize_whitespace(&request.full_name);
        if full_name.is_empty() {
            return Err(ClubError::Validation("Full name is required".to_string()));
        }
        validate_phone(request.phone.as_deref())?;

        let email = request.email.trim().to_lowercase();
        if let Some(existing) = self.users.find_by_email(&email).await? {
            if existing.uid != request.uid {
                return Err(ClubError::Duplicate(format!(
                    "An account with email {} already exists",
                    email
                )));
            }
        }

        let now = self.clock.now_utc();
        let profile = UserProfile {
            uid: request.uid,
            email,
            full_name,
            role: request.role,
            registration_number: clean(request.registration_number),
            phone: clean(request.phone),
            domain: request.domain,
            service_hours: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let created = self.users.create(&profile).await?;
        info!(uid = %created.uid, role = ?created.role, "User profile created");
        Ok(created)
    }

    /// Apply a profile update. Members may change their own contact fields;
    /// role and activation changes need an executive. A member updating a
    /// profile that does not exist yet gets one created from their session.
    pub async fn upsert_profile(&self, actor: &UserProfile, uid: &str, update: UpdateUserRequest) -> Result<UserProfile> {
        if update.touches_privileged_fields() {
            self.authorizer.require(actor, Permission::ManageUsers)?;
        } else {
            self.authorizer
                .require_owner_or(actor, uid, Permission::ManageUsers)?;
        }
        validate_phone(update.phone.as_deref())?;
        if let Some(name) = &update.full_name {
            if normalize_whitespace(name).is_empty() {
                return Err(ClubError::Validation("Full name cannot be empty".to_string()));
            }
        }

        if self.users.find_by_id(uid).await?.is_none() {
            if actor.uid != uid {
                return Err(ClubError::not_found("user", uid));
            }
            debug!(uid, "Creating profile on first update");
            self.create_profile(CreateUserRequest {
                uid: actor.uid.clone(),
                email: actor.email.clone(),
                full_name: actor.full_name.clone(),
                role: actor.role,
                registration_number: actor.registration_number.clone(),
                phone: actor.phone.clone(),
                domain: actor.domain,
            })
            .await?;
        }

        let now = self.clock.now_utc();
        let (profile, _) = self
            .users
            .modify(uid, self.max_conflict_retries, |profile| {
                if let Some(name) = &update.full_name {
                    profile.full_name = normalize_whitespace(name);
                }
                if update.registration_number.is_some() {
                    profile.registration_number = clean(update.registration_number.clone());
                }
                if update.phone.is_some() {
                    profile.phone = clean(update.phone.clone());
                }
                if update.domain.is_some() {
                    profile.domain = update.domain;
                }
                if let Some(role) = update.role {
                    profile.role = role;
                }
                if let Some(active) = update.is_active {
                    profile.is_active = active;
                }
                profile.updated_at = now;
                Ok(())
            })
            .await?;

        info!(uid, actor = %actor.uid, "User profile updated");
        Ok(profile)
    }

    pub async fn set_active(&self, executive: &UserProfile, uid: &str, active: bool) -> Result<UserProfile> {
        self.authorizer.require(executive, Permission::ManageUsers)?;
        let now = self.clock.now_utc();
        let (profile, _) = self
            .users
            .modify(uid, self.max_conflict_retries, |profile| {
                profile.is_active = active;
                profile.updated_at = now;
                Ok(())
            })
            .await?;

        warn!(uid, active, executive = %executive.uid, "Account activation changed");
        Ok(profile)
    }

    pub async fn list_by_domain(&self, executive: &UserProfile, domain: Domain) -> Result<Vec<UserProfile>> {
        self.authorizer.require(executive, Permission::ManageUsers)?;
        self.users.list_by_domain(domain).await
    }

    pub async fn find_by_registration_number(&self, registration_number: &str) -> Result<Option<UserProfile>> {
        self.users
            .find_by_registration_number(registration_number)
            .await
    }

    /// Add to a member's cumulative service hours
    pub async fn credit_service_hours(&self, uid: &str, hours: u32) -> Result<UserProfile> {
        let now = self.clock.now_utc();
        let (profile, _) = self
            .users
            .modify(uid, self.max_conflict_retries, |profile| {
                profile.service_hours = profile.service_hours.saturating_add(hours);
                profile.updated_at = now;
                Ok(())
            })
            .await?;

        info!(uid, hours, total = profile.service_hours, "Service hours credited");
        Ok(profile)
    }

    /// Correct a member's service hours by a signed amount; the total may not
    /// go below zero
    pub async fn adjust_service_hours(&self, uid: &str, delta: i64) -> Result<UserProfile> {
        let now = self.clock.now_utc();
        let (profile, _) = self
            .users
            .modify(uid, self.max_conflict_retries, |profile| {
                let total = i64::from(profile.service_hours) + delta;
                if total < 0 {
                    return Err(ClubError::Validation(format!(
                        "Adjustment of {} would leave {} with negative service hours",
                        delta, profile.full_name
                    )));
                }
                profile.service_hours = u32::try_from(total).map_err(|_| {
                    ClubError::Validation("Service hours total is out of range".to_string())
                })?;
                profile.updated_at = now;
                Ok(())
            })
            .await?;
        Ok(profile)
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_phone(phone: Option<&str>) -> Result<()> {
    match phone.map(str::trim).filter(|p| !p.is_empty()) {
        Some(p) if !is_valid_phone(p) => Err(ClubError::Validation(format!(
            "'{}' is not a valid phone number",
            p
        ))),
        _ => Ok(()),
    }
}
