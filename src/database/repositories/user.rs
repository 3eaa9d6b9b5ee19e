//! User profile repository implementation

use std::sync::Arc;

use super::{decode, decode_all, encode, modify};
use crate::database::store::{Collection, DocumentStore, Filter, OrderBy, StoreError};
use crate::models::user::{Domain, UserProfile};
use crate::utils::errors::{ClubError, Result};

const ENTITY: &str = "user";

#[derive(Clone)]
pub struct UserRepository {
    store: Arc<dyn DocumentStore>,
}

impl UserRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Create a profile keyed by the identity provider's uid
    pub async fn create(&self, profile: &UserProfile) -> Result<UserProfile> {
        match self
            .store
            .put(Collection::Users, &profile.uid, encode(profile)?)
            .await
        {
            Ok(doc) => decode(&doc),
            Err(StoreError::AlreadyExists { id, .. }) => {
                Err(ClubError::Duplicate(format!("user {} already exists", id)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Find user by uid
    pub async fn find_by_id(&self, uid: &str) -> Result<Option<UserProfile>> {
        match self.store.get(Collection::Users, uid).await? {
            Some(doc) => Ok(Some(decode(&doc)?)),
            None => Ok(None),
        }
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserProfile>> {
        let docs = self
            .store
            .query(Collection::Users, &[Filter::eq("email", email)], None)
            .await?;
        match docs.first() {
            Some(doc) => Ok(Some(decode(doc)?)),
            None => Ok(None),
        }
    }

    pub async fn find_by_registration_number(&self, registration_number: &str) -> Result<Option<UserProfile>> {
        let docs = self
            .store
            .query(
                Collection::Users,
                &[Filter::eq("registrationNumber", registration_number)],
                None,
            )
            .await?;
        match docs.first() {
            Some(doc) => Ok(Some(decode(doc)?)),
            None => Ok(None),
        }
    }

    pub async fn modify<R, F>(&self, uid: &str, max_attempts: u32, apply: F) -> Result<(UserProfile, R)>
    where
        F: FnMut(&mut UserProfile) -> Result<R>,
    {
        modify(self.store.as_ref(), Collection::Users, ENTITY, uid, max_attempts, apply).await
    }

    pub async fn list_by_domain(&self, domain: Domain) -> Result<Vec<UserProfile>> {
        let domain = serde_json::to_value(domain)?;
        let docs = self
            .store
            .query(
                Collection::Users,
                &[Filter::eq("domain", domain)],
                Some(&OrderBy::asc("fullName")),
            )
            .await?;
        decode_all(&docs)
    }
}
