//! Registration repository implementation

use std::sync::Arc;

use super::{decode, decode_all, encode, modify};
use crate::database::store::{Collection, DocumentStore, Filter, OrderBy, StoreError};
use crate::models::registration::Registration;
use crate::utils::errors::{ClubError, Result};

const ENTITY: &str = "registration";

#[derive(Clone)]
pub struct RegistrationRepository {
    store: Arc<dyn DocumentStore>,
}

impl RegistrationRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Insert a registration under its deterministic id.
    ///
    /// An existing document for the same (event, user) pair surfaces as
    /// [`ClubError::Duplicate`], including when two inserts race.
    pub async fn insert(&self, registration: &Registration) -> Result<Registration> {
        match self
            .store
            .put(Collection::Registrations, &registration.id, encode(registration)?)
            .await
        {
            Ok(doc) => decode(&doc),
            Err(StoreError::AlreadyExists { .. }) => Err(ClubError::Duplicate(
                "You have already registered for this event".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Registration>> {
        match self.store.get(Collection::Registrations, id).await? {
            Some(doc) => Ok(Some(decode(&doc)?)),
            None => Ok(None),
        }
    }

    pub async fn find(&self, event_id: &str, user_id: &str) -> Result<Option<Registration>> {
        self.find_by_id(&Registration::id_for(event_id, user_id))
            .await
    }

    /// Registrations for an event in registration order
    pub async fn for_event(&self, event_id: &str) -> Result<Vec<Registration>> {
        let docs = self
            .store
            .query(
                Collection::Registrations,
                &[Filter::eq("eventId", event_id)],
                Some(&OrderBy::asc("registeredAt")),
            )
            .await?;
        decode_all(&docs)
    }

    /// Registrations of a user, newest first
    pub async fn for_user(&self, user_id: &str) -> Result<Vec<Registration>> {
        let docs = self
            .store
            .query(
                Collection::Registrations,
                &[Filter::eq("userId", user_id)],
                Some(&OrderBy::desc("registeredAt")),
            )
            .await?;
        decode_all(&docs)
    }

    pub async fn modify<R, F>(&self, id: &str, max_attempts: u32, apply: F) -> Result<(Registration, R)>
    where
        F: FnMut(&mut Registration) -> Result<R>,
    {
        modify(self.store.as_ref(), Collection::Registrations, ENTITY, id, max_attempts, apply).await
    }

    pub async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.store.delete(Collection::Registrations, id).await?)
    }

    /// Delete every registration of an event; returns how many were removed
    pub async fn delete_for_event(&self, event_id: &str) -> Result<usize> {
        let docs = self
            .store
            .query(
                Collection::Registrations,
                &[Filter::eq("eventId", event_id)],
                None,
            )
            .await?;

        let mut removed = 0;
        for doc in docs {
            if self.store.delete(Collection::Registrations, &doc.id).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}
