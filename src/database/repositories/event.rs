//! Event repository implementation

use std::sync::Arc;

use serde_json::Value;

use super::{decode, decode_all, encode, missing, modify};
use crate::database::store::{ChangeStream, Collection, DocumentStore, Filter, OrderBy};
use crate::models::event::{Event, EventKind};
use crate::utils::errors::Result;

const ENTITY: &str = "event";

#[derive(Clone)]
pub struct EventRepository {
    store: Arc<dyn DocumentStore>,
}

impl EventRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Create a new event under a generated id
    pub async fn create(&self, event: &Event) -> Result<Event> {
        let doc = self.store.create(Collection::Events, encode(event)?).await?;
        decode(&doc)
    }

    /// Find event by ID
    pub async fn find_by_id(&self, id: &str) -> Result<Option<Event>> {
        match self.store.get(Collection::Events, id).await? {
            Some(doc) => Ok(Some(decode(&doc)?)),
            None => Ok(None),
        }
    }

    /// All events ordered by date, then start time
    pub async fn list(&self, kind: Option<EventKind>) -> Result<Vec<Event>> {
        let filters: Vec<Filter> = kind
            .map(|k| vec![Filter::eq("type", k.as_str())])
            .unwrap_or_default();
        let docs = self
            .store
            .query(Collection::Events, &filters, Some(&OrderBy::asc("date")))
            .await?;

        let mut events: Vec<Event> = decode_all(&docs)?;
        events.sort_by_key(|e| e.starts_at());
        Ok(events)
    }

    /// Blind shallow merge of event fields
    pub async fn update(&self, id: &str, patch: Value) -> Result<Event> {
        let doc = self
            .store
            .update(Collection::Events, id, patch)
            .await
            .map_err(missing(ENTITY))?;
        decode(&doc)
    }

    /// Read-modify-write under the event's version; see [`super::modify`]
    pub async fn modify<R, F>(&self, id: &str, max_attempts: u32, apply: F) -> Result<(Event, R)>
    where
        F: FnMut(&mut Event) -> Result<R>,
    {
        modify(self.store.as_ref(), Collection::Events, ENTITY, id, max_attempts, apply).await
    }

    /// Delete event; returns whether it existed
    pub async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.store.delete(Collection::Events, id).await?)
    }

    /// Live changes to the events collection
    pub async fn subscribe(&self) -> Result<ChangeStream> {
        Ok(self.store.subscribe(Collection::Events, Vec::new()).await?)
    }
}
