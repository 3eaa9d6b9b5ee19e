//! Past-event gallery repository implementation

use std::sync::Arc;

use super::{decode, decode_all, encode, modify};
use crate::database::store::{Collection, DocumentStore, OrderBy, StoreError};
use crate::models::past_event::PastEventRecord;
use crate::utils::errors::Result;

const ENTITY: &str = "past event";

#[derive(Clone)]
pub struct PastEventRepository {
    store: Arc<dyn DocumentStore>,
}

impl PastEventRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Store an archive record under the source event's id. Archiving the
    /// same event again returns the existing record.
    pub async fn archive(&self, record: &PastEventRecord) -> Result<(PastEventRecord, bool)> {
        match self
            .store
            .put(Collection::PastEvents, &record.id, encode(record)?)
            .await
        {
            Ok(doc) => Ok((decode(&doc)?, true)),
            Err(StoreError::AlreadyExists { collection, id }) => {
                match self.store.get(collection, &id).await? {
                    Some(doc) => Ok((decode(&doc)?, false)),
                    None => Err(StoreError::NotFound { collection, id }.into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<PastEventRecord>> {
        match self.store.get(Collection::PastEvents, id).await? {
            Some(doc) => Ok(Some(decode(&doc)?)),
            None => Ok(None),
        }
    }

    /// Gallery entries, most recent first
    pub async fn list(&self) -> Result<Vec<PastEventRecord>> {
        let docs = self
            .store
            .query(Collection::PastEvents, &[], Some(&OrderBy::desc("date")))
            .await?;
        decode_all(&docs)
    }

    pub async fn modify<R, F>(&self, id: &str, max_attempts: u32, apply: F) -> Result<(PastEventRecord, R)>
    where
        F: FnMut(&mut PastEventRecord) -> Result<R>,
    {
        modify(self.store.as_ref(), Collection::PastEvents, ENTITY, id, max_attempts, apply).await
    }
}
