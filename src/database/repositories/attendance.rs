//! Attendance record repository implementation

use std::sync::Arc;

use super::{decode, decode_all, encode, modify};
use crate::database::store::{Collection, DocumentStore, Filter, OrderBy, StoreError};
use crate::models::attendance::AttendanceRecord;
use crate::utils::errors::Result;

const ENTITY: &str = "attendance record";

#[derive(Clone)]
pub struct AttendanceRepository {
    store: Arc<dyn DocumentStore>,
}

impl AttendanceRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn find(&self, event_id: &str, participant_key: &str) -> Result<Option<AttendanceRecord>> {
        let id = AttendanceRecord::id_for(event_id, participant_key);
        match self.store.get(Collection::Attendance, &id).await? {
            Some(doc) => Ok(Some(decode(&doc)?)),
            None => Ok(None),
        }
    }

    /// Insert the record unless one already exists for the same (event,
    /// participant); returns whichever record is stored
    pub async fn insert_if_absent(&self, record: &AttendanceRecord) -> Result<AttendanceRecord> {
        match self
            .store
            .put(Collection::Attendance, &record.id, encode(record)?)
            .await
        {
            Ok(doc) => decode(&doc),
            Err(StoreError::AlreadyExists { collection, id }) => {
                match self.store.get(collection, &id).await? {
                    Some(doc) => decode(&doc),
                    None => Err(StoreError::NotFound { collection, id }.into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn modify<R, F>(&self, id: &str, max_attempts: u32, apply: F) -> Result<(AttendanceRecord, R)>
    where
        F: FnMut(&mut AttendanceRecord) -> Result<R>,
    {
        modify(self.store.as_ref(), Collection::Attendance, ENTITY, id, max_attempts, apply).await
    }

    pub async fn for_event(&self, event_id: &str) -> Result<Vec<AttendanceRecord>> {
        let docs = self
            .store
            .query(
                Collection::Attendance,
                &[Filter::eq("eventId", event_id)],
                Some(&OrderBy::asc("participantKey")),
            )
            .await?;
        decode_all(&docs)
    }

    pub async fn for_user(&self, user_id: &str) -> Result<Vec<AttendanceRecord>> {
        let docs = self
            .store
            .query(
                Collection::Attendance,
                &[Filter::eq("userId", user_id)],
                Some(&OrderBy::desc("createdAt")),
            )
            .await?;
        decode_all(&docs)
    }

    pub async fn delete_for_event(&self, event_id: &str) -> Result<usize> {
        let docs = self
            .store
            .query(Collection::Attendance, &[Filter::eq("eventId", event_id)], None)
            .await?;

        let mut removed = 0;
        for doc in docs {
            if self.store.delete(Collection::Attendance, &doc.id).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}
