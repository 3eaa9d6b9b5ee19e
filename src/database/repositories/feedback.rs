//! Feedback repository implementation

use std::sync::Arc;

use super::{decode, decode_all, encode, modify};
use crate::database::store::{Collection, DocumentStore, Filter, OrderBy};
use crate::models::feedback::{Feedback, FeedbackStatus};
use crate::utils::errors::Result;

const ENTITY: &str = "feedback";

#[derive(Clone)]
pub struct FeedbackRepository {
    store: Arc<dyn DocumentStore>,
}

impl FeedbackRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, feedback: &Feedback) -> Result<Feedback> {
        let doc = self
            .store
            .create(Collection::Feedback, encode(feedback)?)
            .await?;
        decode(&doc)
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Feedback>> {
        match self.store.get(Collection::Feedback, id).await? {
            Some(doc) => Ok(Some(decode(&doc)?)),
            None => Ok(None),
        }
    }

    pub async fn modify<R, F>(&self, id: &str, max_attempts: u32, apply: F) -> Result<(Feedback, R)>
    where
        F: FnMut(&mut Feedback) -> Result<R>,
    {
        modify(self.store.as_ref(), Collection::Feedback, ENTITY, id, max_attempts, apply).await
    }

    /// Feedback newest first, optionally restricted to one status
    pub async fn list(&self, status: Option<FeedbackStatus>) -> Result<Vec<Feedback>> {
        let filters: Vec<Filter> = status
            .map(|s| vec![Filter::eq("status", s.as_str())])
            .unwrap_or_default();
        let docs = self
            .store
            .query(Collection::Feedback, &filters, Some(&OrderBy::desc("createdAt")))
            .await?;
        decode_all(&docs)
    }

    pub async fn for_user(&self, user_id: &str) -> Result<Vec<Feedback>> {
        let docs = self
            .store
            .query(
                Collection::Feedback,
                &[Filter::eq("userId", user_id)],
                Some(&OrderBy::desc("createdAt")),
            )
            .await?;
        decode_all(&docs)
    }
}
