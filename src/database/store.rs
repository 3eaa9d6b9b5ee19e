//! Document store abstraction
//!
//! Collections hold schemaless JSON documents. Every write bumps the
//! document's `version`, which `update_if` uses as an optimistic precondition.

use std::cmp::Ordering;
use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::utils::helpers::generate_uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Events,
    PastEvents,
    Registrations,
    Attendance,
    Feedback,
    Users,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Events => "events",
            Collection::PastEvents => "past_events",
            Collection::Registrations => "registrations",
            Collection::Attendance => "attendance",
            Collection::Feedback => "feedback",
            Collection::Users => "users",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub version: u64,
    pub data: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Deserialize the document body, injecting the document id as `id`
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        let mut data = self.data.clone();
        if let Value::Object(map) = &mut data {
            map.insert("id".to_string(), Value::String(self.id.clone()));
        }
        Ok(serde_json::from_value(data)?)
    }
}

/// Equality filter on a top-level field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub value: Value,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, data: &Value) -> bool {
        data.get(&self.field) == Some(&self.value)
    }
}

pub fn matches_all(filters: &[Filter], data: &Value) -> bool {
    filters.iter().all(|f| f.matches(data))
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub descending: bool,
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }
}

/// Total order over JSON scalars used for in-process sorting: null < bool <
/// number < string; other values compare equal
pub fn compare_json(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(_) => 4,
        }
    }
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Shallow merge: top-level keys of `patch` replace those of `target`; a
/// `null` removes the key
pub fn merge_patch(target: &mut Value, patch: &Value) {
    if !target.is_object() {
        *target = Value::Object(Default::default());
    }
    if let (Value::Object(target), Value::Object(patch)) = (target, patch) {
        for (key, value) in patch {
            if value.is_null() {
                target.remove(key);
            } else {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Whether every top-level key of `patch` is reflected in `data`
pub fn patch_applied(data: &Value, patch: &Value) -> bool {
    match patch {
        Value::Object(patch) => patch.iter().all(|(key, value)| {
            if value.is_null() {
                data.get(key).is_none()
            } else {
                data.get(key) == Some(value)
            }
        }),
        _ => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

/// Live-update notification. For deletions `document` holds the last version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub collection: Collection,
    pub id: String,
    pub kind: ChangeKind,
    pub document: Option<Document>,
}

impl ChangeEvent {
    pub fn matches(&self, collection: Collection, filters: &[Filter]) -> bool {
        if self.collection != collection {
            return false;
        }
        match &self.document {
            Some(doc) => matches_all(filters, &doc.data),
            None => filters.is_empty(),
        }
    }
}

/// Stream of changes for one collection; dropping it unsubscribes
pub type ChangeStream = Pin<Box<dyn Stream<Item = ChangeEvent> + Send>>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("document {collection}/{id} not found")]
    NotFound { collection: Collection, id: String },

    #[error("document {collection}/{id} already exists")]
    AlreadyExists { collection: Collection, id: String },

    #[error("store call timed out: {0}")]
    Timeout(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Backend(#[from] sqlx::Error),

    #[error("change feed error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("document encoding error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Transient failures worth retrying at the adapter boundary
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Timeout(_) | StoreError::Unavailable(_) => true,
            StoreError::Backend(e) => matches!(
                e,
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed
            ),
            StoreError::Redis(e) => e.is_io_error() || e.is_timeout(),
            _ => false,
        }
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    fn backend_tag(&self) -> &'static str;

    /// Insert a document under a chosen id; fails with `AlreadyExists`
    async fn put(&self, collection: Collection, id: &str, data: Value) -> Result<Document, StoreError>;

    /// Insert a document under a generated id
    async fn create(&self, collection: Collection, data: Value) -> Result<Document, StoreError> {
        let id = generate_uuid();
        self.put(collection, &id, data).await
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError>;

    /// Blind shallow merge; fails with `NotFound` for a missing document
    async fn update(&self, collection: Collection, id: &str, patch: Value) -> Result<Document, StoreError>;

    /// Shallow merge applied only if the stored version equals
    /// `expected_version`. Returns `None` when the precondition fails.
    async fn update_if(
        &self,
        collection: Collection,
        id: &str,
        expected_version: u64,
        patch: Value,
    ) -> Result<Option<Document>, StoreError>;

    /// Idempotent; returns whether a document was removed
    async fn delete(&self, collection: Collection, id: &str) -> Result<bool, StoreError>;

    async fn query(
        &self,
        collection: Collection,
        filters: &[Filter],
        order_by: Option<&OrderBy>,
    ) -> Result<Vec<Document>, StoreError>;

    async fn subscribe(&self, collection: Collection, filters: Vec<Filter>) -> Result<ChangeStream, StoreError>;
}
