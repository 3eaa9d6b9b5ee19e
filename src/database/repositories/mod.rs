//! Database repositories module
//!
//! Typed access to each document collection. Shared helpers here handle
//! encoding and the optimistic read-modify-write loop.

pub mod attendance;
pub mod event;
pub mod feedback;
pub mod past_event;
pub mod registration;
pub mod user;

pub use attendance::AttendanceRepository;
pub use event::EventRepository;
pub use feedback::FeedbackRepository;
pub use past_event::PastEventRepository;
pub use registration::RegistrationRepository;
pub use user::UserRepository;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::store::{Collection, Document, DocumentStore, StoreError};
use crate::utils::errors::{ClubError, Result};

/// A decoded document together with the version it was read at
#[derive(Debug, Clone)]
pub struct Versioned<T> {
    pub value: T,
    pub version: u64,
}

pub(crate) fn decode<T: DeserializeOwned>(doc: &Document) -> Result<T> {
    Ok(doc.decode()?)
}

pub(crate) fn decode_all<T: DeserializeOwned>(docs: &[Document]) -> Result<Vec<T>> {
    docs.iter().map(decode).collect()
}

/// Serialize a model as a document body; the id lives outside the body
pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Value> {
    let mut data = serde_json::to_value(value)?;
    if let Value::Object(map) = &mut data {
        map.remove("id");
    }
    Ok(data)
}

/// Map a store-level miss on a write to the domain error for `entity`
pub(crate) fn missing(entity: &'static str) -> impl Fn(StoreError) -> ClubError {
    move |e| match e {
        StoreError::NotFound { id, .. } => ClubError::not_found(entity, id),
        other => ClubError::Store(other),
    }
}

pub(crate) async fn load_versioned<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: Collection,
    id: &str,
) -> Result<Option<Versioned<T>>> {
    match store.get(collection, id).await? {
        Some(doc) => Ok(Some(Versioned {
            value: decode(&doc)?,
            version: doc.version,
        })),
        None => Ok(None),
    }
}

/// Optimistic read-modify-write.
///
/// `apply` runs against the latest stored value and may reject the change
/// with an error. The result is written with a version precondition; on a
/// lost race the document is re-read and `apply` re-evaluated, up to
/// `max_attempts` times. An `apply` that leaves the value unchanged skips the
/// write.
pub(crate) async fn modify<T, R, F>(
    store: &dyn DocumentStore,
    collection: Collection,
    entity: &'static str,
    id: &str,
    max_attempts: u32,
    mut apply: F,
) -> Result<(T, R)>
where
    T: Serialize + DeserializeOwned,
    F: FnMut(&mut T) -> Result<R>,
{
    let attempts = max_attempts.max(1);
    for attempt in 0..attempts {
        let current: Versioned<T> = load_versioned(store, collection, id)
            .await?
            .ok_or_else(|| ClubError::not_found(entity, id))?;

        let before = encode(&current.value)?;
        let mut value = current.value;
        let outcome = apply(&mut value)?;
        let after = encode(&value)?;

        if before == after {
            return Ok((value, outcome));
        }

        let patch = removed_keys_as_null(&before, after);
        match store
            .update_if(collection, id, current.version, patch)
            .await
            .map_err(missing(entity))?
        {
            Some(doc) => return Ok((decode(&doc)?, outcome)),
            None => {
                debug!(collection = %collection, id, attempt, "Version conflict, re-reading");
            }
        }
    }

    Err(ClubError::Conflict(format!(
        "{} {} changed concurrently {} times",
        entity, id, attempts
    )))
}

/// The store merges shallowly, so keys dropped by `apply` must be sent as
/// explicit nulls
fn removed_keys_as_null(before: &Value, mut after: Value) -> Value {
    if let (Value::Object(before), Value::Object(after)) = (before, &mut after) {
        for key in before.keys() {
            if !after.contains_key(key) {
                after.insert(key.clone(), Value::Null);
            }
        }
    }
    after
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Counter {
        #[serde(default)]
        id: String,
        n: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        note: Option<String>,
    }

    #[tokio::test]
    async fn test_modify_writes_and_bumps_version() {
        let store = MemoryStore::new();
        store
            .put(Collection::Events, "c", json!({"n": 1, "note": "x"}))
            .await
            .unwrap();

        let (counter, previous) = modify(&store, Collection::Events, "counter", "c", 3, |c: &mut Counter| {
            let prev = c.n;
            c.n += 1;
            c.note = None;
            Ok(prev)
        })
        .await
        .unwrap();

        assert_eq!(previous, 1);
        assert_eq!(counter.n, 2);
        let doc = store.get(Collection::Events, "c").await.unwrap().unwrap();
        assert_eq!(doc.version, 2);
        assert!(doc.data.get("note").is_none());
    }

    #[tokio::test]
    async fn test_modify_skips_unchanged_write() {
        let store = MemoryStore::new();
        store.put(Collection::Events, "c", json!({"n": 1})).await.unwrap();

        modify(&store, Collection::Events, "counter", "c", 3, |_: &mut Counter| Ok(()))
            .await
            .unwrap();

        let doc = store.get(Collection::Events, "c").await.unwrap().unwrap();
        assert_eq!(doc.version, 1);
    }

    #[tokio::test]
    async fn test_modify_propagates_rejection_and_missing() {
        let store = MemoryStore::new();
        store.put(Collection::Events, "c", json!({"n": 1})).await.unwrap();

        let err = modify(&store, Collection::Events, "counter", "c", 3, |_: &mut Counter| {
            Err::<(), _>(ClubError::State("closed".into()))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, ClubError::State(_)));

        let err = modify(&store, Collection::Events, "counter", "nope", 3, |_: &mut Counter| Ok(()))
            .await
            .unwrap_err();
        assert!(matches!(err, ClubError::NotFound { entity: "counter", .. }));
    }
}
