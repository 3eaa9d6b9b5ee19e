//! In-process document store
//!
//! Backs tests and local runs. Change notifications are fanned out over a
//! broadcast channel shared by all subscribers.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, warn};

use super::store::{
    compare_json, matches_all, merge_patch, ChangeEvent, ChangeKind, ChangeStream, Collection,
    Document, DocumentStore, Filter, OrderBy, StoreError,
};

const CHANGE_BUFFER: usize = 1024;

pub struct MemoryStore {
    collections: RwLock<HashMap<Collection, BTreeMap<String, Document>>>,
    changes: broadcast::Sender<ChangeEvent>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            collections: RwLock::new(HashMap::new()),
            changes,
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection
    pub async fn len(&self, collection: Collection) -> usize {
        self.collections
            .read()
            .await
            .get(&collection)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    fn notify(&self, collection: Collection, kind: ChangeKind, document: &Document) {
        // No receivers is not an error
        let _ = self.changes.send(ChangeEvent {
            collection,
            id: document.id.clone(),
            kind,
            document: Some(document.clone()),
        });
    }

    async fn apply_update(
        &self,
        collection: Collection,
        id: &str,
        expected_version: Option<u64>,
        patch: &Value,
    ) -> Result<Option<Document>, StoreError> {
        let mut collections = self.collections.write().await;
        let doc = collections
            .get_mut(&collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| StoreError::NotFound {
                collection,
                id: id.to_string(),
            })?;

        if let Some(expected) = expected_version {
            if doc.version != expected {
                debug!(collection = %collection, id = id, expected, actual = doc.version, "Version precondition failed");
                return Ok(None);
            }
        }

        merge_patch(&mut doc.data, patch);
        doc.version += 1;
        doc.updated_at = Utc::now();
        let updated = doc.clone();
        drop(collections);

        self.notify(collection, ChangeKind::Updated, &updated);
        Ok(Some(updated))
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }

    async fn put(&self, collection: Collection, id: &str, data: Value) -> Result<Document, StoreError> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection).or_default();
        if docs.contains_key(id) {
            return Err(StoreError::AlreadyExists {
                collection,
                id: id.to_string(),
            });
        }

        let now = Utc::now();
        let doc = Document {
            id: id.to_string(),
            version: 1,
            data,
            created_at: now,
            updated_at: now,
        };
        docs.insert(id.to_string(), doc.clone());
        drop(collections);

        self.notify(collection, ChangeKind::Created, &doc);
        Ok(doc)
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        Ok(self
            .collections
            .read()
            .await
            .get(&collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn update(&self, collection: Collection, id: &str, patch: Value) -> Result<Document, StoreError> {
        self.apply_update(collection, id, None, &patch)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                collection,
                id: id.to_string(),
            })
    }

    async fn update_if(
        &self,
        collection: Collection,
        id: &str,
        expected_version: u64,
        patch: Value,
    ) -> Result<Option<Document>, StoreError> {
        self.apply_update(collection, id, Some(expected_version), &patch)
            .await
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<bool, StoreError> {
        let removed = self
            .collections
            .write()
            .await
            .get_mut(&collection)
            .and_then(|docs| docs.remove(id));

        match removed {
            Some(doc) => {
                self.notify(collection, ChangeKind::Deleted, &doc);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn query(
        &self,
        collection: Collection,
        filters: &[Filter],
        order_by: Option<&OrderBy>,
    ) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.read().await;
        let mut docs: Vec<Document> = collections
            .get(&collection)
            .map(|docs| {
                docs.values()
                    .filter(|doc| matches_all(filters, &doc.data))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        drop(collections);

        if let Some(order) = order_by {
            docs.sort_by(|a, b| {
                let ord = compare_json(a.data.get(&order.field), b.data.get(&order.field));
                if order.descending {
                    ord.reverse()
                } else {
                    ord
                }
            });
        }
        Ok(docs)
    }

    async fn subscribe(&self, collection: Collection, filters: Vec<Filter>) -> Result<ChangeStream, StoreError> {
        let mut rx = self.changes.subscribe();
        let stream = async_stream::stream! {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if event.matches(collection, &filters) {
                            yield event;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(collection = %collection, skipped, "Change subscriber lagged, notifications dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        };
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    #[tokio::test]
    async fn test_put_rejects_existing_id() {
        let store = MemoryStore::new();
        store.put(Collection::Users, "u1", json!({"a": 1})).await.unwrap();
        let err = store
            .put(Collection::Users, "u1", json!({"a": 2}))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_update_if_checks_version() {
        let store = MemoryStore::new();
        let doc = store.create(Collection::Events, json!({"n": 1})).await.unwrap();

        let first = store
            .update_if(Collection::Events, &doc.id, 1, json!({"n": 2}))
            .await
            .unwrap();
        assert_eq!(first.map(|d| d.version), Some(2));

        let stale = store
            .update_if(Collection::Events, &doc.id, 1, json!({"n": 3}))
            .await
            .unwrap();
        assert!(stale.is_none());

        let current = store.get(Collection::Events, &doc.id).await.unwrap().unwrap();
        assert_eq!(current.data["n"], 2);
    }

    #[tokio::test]
    async fn test_query_filters_and_orders() {
        let store = MemoryStore::new();
        for (id, kind, date) in [
            ("a", "gbm", "2026-03-01"),
            ("b", "event", "2026-01-01"),
            ("c", "gbm", "2026-02-01"),
        ] {
            store
                .put(Collection::Events, id, json!({"type": kind, "date": date}))
                .await
                .unwrap();
        }

        let docs = store
            .query(
                Collection::Events,
                &[Filter::eq("type", "gbm")],
                Some(&OrderBy::asc("date")),
            )
            .await
            .unwrap();
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = MemoryStore::new();
        store.put(Collection::Feedback, "f", json!({})).await.unwrap();
        assert!(store.delete(Collection::Feedback, "f").await.unwrap());
        assert!(!store.delete(Collection::Feedback, "f").await.unwrap());
    }

    #[tokio::test]
    async fn test_subscribe_scoped_to_collection_and_filters() {
        let store = MemoryStore::new();
        let mut changes = store
            .subscribe(Collection::Registrations, vec![Filter::eq("eventId", "e1")])
            .await
            .unwrap();

        store.put(Collection::Events, "e1", json!({})).await.unwrap();
        store
            .put(Collection::Registrations, "r0", json!({"eventId": "e2"}))
            .await
            .unwrap();
        store
            .put(Collection::Registrations, "r1", json!({"eventId": "e1"}))
            .await
            .unwrap();

        let event = changes.next().await.unwrap();
        assert_eq!(event.id, "r1");
        assert_eq!(event.kind, ChangeKind::Created);
    }
}
