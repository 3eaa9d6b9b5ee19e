//! Timeout and retry policy at the store boundary
//!
//! Reads, blind merges and deletes are idempotent and retried on transient
//! failure. Inserts and conditional updates are retried only after a
//! read-back shows the previous attempt did not apply.

use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rand::Rng;
use serde_json::Value;
use tracing::warn;

use super::store::{
    patch_applied, ChangeStream, Collection, Document, DocumentStore, Filter, OrderBy, StoreError,
};
use crate::config::StoreConfig;
use crate::utils::logging::log_store_operation;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub call_timeout: Duration,
    pub max_retries: u32,
    pub backoff_base: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &StoreConfig) -> Self {
        Self {
            call_timeout: Duration::from_millis(config.call_timeout_ms),
            max_retries: config.max_retries,
            backoff_base: Duration::from_millis(config.backoff_base_ms),
        }
    }

    /// Exponential backoff with up to one base interval of jitter
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base_ms = self.backoff_base.as_millis() as u64;
        let exp = base_ms.saturating_mul(1u64 << attempt.min(10));
        let jitter = if base_ms > 0 {
            rand::thread_rng().gen_range(0..=base_ms)
        } else {
            0
        };
        Duration::from_millis(exp + jitter)
    }
}

pub struct ResilientStore<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: DocumentStore> ResilientStore<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// One bounded call, logged
    async fn timed<T, Fut>(&self, operation: &str, collection: Collection, fut: Fut) -> Result<T, StoreError>
    where
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let started = Instant::now();
        let result = match tokio::time::timeout(self.policy.call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(format!("{} on {}", operation, collection))),
        };
        log_store_operation(
            operation,
            collection.as_str(),
            started.elapsed().as_millis() as u64,
            result.is_ok(),
        );
        result
    }

    /// Retry an idempotent operation on transient failure
    async fn idempotent<T, F, Fut>(&self, operation: &str, collection: Collection, mut call: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut attempt = 0;
        loop {
            match self.timed(operation, collection, call()).await {
                Err(e) if e.is_retryable() && attempt < self.policy.max_retries => {
                    warn!(operation, collection = %collection, attempt, error = %e, "Retrying store call");
                    tokio::time::sleep(self.policy.backoff(attempt)).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

#[async_trait]
impl<S: DocumentStore> DocumentStore for ResilientStore<S> {
    fn backend_tag(&self) -> &'static str {
        self.inner.backend_tag()
    }

    async fn put(&self, collection: Collection, id: &str, data: Value) -> Result<Document, StoreError> {
        let mut attempt = 0;
        loop {
            match self
                .timed("put", collection, self.inner.put(collection, id, data.clone()))
                .await
            {
                Err(e) if e.is_retryable() && attempt < self.policy.max_retries => {
                    let existing = self
                        .idempotent("get", collection, || self.inner.get(collection, id))
                        .await?;
                    match existing {
                        Some(doc) if doc.data == data => return Ok(doc),
                        Some(_) => {
                            return Err(StoreError::AlreadyExists {
                                collection,
                                id: id.to_string(),
                            })
                        }
                        None => {
                            warn!(collection = %collection, id, attempt, error = %e, "Insert did not apply, retrying");
                            tokio::time::sleep(self.policy.backoff(attempt)).await;
                            attempt += 1;
                        }
                    }
                }
                other => return other,
            }
        }
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        self.idempotent("get", collection, || self.inner.get(collection, id))
            .await
    }

    async fn update(&self, collection: Collection, id: &str, patch: Value) -> Result<Document, StoreError> {
        self.idempotent("update", collection, || {
            self.inner.update(collection, id, patch.clone())
        })
        .await
    }

    async fn update_if(
        &self,
        collection: Collection,
        id: &str,
        expected_version: u64,
        patch: Value,
    ) -> Result<Option<Document>, StoreError> {
        let mut attempt = 0;
        loop {
            match self
                .timed(
                    "update_if",
                    collection,
                    self.inner
                        .update_if(collection, id, expected_version, patch.clone()),
                )
                .await
            {
                Err(e) if e.is_retryable() && attempt < self.policy.max_retries => {
                    let current = self
                        .idempotent("get", collection, || self.inner.get(collection, id))
                        .await?
                        .ok_or_else(|| StoreError::NotFound {
                            collection,
                            id: id.to_string(),
                        })?;

                    if current.version == expected_version {
                        warn!(collection = %collection, id, attempt, error = %e, "Conditional update did not apply, retrying");
                        tokio::time::sleep(self.policy.backoff(attempt)).await;
                        attempt += 1;
                    } else if current.version == expected_version + 1
                        && patch_applied(&current.data, &patch)
                    {
                        return Ok(Some(current));
                    } else {
                        return Ok(None);
                    }
                }
                other => return other,
            }
        }
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<bool, StoreError> {
        self.idempotent("delete", collection, || self.inner.delete(collection, id))
            .await
    }

    async fn query(
        &self,
        collection: Collection,
        filters: &[Filter],
        order_by: Option<&OrderBy>,
    ) -> Result<Vec<Document>, StoreError> {
        self.idempotent("query", collection, || {
            self.inner.query(collection, filters, order_by)
        })
        .await
    }

    async fn subscribe(&self, collection: Collection, filters: Vec<Filter>) -> Result<ChangeStream, StoreError> {
        self.timed(
            "subscribe",
            collection,
            self.inner.subscribe(collection, filters),
        )
        .await
    }
}
