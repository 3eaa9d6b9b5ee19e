//! PostgreSQL document store
//!
//! All collections share the `documents` table; bodies live in a JSONB column.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};

use super::change_feed::RedisChangeFeed;
use super::store::{
    ChangeEvent, ChangeKind, ChangeStream, Collection, Document, DocumentStore, Filter, OrderBy,
    StoreError,
};

const COLUMNS: &str = "id, version, data, created_at, updated_at";

/// Shallow merge that drops keys whose patch value is JSON null
const MERGE_EXPR: &str = "(data || $3::jsonb) - ARRAY(SELECT key FROM jsonb_each($3::jsonb) WHERE jsonb_typeof(value) = 'null')";

#[derive(FromRow)]
struct DocumentRow {
    id: String,
    version: i64,
    data: Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<DocumentRow> for Document {
    fn from(row: DocumentRow) -> Self {
        Document {
            id: row.id,
            version: row.version.max(0) as u64,
            data: row.data,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
    feed: Option<RedisChangeFeed>,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool, feed: Option<RedisChangeFeed>) -> Self {
        Self { pool, feed }
    }

    async fn publish(&self, collection: Collection, kind: ChangeKind, document: &Document) {
        if let Some(feed) = &self.feed {
            feed.publish(&ChangeEvent {
                collection,
                id: document.id.clone(),
                kind,
                document: Some(document.clone()),
            })
            .await;
        }
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    fn backend_tag(&self) -> &'static str {
        "postgres"
    }

    async fn put(&self, collection: Collection, id: &str, data: Value) -> Result<Document, StoreError> {
        let row = sqlx::query_as::<_, DocumentRow>(&format!(
            r#"
            INSERT INTO documents (collection, id, version, data, created_at, updated_at)
            VALUES ($1, $2, 1, $3, NOW(), NOW())
            ON CONFLICT (collection, id) DO NOTHING
            RETURNING {COLUMNS}
            "#
        ))
        .bind(collection.as_str())
        .bind(id)
        .bind(&data)
        .fetch_optional(&self.pool)
        .await?;

        let doc: Document = row
            .ok_or_else(|| StoreError::AlreadyExists {
                collection,
                id: id.to_string(),
            })?
            .into();
        self.publish(collection, ChangeKind::Created, &doc).await;
        Ok(doc)
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query_as::<_, DocumentRow>(&format!(
            "SELECT {COLUMNS} FROM documents WHERE collection = $1 AND id = $2"
        ))
        .bind(collection.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn update(&self, collection: Collection, id: &str, patch: Value) -> Result<Document, StoreError> {
        let row = sqlx::query_as::<_, DocumentRow>(&format!(
            r#"
            UPDATE documents
            SET data = {MERGE_EXPR},
                version = version + 1,
                updated_at = NOW()
            WHERE collection = $1 AND id = $2
            RETURNING {COLUMNS}
            "#
        ))
        .bind(collection.as_str())
        .bind(id)
        .bind(&patch)
        .fetch_optional(&self.pool)
        .await?;

        let doc: Document = row
            .ok_or_else(|| StoreError::NotFound {
                collection,
                id: id.to_string(),
            })?
            .into();
        self.publish(collection, ChangeKind::Updated, &doc).await;
        Ok(doc)
    }

    async fn update_if(
        &self,
        collection: Collection,
        id: &str,
        expected_version: u64,
        patch: Value,
    ) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query_as::<_, DocumentRow>(&format!(
            r#"
            UPDATE documents
            SET data = {MERGE_EXPR},
                version = version + 1,
                updated_at = NOW()
            WHERE collection = $1 AND id = $2 AND version = $4
            RETURNING {COLUMNS}
            "#
        ))
        .bind(collection.as_str())
        .bind(id)
        .bind(&patch)
        .bind(expected_version as i64)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let doc: Document = row.into();
                self.publish(collection, ChangeKind::Updated, &doc).await;
                Ok(Some(doc))
            }
            None => match self.get(collection, id).await? {
                Some(_) => Ok(None),
                None => Err(StoreError::NotFound {
                    collection,
                    id: id.to_string(),
                }),
            },
        }
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<bool, StoreError> {
        let row = sqlx::query_as::<_, DocumentRow>(&format!(
            "DELETE FROM documents WHERE collection = $1 AND id = $2 RETURNING {COLUMNS}"
        ))
        .bind(collection.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let doc: Document = row.into();
                self.publish(collection, ChangeKind::Deleted, &doc).await;
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
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {COLUMNS} FROM documents WHERE collection = "));
        builder.push_bind(collection.as_str());

        for filter in filters {
            builder.push(" AND data -> ");
            builder.push_bind(filter.field.clone());
            builder.push(" = ");
            builder.push_bind(filter.value.clone());
        }

        match order_by {
            Some(order) => {
                builder.push(" ORDER BY data -> ");
                builder.push_bind(order.field.clone());
                builder.push(if order.descending { " DESC" } else { " ASC" });
                builder.push(", id ASC");
            }
            None => {
                builder.push(" ORDER BY id ASC");
            }
        }

        let rows = builder
            .build_query_as::<DocumentRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn subscribe(&self, collection: Collection, filters: Vec<Filter>) -> Result<ChangeStream, StoreError> {
        match &self.feed {
            Some(feed) => feed.subscribe(collection, filters).await,
            None => Err(StoreError::Unavailable(
                "change feed is disabled for this store".to_string(),
            )),
        }
    }
}
