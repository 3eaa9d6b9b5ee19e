//! Redis pub/sub change feed
//!
//! The PostgreSQL store publishes one message per write on
//! `<prefix>changes:<collection>`; subscribers filter locally.

use futures::StreamExt;
use redis::AsyncCommands;
use tracing::{debug, warn};

use super::store::{ChangeEvent, ChangeStream, Collection, Filter, StoreError};
use crate::config::RedisConfig;

#[derive(Clone)]
pub struct RedisChangeFeed {
    client: redis::Client,
    publisher: redis::aio::ConnectionManager,
    prefix: String,
}

impl RedisChangeFeed {
    pub async fn new(config: &RedisConfig) -> Result<Self, StoreError> {
        let client = redis::Client::open(config.url.as_str())?;
        let publisher = redis::aio::ConnectionManager::new(client.clone()).await?;

        Ok(Self {
            client,
            publisher,
            prefix: config.prefix.clone(),
        })
    }

    pub fn channel(&self, collection: Collection) -> String {
        format!("{}changes:{}", self.prefix, collection.as_str())
    }

    /// Publish failures are logged, not returned: the write itself already
    /// succeeded and live views re-read on their next query
    pub async fn publish(&self, event: &ChangeEvent) {
        let channel = self.channel(event.collection);
        let payload = match serde_json::to_string(event) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(channel = %channel, error = %e, "Failed to encode change event");
                return;
            }
        };

        let mut conn = self.publisher.clone();
        match conn.publish::<_, _, i64>(&channel, payload).await {
            Ok(receivers) => debug!(channel = %channel, receivers, "Change event published"),
            Err(e) => warn!(channel = %channel, error = %e, "Failed to publish change event"),
        }
    }

    pub async fn subscribe(&self, collection: Collection, filters: Vec<Filter>) -> Result<ChangeStream, StoreError> {
        let channel = self.channel(collection);
        let mut pubsub = self.client.get_async_connection().await?.into_pubsub();
        pubsub.subscribe(&channel).await?;

        let stream = async_stream::stream! {
            let mut messages = pubsub.into_on_message();
            while let Some(msg) = messages.next().await {
                let payload: String = match msg.get_payload() {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!(error = %e, "Unreadable change message");
                        continue;
                    }
                };
                match serde_json::from_str::<ChangeEvent>(&payload) {
                    Ok(event) if event.matches(collection, &filters) => yield event,
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "Malformed change message"),
                }
            }
        };
        Ok(Box::pin(stream))
    }
}
