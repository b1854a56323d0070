use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::collections::HashMap;
use tokio::time::{timeout, Duration};

use super::SnapshotStore;
use crate::error::TradeError;
use crate::models::{FieldDeltas, Snapshot};
use crate::Result;

/// Redis persistence for instrument snapshots
///
/// One hash per instrument at `snapshot:{symbol}`, one hash field per snapshot field.
pub struct RedisSnapshotStore {
    conn: ConnectionManager,
}

impl RedisSnapshotStore {
    /// Connect to Redis
    ///
    /// # Arguments
    /// * `redis_url` - Redis connection URL (e.g., "redis://127.0.0.1:6379")
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)?;

        // Add 5 second timeout to connection attempt
        let conn = timeout(Duration::from_secs(5), ConnectionManager::new(client))
            .await
            .map_err(|_| TradeError::Store("Redis connection timeout after 5 seconds".to_string()))??;

        tracing::info!("Connected to Redis at {}", redis_url);

        Ok(Self { conn })
    }

    fn key(symbol: &str) -> String {
        format!("snapshot:{}", symbol)
    }
}

#[async_trait]
impl SnapshotStore for RedisSnapshotStore {
    async fn get(&self, symbol: &str) -> Result<Option<Snapshot>> {
        let mut conn = self.conn.clone();
        let raw: HashMap<String, String> = conn.hgetall(Self::key(symbol)).await?;

        if raw.is_empty() {
            return Ok(None);
        }

        Snapshot::from_store(symbol, &raw).map(Some)
    }

    async fn update(&self, symbol: &str, deltas: &FieldDeltas) -> Result<Snapshot> {
        if deltas.is_empty() {
            return Ok(self.get(symbol).await?.unwrap_or_else(|| Snapshot::new(symbol)));
        }

        let key = Self::key(symbol);
        let pairs = deltas.to_store_pairs();
        let mut conn = self.conn.clone();

        // MULTI/EXEC so the write and the read-back see the same record
        let (raw,): (HashMap<String, String>,) = redis::pipe()
            .atomic()
            .hset_multiple(&key, &pairs)
            .ignore()
            .hgetall(&key)
            .query_async(&mut conn)
            .await?;

        tracing::debug!(symbol = %symbol, fields = pairs.len(), "Snapshot updated in Redis");

        Snapshot::from_store(symbol, &raw)
    }
}
