use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::SnapshotStore;
use crate::error::TradeError;
use crate::models::{FieldDeltas, Snapshot};
use crate::Result;

/// In-process snapshot store, used for dry runs and tests
#[derive(Default)]
pub struct MemorySnapshotStore {
    records: Mutex<HashMap<String, Snapshot>>,
    unavailable: AtomicBool,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or overwrite a record
    pub fn insert(&self, snapshot: Snapshot) -> Result<()> {
        let mut records = self.records.lock().map_err(|e| TradeError::Store(e.to_string()))?;
        records.insert(snapshot.symbol.clone(), snapshot);
        Ok(())
    }

    /// Simulate an outage: every call fails while set
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(TradeError::Store("Store unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn get(&self, symbol: &str) -> Result<Option<Snapshot>> {
        self.check_available()?;
        let records = self.records.lock().map_err(|e| TradeError::Store(e.to_string()))?;
        Ok(records.get(symbol).cloned())
    }

    async fn update(&self, symbol: &str, deltas: &FieldDeltas) -> Result<Snapshot> {
        self.check_available()?;
        let mut records = self.records.lock().map_err(|e| TradeError::Store(e.to_string()))?;

        // Merge into a copy so a bad delta leaves the stored record untouched
        let mut merged = records
            .get(symbol)
            .cloned()
            .unwrap_or_else(|| Snapshot::new(symbol));
        merged.apply(deltas)?;
        records.insert(symbol.to_string(), merged.clone());

        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Field;

    #[tokio::test]
    async fn test_update_creates_record() {
        let store = MemorySnapshotStore::new();
        assert!(store.get("BTCUSD").await.unwrap().is_none());

        let merged = store
            .update("BTCUSD", &FieldDeltas::new().with_number(Field::Baseline, 100.0))
            .await
            .unwrap();

        assert_eq!(merged.baseline, Some(100.0));
        assert_eq!(store.get("BTCUSD").await.unwrap(), Some(merged));
    }

    #[tokio::test]
    async fn test_failed_delta_leaves_record_untouched() {
        let store = MemorySnapshotStore::new();
        store
            .update("BTCUSD", &FieldDeltas::new().with_number(Field::Baseline, 100.0))
            .await
            .unwrap();

        let bad = FieldDeltas::new()
            .with_number(Field::Volatility, 3.0)
            .with_text(Field::TradeState, "NOT_A_STATE");
        assert!(store.update("BTCUSD", &bad).await.is_err());

        let stored = store.get("BTCUSD").await.unwrap().unwrap();
        assert_eq!(stored.volatility, None);
    }

    #[tokio::test]
    async fn test_unavailable_store_fails() {
        let store = MemorySnapshotStore::new();
        store.set_unavailable(true);

        assert!(matches!(store.get("BTCUSD").await, Err(TradeError::Store(_))));
        assert!(store.update("BTCUSD", &FieldDeltas::new()).await.is_err());
    }
}
