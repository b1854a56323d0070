use std::sync::Arc;

use crate::models::{PartialUpdate, Snapshot};
use crate::persistence::SnapshotStore;
use crate::Result;

/// Byte range of the minute component in an ISO-like timestamp (`YYYY-MM-DDTHH:MM...`)
const MINUTE_RANGE: std::ops::Range<usize> = 14..16;

/// Why the barrier did or did not let a delivery through
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate {
    /// All four feeds agree on `marker` and it has not been processed yet
    Open { marker: String },
    /// At least one feed is missing or reports a different minute
    NotAligned,
    /// Feeds agree but this minute was already processed
    AlreadyProcessed { marker: String },
}

#[derive(Debug, Clone)]
pub struct BarrierOutcome {
    pub gate: Gate,
    /// Record after the merge
    pub snapshot: Snapshot,
    /// Record as it stood before the merge
    pub prior: Snapshot,
}

impl BarrierOutcome {
    pub fn proceed(&self) -> bool {
        matches!(self.gate, Gate::Open { .. })
    }

    pub fn marker(&self) -> Option<&str> {
        match &self.gate {
            Gate::Open { marker } => Some(marker),
            _ => None,
        }
    }
}

/// Minute component of a feed timestamp
///
/// Plain substring of characters 14..16, so `2021-06-01T12:34:56Z` gives `34`.
pub fn candle_minute(timestamp: &str) -> Option<&str> {
    timestamp.get(MINUTE_RANGE)
}

/// Minute shared by all four feeds, None unless every feed reported in that minute
///
/// Assumes all four alerts for a candle are stamped within the same clock minute.
/// Alerts for one candle straddling a minute boundary never align.
pub fn aligned_minute(snapshot: &Snapshot) -> Option<&str> {
    let mut minutes = snapshot
        .feed_timestamps()
        .into_iter()
        .map(|ts| ts.and_then(candle_minute));

    let first = minutes.next()??;
    for minute in minutes {
        if minute? != first {
            return None;
        }
    }
    Some(first)
}

/// Decide the gate for a merged snapshot
pub fn evaluate_gate(snapshot: &Snapshot) -> Gate {
    match aligned_minute(snapshot) {
        None => Gate::NotAligned,
        Some(minute) if snapshot.last_processed_marker.as_deref() == Some(minute) => {
            Gate::AlreadyProcessed {
                marker: minute.to_string(),
            }
        }
        Some(minute) => Gate::Open {
            marker: minute.to_string(),
        },
    }
}

/// Merges partial feed updates and lets exactly one delivery per candle minute through
pub struct SyncBarrier {
    store: Arc<dyn SnapshotStore>,
}

impl SyncBarrier {
    pub fn new(store: Arc<dyn SnapshotStore>) -> Self {
        Self { store }
    }

    /// Merge `update` into the stored snapshot and evaluate the gate
    ///
    /// Store failures propagate as `TradeError::Store`; the merge is keyed by
    /// field identity so the caller can simply redeliver.
    pub async fn reconcile(&self, update: &PartialUpdate) -> Result<BarrierOutcome> {
        let symbol = update.symbol();

        let prior = self
            .store
            .get(symbol)
            .await?
            .unwrap_or_else(|| Snapshot::new(symbol));
        let snapshot = self.store.update(symbol, update.deltas()).await?;

        let gate = evaluate_gate(&snapshot);
        match &gate {
            Gate::Open { marker } => {
                tracing::info!(symbol = %symbol, marker = %marker, "All feeds aligned, proceeding");
            }
            Gate::NotAligned => {
                tracing::debug!(
                    symbol = %symbol,
                    timestamps = ?snapshot.feed_timestamps(),
                    "Timestamps not synced yet"
                );
            }
            Gate::AlreadyProcessed { marker } => {
                tracing::debug!(symbol = %symbol, marker = %marker, "Execution already completed for minute");
            }
        }

        Ok(BarrierOutcome {
            gate,
            snapshot,
            prior,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Field, FieldDeltas};
    use crate::persistence::MemorySnapshotStore;

    fn ts(minute: u32) -> String {
        format!("2021-06-01T10:{:02}:00Z", minute)
    }

    fn feed_update(field: Field, minute: u32) -> PartialUpdate {
        PartialUpdate::new("BTCUSD", FieldDeltas::new().with_text(field, ts(minute))).unwrap()
    }

    async fn deliver(barrier: &SyncBarrier, minutes: [u32; 4]) -> Vec<bool> {
        let fields = [
            Field::TrendTimestamp,
            Field::BaselineTimestamp,
            Field::VolatilityTimestamp,
            Field::VolumeTimestamp,
        ];
        let mut opened = Vec::new();
        for (field, minute) in fields.into_iter().zip(minutes) {
            let outcome = barrier.reconcile(&feed_update(field, minute)).await.unwrap();
            opened.push(outcome.proceed());
        }
        opened
    }

    #[test]
    fn test_candle_minute_substring() {
        assert_eq!(candle_minute("2021-06-01T12:34:56Z"), Some("34"));
        assert_eq!(candle_minute("2021-06-01T12:3"), None);
    }

    #[tokio::test]
    async fn test_opens_once_when_all_minutes_match() {
        let store = Arc::new(MemorySnapshotStore::new());
        let barrier = SyncBarrier::new(store.clone());

        let opened = deliver(&barrier, [12, 12, 12, 12]).await;
        assert_eq!(opened, vec![false, false, false, true]);

        // Commit the marker the way the coordinator does, then redeliver a duplicate
        store
            .update("BTCUSD", &FieldDeltas::new().with_text(Field::LastProcessedMarker, "12"))
            .await
            .unwrap();
        let dup = barrier
            .reconcile(&feed_update(Field::VolumeTimestamp, 12))
            .await
            .unwrap();
        assert!(!dup.proceed());
        assert_eq!(
            dup.gate,
            Gate::AlreadyProcessed {
                marker: "12".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_never_opens_with_one_feed_off() {
        let barrier = SyncBarrier::new(Arc::new(MemorySnapshotStore::new()));

        let opened = deliver(&barrier, [12, 12, 13, 12]).await;
        assert!(opened.iter().all(|o| !o));
    }

    #[tokio::test]
    async fn test_never_opens_before_all_feeds_reported() {
        let barrier = SyncBarrier::new(Arc::new(MemorySnapshotStore::new()));

        for _ in 0..3 {
            let outcome = barrier
                .reconcile(&feed_update(Field::TrendTimestamp, 12))
                .await
                .unwrap();
            assert_eq!(outcome.gate, Gate::NotAligned);
        }
    }

    #[tokio::test]
    async fn test_arrival_order_does_not_matter() {
        let barrier = SyncBarrier::new(Arc::new(MemorySnapshotStore::new()));

        let order = [
            Field::VolumeTimestamp,
            Field::TrendTimestamp,
            Field::VolatilityTimestamp,
            Field::BaselineTimestamp,
        ];
        let mut last = None;
        for field in order {
            last = Some(barrier.reconcile(&feed_update(field, 45)).await.unwrap());
        }

        let last = last.unwrap();
        assert!(last.proceed());
        assert_eq!(last.marker(), Some("45"));
    }

    #[tokio::test]
    async fn test_prior_is_pre_merge_record() {
        let barrier = SyncBarrier::new(Arc::new(MemorySnapshotStore::new()));

        let first = PartialUpdate::new(
            "BTCUSD",
            FieldDeltas::new()
                .with_number(Field::CandleClose, 98.0)
                .with_text(Field::BaselineTimestamp, ts(11)),
        )
        .unwrap();
        barrier.reconcile(&first).await.unwrap();

        let second = PartialUpdate::new(
            "BTCUSD",
            FieldDeltas::new()
                .with_number(Field::CandleClose, 105.0)
                .with_text(Field::BaselineTimestamp, ts(12)),
        )
        .unwrap();
        let outcome = barrier.reconcile(&second).await.unwrap();

        assert_eq!(outcome.prior.candle_close, Some(98.0));
        assert_eq!(outcome.snapshot.candle_close, Some(105.0));
    }

    #[tokio::test]
    async fn test_next_candle_opens_again() {
        let store = Arc::new(MemorySnapshotStore::new());
        let barrier = SyncBarrier::new(store.clone());

        deliver(&barrier, [12, 12, 12, 12]).await;
        store
            .update("BTCUSD", &FieldDeltas::new().with_text(Field::LastProcessedMarker, "12"))
            .await
            .unwrap();

        let opened = deliver(&barrier, [13, 13, 13, 13]).await;
        assert_eq!(opened, vec![false, false, false, true]);
    }

    #[tokio::test]
    async fn test_minute_boundary_race_is_not_aligned() {
        // Same candle, but one alert was stamped a second after the minute rolled over.
        // The heuristic treats this as misaligned; kept as-is for compatibility.
        let barrier = SyncBarrier::new(Arc::new(MemorySnapshotStore::new()));

        let opened = deliver(&barrier, [59, 59, 59, 0]).await;
        assert!(opened.iter().all(|o| !o));
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let store = Arc::new(MemorySnapshotStore::new());
        store.set_unavailable(true);
        let barrier = SyncBarrier::new(store);

        let result = barrier.reconcile(&feed_update(Field::TrendTimestamp, 12)).await;
        assert!(matches!(result, Err(crate::error::TradeError::Store(_))));
    }
}
