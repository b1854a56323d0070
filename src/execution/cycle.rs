use std::sync::Arc;

use serde::Serialize;

use super::coordinator::{ExecutionContext, ExecutionCoordinator, ExecutionOutcome};
use crate::api::ExchangeConnector;
use crate::auth::SecretProvider;
use crate::models::{PartialUpdate, TradeState};
use crate::persistence::SnapshotStore;
use crate::risk::PositionSizing;
use crate::strategy::{decide, ExchangePosition};
use crate::sync::{Gate, SyncBarrier};
use crate::Result;

/// Result of handling one inbound update
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CycleReport {
    /// Merged, but the barrier stayed closed
    Skipped { reason: String },
    Executed {
        symbol: String,
        marker: String,
        previous_state: TradeState,
        outcome: ExecutionOutcome,
    },
}

/// One alert in, at most one decision out
///
/// barrier -> credentials -> exchange position -> state machine -> coordinator
pub struct DecisionCycle {
    barrier: SyncBarrier,
    secrets: Arc<dyn SecretProvider>,
    connector: Arc<dyn ExchangeConnector>,
    coordinator: ExecutionCoordinator,
    secret_id: String,
}

impl DecisionCycle {
    pub fn new(
        store: Arc<dyn SnapshotStore>,
        secrets: Arc<dyn SecretProvider>,
        connector: Arc<dyn ExchangeConnector>,
        sizing: PositionSizing,
        secret_id: impl Into<String>,
    ) -> Self {
        Self {
            barrier: SyncBarrier::new(store.clone()),
            secrets,
            connector,
            coordinator: ExecutionCoordinator::new(store, sizing),
            secret_id: secret_id.into(),
        }
    }

    pub async fn run(&self, update: &PartialUpdate) -> Result<CycleReport> {
        let barrier = self.barrier.reconcile(update).await?;

        let marker = match &barrier.gate {
            Gate::Open { marker } => marker.clone(),
            Gate::NotAligned => {
                return Ok(CycleReport::Skipped {
                    reason: "feeds not aligned on one candle minute".to_string(),
                })
            }
            Gate::AlreadyProcessed { marker } => {
                return Ok(CycleReport::Skipped {
                    reason: format!("candle minute {} already processed", marker),
                })
            }
        };

        let symbol = update.symbol();
        let credentials = self
            .secrets
            .get_credentials(&self.secret_id)
            .await
            .map_err(|e| {
                tracing::error!(symbol = %symbol, secret_id = %self.secret_id, error = %e, "Could not load credentials");
                e
            })?;

        let exchange = self.connector.connect(credentials)?;
        let position = exchange.get_position(symbol).await?;

        let snapshot = &barrier.snapshot;
        let previous_state = snapshot.trade_state;
        let exchange_position = if position.is_open() {
            ExchangePosition::Open
        } else {
            ExchangePosition::Flat
        };

        let decision = decide(previous_state, snapshot, &barrier.prior, exchange_position)
            .map_err(|e| {
                tracing::error!(symbol = %symbol, state = %previous_state, error = %e, "No decision for candle");
                e
            })?;
        tracing::info!(
            symbol = %symbol,
            marker = %marker,
            state = %previous_state,
            next_state = %decision.next_state,
            action = ?decision.action,
            position_size = position.size,
            "Decided"
        );

        let ctx = ExecutionContext {
            symbol,
            snapshot,
            marker: &marker,
            position,
        };
        let outcome = self
            .coordinator
            .execute(exchange.as_ref(), decision, &ctx)
            .await?;

        Ok(CycleReport::Executed {
            symbol: symbol.to_string(),
            marker,
            previous_state,
            outcome,
        })
    }
}
