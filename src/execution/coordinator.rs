use std::sync::Arc;

use serde::Serialize;

use crate::api::{Exchange, OrderAck, PositionInfo};
use crate::error::{OrderStep, TradeError};
use crate::models::{Field, FieldDeltas, PendingTradeFacts, Side, Snapshot, TradeState};
use crate::persistence::SnapshotStore;
use crate::risk::{base_asset, split_targets, PositionSizing};
use crate::strategy::{Decision, TradeAction};
use crate::Result;

/// Everything the coordinator needs to know about the candle being acted on
#[derive(Debug, Clone)]
pub struct ExecutionContext<'a> {
    pub symbol: &'a str,
    /// Merged snapshot the decision was made on
    pub snapshot: &'a Snapshot,
    /// Candle minute to record as processed
    pub marker: &'a str,
    pub position: PositionInfo,
}

/// What was committed for a decision
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionOutcome {
    pub state: TradeState,
    pub action: TradeAction,
    pub orders: Vec<OrderAck>,
}

/// Runs the order sequence for a decision and commits the result
///
/// State, trade facts and the processed marker go to the store in one update
/// once the exchange calls are done. Exchange calls are awaited one at a time.
pub struct ExecutionCoordinator {
    store: Arc<dyn SnapshotStore>,
    sizing: PositionSizing,
}

impl ExecutionCoordinator {
    pub fn new(store: Arc<dyn SnapshotStore>, sizing: PositionSizing) -> Self {
        Self { store, sizing }
    }

    pub async fn execute(
        &self,
        exchange: &dyn Exchange,
        decision: Decision,
        ctx: &ExecutionContext<'_>,
    ) -> Result<ExecutionOutcome> {
        match decision.action {
            TradeAction::EnterLong => self.enter(exchange, Side::Long, decision, ctx).await,
            TradeAction::EnterShort => self.enter(exchange, Side::Short, decision, ctx).await,
            TradeAction::ExitPosition => self.exit(exchange, decision, ctx).await,
            TradeAction::None => self.hold(decision, ctx).await,
        }
    }

    async fn enter(
        &self,
        exchange: &dyn Exchange,
        side: Side,
        decision: Decision,
        ctx: &ExecutionContext<'_>,
    ) -> Result<ExecutionOutcome> {
        let ind = ctx.snapshot.indicators()?;
        let asset = base_asset(ctx.symbol);

        let balance = exchange.get_balance(asset).await?;
        let qty = match self.sizing.size(asset, balance, ind.close) {
            Ok(qty) => qty,
            Err(e @ TradeError::ZeroBalance { .. }) => {
                // Nothing was sent; this candle is done
                self.commit(ctx, TradeState::FlatFresh, &PendingTradeFacts::default())
                    .await?;
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        let levels = self.sizing.levels(side, ind.close, ind.volatility);
        let facts = PendingTradeFacts {
            entry: Some(ind.close),
            stop_loss: Some(levels.stop_loss),
            tp1: Some(levels.tp1),
            tp3x: Some(levels.tp3x),
            qty: Some(qty),
        };

        let entry_ack = exchange
            .place_market_order(ctx.symbol, side, qty, Some(levels.stop_loss))
            .await
            .map_err(|e| {
                tracing::error!(symbol = %ctx.symbol, side = ?side, qty, error = %e, "Entry order rejected");
                TradeError::OrderRejected {
                    step: OrderStep::Entry,
                    reason: e.reason(),
                }
            })?;

        tracing::info!(
            symbol = %ctx.symbol,
            side = ?side,
            qty,
            entry = ind.close,
            stop_loss = levels.stop_loss,
            order_id = %entry_ack.order_id,
            "Entered position"
        );

        let (first, second) = split_targets(qty);
        let targets = [
            (OrderStep::TakeProfit1, levels.tp1, first),
            (OrderStep::TakeProfit2, levels.tp3x, second),
        ];
        for (step, price, target_qty) in targets {
            if let Err(e) = exchange.place_take_profit(ctx.symbol, price, target_qty).await {
                tracing::error!(
                    symbol = %ctx.symbol,
                    step = %step,
                    price,
                    qty = target_qty,
                    error = %e,
                    "Take-profit failed, flattening position"
                );
                return self
                    .roll_back(exchange, side, qty, step, e, decision.next_state, &facts, ctx)
                    .await;
            }
        }

        self.commit(ctx, decision.next_state, &facts).await?;

        Ok(ExecutionOutcome {
            state: decision.next_state,
            action: decision.action,
            orders: vec![entry_ack],
        })
    }

    /// Close the position opened by a failed entry sequence
    #[allow(clippy::too_many_arguments)]
    async fn roll_back(
        &self,
        exchange: &dyn Exchange,
        side: Side,
        qty: u64,
        step: OrderStep,
        cause: TradeError,
        open_state: TradeState,
        facts: &PendingTradeFacts,
        ctx: &ExecutionContext<'_>,
    ) -> Result<ExecutionOutcome> {
        let reason = cause.reason();

        match exchange
            .place_market_order(ctx.symbol, side.opposite(), qty, None)
            .await
        {
            Ok(ack) => {
                tracing::warn!(
                    symbol = %ctx.symbol,
                    qty,
                    order_id = %ack.order_id,
                    "Entry rolled back"
                );
                self.commit(ctx, TradeState::FlatFresh, &PendingTradeFacts::default())
                    .await?;
                Err(TradeError::EntryRolledBack { step, reason })
            }
            Err(flatten_error) => {
                // Position is still open; record it so the next candle manages it
                tracing::error!(
                    symbol = %ctx.symbol,
                    state = %open_state,
                    qty,
                    error = %flatten_error,
                    "Flatten failed after take-profit failure"
                );
                self.commit(ctx, open_state, facts).await?;
                Err(TradeError::RollbackFailed {
                    step,
                    reason,
                    flatten_error: flatten_error.reason(),
                })
            }
        }
    }

    async fn exit(
        &self,
        exchange: &dyn Exchange,
        decision: Decision,
        ctx: &ExecutionContext<'_>,
    ) -> Result<ExecutionOutcome> {
        let state = ctx.snapshot.trade_state;
        let side = ctx
            .position
            .side
            .or_else(|| state.position_side())
            .ok_or_else(|| {
                TradeError::UnexpectedState(format!(
                    "Exit requested for {} with no position side (state {})",
                    ctx.symbol, state
                ))
            })?;

        let qty = if ctx.position.is_open() {
            ctx.position.size
        } else {
            ctx.snapshot.order_qty.ok_or_else(|| {
                TradeError::UnexpectedState(format!(
                    "Exit requested for {} with no known position size",
                    ctx.symbol
                ))
            })?
        };

        let ack = exchange
            .place_market_order(ctx.symbol, side.opposite(), qty, None)
            .await
            .map_err(|e| {
                tracing::error!(symbol = %ctx.symbol, qty, error = %e, "Exit order rejected");
                TradeError::OrderRejected {
                    step: OrderStep::Exit,
                    reason: e.reason(),
                }
            })?;

        tracing::info!(
            symbol = %ctx.symbol,
            from = %state,
            to = %decision.next_state,
            qty,
            order_id = %ack.order_id,
            "Closed position"
        );

        self.commit(ctx, decision.next_state, &PendingTradeFacts::default())
            .await?;

        Ok(ExecutionOutcome {
            state: decision.next_state,
            action: decision.action,
            orders: vec![ack],
        })
    }

    async fn hold(&self, decision: Decision, ctx: &ExecutionContext<'_>) -> Result<ExecutionOutcome> {
        let state = ctx.snapshot.trade_state;
        let mut facts = PendingTradeFacts::default();

        // First target filled: only the second half remains on the exchange
        if state.is_open() && !state.is_tp1_hit() && decision.next_state.is_tp1_hit() {
            match ctx.snapshot.order_qty {
                Some(qty) => facts.qty = Some(split_targets(qty).1),
                None => tracing::warn!(
                    symbol = %ctx.symbol,
                    "TP1 reached with no recorded order quantity"
                ),
            }
        }

        self.commit(ctx, decision.next_state, &facts).await?;

        Ok(ExecutionOutcome {
            state: decision.next_state,
            action: decision.action,
            orders: Vec::new(),
        })
    }

    /// Write state, facts and marker in a single store update
    async fn commit(
        &self,
        ctx: &ExecutionContext<'_>,
        state: TradeState,
        facts: &PendingTradeFacts,
    ) -> Result<()> {
        let mut deltas = FieldDeltas::new()
            .with_text(Field::TradeState, state.as_str())
            .with_text(Field::LastProcessedMarker, ctx.marker);
        facts.write_into(&mut deltas);

        self.store.update(ctx.symbol, &deltas).await?;
        tracing::info!(
            symbol = %ctx.symbol,
            state = %state,
            marker = %ctx.marker,
            "Committed trade state"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemorySnapshotStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Balance(String),
        Market { side: Side, qty: u64, stop_loss: Option<f64> },
        TakeProfit { price: f64, qty: u64 },
    }

    /// Records calls; fails the Nth order-placing call (1-based) when set
    #[derive(Default)]
    struct ScriptedExchange {
        balance: f64,
        fail_orders: Vec<usize>,
        calls: Mutex<Vec<Call>>,
        order_count: Mutex<usize>,
    }

    impl ScriptedExchange {
        fn new(balance: f64) -> Self {
            Self {
                balance,
                ..Default::default()
            }
        }

        fn failing(mut self, order_numbers: &[usize]) -> Self {
            self.fail_orders = order_numbers.to_vec();
            self
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn next_order(&self) -> Result<usize> {
            let mut count = self.order_count.lock().unwrap();
            *count += 1;
            if self.fail_orders.contains(&*count) {
                return Err(TradeError::ExchangeRejected {
                    code: 30031,
                    message: "insufficient margin".to_string(),
                });
            }
            Ok(*count)
        }
    }

    #[async_trait]
    impl Exchange for ScriptedExchange {
        async fn place_market_order(
            &self,
            _symbol: &str,
            side: Side,
            qty: u64,
            stop_loss: Option<f64>,
        ) -> Result<OrderAck> {
            self.calls.lock().unwrap().push(Call::Market { side, qty, stop_loss });
            let n = self.next_order()?;
            Ok(OrderAck {
                order_id: format!("order-{}", n),
                order_link_id: uuid::Uuid::new_v4().to_string(),
            })
        }

        async fn place_take_profit(&self, _symbol: &str, price: f64, qty: u64) -> Result<()> {
            self.calls.lock().unwrap().push(Call::TakeProfit { price, qty });
            self.next_order().map(|_| ())
        }

        async fn get_position(&self, _symbol: &str) -> Result<PositionInfo> {
            Ok(PositionInfo::flat())
        }

        async fn get_balance(&self, asset: &str) -> Result<f64> {
            self.calls.lock().unwrap().push(Call::Balance(asset.to_string()));
            Ok(self.balance)
        }
    }

    fn snapshot(state: TradeState) -> Snapshot {
        Snapshot {
            symbol: "BTCUSD".to_string(),
            trend_long: Some(2.0),
            trend_short: Some(1.0),
            baseline: Some(100.0),
            candle_close: Some(105.0),
            candle_high: Some(106.0),
            candle_low: Some(101.0),
            volatility: Some(3.0),
            volume_long: Some(5.0),
            volume_short: Some(2.0),
            trade_state: state,
            ..Snapshot::new("BTCUSD")
        }
    }

    async fn setup(state: TradeState) -> (Arc<MemorySnapshotStore>, ExecutionCoordinator, Snapshot) {
        let store = Arc::new(MemorySnapshotStore::new());
        let snap = snapshot(state);
        store.insert(snap.clone()).unwrap();
        let coordinator = ExecutionCoordinator::new(store.clone(), PositionSizing::default());
        (store, coordinator, snap)
    }

    fn ctx<'a>(snapshot: &'a Snapshot, position: PositionInfo) -> ExecutionContext<'a> {
        ExecutionContext {
            symbol: "BTCUSD",
            snapshot,
            marker: "12",
            position,
        }
    }

    #[tokio::test]
    async fn test_entry_places_order_and_two_targets() {
        let (store, coordinator, snap) = setup(TradeState::FlatFresh).await;
        let exchange = ScriptedExchange::new(2.0);

        let outcome = coordinator
            .execute(&exchange, Decision::enter(Side::Long), &ctx(&snap, PositionInfo::flat()))
            .await
            .unwrap();

        assert_eq!(outcome.state, TradeState::InLong);
        assert_eq!(
            exchange.calls(),
            vec![
                Call::Balance("BTC".to_string()),
                Call::Market { side: Side::Long, qty: 21, stop_loss: Some(100.5) },
                Call::TakeProfit { price: 108.0, qty: 10 },
                Call::TakeProfit { price: 114.0, qty: 11 },
            ]
        );

        let stored = store.get("BTCUSD").await.unwrap().unwrap();
        assert_eq!(stored.trade_state, TradeState::InLong);
        assert_eq!(stored.trade_entry, Some(105.0));
        assert_eq!(stored.trade_stop_loss, Some(100.5));
        assert_eq!(stored.trade_tp1, Some(108.0));
        assert_eq!(stored.trade_tp3x, Some(114.0));
        assert_eq!(stored.order_qty, Some(21));
        assert_eq!(stored.last_processed_marker.as_deref(), Some("12"));
    }

    #[tokio::test]
    async fn test_zero_balance_persists_flat_fresh() {
        let (store, coordinator, snap) = setup(TradeState::FlatFresh).await;
        let exchange = ScriptedExchange::new(0.0);

        let result = coordinator
            .execute(&exchange, Decision::enter(Side::Long), &ctx(&snap, PositionInfo::flat()))
            .await;

        assert!(matches!(result, Err(TradeError::ZeroBalance { .. })));
        assert_eq!(exchange.calls(), vec![Call::Balance("BTC".to_string())]);

        let stored = store.get("BTCUSD").await.unwrap().unwrap();
        assert_eq!(stored.trade_state, TradeState::FlatFresh);
        assert_eq!(stored.last_processed_marker.as_deref(), Some("12"));
    }

    #[tokio::test]
    async fn test_entry_rejection_persists_nothing() {
        let (store, coordinator, snap) = setup(TradeState::FlatFresh).await;
        let exchange = ScriptedExchange::new(2.0).failing(&[1]);

        let result = coordinator
            .execute(&exchange, Decision::enter(Side::Long), &ctx(&snap, PositionInfo::flat()))
            .await;

        assert!(matches!(
            result,
            Err(TradeError::OrderRejected { step: OrderStep::Entry, .. })
        ));
        // No take-profits after a rejected entry
        assert_eq!(exchange.calls().len(), 2);

        let stored = store.get("BTCUSD").await.unwrap().unwrap();
        assert_eq!(stored, snap);
    }

    #[tokio::test]
    async fn test_second_target_failure_flattens() {
        let (store, coordinator, snap) = setup(TradeState::FlatFresh).await;
        let exchange = ScriptedExchange::new(2.0).failing(&[3]);

        let result = coordinator
            .execute(&exchange, Decision::enter(Side::Long), &ctx(&snap, PositionInfo::flat()))
            .await;

        assert!(matches!(
            result,
            Err(TradeError::EntryRolledBack { step: OrderStep::TakeProfit2, .. })
        ));
        let calls = exchange.calls();
        assert_eq!(
            calls.last(),
            Some(&Call::Market { side: Side::Short, qty: 21, stop_loss: None })
        );

        let stored = store.get("BTCUSD").await.unwrap().unwrap();
        assert_eq!(stored.trade_state, TradeState::FlatFresh);
        assert_eq!(stored.last_processed_marker.as_deref(), Some("12"));
    }

    #[tokio::test]
    async fn test_first_target_failure_skips_second() {
        let (_store, coordinator, snap) = setup(TradeState::FlatFresh).await;
        let exchange = ScriptedExchange::new(2.0).failing(&[2]);

        let result = coordinator
            .execute(&exchange, Decision::enter(Side::Long), &ctx(&snap, PositionInfo::flat()))
            .await;

        assert!(matches!(
            result,
            Err(TradeError::EntryRolledBack { step: OrderStep::TakeProfit1, .. })
        ));
        let take_profits = exchange
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::TakeProfit { .. }))
            .count();
        assert_eq!(take_profits, 1);
    }

    #[tokio::test]
    async fn test_failed_flatten_keeps_position_state() {
        let (store, coordinator, snap) = setup(TradeState::FlatFresh).await;
        let exchange = ScriptedExchange::new(2.0).failing(&[3, 4]);

        let result = coordinator
            .execute(&exchange, Decision::enter(Side::Long), &ctx(&snap, PositionInfo::flat()))
            .await;

        assert!(matches!(result, Err(TradeError::RollbackFailed { .. })));

        let stored = store.get("BTCUSD").await.unwrap().unwrap();
        assert_eq!(stored.trade_state, TradeState::InLong);
        assert_eq!(stored.order_qty, Some(21));
        assert_eq!(stored.trade_tp1, Some(108.0));
    }

    #[tokio::test]
    async fn test_exit_uses_exchange_size() {
        let (store, coordinator, mut snap) = setup(TradeState::InLong).await;
        snap.order_qty = Some(21);
        let exchange = ScriptedExchange::new(2.0);
        let position = PositionInfo { size: 11, side: Some(Side::Long) };

        let outcome = coordinator
            .execute(
                &exchange,
                Decision::exit(TradeState::LostToBaseline),
                &ctx(&snap, position),
            )
            .await
            .unwrap();

        assert_eq!(outcome.state, TradeState::LostToBaseline);
        assert_eq!(
            exchange.calls(),
            vec![Call::Market { side: Side::Short, qty: 11, stop_loss: None }]
        );
        let stored = store.get("BTCUSD").await.unwrap().unwrap();
        assert_eq!(stored.trade_state, TradeState::LostToBaseline);
    }

    #[tokio::test]
    async fn test_exit_falls_back_to_stored_qty() {
        let (_store, coordinator, mut snap) = setup(TradeState::InShort).await;
        snap.order_qty = Some(8);
        let exchange = ScriptedExchange::new(2.0);

        coordinator
            .execute(
                &exchange,
                Decision::exit(TradeState::FlatFresh),
                &ctx(&snap, PositionInfo::flat()),
            )
            .await
            .unwrap();

        assert_eq!(
            exchange.calls(),
            vec![Call::Market { side: Side::Long, qty: 8, stop_loss: None }]
        );
    }

    #[tokio::test]
    async fn test_exit_rejection_persists_nothing() {
        let (store, coordinator, snap) = setup(TradeState::InLong).await;
        let exchange = ScriptedExchange::new(2.0).failing(&[1]);
        let position = PositionInfo { size: 10, side: Some(Side::Long) };

        let result = coordinator
            .execute(&exchange, Decision::exit(TradeState::FlatFresh), &ctx(&snap, position))
            .await;

        assert!(matches!(
            result,
            Err(TradeError::OrderRejected { step: OrderStep::Exit, .. })
        ));
        assert_eq!(store.get("BTCUSD").await.unwrap().unwrap(), snap);
    }

    #[tokio::test]
    async fn test_tp1_hit_records_remaining_qty() {
        let (store, coordinator, mut snap) = setup(TradeState::InLong).await;
        snap.order_qty = Some(21);
        store.insert(snap.clone()).unwrap();
        let exchange = ScriptedExchange::new(2.0);

        coordinator
            .execute(
                &exchange,
                Decision::hold(TradeState::InLongTp1Hit),
                &ctx(&snap, PositionInfo { size: 11, side: Some(Side::Long) }),
            )
            .await
            .unwrap();

        assert!(exchange.calls().is_empty());
        let stored = store.get("BTCUSD").await.unwrap().unwrap();
        assert_eq!(stored.trade_state, TradeState::InLongTp1Hit);
        assert_eq!(stored.order_qty, Some(11));
    }

    #[tokio::test]
    async fn test_hold_writes_state_and_marker_only() {
        let (store, coordinator, snap) = setup(TradeState::FlatFresh).await;
        let exchange = ScriptedExchange::new(2.0);

        coordinator
            .execute(
                &exchange,
                Decision::hold(TradeState::PendingAtrLong),
                &ctx(&snap, PositionInfo::flat()),
            )
            .await
            .unwrap();

        let stored = store.get("BTCUSD").await.unwrap().unwrap();
        assert_eq!(stored.trade_state, TradeState::PendingAtrLong);
        assert_eq!(stored.last_processed_marker.as_deref(), Some("12"));
        assert_eq!(stored.order_qty, None);
    }
}
