use super::entry::{continuation_rules, entry_rules, lost_to_baseline_rules};
use super::position::{classify_closed_position, in_trade_rules};
use super::Decision;
use crate::error::TradeError;
use crate::models::{Snapshot, TradeState};
use crate::Result;

/// What the exchange reports for the instrument's position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangePosition {
    Open,
    Flat,
}

/// Next state and action for one candle, given the state as recorded locally
///
/// Pure: the same inputs always give the same decision. Open-family states only
/// ever exit or hold; entries come from the flat family.
pub fn transition(state: TradeState, current: &Snapshot, prior: &Snapshot) -> Result<Decision> {
    let ind = current.indicators()?;

    if state.is_open() {
        return in_trade_rules(state, &ind, current);
    }

    Ok(match state {
        TradeState::ContinuationPending => continuation_rules(&ind),
        TradeState::LostToBaseline => lost_to_baseline_rules(&ind, prior),
        _ => entry_rules(state, &ind, prior),
    })
}

/// Reconcile the local state with the exchange, then run the transition
pub fn decide(
    state: TradeState,
    current: &Snapshot,
    prior: &Snapshot,
    exchange: ExchangePosition,
) -> Result<Decision> {
    match (exchange, state.is_open()) {
        (ExchangePosition::Open, true) | (ExchangePosition::Flat, false) => {
            transition(state, current, prior)
        }
        (ExchangePosition::Open, false) => Err(TradeError::UnexpectedState(format!(
            "Exchange holds a position for {} while state is {}",
            current.symbol, state
        ))),
        (ExchangePosition::Flat, true) => {
            let ind = current.indicators()?;
            let closed_as = classify_closed_position(state, &ind, current)?;
            tracing::info!(
                symbol = %current.symbol,
                state = %state,
                closed_as = %closed_as,
                "Position closed on exchange (TP/SL)"
            );

            if closed_as == TradeState::LostToBaseline {
                // Stopped out: wait for a reversal before any new entry
                return Ok(Decision::hold(closed_as));
            }
            transition(closed_as, current, prior)
        }
    }
}
